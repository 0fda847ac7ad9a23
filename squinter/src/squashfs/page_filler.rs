//! Fills one fixed-size page of a file's uncompressed data, routing between
//! the datablock and fragment paths and always returning a complete result --
//! never leaving a caller-visible "locked but unfilled" state.
//!
//! Grounded on [`super::filedata::FileDataReader`] for the
//! locate-block-then-decompress-then-copy shape, and on
//! [`super::block::FragmentBlockCache`]/[`super::block::FragmentReader`] for
//! the fragment path.

use std::io::{self, Read, Seek, SeekFrom};

use super::block::FragmentBlockCache;
use super::block_locator;
use super::compressed::CompressedBlockReader;
use super::meta_index::SlotTable;
use super::meta_index_error::MetaIndexError;
use super::metadata::{self, BasicFileInfo, CachingMetadataReader};
use super::readermux::ReaderClient;
use super::superblock::{Compressor, Superblock};

/// The result of a page fill. Stands in for the kernel page-cache flags this
/// crate has no OS-resident cache to coordinate with: `sparse` marks a page
/// that came from a hole (zero-filled without reading anything), `uptodate`
/// is always true on return -- the caller never needs to retry.
#[derive(Debug, Clone)]
pub struct PageFill {
    pub data: Vec<u8>,
    pub sparse: bool,
    pub uptodate: bool,
}

/// Fill `target_page` (a `page_size`-byte window) of the file described by
/// `file_info`. Never fails outwardly: any internal error is logged and
/// collapsed into a zero-filled, `uptodate` page, per the "host must never
/// leave a page locked" rule this replaces kernel-side page-cache handling
/// with.
#[allow(clippy::too_many_arguments)]
pub(crate) fn fill_page<R: Read + Seek>(
    slot_table: &SlotTable,
    md: &mut CachingMetadataReader<ReaderClient<R>>,
    frag_cache: &mut FragmentBlockCache<ReaderClient<R>>,
    data_client: &mut ReaderClient<R>,
    sb: &Superblock,
    inode_number: u32,
    file_info: &BasicFileInfo,
    page_size: u64,
    target_page: u64,
) -> PageFill {
    let file_size = u64::from(file_info.file_size);
    let page_start = target_page * page_size;

    if page_start >= file_size {
        return PageFill { data: vec![0u8; page_size as usize], sparse: true, uptodate: true };
    }

    match fill_page_inner(slot_table, md, frag_cache, data_client, sb, inode_number, file_info, page_size, page_start) {
        Ok(fill) => fill,
        Err(e) => {
            log::warn!("page fill failed for inode {inode_number} page {target_page}: {e}");
            PageFill { data: vec![0u8; page_size as usize], sparse: false, uptodate: true }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn fill_page_inner<R: Read + Seek>(
    slot_table: &SlotTable,
    md: &mut CachingMetadataReader<ReaderClient<R>>,
    frag_cache: &mut FragmentBlockCache<ReaderClient<R>>,
    data_client: &mut ReaderClient<R>,
    sb: &Superblock,
    inode_number: u32,
    file_info: &BasicFileInfo,
    page_size: u64,
    page_start: u64,
) -> Result<PageFill, MetaIndexError> {
    let file_size = u64::from(file_info.file_size);
    let block_size = u64::from(sb.block_size);
    let page_len = std::cmp::min(page_size, file_size - page_start) as usize;
    let mut data = vec![0u8; page_size as usize];

    // When a datablock spans several pages (block_size > page_size), every
    // page in that span maps to the same datablock_index. page_mask/
    // start_page/end_page name that span explicitly; this crate fills one
    // page per call (the caller owns one page-sized buffer, not a resident
    // page cache to deposit a whole group into), so the group bound is used
    // only to derive datablock_index and to bound target_page within it, not
    // to batch-fill the rest of the group.
    let pages_per_block = (block_size / page_size).max(1);
    let page_mask = pages_per_block - 1;
    let target_page = page_start / page_size;
    let start_page = target_page & !page_mask;
    let end_page = start_page | page_mask;
    debug_assert!(start_page <= target_page && target_page <= end_page);
    let datablock_index = (start_page / pages_per_block) as u32;
    let file_last_datablock = file_info.num_blocks;

    let has_fragment = file_info.frag_index != u32::MAX;

    if !has_fragment || datablock_index < file_last_datablock {
        let loc = block_locator::read_blocklist(
            slot_table,
            md,
            inode_number,
            file_info.block_list_ref,
            u64::from(file_info.blocks_start),
            file_info.num_blocks,
            u64::from(datablock_index),
        )?;

        if loc.compressed_size == 0 {
            // A hole: no disk bytes exist for this datablock at all.
            return Ok(PageFill { data, sparse: true, uptodate: true });
        }

        let block_start_byte = u64::from(datablock_index) * block_size;
        let block_data_len = std::cmp::min(block_size, file_size - block_start_byte);
        let comp = if loc.is_compressed { sb.compressor } else { Compressor::None };

        data_client.seek(SeekFrom::Start(loc.data_block_offset))?;
        let mut block_reader = CompressedBlockReader::new(&mut *data_client, comp, u64::from(loc.compressed_size), block_data_len)?;
        let in_block_offset = page_start - block_start_byte;
        io::copy(&mut block_reader.by_ref().take(in_block_offset), &mut io::sink())?;
        block_reader.read_exact(&mut data[..page_len])?;
        return Ok(PageFill { data, sparse: false, uptodate: true });
    }

    // Fragment path: the file's tail end lives packed alongside other files'
    // tails in a shared fragment block.
    let frag_table = metadata::FragmentLookupTable::read(data_client, sb)?;
    let entry = frag_table
        .lu_table
        .entries
        .get(file_info.frag_index as usize)
        .ok_or(MetaIndexError::FragmentError)?;
    let frag_disk_len = entry.size & 0x00FF_FFFF;
    if frag_disk_len == 0 {
        return Err(MetaIndexError::FragmentError);
    }
    // FragmentBlockCache decompresses with the superblock's global compressor
    // for every block; it has no per-block "stored uncompressed" override the
    // way the datablock path above does. Carried over from FragmentBlockCache
    // as-is (see DESIGN.md).

    let full_blocks_bytes = u64::from(file_last_datablock) * block_size;
    let tail_len = file_size - full_blocks_bytes;
    let within_tail = page_start - full_blocks_bytes;

    let mut frag_reader = frag_cache.get_fragment_reader(
        entry.start,
        u64::from(frag_disk_len),
        block_size,
        u64::from(file_info.block_offset),
        tail_len,
    )?;
    frag_reader.seek(SeekFrom::Start(within_tail))?;
    frag_reader.read_exact(&mut data[..page_len])?;

    Ok(PageFill { data, sparse: false, uptodate: true })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::squashfs::meta_index::SlotTable;
    use crate::squashfs::metadata::EntryReference;
    use crate::squashfs::readermux::ReaderMux;
    use crate::squashfs::superblock::SuperblockFlags;
    use std::io::Cursor;

    fn test_superblock(block_size: u32, compressor: Compressor) -> Superblock {
        Superblock {
            magic: 0,
            inode_count: 1,
            mod_time: 0,
            block_size,
            frag_count: 0,
            compressor,
            block_log: 0,
            flags: SuperblockFlags::empty(),
            id_count: 0,
            version_major: 4,
            version_minor: 0,
            root_inode: EntryReference::new(0, 0),
            bytes_used: 0,
            id_table: 0,
            xattr_table: u64::MAX,
            inode_table: 0,
            dir_table: 0,
            frag_table: 0,
            export_table: u64::MAX,
        }
    }

    /// One metadata block (header + raw words) holding a file's block list.
    fn block_list_stream(words: &[u32]) -> Vec<u8> {
        let payload_len = (words.len() * 4) as u16;
        let mut buf = Vec::new();
        buf.extend_from_slice(&(payload_len | 0x8000).to_le_bytes());
        for w in words {
            buf.extend_from_slice(&w.to_le_bytes());
        }
        buf
    }

    struct Harness {
        reader_mux: ReaderMux<Cursor<Vec<u8>>>,
        slot_table: SlotTable,
        sb: Superblock,
    }

    impl Harness {
        fn new(image: Vec<u8>, block_size: u32) -> Self {
            Self {
                reader_mux: ReaderMux::new(Cursor::new(image)),
                slot_table: SlotTable::new(),
                sb: test_superblock(block_size, Compressor::None),
            }
        }

        fn fill(&mut self, inode_number: u32, info: &BasicFileInfo, page_size: u64, target_page: u64) -> PageFill {
            let mut md = CachingMetadataReader::new(self.reader_mux.client(), self.sb.compressor);
            let mut frag_cache = FragmentBlockCache::new(self.reader_mux.client(), self.sb.compressor);
            let mut data_client = self.reader_mux.client();
            fill_page(&self.slot_table, &mut md, &mut frag_cache, &mut data_client, &self.sb, inode_number, info, page_size, target_page)
        }
    }

    #[test]
    fn past_eof_page_is_sparse_and_uptodate() {
        let mut harness = Harness::new(Vec::new(), 131072);
        let info = BasicFileInfo {
            blocks_start: 0,
            frag_index: u32::MAX,
            block_offset: 0,
            file_size: 100,
            block_sizes: Vec::new(),
            block_list_ref: EntryReference::new(0, 0),
            num_blocks: 1,
        };

        // target_page 2 at a 4096-byte page size starts well past EOF.
        let fill = harness.fill(1, &info, 4096, 2);
        assert!(fill.sparse);
        assert!(fill.uptodate);
        assert!(fill.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn small_file_fills_from_a_single_datablock() {
        // One block-list word for a single datablock holding the whole file,
        // flagged "stored uncompressed" so the CompressedBlockReader::None
        // path serves it directly.
        let word = 100u32 | 0x0100_0000;
        let mut image = block_list_stream(&[word]);
        let blocks_start = image.len() as u32;
        let payload: Vec<u8> = (0..100u8).collect();
        image.extend_from_slice(&payload);

        let mut harness = Harness::new(image, 131072);
        let info = BasicFileInfo {
            blocks_start,
            frag_index: u32::MAX,
            block_offset: 0,
            file_size: 100,
            block_sizes: Vec::new(),
            block_list_ref: EntryReference::new(0, 0),
            num_blocks: 1,
        };

        let fill = harness.fill(1, &info, 64, 0);
        assert!(!fill.sparse);
        assert!(fill.uptodate);
        assert_eq!(&fill.data[..64], &payload[..64]);
    }

    #[test]
    fn hole_datablock_is_sparse_and_zero_filled() {
        // Two block-list words: a real block, then a hole (word == 0).
        let real_word = 64u32 | 0x0100_0000;
        let image = block_list_stream(&[real_word, 0]);

        let mut harness = Harness::new(image, 64);
        let info = BasicFileInfo {
            blocks_start: 0,
            frag_index: u32::MAX,
            block_offset: 0,
            file_size: 128,
            block_sizes: Vec::new(),
            block_list_ref: EntryReference::new(0, 0),
            num_blocks: 2,
        };

        // page 1, at a 64-byte page size, lands entirely in the hole.
        let fill = harness.fill(2, &info, 64, 1);
        assert!(fill.sparse);
        assert!(fill.uptodate);
        assert!(fill.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn corrupt_slot_collapses_to_a_zero_filled_uptodate_page() {
        let image = block_list_stream(&[100u32 | 0x0100_0000]);
        let mut harness = Harness::new(image, 131072);

        // Manufacture a corrupt slot: claimed for this inode at coarse
        // offset 0, then released with no entry ever pushed into it.
        drop(harness.slot_table.empty(3, 0, 1).unwrap());

        let info = BasicFileInfo {
            blocks_start: 0,
            frag_index: u32::MAX,
            block_offset: 0,
            file_size: 100,
            block_sizes: Vec::new(),
            block_list_ref: EntryReference::new(0, 0),
            num_blocks: 1,
        };

        let fill = harness.fill(3, &info, 64, 0);
        assert!(!fill.sparse);
        assert!(fill.uptodate);
        assert!(fill.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn fragment_path_reads_the_files_tail_out_of_the_shared_block() {
        // Fragment table layout: one block_offsets entry, pointing at a
        // metadata block holding a single 16-byte FragmentEntry, followed by
        // the raw (uncompressed) fragment block bytes it points to.
        let mut image = Vec::new();
        let entries_block_off = 8u64;
        image.extend_from_slice(&entries_block_off.to_le_bytes());

        let frag_block_start = entries_block_off + 2 + 16;
        let frag_disk_len = 15u32;
        let mut entry_bytes = [0u8; 16];
        entry_bytes[0..8].copy_from_slice(&frag_block_start.to_le_bytes());
        entry_bytes[8..12].copy_from_slice(&frag_disk_len.to_le_bytes());
        image.extend_from_slice(&(16u16 | 0x8000).to_le_bytes());
        image.extend_from_slice(&entry_bytes);

        let frag_payload: Vec<u8> = (0..15u8).collect();
        image.extend_from_slice(&frag_payload);

        let mut harness = Harness::new(image, 131072);
        harness.sb.frag_table = 0;
        harness.sb.frag_count = 1;

        let info = BasicFileInfo {
            blocks_start: 0,
            frag_index: 0,
            block_offset: 5, // this file's tail starts 5 bytes into the fragment block
            file_size: 10,   // and runs for 10 bytes -- no full datablocks at all
            block_sizes: Vec::new(),
            block_list_ref: EntryReference::new(0, 0),
            num_blocks: 0,
        };

        let fill = harness.fill(4, &info, 64, 0);
        assert!(!fill.sparse);
        assert!(fill.uptodate);
        assert_eq!(&fill.data[..10], &frag_payload[5..15]);
    }
}
