//! Resolves a logical datablock index within a file's block list to its
//! on-disk offset and compressed size, using the meta-index cache to skip
//! over as much of the block list as possible.

use std::io::{Read, Seek};

use super::block_list;
use super::index_filler;
use super::meta_index::{self, SlotTable, INDEXES_PER_ENTRY, SCRATCH_WORDS};
use super::meta_index_error::MetaIndexError;
use super::metadata::{CachingMetadataReader, EntryReference};

#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockLocation {
    pub data_block_offset: u64,
    pub compressed_size: u32,
    pub is_compressed: bool,
}

/// Resolve block `logical_block_index` of a file whose block list starts at
/// `block_list_ref` / `blocks_start` and spans `num_blocks` datablocks.
pub(crate) fn read_blocklist<R: Read + Seek>(
    slot_table: &SlotTable,
    md: &mut CachingMetadataReader<R>,
    inode_number: u32,
    block_list_ref: EntryReference,
    blocks_start: u64,
    num_blocks: u32,
    logical_block_index: u64,
) -> Result<BlockLocation, MetaIndexError> {
    let skip = meta_index::skip(u64::from(num_blocks).max(1));
    let step = INDEXES_PER_ENTRY * skip;
    let target_coarse = logical_block_index / step;

    let r = index_filler::fill(slot_table, md, inode_number, block_list_ref, blocks_start, target_coarse, skip)?;
    let (mut cursor, mut data_block, mut reached_block) = (r.cursor, r.data_block, r.reached_coarse * step);

    while reached_block + SCRATCH_WORDS as u64 <= logical_block_index {
        let span = block_list::read_block_indexes(md, &mut cursor, SCRATCH_WORDS)?;
        data_block += span;
        reached_block += SCRATCH_WORDS as u64;
    }
    let remaining = (logical_block_index - reached_block) as usize;
    if remaining > 0 {
        let span = block_list::read_block_indexes(md, &mut cursor, remaining)?;
        data_block += span;
    }

    let word = block_list::read_single_word(md, &mut cursor)?;
    Ok(BlockLocation {
        data_block_offset: data_block,
        compressed_size: block_list::compressed_size(word),
        is_compressed: block_list::is_compressed(word),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::squashfs::meta_index::SlotTable;
    use crate::squashfs::superblock::Compressor;
    use std::io::Cursor;

    fn words_stream(words: &[u32]) -> Vec<u8> {
        let payload_len = (words.len() * 4) as u16;
        let mut buf = Vec::new();
        buf.extend_from_slice(&(payload_len | 0x8000).to_le_bytes());
        for w in words {
            buf.extend_from_slice(&w.to_le_bytes());
        }
        buf
    }

    #[test]
    fn locates_block_by_summing_preceding_sizes() {
        let table = SlotTable::new();
        let words = [0x100u32, 0x200, 0x300, 0x400];
        let stream = words_stream(&words);
        let mut md = CachingMetadataReader::new(Cursor::new(stream), Compressor::None);

        let loc = read_blocklist(&table, &mut md, 1, EntryReference::new(0, 0), 5000, 4, 2).unwrap();
        assert_eq!(loc.data_block_offset, 5000 + 0x100 + 0x200);
        assert_eq!(loc.compressed_size, 0x300);
        assert!(loc.is_compressed);
    }

    #[test]
    fn repeated_lookups_on_same_file_reuse_the_cache() {
        let table = SlotTable::new();
        let hop = INDEXES_PER_ENTRY as usize;
        let words: Vec<u32> = (0..hop * 3 + 5).map(|i| 0x10 + i as u32).collect();
        let stream = words_stream(&words);
        let mut md = CachingMetadataReader::new(Cursor::new(stream), Compressor::None);

        let last_index = (words.len() - 1) as u64;
        let first = read_blocklist(&table, &mut md, 55, EntryReference::new(0, 0), 0, words.len() as u32, last_index).unwrap();

        // A second identical lookup must reuse the cached entries and only
        // read the uncached tail again -- it must not re-read from scratch
        // (the Cursor would return the same bytes regardless, so this test
        // documents intent rather than detecting divergence by itself; see
        // `index_filler::tests::second_fill_reuses_cached_entries` for the
        // stronger EOF-based assertion).
        let second = read_blocklist(&table, &mut md, 55, EntryReference::new(0, 0), 0, words.len() as u32, last_index).unwrap();
        assert_eq!(first.data_block_offset, second.data_block_offset);
    }

    #[test]
    fn hole_word_reports_zero_compressed_size() {
        let table = SlotTable::new();
        let words = [0u32, 0x200];
        let stream = words_stream(&words);
        let mut md = CachingMetadataReader::new(Cursor::new(stream), Compressor::None);

        let loc = read_blocklist(&table, &mut md, 9, EntryReference::new(0, 0), 0, 2, 0).unwrap();
        assert_eq!(loc.compressed_size, 0);
    }
}
