//! Reads raw block-list words out of the compressed metadata stream.
//!
//! A file's block list is a run of little-endian 32-bit words living inline
//! in the metadata stream, immediately after its inode header -- the same
//! stream [`super::metadata::CachingMetadataReader`] already serves inode and
//! directory reads from, so block-list words are read through it rather than
//! through a separate mechanism.

use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};

use super::meta_index_error::MetaIndexError;
use super::metadata::{CachingMetadataReader, EntryReference};

/// Top bit of a block-list word flags "stored uncompressed"; the low 24 bits
/// are the on-disk length.
const COMPRESSED_SIZE_MASK: u32 = 0x00FF_FFFF;

pub(crate) fn compressed_size(word: u32) -> u32 {
    word & COMPRESSED_SIZE_MASK
}

pub(crate) fn is_compressed(word: u32) -> bool {
    word & 0x0100_0000 == 0
}

/// Read `n` consecutive block-list words starting at `cursor`, advance
/// `cursor` past them, and return the summed on-disk span
/// (`Σ compressed_size(word)`) those `n` blocks occupy.
///
/// `n` is expected to be small -- bounded by the caller's scratch-word
/// allowance (`SCRATCH_WORDS`); callers needing more words make repeated calls
/// rather than asking for an unbounded read in one go.
pub(crate) fn read_block_indexes<R: Read + Seek>(
    md: &mut CachingMetadataReader<R>,
    cursor: &mut EntryReference,
    n: usize,
) -> Result<u64, MetaIndexError> {
    seek_to(md, *cursor)?;

    let mut span: u64 = 0;
    for _ in 0..n {
        let word = md.read_u32::<LittleEndian>()?;
        span += u64::from(compressed_size(word));
    }
    *cursor = md.current_ref();
    Ok(span)
}

/// Read a single block-list word at `cursor` without advancing the running
/// data-block total -- used by the locator to peek at the target block's own
/// size once the walk has reached it.
pub(crate) fn read_single_word<R: Read + Seek>(
    md: &mut CachingMetadataReader<R>,
    cursor: &mut EntryReference,
) -> Result<u32, MetaIndexError> {
    seek_to(md, *cursor)?;
    let word = md.read_u32::<LittleEndian>()?;
    *cursor = md.current_ref();
    Ok(word)
}

fn seek_to<R: Read + Seek>(md: &mut CachingMetadataReader<R>, cursor: EntryReference) -> io::Result<()> {
    md.seek(SeekFrom::Start(cursor.location()))?;
    io::copy(&mut md.by_ref().take(cursor.offset().into()), &mut io::sink())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::squashfs::superblock::Compressor;
    use std::io::Cursor;

    fn build_metadata_stream(words: &[u32]) -> Vec<u8> {
        // One uncompressed metadata block holding the words, preceded by its
        // 2-byte size/compressed header.
        let payload_len = (words.len() * 4) as u16;
        let mut buf = Vec::new();
        buf.extend_from_slice(&(payload_len | 0x8000).to_le_bytes());
        for w in words {
            buf.extend_from_slice(&w.to_le_bytes());
        }
        buf
    }

    #[test]
    fn reads_words_and_sums_compressed_size() {
        let words = [0x000400u32, 0x800800, 0x000300];
        let stream = build_metadata_stream(&words);
        let mut md = CachingMetadataReader::new(Cursor::new(stream), Compressor::None);
        let mut cursor = EntryReference::new(0, 0);

        let span = read_block_indexes(&mut md, &mut cursor, 3).unwrap();
        assert_eq!(span, 0x400 + 0x800 + 0x300);
    }

    #[test]
    fn single_word_reads_without_moving_twice() {
        let words = [0x0000_1000u32, 0x0000_2000];
        let stream = build_metadata_stream(&words);
        let mut md = CachingMetadataReader::new(Cursor::new(stream), Compressor::None);
        let mut cursor = EntryReference::new(0, 0);

        let w = read_single_word(&mut md, &mut cursor).unwrap();
        assert_eq!(compressed_size(w), 0x1000);
        let w2 = read_single_word(&mut md, &mut cursor).unwrap();
        assert_eq!(compressed_size(w2), 0x2000);
    }

    #[test]
    fn hole_word_has_zero_compressed_size() {
        assert_eq!(compressed_size(0), 0);
    }
}
