use std::io;

use thiserror::Error;

/// Semantic error categories raised by the meta-index cache and page-fill
/// pipeline. Kept distinct from the plain `io::Error` the rest of squinter's
/// readers return, since callers need to tell "degraded but correct" apart
/// from "actually broken".
#[derive(Error, Debug)]
pub enum MetaIndexError {
    /// A slot matching the requested inode and range was located but had no
    /// entries -- impossible if the cache invariants held.
    #[error("meta-index slot corrupted: located slot for inode {inode} has no entries")]
    Corruption { inode: u32 },

    /// No unlocked slot was available anywhere in the table. Not fatal --
    /// `index_filler::fill` handles this in place by continuing the walk
    /// uncached from wherever it had reached, so this variant is never
    /// actually constructed; it stays part of the taxonomy for whichever
    /// caller wants to distinguish "degraded" from "broken" explicitly.
    #[error("meta-index cache exhausted, degrading to uncached walk")]
    ExhaustedCache,

    /// The external data-block reader returned zero decompressed bytes.
    #[error("data block read returned no bytes")]
    ReadFailure,

    /// The fragment cache reported its error flag for the requested entry.
    #[error("fragment cache entry is in error state")]
    FragmentError,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<MetaIndexError> for io::Error {
    fn from(e: MetaIndexError) -> Self {
        match e {
            MetaIndexError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }
}
