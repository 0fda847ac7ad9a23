mod block;
mod block_list;
mod block_locator;
mod compressed;
mod index_filler;
mod meta_index;
mod meta_index_error;
mod page_filler;
mod squashfs;
mod filedata;
mod readermux;
mod superblock;

pub mod metadata;
pub mod path;
pub use squashfs::*;
pub use metadata::Inode;
pub use meta_index_error::MetaIndexError;
pub use page_filler::PageFill;
