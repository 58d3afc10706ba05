//! BWFS is a Unix-style filesystem whose disk is a folder of monochrome
//! images: every logical block is one 1000x1000 single-channel image, and a
//! byte of data is eight adjacent pixels (bit 1 white, bit 0 black).
//!
//! The layers, bottom to top:
//! 1. Block codec:       image file <-> 125,000-byte payload     | `codec`
//! 2. Superblock/Bitmap: global metadata in blocks 0 and 1,      | `superblock`, `bitmap`
//!                       worst-fit contiguous allocation
//! 3. Inode:             one record per block, ten direct ptrs   | `inode`
//! 4. Directory/Path:    single-block directories, `/` walking   | `directory`, `path`
//! 5. File:              byte-offset reads and writes            | `file`
//! 6. FileSystem:        the mounted facade the tools consume    | `fs`
//!
//! `mkfs` formats a host directory, `fsck` checks and repairs one, and the
//! `fuse` module (cargo feature `fuse`) hooks the facade into the kernel.

mod bitmap;
mod codec;
mod config;
mod directory;
mod error;
mod file;
mod fs;
mod fsck;
#[cfg(feature = "fuse")]
mod fuse;
mod inode;
mod mkfs;
mod path;
mod structs;
mod superblock;

pub use bitmap::Bitmap;
pub use codec::{block_path, create_empty_block, read_block, write_block};
pub use config::*;
pub use directory::{dir_add, dir_entries, dir_lookup, dir_remove};
pub use error::{FsError, Result};
pub use file::{fread, fwrite};
pub use fs::{FileSystem, FsStat};
pub use fsck::{check, CheckOptions, CheckReport, CheckStatus};
#[cfg(feature = "fuse")]
pub use fuse::BwfsFuse;
pub use inode::{create_inode, read_inode, resize, write_inode};
pub use mkfs::format;
pub use path::{resolve, split};
pub use structs::{DirEntry, Inode, Superblock};
pub use superblock::{read_superblock, write_superblock};
