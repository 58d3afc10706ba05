//! Superblock persistence (block 0).

use std::path::Path;

use log::info;

use crate::codec;
use crate::config::{BLOCK_SIZE_BITS, MAGIC, SUPERBLOCK_BLK, SUPERBLOCK_DISK_SIZE};
use crate::error::{FsError, Result};
use crate::structs::Superblock;

/// Write the superblock header at the start of block 0.
pub fn write_superblock(sb: &Superblock, fs_dir: &Path) -> Result<()> {
    codec::write_block(fs_dir, SUPERBLOCK_BLK, &sb.to_bytes())?;
    info!(
        "superblock written (total_blocks={}, root_inode={})",
        sb.total_blocks, sb.root_inode
    );
    Ok(())
}

/// Load the superblock from block 0 and validate it.
pub fn read_superblock(fs_dir: &Path) -> Result<Superblock> {
    let mut buf = [0u8; SUPERBLOCK_DISK_SIZE];
    codec::read_block(fs_dir, SUPERBLOCK_BLK, &mut buf)?;
    let sb = Superblock::from_bytes(&buf);
    if sb.magic != MAGIC {
        return Err(FsError::BadMagic(sb.magic));
    }
    if sb.block_size != BLOCK_SIZE_BITS as u32 {
        return Err(FsError::BadBlockSize(sb.block_size));
    }
    Ok(sb)
}
