//! Formatting a host directory into a fresh volume.

use std::fs;
use std::path::Path;

use log::info;

use crate::bitmap::Bitmap;
use crate::codec;
use crate::config::{BITMAP_BLK, MIN_BLOCKS, SUPERBLOCK_BLK};
use crate::error::{FsError, Result};
use crate::inode::create_inode;
use crate::structs::Superblock;
use crate::superblock::write_superblock;

/// Initialize `fs_dir` as a fresh filesystem of `total_blocks` blocks:
/// superblock in block 0, bitmap in block 1, an empty root directory, and
/// one all-black image per remaining block. Returns the new superblock.
pub fn format(fs_dir: &Path, total_blocks: u32) -> Result<Superblock> {
    if total_blocks < MIN_BLOCKS {
        return Err(FsError::Invalid("a volume needs at least 3 blocks"));
    }
    fs::create_dir_all(fs_dir)?;

    let mut sb = Superblock::new(total_blocks);
    let mut bm = Bitmap::new(total_blocks);
    bm.set(SUPERBLOCK_BLK, true);
    bm.set(BITMAP_BLK, true);

    let root = create_inode(&mut bm, true, fs_dir)?;
    sb.root_inode = root;

    write_superblock(&sb, fs_dir)?;
    bm.write(fs_dir)?;

    // blocks persisted above keep their content
    for blk in 0..total_blocks {
        if !codec::block_path(fs_dir, blk).exists() {
            codec::create_empty_block(fs_dir, blk)?;
        }
    }

    info!(
        "formatted {} with {} blocks (root inode {})",
        fs_dir.display(),
        total_blocks,
        root
    );
    Ok(sb)
}
