//! Inode persistence and sizing.
//!
//! Every inode occupies its own block, so the block index is the inode
//! number. Only the ten direct pointers are supported; `indirect` stays
//! zero on disk.

use std::path::Path;

use log::warn;

use crate::bitmap::Bitmap;
use crate::codec;
use crate::config::{BLOCK_SIZE_BYTES, DIRECT_BLOCKS, INODE_DISK_SIZE};
use crate::error::{FsError, Result};
use crate::structs::Inode;

/// Create a fresh inode: reserve one block for the record itself, persist
/// the record and then the bitmap. The reservation is rolled back when
/// either write fails.
pub fn create_inode(bm: &mut Bitmap, is_dir: bool, fs_dir: &Path) -> Result<u32> {
    let Some(ino_blk) = bm.alloc_blocks(1) else {
        return Err(FsError::Full);
    };
    let inode = Inode::new(ino_blk, is_dir);
    if let Err(err) = write_inode(&inode, fs_dir).and_then(|_| bm.write(fs_dir)) {
        bm.free_blocks(ino_blk, 1);
        if let Err(rollback) = bm.write(fs_dir) {
            warn!("bitmap rewrite after failed inode create: {rollback}");
        }
        return Err(err);
    }
    Ok(ino_blk)
}

/// Persist an inode record into its own block.
pub fn write_inode(inode: &Inode, fs_dir: &Path) -> Result<()> {
    codec::write_block(fs_dir, inode.ino, &inode.to_bytes())
}

/// Load the inode stored in block `ino`.
pub fn read_inode(ino: u32, fs_dir: &Path) -> Result<Inode> {
    let mut buf = [0u8; INODE_DISK_SIZE];
    codec::read_block(fs_dir, ino, &mut buf)?;
    Ok(Inode::from_bytes(&buf))
}

/// Grow or shrink a file to `new_size` bytes, allocating or releasing
/// direct blocks one at a time. All-or-nothing with respect to the caller's
/// inode: on any failure it is left exactly as it was, and an allocation
/// shortfall frees whatever this call reserved. The bitmap is persisted
/// before the inode, so an interruption between the two can only leak
/// blocks, never leave a pointer to a free one.
pub fn resize(bm: &mut Bitmap, inode: &mut Inode, new_size: u32, fs_dir: &Path) -> Result<()> {
    let req = (new_size as usize).div_ceil(BLOCK_SIZE_BYTES) as u32;
    if req > DIRECT_BLOCKS as u32 {
        return Err(FsError::Full);
    }

    let mut staged = *inode;
    let cur = staged.block_count;
    if req > cur {
        let mut fresh: Vec<u32> = Vec::with_capacity((req - cur) as usize);
        for _ in cur..req {
            match bm.alloc_blocks(1) {
                Some(blk) => fresh.push(blk),
                None => {
                    for &blk in &fresh {
                        bm.free_blocks(blk, 1);
                    }
                    if let Err(rollback) = bm.write(fs_dir) {
                        warn!("bitmap rewrite after failed grow: {rollback}");
                    }
                    return Err(FsError::Full);
                }
            }
        }
        for (i, blk) in fresh.into_iter().enumerate() {
            staged.blocks[cur as usize + i] = blk;
        }
    } else if req < cur {
        for slot in req..cur {
            bm.free_blocks(staged.blocks[slot as usize], 1);
            staged.blocks[slot as usize] = 0;
        }
    }

    staged.block_count = req;
    staged.size = new_size;
    bm.write(fs_dir)?;
    write_inode(&staged, fs_dir)?;
    *inode = staged;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{BITMAP_BLK, SUPERBLOCK_BLK};

    fn fresh_volume(total: u32) -> (tempfile::TempDir, Bitmap) {
        let dir = tempfile::TempDir::new().unwrap();
        let mut bm = Bitmap::new(total);
        bm.set(SUPERBLOCK_BLK, true);
        bm.set(BITMAP_BLK, true);
        (dir, bm)
    }

    #[test]
    fn test_create_and_read_back() {
        let (dir, mut bm) = fresh_volume(16);
        let ino = create_inode(&mut bm, true, dir.path()).unwrap();
        assert_eq!(ino, 2);
        assert!(bm.test(ino));

        let inode = read_inode(ino, dir.path()).unwrap();
        assert_eq!(inode.ino, ino);
        assert!(inode.is_dir());
        assert_eq!(inode.size, 0);
        assert_eq!(inode.block_count, 0);

        // the bitmap was persisted along with the inode
        let persisted = Bitmap::read(dir.path(), 16).unwrap();
        assert!(persisted.test(ino));
    }

    #[test]
    fn test_create_fails_on_full_volume() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut bm = Bitmap::new(4);
        for blk in 0..4 {
            bm.set(blk, true);
        }
        let err = create_inode(&mut bm, false, dir.path()).unwrap_err();
        assert!(matches!(err, FsError::Full));
    }

    #[test]
    fn test_resize_grow_and_shrink() {
        let (dir, mut bm) = fresh_volume(16);
        let ino = create_inode(&mut bm, false, dir.path()).unwrap();
        let mut inode = read_inode(ino, dir.path()).unwrap();

        resize(&mut bm, &mut inode, 2 * BLOCK_SIZE_BYTES as u32 + 7, dir.path()).unwrap();
        assert_eq!(inode.block_count, 3);
        assert_eq!(inode.size, 2 * BLOCK_SIZE_BYTES as u32 + 7);
        assert_eq!(inode.used_prefix(), 3);
        for slot in 0..3 {
            assert!(bm.test(inode.blocks[slot]));
        }

        let freed = inode.blocks[1];
        resize(&mut bm, &mut inode, 1, dir.path()).unwrap();
        assert_eq!(inode.block_count, 1);
        assert_eq!(inode.size, 1);
        assert!(!bm.test(freed));
        assert_eq!(inode.blocks[1], 0);

        let back = read_inode(ino, dir.path()).unwrap();
        assert_eq!(back, inode);
    }

    #[test]
    fn test_resize_to_zero_frees_everything() {
        let (dir, mut bm) = fresh_volume(16);
        let ino = create_inode(&mut bm, false, dir.path()).unwrap();
        let mut inode = read_inode(ino, dir.path()).unwrap();
        resize(&mut bm, &mut inode, 1000, dir.path()).unwrap();
        let data_blk = inode.blocks[0];

        resize(&mut bm, &mut inode, 0, dir.path()).unwrap();
        assert_eq!(inode.block_count, 0);
        assert_eq!(inode.size, 0);
        assert!(!bm.test(data_blk));
        assert_eq!(inode.used_prefix(), 0);
    }

    #[test]
    fn test_resize_beyond_direct_budget() {
        let (dir, mut bm) = fresh_volume(16);
        let ino = create_inode(&mut bm, false, dir.path()).unwrap();
        let mut inode = read_inode(ino, dir.path()).unwrap();

        let too_big = (DIRECT_BLOCKS * BLOCK_SIZE_BYTES + 1) as u32;
        let err = resize(&mut bm, &mut inode, too_big, dir.path()).unwrap_err();
        assert!(matches!(err, FsError::Full));
        assert_eq!(inode.block_count, 0);
        assert_eq!(inode.size, 0);

        let at_limit = (DIRECT_BLOCKS * BLOCK_SIZE_BYTES) as u32;
        resize(&mut bm, &mut inode, at_limit, dir.path()).unwrap();
        assert_eq!(inode.block_count, DIRECT_BLOCKS as u32);
    }

    #[test]
    fn test_resize_shortfall_rolls_back() {
        // 6 blocks total, 3 free after superblock + bitmap + inode
        let (dir, mut bm) = fresh_volume(6);
        let ino = create_inode(&mut bm, false, dir.path()).unwrap();
        let mut inode = read_inode(ino, dir.path()).unwrap();
        let used_before = bm.used();

        let err = resize(&mut bm, &mut inode, 4 * BLOCK_SIZE_BYTES as u32, dir.path()).unwrap_err();
        assert!(matches!(err, FsError::Full));
        assert_eq!(inode.block_count, 0);
        assert_eq!(inode.size, 0);
        assert_eq!(bm.used(), used_before);
    }
}
