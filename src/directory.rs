//! Single-block directories.
//!
//! A directory's entries live in one data block as a fixed array of
//! [`DirEntry`] slots (480 per block). The block is allocated lazily on the
//! first insertion; a directory that fills it is simply full.

use std::path::Path;

use crate::bitmap::Bitmap;
use crate::codec;
use crate::config::{BLOCK_SIZE_BYTES, DIR_ENTRY_SIZE};
use crate::error::{FsError, Result};
use crate::inode::write_inode;
use crate::structs::{DirEntry, Inode};

fn load_entries(dir_inode: &Inode, fs_dir: &Path) -> Result<Vec<DirEntry>> {
    let mut buf = vec![0u8; BLOCK_SIZE_BYTES];
    codec::read_block(fs_dir, dir_inode.blocks[0], &mut buf)?;
    Ok(buf
        .chunks_exact(DIR_ENTRY_SIZE)
        .map(DirEntry::from_bytes)
        .collect())
}

fn store_entries(dir_inode: &Inode, fs_dir: &Path, entries: &[DirEntry]) -> Result<()> {
    let mut buf = vec![0u8; BLOCK_SIZE_BYTES];
    for (slot, entry) in entries.iter().enumerate() {
        buf[slot * DIR_ENTRY_SIZE..(slot + 1) * DIR_ENTRY_SIZE]
            .copy_from_slice(&entry.to_bytes());
    }
    codec::write_block(fs_dir, dir_inode.blocks[0], &buf)
}

/// Insert `name -> child_ino` into a directory. The directory's data block
/// is allocated on the first insertion, which requires `bm`; later inserts
/// may pass `None`.
pub fn dir_add(
    bm: Option<&mut Bitmap>,
    dir_inode: &mut Inode,
    fs_dir: &Path,
    name: &str,
    child_ino: u32,
) -> Result<()> {
    if !dir_inode.is_dir() {
        return Err(FsError::NotDir);
    }
    let entry = DirEntry::new(child_ino, name)?;

    if dir_inode.block_count == 0 {
        let Some(bm) = bm else {
            return Err(FsError::Full);
        };
        let Some(blk) = bm.alloc_blocks(1) else {
            return Err(FsError::Full);
        };
        // the fresh block must read back as all-empty slots
        if let Err(err) = codec::write_block(fs_dir, blk, &[]) {
            bm.free_blocks(blk, 1);
            return Err(err);
        }
        dir_inode.blocks[0] = blk;
        dir_inode.block_count = 1;
        dir_inode.size = 0;
        bm.write(fs_dir)?;
        write_inode(dir_inode, fs_dir)?;
    }

    let mut entries = load_entries(dir_inode, fs_dir)?;
    let mut free_idx = None;
    for (slot, cur) in entries.iter().enumerate() {
        if cur.ino == 0 {
            if free_idx.is_none() {
                free_idx = Some(slot);
            }
        } else if cur.matches(name) {
            return Err(FsError::Exists);
        }
    }
    let Some(slot) = free_idx else {
        return Err(FsError::Full);
    };

    entries[slot] = entry;
    dir_inode.size += DIR_ENTRY_SIZE as u32;
    store_entries(dir_inode, fs_dir, &entries)?;
    write_inode(dir_inode, fs_dir)
}

/// Remove the entry named `name`, returning the inode it pointed to.
pub fn dir_remove(dir_inode: &mut Inode, fs_dir: &Path, name: &str) -> Result<u32> {
    if !dir_inode.is_dir() {
        return Err(FsError::NotDir);
    }
    if dir_inode.block_count == 0 {
        return Err(FsError::NotFound);
    }

    let mut entries = load_entries(dir_inode, fs_dir)?;
    let Some(slot) = entries.iter().position(|e| e.ino != 0 && e.matches(name)) else {
        return Err(FsError::NotFound);
    };

    let removed = entries[slot].ino;
    entries[slot].ino = 0;
    entries[slot].name[0] = 0;
    dir_inode.size -= DIR_ENTRY_SIZE as u32;
    store_entries(dir_inode, fs_dir, &entries)?;
    write_inode(dir_inode, fs_dir)?;
    Ok(removed)
}

/// Look `name` up, returning the inode it maps to.
pub fn dir_lookup(dir_inode: &Inode, fs_dir: &Path, name: &str) -> Result<u32> {
    if !dir_inode.is_dir() {
        return Err(FsError::NotDir);
    }
    if dir_inode.block_count == 0 {
        return Err(FsError::NotFound);
    }
    let entries = load_entries(dir_inode, fs_dir)?;
    entries
        .iter()
        .find(|e| e.ino != 0 && e.matches(name))
        .map(|e| e.ino)
        .ok_or(FsError::NotFound)
}

/// All occupied slots, in slot order.
pub fn dir_entries(dir_inode: &Inode, fs_dir: &Path) -> Result<Vec<DirEntry>> {
    if !dir_inode.is_dir() {
        return Err(FsError::NotDir);
    }
    if dir_inode.block_count == 0 {
        return Ok(Vec::new());
    }
    let entries = load_entries(dir_inode, fs_dir)?;
    Ok(entries.into_iter().filter(|e| e.ino != 0).collect())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{BITMAP_BLK, ENTRIES_PER_BLOCK, SUPERBLOCK_BLK};
    use crate::inode::create_inode;
    use crate::inode::read_inode;

    fn fresh_dir(total: u32) -> (tempfile::TempDir, Bitmap, Inode) {
        let dir = tempfile::TempDir::new().unwrap();
        let mut bm = Bitmap::new(total);
        bm.set(SUPERBLOCK_BLK, true);
        bm.set(BITMAP_BLK, true);
        let ino = create_inode(&mut bm, true, dir.path()).unwrap();
        let inode = read_inode(ino, dir.path()).unwrap();
        (dir, bm, inode)
    }

    #[test]
    fn test_add_then_lookup() {
        let (dir, mut bm, mut dir_inode) = fresh_dir(16);
        dir_add(Some(&mut bm), &mut dir_inode, dir.path(), "a.txt", 7).unwrap();
        dir_add(Some(&mut bm), &mut dir_inode, dir.path(), "b.txt", 8).unwrap();

        assert_eq!(dir_lookup(&dir_inode, dir.path(), "a.txt").unwrap(), 7);
        assert_eq!(dir_lookup(&dir_inode, dir.path(), "b.txt").unwrap(), 8);
        assert_eq!(dir_inode.block_count, 1);
        assert_eq!(dir_inode.size, 2 * DIR_ENTRY_SIZE as u32);
        assert!(matches!(
            dir_lookup(&dir_inode, dir.path(), "c.txt"),
            Err(FsError::NotFound)
        ));
    }

    #[test]
    fn test_first_insert_allocates_the_block() {
        let (dir, mut bm, mut dir_inode) = fresh_dir(16);
        assert_eq!(dir_inode.block_count, 0);
        let used_before = bm.used();

        dir_add(Some(&mut bm), &mut dir_inode, dir.path(), "x", 5).unwrap();
        assert_eq!(dir_inode.block_count, 1);
        assert!(bm.test(dir_inode.blocks[0]));
        assert_eq!(bm.used(), used_before + 1);

        // and the metadata was persisted
        let back = read_inode(dir_inode.ino, dir.path()).unwrap();
        assert_eq!(back.blocks[0], dir_inode.blocks[0]);
        let persisted = Bitmap::read(dir.path(), 16).unwrap();
        assert!(persisted.test(dir_inode.blocks[0]));
    }

    #[test]
    fn test_without_bitmap_first_insert_fails() {
        let (dir, _bm, mut dir_inode) = fresh_dir(16);
        let err = dir_add(None, &mut dir_inode, dir.path(), "x", 5).unwrap_err();
        assert!(matches!(err, FsError::Full));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let (dir, mut bm, mut dir_inode) = fresh_dir(16);
        dir_add(Some(&mut bm), &mut dir_inode, dir.path(), "same", 5).unwrap();
        let err = dir_add(Some(&mut bm), &mut dir_inode, dir.path(), "same", 6).unwrap_err();
        assert!(matches!(err, FsError::Exists));
        assert_eq!(dir_lookup(&dir_inode, dir.path(), "same").unwrap(), 5);
    }

    #[test]
    fn test_remove_frees_the_slot() {
        let (dir, mut bm, mut dir_inode) = fresh_dir(16);
        dir_add(Some(&mut bm), &mut dir_inode, dir.path(), "a", 5).unwrap();
        dir_add(Some(&mut bm), &mut dir_inode, dir.path(), "b", 6).unwrap();

        assert_eq!(dir_remove(&mut dir_inode, dir.path(), "a").unwrap(), 5);
        assert_eq!(dir_inode.size, DIR_ENTRY_SIZE as u32);
        assert!(matches!(
            dir_lookup(&dir_inode, dir.path(), "a"),
            Err(FsError::NotFound)
        ));

        // slot is reusable
        dir_add(Some(&mut bm), &mut dir_inode, dir.path(), "c", 7).unwrap();
        let entries = dir_entries(&dir_inode, dir.path()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name_bytes(), b"c");
        assert_eq!(entries[1].name_bytes(), b"b");
    }

    #[test]
    fn test_remove_missing_entry() {
        let (dir, mut bm, mut dir_inode) = fresh_dir(16);
        assert!(matches!(
            dir_remove(&mut dir_inode, dir.path(), "ghost"),
            Err(FsError::NotFound)
        ));
        dir_add(Some(&mut bm), &mut dir_inode, dir.path(), "a", 5).unwrap();
        assert!(matches!(
            dir_remove(&mut dir_inode, dir.path(), "ghost"),
            Err(FsError::NotFound)
        ));
    }

    #[test]
    fn test_not_a_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut bm = Bitmap::new(16);
        bm.set(SUPERBLOCK_BLK, true);
        bm.set(BITMAP_BLK, true);
        let ino = create_inode(&mut bm, false, dir.path()).unwrap();
        let mut file_inode = read_inode(ino, dir.path()).unwrap();
        let err =
            dir_add(Some(&mut bm), &mut file_inode, dir.path(), "x", 5).unwrap_err();
        assert!(matches!(err, FsError::NotDir));
        assert!(matches!(
            dir_lookup(&file_inode, dir.path(), "x"),
            Err(FsError::NotDir)
        ));
    }

    #[test]
    fn test_slot_capacity() {
        assert_eq!(ENTRIES_PER_BLOCK, 480);
    }
}
