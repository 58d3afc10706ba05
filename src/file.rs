//! Byte-addressed reads and writes over an inode's direct blocks.

use std::path::Path;

use crate::bitmap::Bitmap;
use crate::codec;
use crate::config::{BLOCK_SIZE_BYTES, DIRECT_BLOCKS};
use crate::error::{FsError, Result};
use crate::inode::resize;
use crate::structs::Inode;

/// Read up to `buf.len()` bytes starting at `offset`. Reads past the end of
/// the file are clamped; an offset at or past EOF reads zero bytes.
pub fn fread(inode: &Inode, fs_dir: &Path, offset: u32, buf: &mut [u8]) -> Result<usize> {
    if inode.is_dir() {
        return Err(FsError::IsDir);
    }
    if offset >= inode.size {
        return Ok(0);
    }
    let want = buf.len().min((inode.size - offset) as usize);

    let mut block_buf = vec![0u8; BLOCK_SIZE_BYTES];
    let mut done = 0usize;
    while done < want {
        let pos = offset as usize + done;
        let blk_idx = pos / BLOCK_SIZE_BYTES;
        let blk_off = pos % BLOCK_SIZE_BYTES;
        if blk_idx >= DIRECT_BLOCKS {
            return Err(FsError::Invalid("file size exceeds direct-block capacity"));
        }
        let chunk = (BLOCK_SIZE_BYTES - blk_off).min(want - done);
        codec::read_block(fs_dir, inode.blocks[blk_idx], &mut block_buf)?;
        buf[done..done + chunk].copy_from_slice(&block_buf[blk_off..blk_off + chunk]);
        done += chunk;
    }
    Ok(want)
}

/// Write all of `data` at `offset`, growing the file first when the write
/// extends past the current size. Partial blocks are read-modify-written;
/// whole-block writes skip the read.
pub fn fwrite(
    bm: &mut Bitmap,
    inode: &mut Inode,
    fs_dir: &Path,
    offset: u32,
    data: &[u8],
) -> Result<usize> {
    if inode.is_dir() {
        return Err(FsError::IsDir);
    }
    if data.is_empty() {
        return Ok(0);
    }
    let end = offset as u64 + data.len() as u64;
    if end > (DIRECT_BLOCKS * BLOCK_SIZE_BYTES) as u64 {
        return Err(FsError::Full);
    }
    let end = end as u32;
    if end > inode.size {
        resize(bm, inode, end, fs_dir)?;
    }

    let mut block_buf = vec![0u8; BLOCK_SIZE_BYTES];
    let mut done = 0usize;
    while done < data.len() {
        let pos = offset as usize + done;
        let blk_idx = pos / BLOCK_SIZE_BYTES;
        let blk_off = pos % BLOCK_SIZE_BYTES;
        let chunk = (BLOCK_SIZE_BYTES - blk_off).min(data.len() - done);
        let blk = inode.blocks[blk_idx];
        if blk_off > 0 || chunk < BLOCK_SIZE_BYTES {
            codec::read_block(fs_dir, blk, &mut block_buf)?;
        }
        block_buf[blk_off..blk_off + chunk].copy_from_slice(&data[done..done + chunk]);
        codec::write_block(fs_dir, blk, &block_buf)?;
        done += chunk;
    }
    Ok(data.len())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{BITMAP_BLK, SUPERBLOCK_BLK};
    use crate::inode::{create_inode, read_inode};

    fn fresh_file(total: u32) -> (tempfile::TempDir, Bitmap, Inode) {
        let dir = tempfile::TempDir::new().unwrap();
        let mut bm = Bitmap::new(total);
        bm.set(SUPERBLOCK_BLK, true);
        bm.set(BITMAP_BLK, true);
        let ino = create_inode(&mut bm, false, dir.path()).unwrap();
        let inode = read_inode(ino, dir.path()).unwrap();
        for blk in 0..total {
            if !crate::codec::block_path(dir.path(), blk).exists() {
                crate::codec::create_empty_block(dir.path(), blk).unwrap();
            }
        }
        (dir, bm, inode)
    }

    #[test]
    fn test_small_write_read() {
        let (dir, mut bm, mut inode) = fresh_file(16);
        let written = fwrite(&mut bm, &mut inode, dir.path(), 0, b"hello").unwrap();
        assert_eq!(written, 5);
        assert_eq!(inode.size, 5);
        assert_eq!(inode.block_count, 1);

        let mut buf = [0u8; 5];
        assert_eq!(fread(&inode, dir.path(), 0, &mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn test_read_clamped_at_eof() {
        let (dir, mut bm, mut inode) = fresh_file(16);
        fwrite(&mut bm, &mut inode, dir.path(), 0, b"abc").unwrap();

        let mut buf = [0u8; 16];
        assert_eq!(fread(&inode, dir.path(), 0, &mut buf).unwrap(), 3);
        assert_eq!(fread(&inode, dir.path(), 3, &mut buf).unwrap(), 0);
        assert_eq!(fread(&inode, dir.path(), 1000, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_write_spanning_blocks() {
        let (dir, mut bm, mut inode) = fresh_file(16);
        let data: Vec<u8> = (0..2 * BLOCK_SIZE_BYTES + 64).map(|i| i as u8).collect();
        fwrite(&mut bm, &mut inode, dir.path(), 0, &data).unwrap();
        assert_eq!(inode.block_count, 3);
        assert_eq!(inode.size as usize, data.len());

        let mut back = vec![0u8; data.len()];
        assert_eq!(fread(&inode, dir.path(), 0, &mut back).unwrap(), data.len());
        assert_eq!(back, data);
    }

    #[test]
    fn test_overwrite_inside_a_block() {
        let (dir, mut bm, mut inode) = fresh_file(16);
        fwrite(&mut bm, &mut inode, dir.path(), 0, &vec![b'.'; 300]).unwrap();
        fwrite(&mut bm, &mut inode, dir.path(), 100, b"PATCH").unwrap();
        assert_eq!(inode.size, 300);

        let mut back = vec![0u8; 300];
        fread(&inode, dir.path(), 0, &mut back).unwrap();
        assert_eq!(&back[..100], &vec![b'.'; 100][..]);
        assert_eq!(&back[100..105], b"PATCH");
        assert_eq!(&back[105..], &vec![b'.'; 195][..]);
    }

    #[test]
    fn test_write_at_unaligned_offset_crossing_blocks() {
        let (dir, mut bm, mut inode) = fresh_file(16);
        let offset = BLOCK_SIZE_BYTES as u32 - 3;
        fwrite(&mut bm, &mut inode, dir.path(), offset, b"straddle").unwrap();
        assert_eq!(inode.size, offset + 8);
        assert_eq!(inode.block_count, 2);

        let mut back = [0u8; 8];
        fread(&inode, dir.path(), offset, &mut back).unwrap();
        assert_eq!(&back, b"straddle");
    }

    #[test]
    fn test_write_past_direct_budget() {
        let (dir, mut bm, mut inode) = fresh_file(16);
        let offset = (DIRECT_BLOCKS * BLOCK_SIZE_BYTES) as u32 - 2;
        let err = fwrite(&mut bm, &mut inode, dir.path(), offset, b"xyz").unwrap_err();
        assert!(matches!(err, FsError::Full));
        assert_eq!(inode.size, 0);
    }

    #[test]
    fn test_directory_io_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut bm = Bitmap::new(16);
        bm.set(SUPERBLOCK_BLK, true);
        bm.set(BITMAP_BLK, true);
        let ino = create_inode(&mut bm, true, dir.path()).unwrap();
        let mut inode = read_inode(ino, dir.path()).unwrap();

        let mut buf = [0u8; 4];
        assert!(matches!(
            fread(&inode, dir.path(), 0, &mut buf),
            Err(FsError::IsDir)
        ));
        assert!(matches!(
            fwrite(&mut bm, &mut inode, dir.path(), 0, b"no"),
            Err(FsError::IsDir)
        ));
    }

    #[test]
    fn test_empty_write_is_a_no_op() {
        let (dir, mut bm, mut inode) = fresh_file(16);
        assert_eq!(fwrite(&mut bm, &mut inode, dir.path(), 0, b"").unwrap(), 0);
        assert_eq!(inode.size, 0);
        assert_eq!(inode.block_count, 0);
    }
}
