//! The mounted-filesystem facade.
//!
//! [`FileSystem`] owns the only mutable state of a mounted volume — the
//! superblock and the allocation bitmap — and exposes the operation table
//! the CLI tools and the FUSE bridge consume. One instance per filesystem
//! directory; concurrent instances are not supported.

use std::path::{Path, PathBuf};

use log::warn;

use crate::bitmap::Bitmap;
use crate::config::{BLOCK_SIZE_BYTES, NAME_MAX};
use crate::directory::{dir_add, dir_entries, dir_lookup, dir_remove};
use crate::error::{FsError, Result};
use crate::file::{fread, fwrite};
use crate::inode::{create_inode, read_inode, resize};
use crate::mkfs;
use crate::path;
use crate::structs::{DirEntry, Inode, Superblock};
use crate::superblock::read_superblock;

/// Free-space summary reported by `statfs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStat {
    pub total_blocks: u32,
    pub free_blocks: u32,
    pub block_size: u32,
    pub name_max: u32,
}

#[derive(Debug)]
pub struct FileSystem {
    fs_dir: PathBuf,
    sb: Superblock,
    bitmap: Bitmap,
}

impl FileSystem {
    /// Format `fs_dir` and mount the fresh volume.
    pub fn format(fs_dir: impl Into<PathBuf>, total_blocks: u32) -> Result<Self> {
        let fs_dir = fs_dir.into();
        mkfs::format(&fs_dir, total_blocks)?;
        Self::mount(fs_dir)
    }

    /// Mount an existing volume.
    pub fn mount(fs_dir: impl Into<PathBuf>) -> Result<Self> {
        let fs_dir = fs_dir.into();
        let sb = read_superblock(&fs_dir)?;
        let bitmap = Bitmap::read(&fs_dir, sb.total_blocks)?;
        Ok(FileSystem { fs_dir, sb, bitmap })
    }

    pub fn superblock(&self) -> &Superblock {
        &self.sb
    }

    pub fn fs_dir(&self) -> &Path {
        &self.fs_dir
    }

    pub fn root_ino(&self) -> u32 {
        self.sb.root_inode
    }

    pub fn statfs(&self) -> FsStat {
        FsStat {
            total_blocks: self.sb.total_blocks,
            free_blocks: self.sb.total_blocks - self.bitmap.used(),
            block_size: BLOCK_SIZE_BYTES as u32,
            name_max: NAME_MAX as u32,
        }
    }

    /// Nothing is buffered; present for bridge completeness.
    pub fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    // ---- inode-level primitives ----------------------------------------

    /// Load the inode stored in block `ino`.
    pub fn inode(&self, ino: u32) -> Result<Inode> {
        if ino < 2 || ino >= self.sb.total_blocks {
            return Err(FsError::NotFound);
        }
        read_inode(ino, &self.fs_dir)
    }

    /// Resolve `name` inside directory `dir_ino`.
    pub fn lookup_at(&self, dir_ino: u32, name: &str) -> Result<Inode> {
        let dir = self.inode(dir_ino)?;
        let ino = dir_lookup(&dir, &self.fs_dir, name)?;
        read_inode(ino, &self.fs_dir)
    }

    /// Occupied entries of directory `dir_ino`, in slot order.
    pub fn entries_at(&self, dir_ino: u32) -> Result<Vec<DirEntry>> {
        let dir = self.inode(dir_ino)?;
        dir_entries(&dir, &self.fs_dir)
    }

    /// Create a file or directory named `name` under `dir_ino`.
    pub fn create_at(&mut self, dir_ino: u32, name: &str, is_dir: bool) -> Result<Inode> {
        let mut parent = self.inode(dir_ino)?;
        if !parent.is_dir() {
            return Err(FsError::NotDir);
        }
        let ino = create_inode(&mut self.bitmap, is_dir, &self.fs_dir)?;
        if let Err(err) = dir_add(
            Some(&mut self.bitmap),
            &mut parent,
            &self.fs_dir,
            name,
            ino,
        ) {
            self.bitmap.free_blocks(ino, 1);
            if let Err(rollback) = self.bitmap.write(&self.fs_dir) {
                warn!("bitmap rewrite after failed create: {rollback}");
            }
            return Err(err);
        }
        read_inode(ino, &self.fs_dir)
    }

    pub fn unlink_at(&mut self, dir_ino: u32, name: &str) -> Result<()> {
        self.remove_entry(dir_ino, name, false)
    }

    pub fn rmdir_at(&mut self, dir_ino: u32, name: &str) -> Result<()> {
        self.remove_entry(dir_ino, name, true)
    }

    fn remove_entry(&mut self, dir_ino: u32, name: &str, is_rmdir: bool) -> Result<()> {
        let mut parent = self.inode(dir_ino)?;
        let target_ino = dir_lookup(&parent, &self.fs_dir, name)?;
        let target = read_inode(target_ino, &self.fs_dir)?;
        if is_rmdir {
            if !target.is_dir() {
                return Err(FsError::NotDir);
            }
            if target.size > 0 {
                return Err(FsError::NotEmpty);
            }
        } else if target.is_dir() {
            return Err(FsError::IsDir);
        }

        // Entry first: once the name is gone, the worst an interruption can
        // do is leak the blocks freed below.
        dir_remove(&mut parent, &self.fs_dir, name)?;
        for slot in 0..target.used_prefix() as usize {
            let blk = target.blocks[slot];
            if blk >= 2 && blk < self.sb.total_blocks {
                self.bitmap.free_blocks(blk, 1);
            }
        }
        self.bitmap.free_blocks(target_ino, 1);
        self.bitmap.write(&self.fs_dir)
    }

    /// Rename `from` to `to` inside one directory. A different target
    /// directory is `CrossDevice`; an occupied target name is `Exists`;
    /// renaming a name onto itself is a no-op.
    pub fn rename_at(&mut self, dir_ino: u32, from: &str, to_dir: u32, to: &str) -> Result<()> {
        if dir_ino != to_dir {
            return Err(FsError::CrossDevice);
        }
        let mut parent = self.inode(dir_ino)?;
        let child = dir_lookup(&parent, &self.fs_dir, from)?;
        if from == to {
            return Ok(());
        }
        match dir_lookup(&parent, &self.fs_dir, to) {
            Ok(_) => return Err(FsError::Exists),
            Err(FsError::NotFound) => {}
            Err(err) => return Err(err),
        }
        dir_remove(&mut parent, &self.fs_dir, from)?;
        dir_add(None, &mut parent, &self.fs_dir, to, child)
    }

    pub fn read_at(&self, ino: u32, offset: u32, buf: &mut [u8]) -> Result<usize> {
        let inode = self.inode(ino)?;
        fread(&inode, &self.fs_dir, offset, buf)
    }

    pub fn write_at(&mut self, ino: u32, offset: u32, data: &[u8]) -> Result<usize> {
        let mut inode = self.inode(ino)?;
        fwrite(&mut self.bitmap, &mut inode, &self.fs_dir, offset, data)
    }

    /// Truncate or extend a file to exactly `new_size` bytes.
    pub fn truncate_at(&mut self, ino: u32, new_size: u32) -> Result<()> {
        let mut inode = self.inode(ino)?;
        if inode.is_dir() {
            return Err(FsError::IsDir);
        }
        resize(&mut self.bitmap, &mut inode, new_size, &self.fs_dir)
    }

    // ---- path-level operations ------------------------------------------

    /// Resolve an absolute path to its inode.
    pub fn resolve(&self, path: &str) -> Result<Inode> {
        path::resolve(&self.sb, &self.fs_dir, path)
    }

    fn resolve_parent(&self, p: &str) -> Result<(Inode, String)> {
        let (parent_path, name) = path::split(p)?;
        if name.is_empty() {
            return Err(FsError::Invalid("path names the root directory"));
        }
        let parent = self.resolve(&parent_path)?;
        Ok((parent, name))
    }

    /// Create a regular file, returning its inode number.
    pub fn create(&mut self, p: &str) -> Result<u32> {
        let (parent, name) = self.resolve_parent(p)?;
        Ok(self.create_at(parent.ino, &name, false)?.ino)
    }

    /// Create a directory, returning its inode number.
    pub fn mkdir(&mut self, p: &str) -> Result<u32> {
        let (parent, name) = self.resolve_parent(p)?;
        Ok(self.create_at(parent.ino, &name, true)?.ino)
    }

    /// Remove a regular file and free its blocks.
    pub fn unlink(&mut self, p: &str) -> Result<()> {
        let (parent, name) = self.resolve_parent(p)?;
        self.unlink_at(parent.ino, &name)
    }

    /// Remove an empty directory and free its blocks.
    pub fn rmdir(&mut self, p: &str) -> Result<()> {
        let (parent, name) = self.resolve_parent(p)?;
        self.rmdir_at(parent.ino, &name)
    }

    pub fn read(&self, p: &str, offset: u32, buf: &mut [u8]) -> Result<usize> {
        let inode = self.resolve(p)?;
        fread(&inode, &self.fs_dir, offset, buf)
    }

    pub fn write(&mut self, p: &str, offset: u32, data: &[u8]) -> Result<usize> {
        let mut inode = self.resolve(p)?;
        fwrite(&mut self.bitmap, &mut inode, &self.fs_dir, offset, data)
    }

    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        let (from_parent, from_name) = self.resolve_parent(from)?;
        let (to_parent, to_name) = self.resolve_parent(to)?;
        if from_parent.ino != to_parent.ino {
            return Err(FsError::CrossDevice);
        }
        self.rename_at(from_parent.ino, &from_name, to_parent.ino, &to_name)
    }

    /// Occupied entries of the directory at `p`. `.` and `..` are never
    /// stored; a listing layer synthesizes them.
    pub fn read_dir(&self, p: &str) -> Result<Vec<DirEntry>> {
        let dir = self.resolve(p)?;
        dir_entries(&dir, &self.fs_dir)
    }
}
