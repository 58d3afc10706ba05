//! FUSE bridge: adapts the engine's operation table to [`fuser`].
//!
//! The kernel addresses everything by inode number with root fixed at 1;
//! on disk the root inode lives wherever the formatter placed it, so id 1
//! is translated and every other number passes through unchanged (user
//! inodes start at block 2, after the superblock and bitmap).

use std::ffi::OsStr;
use std::time::{Duration, SystemTime};

use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyLseek, ReplyOpen, ReplyStatfs, ReplyWrite,
    Request, TimeOrNow, FUSE_ROOT_ID,
};
use libc::{
    c_int, EEXIST, EFBIG, EINVAL, EIO, EISDIR, ENOENT, ENOMEM, ENOSPC, ENOTDIR, ENOTEMPTY, EXDEV,
    SEEK_END, SEEK_SET,
};
use log::info;

use crate::config::{BLOCK_SIZE_BYTES, NAME_MAX};
use crate::error::FsError;
use crate::fs::FileSystem;
use crate::structs::Inode;

const TTL: Duration = Duration::from_secs(1);

/// Translate an engine failure into the bridge's errno.
fn errno(err: &FsError) -> c_int {
    match err {
        FsError::Io(_) => EIO,
        FsError::NoMemory => ENOMEM,
        FsError::Full => ENOSPC,
        FsError::NotFound => ENOENT,
        FsError::NotDir => ENOTDIR,
        FsError::IsDir => EISDIR,
        FsError::Exists => EEXIST,
        FsError::NotEmpty => ENOTEMPTY,
        FsError::CrossDevice => EXDEV,
        FsError::BadLen(_) => EFBIG,
        FsError::Invalid(_) => EINVAL,
        _ => EIO,
    }
}

pub struct BwfsFuse {
    fs: FileSystem,
    uid: u32,
    gid: u32,
}

impl BwfsFuse {
    pub fn new(fs: FileSystem) -> Self {
        BwfsFuse {
            fs,
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
        }
    }

    fn ino_of(&self, fuse_ino: u64) -> u32 {
        if fuse_ino == FUSE_ROOT_ID {
            self.fs.root_ino()
        } else {
            fuse_ino as u32
        }
    }

    fn fuse_ino(&self, ino: u32) -> u64 {
        if ino == self.fs.root_ino() {
            FUSE_ROOT_ID
        } else {
            ino as u64
        }
    }

    fn attr(&self, inode: &Inode) -> FileAttr {
        let now = SystemTime::now();
        let (kind, perm) = if inode.is_dir() {
            (FileType::Directory, 0o755)
        } else {
            (FileType::RegularFile, 0o644)
        };
        FileAttr {
            ino: self.fuse_ino(inode.ino),
            size: inode.size as u64,
            blocks: inode.block_count as u64,
            atime: now,
            mtime: now,
            ctime: now,
            crtime: now,
            kind,
            perm,
            nlink: 1,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: BLOCK_SIZE_BYTES as u32,
            flags: 0,
        }
    }
}

impl Filesystem for BwfsFuse {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), c_int> {
        info!(
            "mounted {} (root inode {})",
            self.fs.fs_dir().display(),
            self.fs.root_ino()
        );
        Ok(())
    }

    fn destroy(&mut self) {
        info!("unmounted {}", self.fs.fs_dir().display());
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(name) = name.to_str() else {
            reply.error(ENOENT);
            return;
        };
        match self.fs.lookup_at(self.ino_of(parent), name) {
            Ok(inode) => reply.entry(&TTL, &self.attr(&inode), 0),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        match self.fs.inode(self.ino_of(ino)) {
            Ok(inode) => reply.attr(&TTL, &self.attr(&inode)),
            Err(err) => reply.error(errno(&err)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let ino = self.ino_of(ino);
        if let Some(size) = size {
            let Ok(size) = u32::try_from(size) else {
                reply.error(EFBIG);
                return;
            };
            if let Err(err) = self.fs.truncate_at(ino, size) {
                reply.error(errno(&err));
                return;
            }
        }
        match self.fs.inode(ino) {
            Ok(inode) => reply.attr(&TTL, &self.attr(&inode)),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn access(&mut self, _req: &Request<'_>, ino: u64, _mask: i32, reply: ReplyEmpty) {
        match self.fs.inode(self.ino_of(ino)) {
            Ok(_) => reply.ok(),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        match self.fs.inode(self.ino_of(ino)) {
            Ok(inode) if inode.is_dir() => reply.opened(0, 0),
            Ok(_) => reply.error(ENOTDIR),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let dir_ino = self.ino_of(ino);
        let entries = match self.fs.entries_at(dir_ino) {
            Ok(entries) => entries,
            Err(err) => {
                reply.error(errno(&err));
                return;
            }
        };

        let mut listing: Vec<(u64, FileType, String)> = Vec::with_capacity(entries.len() + 2);
        listing.push((ino, FileType::Directory, ".".to_string()));
        listing.push((ino, FileType::Directory, "..".to_string()));
        for entry in &entries {
            let kind = match self.fs.inode(entry.ino) {
                Ok(child) if child.is_dir() => FileType::Directory,
                _ => FileType::RegularFile,
            };
            listing.push((self.fuse_ino(entry.ino), kind, entry.name_lossy().into_owned()));
        }

        for (i, (child, kind, name)) in listing.into_iter().enumerate().skip(offset as usize) {
            if reply.add(child, (i + 1) as i64, kind, &name) {
                break;
            }
        }
        reply.ok();
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let Some(name) = name.to_str() else {
            reply.error(EINVAL);
            return;
        };
        match self.fs.create_at(self.ino_of(parent), name, true) {
            Ok(inode) => reply.entry(&TTL, &self.attr(&inode), 0),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(name) = name.to_str() else {
            reply.error(ENOENT);
            return;
        };
        match self.fs.rmdir_at(self.ino_of(parent), name) {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let Some(name) = name.to_str() else {
            reply.error(EINVAL);
            return;
        };
        match self.fs.create_at(self.ino_of(parent), name, false) {
            Ok(inode) => reply.created(&TTL, &self.attr(&inode), 0, 0, 0),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        match self.fs.inode(self.ino_of(ino)) {
            Ok(_) => reply.opened(0, 0),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Ok(offset) = u32::try_from(offset) else {
            reply.error(EINVAL);
            return;
        };
        let mut buf = vec![0u8; size as usize];
        match self.fs.read_at(self.ino_of(ino), offset, &mut buf) {
            Ok(n) => reply.data(&buf[..n]),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let Ok(offset) = u32::try_from(offset) else {
            reply.error(EINVAL);
            return;
        };
        match self.fs.write_at(self.ino_of(ino), offset, data) {
            Ok(n) => reply.written(n as u32),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn flush(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        match self.fs.flush() {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn fsync(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _datasync: bool, reply: ReplyEmpty) {
        match self.fs.flush() {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn lseek(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        whence: i32,
        reply: ReplyLseek,
    ) {
        let inode = match self.fs.inode(self.ino_of(ino)) {
            Ok(inode) => inode,
            Err(err) => {
                reply.error(errno(&err));
                return;
            }
        };
        let new_offset = match whence {
            SEEK_SET => offset,
            SEEK_END => inode.size as i64 + offset,
            // no per-handle offset is kept, so SEEK_CUR is unsupported
            _ => {
                reply.error(EINVAL);
                return;
            }
        };
        if new_offset < 0 {
            reply.error(EINVAL);
        } else {
            reply.offset(new_offset);
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(name) = name.to_str() else {
            reply.error(ENOENT);
            return;
        };
        match self.fs.unlink_at(self.ino_of(parent), name) {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        let (Some(from), Some(to)) = (name.to_str(), newname.to_str()) else {
            reply.error(EINVAL);
            return;
        };
        match self
            .fs
            .rename_at(self.ino_of(parent), from, self.ino_of(newparent), to)
        {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        let stat = self.fs.statfs();
        reply.statfs(
            stat.total_blocks as u64,
            stat.free_blocks as u64,
            stat.free_blocks as u64,
            0,
            0,
            stat.block_size,
            NAME_MAX as u32,
            stat.block_size,
        );
    }
}
