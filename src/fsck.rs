//! Consistency checking and repair.
//!
//! The checker rebuilds the reachability graph from the root directory,
//! audits every inode it reaches, then reconciles the persisted bitmap with
//! the blocks it actually observed in use. Each finding is optionally
//! repaired in place; the checker accumulates findings instead of aborting
//! on the first.

use std::fmt;
use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::bitmap::Bitmap;
use crate::config::{BITMAP_BLK, BLOCK_SIZE_BYTES, DIR_ENTRY_SIZE, MAX_DEPTH, MIN_BLOCKS, SUPERBLOCK_BLK};
use crate::directory::dir_entries;
use crate::error::{FsError, Result};
use crate::inode::{read_inode, write_inode};
use crate::structs::Superblock;
use crate::superblock::read_superblock;

/// How a check run should behave.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckOptions {
    /// Repair every inconsistency found instead of only reporting it.
    pub repair: bool,
}

/// Counters and findings of one check run.
#[derive(Debug, Default)]
pub struct CheckReport {
    pub errors_found: u32,
    pub errors_fixed: u32,
    pub warnings: u32,
    /// Self-consistent inodes allocated in the bitmap but unreachable from
    /// the root. Reported only; never relocated.
    pub orphans: Vec<u32>,
}

/// Final classification of a check run, with the conventional exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    /// No inconsistencies found and nothing repaired. Exit 0.
    Clean,
    /// Inconsistencies found, all repaired. Exit 1.
    Repaired,
    /// Inconsistencies remain on disk. Exit 4.
    Dirty,
    /// The superblock or bitmap could not be loaded. Exit 8.
    OpError,
}

impl CheckStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            CheckStatus::Clean => 0,
            CheckStatus::Repaired => 1,
            CheckStatus::Dirty => 4,
            CheckStatus::OpError => 8,
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CheckStatus::Clean => "clean",
            CheckStatus::Repaired => "repaired",
            CheckStatus::Dirty => "has errors",
            CheckStatus::OpError => "could not be checked",
        };
        f.write_str(text)
    }
}

/// Check the volume in `fs_dir`, repairing when `opts.repair` is set.
pub fn check(fs_dir: &Path, opts: CheckOptions) -> (CheckStatus, CheckReport) {
    let mut checker = match Checker::load(fs_dir, opts) {
        Ok(checker) => checker,
        Err(err) => {
            error!("cannot load filesystem metadata: {err}");
            return (CheckStatus::OpError, CheckReport::default());
        }
    };
    checker.run();
    checker.finish()
}

struct Checker {
    fs_dir: PathBuf,
    opts: CheckOptions,
    sb: Superblock,
    bitmap: Bitmap,
    bitmap_dirty: bool,
    /// Inode blocks reached by the walk.
    reachable: Bitmap,
    /// Blocks the walk proved in use: 0, 1, reached inodes, their data.
    observed: Bitmap,
    report: CheckReport,
}

impl Checker {
    fn load(fs_dir: &Path, opts: CheckOptions) -> Result<Self> {
        let sb = read_superblock(fs_dir)?;
        if sb.total_blocks < MIN_BLOCKS || sb.root_inode >= sb.total_blocks {
            return Err(FsError::Invalid("superblock geometry out of range"));
        }
        let bitmap = Bitmap::read(fs_dir, sb.total_blocks)?;
        let total = sb.total_blocks;
        Ok(Checker {
            fs_dir: fs_dir.to_path_buf(),
            opts,
            sb,
            bitmap,
            bitmap_dirty: false,
            reachable: Bitmap::new(total),
            observed: Bitmap::new(total),
            report: CheckReport::default(),
        })
    }

    fn run(&mut self) {
        self.check_superblock();
        self.check_reserved_bits();
        let _ = self.walk(self.sb.root_inode, true, 0);
        self.scan_orphans();
        self.reconcile();

        if self.bitmap_dirty {
            if let Err(err) = self.bitmap.write(&self.fs_dir) {
                error!("cannot write repaired bitmap: {err}");
                self.report.errors_found += 1;
            }
        }
    }

    fn finish(self) -> (CheckStatus, CheckReport) {
        let report = self.report;
        let status = if report.errors_found == 0 && report.errors_fixed == 0 {
            CheckStatus::Clean
        } else if report.errors_found <= report.errors_fixed {
            CheckStatus::Repaired
        } else {
            CheckStatus::Dirty
        };
        info!(
            "check finished: {} errors, {} fixed, {} warnings",
            report.errors_found, report.errors_fixed, report.warnings
        );
        (status, report)
    }

    fn found(&mut self, msg: String) {
        error!("{msg}");
        self.report.errors_found += 1;
    }

    fn warning(&mut self, msg: String) {
        warn!("{msg}");
        self.report.warnings += 1;
    }

    fn fixed(&mut self) {
        self.report.errors_fixed += 1;
    }

    fn check_superblock(&mut self) {
        let unknown = self.sb.unknown_flags();
        if unknown != 0 {
            self.warning(format!("superblock: unknown flag bits {unknown:#x}"));
        }
        info!(
            "superblock ok ({} blocks, root inode {})",
            self.sb.total_blocks, self.sb.root_inode
        );
    }

    /// Blocks 0, 1 and the root inode must be allocated.
    fn check_reserved_bits(&mut self) {
        for (blk, what) in [
            (SUPERBLOCK_BLK, "superblock"),
            (BITMAP_BLK, "bitmap"),
            (self.sb.root_inode, "root inode"),
        ] {
            if !self.bitmap.test(blk) {
                self.found(format!("block {blk} ({what}) marked free"));
                if self.opts.repair {
                    self.bitmap.set(blk, true);
                    self.bitmap_dirty = true;
                    self.fixed();
                }
            }
        }
        self.observed.set(SUPERBLOCK_BLK, true);
        self.observed.set(BITMAP_BLK, true);
    }

    /// Depth-first walk over "directory entry -> inode" edges. A healthy
    /// volume is a tree, so each inode is visited once; a cycle keeps the
    /// walk descending until the depth cap aborts that branch with `Loop`.
    fn walk(&mut self, node: u32, expect_dir: bool, depth: usize) -> Result<()> {
        if depth > MAX_DEPTH {
            self.found(format!(
                "inode {node}: walk depth exceeds {MAX_DEPTH}, aborting branch"
            ));
            return Err(FsError::Loop);
        }
        let mut inode = match read_inode(node, &self.fs_dir) {
            Ok(inode) => inode,
            Err(err) => {
                self.found(format!("inode {node}: unreadable ({err})"));
                return Ok(());
            }
        };
        self.reachable.set(node, true);
        self.observed.set(node, true);

        if inode.ino != node {
            self.found(format!(
                "inode {node}: self number is {}, expected {node}",
                inode.ino
            ));
            if self.opts.repair {
                inode.ino = node;
                if write_inode(&inode, &self.fs_dir).is_ok() {
                    self.fixed();
                }
            }
        }
        if expect_dir && !inode.is_dir() {
            self.found(format!("inode {node}: the root must be a directory"));
            return Ok(());
        }

        let prefix = inode.used_prefix();
        for slot in 0..prefix as usize {
            let blk = inode.blocks[slot];
            if blk < 2 || blk >= self.sb.total_blocks {
                self.found(format!("inode {node}: block pointer {blk} out of range"));
                return Ok(());
            }
            self.observed.set(blk, true);
        }
        if inode.block_count != prefix {
            self.found(format!(
                "inode {node}: block_count={} but {prefix} blocks in use",
                inode.block_count
            ));
            if self.opts.repair {
                inode.block_count = prefix;
                if write_inode(&inode, &self.fs_dir).is_ok() {
                    self.fixed();
                }
            }
        }

        if !inode.is_dir() {
            let capacity = prefix * BLOCK_SIZE_BYTES as u32;
            if inode.size > capacity {
                self.found(format!(
                    "inode {node}: size {} exceeds capacity {capacity}",
                    inode.size
                ));
                if self.opts.repair {
                    inode.size = capacity;
                    if write_inode(&inode, &self.fs_dir).is_ok() {
                        self.fixed();
                    }
                }
            }
            return Ok(());
        }

        if prefix == 0 {
            if inode.size != 0 {
                self.warning(format!(
                    "directory {node}: size {} with no data block",
                    inode.size
                ));
            }
            return Ok(());
        }

        // audit entries through the observed prefix, not the stored count
        let probe = {
            let mut probe = inode;
            probe.block_count = prefix;
            probe
        };
        let entries = match dir_entries(&probe, &self.fs_dir) {
            Ok(entries) => entries,
            Err(err) => {
                self.found(format!("directory {node}: unreadable entry block ({err})"));
                return Ok(());
            }
        };

        let expected = entries.len() as u32 * DIR_ENTRY_SIZE as u32;
        if inode.size != expected || inode.size % DIR_ENTRY_SIZE as u32 != 0 {
            self.warning(format!(
                "directory {node}: size {} but {} occupied slots",
                inode.size,
                entries.len()
            ));
        }

        for entry in entries {
            let child = entry.ino;
            if child < 2 || child >= self.sb.total_blocks {
                self.found(format!(
                    "directory {node}: entry '{}' points to invalid inode {child}",
                    entry.name_lossy()
                ));
                continue;
            }
            let _ = self.walk(child, false, depth + 1);
        }
        Ok(())
    }

    /// Allocated, unreached blocks that decode to a self-consistent inode.
    /// Live data blocks are excluded so file content that happens to start
    /// with its own block index is not misread as an inode.
    fn scan_orphans(&mut self) {
        for blk in 2..self.sb.total_blocks {
            if !self.bitmap.test(blk) || self.reachable.test(blk) || self.observed.test(blk) {
                continue;
            }
            if let Ok(inode) = read_inode(blk, &self.fs_dir) {
                if inode.ino == blk {
                    self.warning(format!("inode {blk}: orphaned (valid but unreachable)"));
                    self.report.orphans.push(blk);
                }
            }
        }
    }

    /// Compare the persisted bitmap against observed usage. A set bit with
    /// no referent is a leak (the bitmap may over-approximate, so this is a
    /// warning); a clear bit on a live block is an error.
    fn reconcile(&mut self) {
        for blk in 0..self.sb.total_blocks {
            let marked = self.bitmap.test(blk);
            let observed = self.observed.test(blk);
            if marked && !observed {
                self.warning(format!("block {blk}: allocated but not referenced (leak)"));
                if self.opts.repair {
                    self.bitmap.set(blk, false);
                    self.bitmap_dirty = true;
                    self.fixed();
                }
            } else if !marked && observed {
                self.found(format!("block {blk}: in use but marked free"));
                if self.opts.repair {
                    self.bitmap.set(blk, true);
                    self.bitmap_dirty = true;
                    self.fixed();
                }
            }
        }
    }
}
