//! The allocation bitmap (block 1) and the worst-fit block allocator.
//!
//! Bit `i` is set iff block `i` is in use (byte `i/8`, mask `1 << (i%8)`).
//! Every mutation is a pure memory operation; nothing reaches disk until an
//! explicit [`Bitmap::write`], so callers batch persistence per operation.

use std::path::Path;

use log::debug;

use crate::codec;
use crate::config::BITMAP_BLK;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct Bitmap {
    total_blocks: u32,
    map: Vec<u8>,
}

impl Bitmap {
    /// A fresh all-free bitmap tracking `total_blocks` blocks.
    pub fn new(total_blocks: u32) -> Self {
        Bitmap {
            total_blocks,
            map: vec![0u8; (total_blocks as usize + 7) / 8],
        }
    }

    pub fn total_blocks(&self) -> u32 {
        self.total_blocks
    }

    /// Whether block `blk` is marked in use.
    pub fn test(&self, blk: u32) -> bool {
        self.map[blk as usize / 8] & (1 << (blk % 8)) != 0
    }

    /// Mark block `blk` used or free.
    pub fn set(&mut self, blk: u32, used: bool) {
        if used {
            self.map[blk as usize / 8] |= 1 << (blk % 8);
        } else {
            self.map[blk as usize / 8] &= !(1 << (blk % 8));
        }
    }

    /// Count of blocks marked in use.
    pub fn used(&self) -> u32 {
        self.map.iter().map(|byte| byte.count_ones()).sum()
    }

    /// Persist the bitmap into block 1.
    pub fn write(&self, fs_dir: &Path) -> Result<()> {
        codec::write_block(fs_dir, BITMAP_BLK, &self.map)?;
        debug!("bitmap written ({} blocks tracked)", self.total_blocks);
        Ok(())
    }

    /// Load the bitmap of a volume with `total_blocks` blocks from block 1.
    pub fn read(fs_dir: &Path, total_blocks: u32) -> Result<Self> {
        let mut map = vec![0u8; (total_blocks as usize + 7) / 8];
        codec::read_block(fs_dir, BITMAP_BLK, &mut map)?;
        Ok(Bitmap { total_blocks, map })
    }

    /// Reserve `count` contiguous blocks, worst-fit: the longest free run of
    /// length at least `count` wins, ties broken by lowest start index.
    /// Returns the first reserved block, or `None` (leaving the map
    /// untouched) when no run is long enough or `count` is zero.
    pub fn alloc_blocks(&mut self, count: u32) -> Option<u32> {
        if count == 0 {
            return None;
        }
        let (start, _) = self.find_worst_fit(count)?;
        for blk in start..start + count {
            self.set(blk, true);
        }
        Some(start)
    }

    /// Release `count` blocks starting at `start`.
    pub fn free_blocks(&mut self, start: u32, count: u32) {
        for blk in start..start + count {
            self.set(blk, false);
        }
    }

    fn find_worst_fit(&self, min_len: u32) -> Option<(u32, u32)> {
        let mut best: Option<(u32, u32)> = None;
        let mut cur_start = 0u32;
        let mut cur_len = 0u32;

        for blk in 0..self.total_blocks {
            if !self.test(blk) {
                if cur_len == 0 {
                    cur_start = blk;
                }
                cur_len += 1;
            } else {
                if cur_len >= min_len && best.map_or(true, |(_, len)| cur_len > len) {
                    best = Some((cur_start, cur_len));
                }
                cur_len = 0;
            }
        }
        // a run touching the end of the map terminates here
        if cur_len >= min_len && best.map_or(true, |(_, len)| cur_len > len) {
            best = Some((cur_start, cur_len));
        }
        best
    }
}
