pub const MAGIC: u32 = 0x4246_5753; // "BWFS"

pub const BLOCK_PX: usize = 1000; // Block images are BLOCK_PX x BLOCK_PX pixels
pub const BLOCK_SIZE_BITS: usize = BLOCK_PX * BLOCK_PX; // One pixel per bit
pub const BLOCK_SIZE_BYTES: usize = BLOCK_SIZE_BITS / 8;
pub const BLOCK_EXT: &str = "pgm"; // File extension of block images

pub const SUPERBLOCK_BLK: u32 = 0; // Block ID of the superblock
pub const BITMAP_BLK: u32 = 1; // Block ID of the allocation bitmap
pub const MIN_BLOCKS: u32 = 3; // Superblock, bitmap and the root inode

pub const DIRECT_BLOCKS: usize = 10; // Direct data-block pointers per inode
pub const INODE_DISK_SIZE: usize = 128; // Bytes an inode record occupies in its block
pub const SUPERBLOCK_DISK_SIZE: usize = 64; // Bytes the superblock header occupies

pub const NAME_MAX: usize = 255; // Longest file name, NUL terminator excluded
pub const DIR_ENTRY_SIZE: usize = 4 + NAME_MAX + 1; // Child inode + name field
pub const ENTRIES_PER_BLOCK: usize = BLOCK_SIZE_BYTES / DIR_ENTRY_SIZE;

pub const MAX_DEPTH: usize = 100; // Directory-walk depth cap in the checker

pub const SB_ENCRYPTED: u32 = 1 << 0; // Superblock flag: metadata encrypted
pub const SB_RESIZABLE: u32 = 1 << 1; // Superblock flag: offline resize allowed
pub const INODE_DIR: u8 = 1 << 0; // Inode flag: directory
