use thiserror::Error;

/// Every failure the engine can produce, as a flat kind enum.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("out of memory")]
    NoMemory,
    #[error("no space left, or request exceeds the direct-block budget")]
    Full,
    #[error("not found")]
    NotFound,
    #[error("not a directory")]
    NotDir,
    #[error("is a directory")]
    IsDir,
    #[error("entry already exists")]
    Exists,
    #[error("directory not empty")]
    NotEmpty,
    #[error("rename across directories")]
    CrossDevice,
    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),
    #[error("bad block size {0}")]
    BadBlockSize(u32),
    #[error("block image is {width}x{height}, expected 1000x1000")]
    BadDimensions { width: u32, height: u32 },
    #[error("length {0} exceeds block capacity")]
    BadLen(usize),
    #[error("directory loop detected")]
    Loop,
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
}

pub type Result<T> = std::result::Result<T, FsError>;
