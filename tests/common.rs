//! Common utilities for tests
#![allow(unused)]

use tempfile::TempDir;

use bwfs::FileSystem;

pub const ORANGE: &str = "\x1b[38;5;214m";
pub const RESET: &str = "\x1b[0m";

/// Provides a macro for logging messages during tests.
/// e.g. log!("placeholder") -> println!("[test] placeholder");
#[macro_export]
macro_rules! log {
    ($msg:expr, $($arg:tt)*) => {
        println!("{}[test] {}{}", crate::common::ORANGE, format!($msg, $($arg)*), crate::common::RESET)
    };
    ($msg:expr) => {
        println!("{}[test] {}{}", crate::common::ORANGE, $msg, crate::common::RESET)
    };
}

/// Format a fresh volume of `blocks` blocks inside a temp directory.
pub fn new_fs(blocks: u32) -> (TempDir, FileSystem) {
    let dir = TempDir::new().unwrap();
    let fs = FileSystem::format(dir.path(), blocks).unwrap();
    (dir, fs)
}
