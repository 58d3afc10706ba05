//! Absolute path resolution and splitting.

use std::path::Path;

use crate::directory::dir_lookup;
use crate::error::{FsError, Result};
use crate::inode::read_inode;
use crate::structs::{Inode, Superblock};

/// Walk an absolute path down from the root directory and return the inode
/// it names. Empty components (duplicate or trailing slashes) are skipped,
/// so `/a//b/` resolves like `/a/b`.
pub fn resolve(sb: &Superblock, fs_dir: &Path, path: &str) -> Result<Inode> {
    if !path.starts_with('/') {
        return Err(FsError::Invalid("path is not absolute"));
    }
    let mut cur = read_inode(sb.root_inode, fs_dir)?;
    for component in path.split('/').filter(|c| !c.is_empty()) {
        if !cur.is_dir() {
            return Err(FsError::NotDir);
        }
        let ino = dir_lookup(&cur, fs_dir, component)?;
        cur = read_inode(ino, fs_dir)?;
    }
    Ok(cur)
}

/// Split an absolute path into parent directory and final component.
/// eg. "/home/user/file.txt" -> ("/home/user", "file.txt")
///     "/file.txt" -> ("/", "file.txt")
///     "/" -> ("/", "")
pub fn split(path: &str) -> Result<(String, String)> {
    if !path.starts_with('/') {
        return Err(FsError::Invalid("path is not absolute"));
    }
    let mut components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
    let name = components.pop().unwrap_or("").to_string();
    let parent = if components.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", components.join("/"))
    };
    Ok((parent, name))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_split() {
        let (dir, file) = split("/home/user/file.txt").unwrap();
        assert_eq!(dir, "/home/user");
        assert_eq!(file, "file.txt");

        let (dir, file) = split("/file.txt").unwrap();
        assert_eq!(dir, "/");
        assert_eq!(file, "file.txt");

        let (dir, file) = split("/").unwrap();
        assert_eq!(dir, "/");
        assert_eq!(file, "");
    }

    #[test]
    fn test_split_collapses_slashes() {
        let (dir, file) = split("/home/user//file.txt").unwrap();
        assert_eq!(dir, "/home/user");
        assert_eq!(file, "file.txt");

        let (dir, file) = split("//file.txt").unwrap();
        assert_eq!(dir, "/");
        assert_eq!(file, "file.txt");

        let (dir, file) = split("///").unwrap();
        assert_eq!(dir, "/");
        assert_eq!(file, "");
    }

    #[test]
    fn test_split_rejects_relative_paths() {
        assert!(matches!(split("file.txt"), Err(FsError::Invalid(_))));
        assert!(matches!(split(""), Err(FsError::Invalid(_))));
    }
}
