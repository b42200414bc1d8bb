// SPDX-License-Identifier: Apache-2.0

//! File identity for rotation detection.
//!
//! The identity stays stable across renames, so a changed identity at
//! the watched path means the file was replaced (rotated) and reading
//! must restart from offset zero.

use std::fs::File;
use std::io;
use std::path::Path;

/// A unique identifier for an open file.
///
/// On Unix this is device ID + inode number. On other platforms the
/// identity is unknown and never matches, leaving rotation detection
/// to the size-shrink heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId {
    dev: u64,
    ino: u64,
}

impl FileId {
    #[cfg(unix)]
    pub fn from_file(file: &File) -> io::Result<Self> {
        use std::os::unix::fs::MetadataExt;

        let metadata = file.metadata()?;
        Ok(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    pub fn from_file(file: &File) -> io::Result<Self> {
        let _ = file;
        Ok(Self { dev: 0, ino: 0 })
    }

    /// Identity of the file currently at `path`
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        Self::from_file(&file)
    }

    /// Whether identity comparison is meaningful on this platform
    pub fn is_known(&self) -> bool {
        !(self.dev == 0 && self.ino == 0)
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.dev, self.ino)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_id_stable_across_rename() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, "x\n").unwrap();

        let before = FileId::from_path(&path).unwrap();

        let renamed = dir.path().join("a.log.1");
        std::fs::rename(&path, &renamed).unwrap();

        let after = FileId::from_path(&renamed).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_file_id_changes_when_replaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        let fresh = dir.path().join("a.log.new");
        std::fs::write(&path, "x\n").unwrap();
        std::fs::write(&fresh, "y\n").unwrap();

        let before = FileId::from_path(&path).unwrap();
        let replacement = FileId::from_path(&fresh).unwrap();
        assert_ne!(before, replacement);

        std::fs::rename(&fresh, &path).unwrap();
        assert_eq!(FileId::from_path(&path).unwrap(), replacement);
    }
}
