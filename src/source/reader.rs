// SPDX-License-Identifier: Apache-2.0

//! Incremental line reading from a single file with rotation and
//! truncation detection.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::config::StartAt;
use super::file_id::FileId;

/// Upper bound on lines returned by one `read_lines` call
pub const MAX_BATCH_LINES: usize = 128;

/// What `check_reopen` found at the watched path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reopen {
    /// Same file, nothing to do
    Unchanged,
    /// The path now refers to a different file; reading restarted at
    /// offset zero of the new file
    Rotated,
    /// The file shrank below the read offset; reading restarted at
    /// offset zero
    Truncated,
}

/// LineReader manages reading from a single file
pub struct LineReader {
    /// Path being tailed
    path: PathBuf,
    /// Open handle, None until the file exists
    file: Option<File>,
    /// Identity of the open file
    file_id: Option<FileId>,
    /// Read offset in bytes; only advanced past complete lines
    offset: u64,
    /// Whether the last read drained the file
    eof: bool,
}

impl LineReader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
            file_id: None,
            offset: 0,
            eof: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Open the file at the path. With `StartAt::End` the offset moves
    /// to the current end so only appended lines are read.
    pub fn open(&mut self, start_at: StartAt) -> io::Result<()> {
        let file = File::open(&self.path)?;
        let file_id = FileId::from_file(&file)?;

        self.offset = match start_at {
            StartAt::Beginning => 0,
            StartAt::End => file.metadata()?.len(),
        };
        self.file = Some(file);
        self.file_id = Some(file_id);
        self.eof = false;

        Ok(())
    }

    /// Check whether the path was rotated (replaced by a new file) or
    /// truncated in place, and reopen from offset zero if so.
    ///
    /// A missing path is not a rotation: the open handle stays valid
    /// and is drained until a new file shows up.
    pub fn check_reopen(&mut self) -> io::Result<Reopen> {
        if self.file.is_none() {
            return Ok(Reopen::Unchanged);
        }

        let current = match FileId::from_path(&self.path) {
            Ok(id) => id,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Reopen::Unchanged),
            Err(e) => return Err(e),
        };

        if let Some(id) = self.file_id {
            if id.is_known() && current.is_known() && id != current {
                self.open(StartAt::Beginning)?;
                return Ok(Reopen::Rotated);
            }
        }

        // same identity: an in-place truncation only shows as a shrink
        let len = std::fs::metadata(&self.path)?.len();
        if len < self.offset {
            self.offset = 0;
            self.eof = false;
            return Ok(Reopen::Truncated);
        }

        Ok(Reopen::Unchanged)
    }

    /// Read the next batch of complete lines since the last read, at
    /// most [`MAX_BATCH_LINES`] per call so a large backlog is streamed
    /// in bounded chunks rather than buffered whole. `is_eof` stays
    /// false after a capped batch; call again for the rest.
    ///
    /// Blank lines are dropped; they carry no record. A trailing
    /// fragment without a newline is left in the file (the offset does
    /// not advance past it) so a line still being written is never
    /// split - unless `emit_partial` is set for the final drain of a
    /// non-follow source.
    pub fn read_lines(&mut self, emit_partial: bool) -> io::Result<Vec<String>> {
        let file = match self.file.as_mut() {
            Some(f) => f,
            None => return Ok(Vec::new()),
        };

        file.seek(SeekFrom::Start(self.offset))?;
        let mut reader = BufReader::new(file);

        let mut lines = Vec::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let n = reader.read_until(b'\n', &mut buf)?;
            if n == 0 {
                self.eof = true;
                break;
            }

            let complete = buf.last() == Some(&b'\n');
            if !complete && !emit_partial {
                // incomplete trailing line, re-read once more bytes land
                self.eof = true;
                break;
            }

            self.offset += n as u64;

            let mut text = String::from_utf8_lossy(&buf).into_owned();
            while text.ends_with('\n') || text.ends_with('\r') {
                text.pop();
            }
            if !text.is_empty() {
                lines.push(text);
            }

            if lines.len() == MAX_BATCH_LINES {
                self.eof = false;
                break;
            }
        }

        Ok(lines)
    }

    /// Reopen after a read error, keeping the read offset when the path
    /// still refers to the same file so already-consumed lines are not
    /// re-read. A different file at the path restarts from offset zero.
    pub fn recover(&mut self) -> io::Result<()> {
        let prev_id = self.file_id;
        let prev_offset = self.offset;

        self.close();
        self.open(StartAt::Beginning)?;

        match (prev_id, self.file_id) {
            (Some(old), Some(new)) if old.is_known() && new.is_known() && old == new => {
                self.offset = prev_offset;
            }
            _ => {}
        }
        Ok(())
    }

    pub fn close(&mut self) {
        self.file = None;
        self.file_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn append(path: &Path, content: &str) {
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
    }

    #[test]
    fn test_read_lines_from_beginning() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        append(&path, "line 1\nline 2\n");

        let mut reader = LineReader::new(&path);
        reader.open(StartAt::Beginning).unwrap();

        let lines = reader.read_lines(false).unwrap();
        assert_eq!(lines, vec!["line 1", "line 2"]);
        assert!(reader.is_eof());
    }

    #[test]
    fn test_incremental_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        append(&path, "line 1\n");

        let mut reader = LineReader::new(&path);
        reader.open(StartAt::Beginning).unwrap();
        assert_eq!(reader.read_lines(false).unwrap(), vec!["line 1"]);

        append(&path, "line 2\n");
        assert_eq!(reader.read_lines(false).unwrap(), vec!["line 2"]);
    }

    #[test]
    fn test_start_at_end() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        append(&path, "existing\n");

        let mut reader = LineReader::new(&path);
        reader.open(StartAt::End).unwrap();

        assert!(reader.read_lines(false).unwrap().is_empty());

        append(&path, "new\n");
        assert_eq!(reader.read_lines(false).unwrap(), vec!["new"]);
    }

    #[test]
    fn test_partial_line_held_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        append(&path, "done\nhalf");

        let mut reader = LineReader::new(&path);
        reader.open(StartAt::Beginning).unwrap();

        assert_eq!(reader.read_lines(false).unwrap(), vec!["done"]);

        // finish the line
        append(&path, "-written\n");
        assert_eq!(reader.read_lines(false).unwrap(), vec!["half-written"]);
    }

    #[test]
    fn test_partial_line_emitted_on_final_drain() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        append(&path, "tail-without-newline");

        let mut reader = LineReader::new(&path);
        reader.open(StartAt::Beginning).unwrap();

        assert_eq!(
            reader.read_lines(true).unwrap(),
            vec!["tail-without-newline"]
        );
    }

    #[test]
    fn test_truncation_detected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        append(&path, "aaaa\nbbbb\n");

        let mut reader = LineReader::new(&path);
        reader.open(StartAt::Beginning).unwrap();
        reader.read_lines(false).unwrap();

        std::fs::write(&path, "cc\n").unwrap();

        assert_eq!(reader.check_reopen().unwrap(), Reopen::Truncated);
        assert_eq!(reader.read_lines(false).unwrap(), vec!["cc"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_rotation_detected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        append(&path, "old\n");

        let mut reader = LineReader::new(&path);
        reader.open(StartAt::Beginning).unwrap();
        reader.read_lines(false).unwrap();

        std::fs::rename(&path, dir.path().join("a.log.1")).unwrap();
        append(&path, "new\n");

        assert_eq!(reader.check_reopen().unwrap(), Reopen::Rotated);
        assert_eq!(reader.read_lines(false).unwrap(), vec!["new"]);
    }

    #[test]
    fn test_large_backlog_read_in_capped_batches() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        let mut content = String::new();
        for i in 0..300 {
            content.push_str(&format!("line {}\n", i));
        }
        append(&path, &content);

        let mut reader = LineReader::new(&path);
        reader.open(StartAt::Beginning).unwrap();

        let first = reader.read_lines(false).unwrap();
        assert_eq!(first.len(), MAX_BATCH_LINES);
        assert!(!reader.is_eof());

        let second = reader.read_lines(false).unwrap();
        assert_eq!(second.len(), MAX_BATCH_LINES);
        assert!(!reader.is_eof());

        let third = reader.read_lines(false).unwrap();
        assert_eq!(third.len(), 300 - 2 * MAX_BATCH_LINES);
        assert!(reader.is_eof());

        assert_eq!(first[0], "line 0");
        assert_eq!(third.last().unwrap(), "line 299");
    }

    #[test]
    fn test_recover_keeps_offset_on_same_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        append(&path, "line 1\nline 2\n");

        let mut reader = LineReader::new(&path);
        reader.open(StartAt::Beginning).unwrap();
        assert_eq!(reader.read_lines(false).unwrap().len(), 2);

        reader.recover().unwrap();

        // no duplicates of already-consumed lines
        append(&path, "line 3\n");
        assert_eq!(reader.read_lines(false).unwrap(), vec!["line 3"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_recover_restarts_when_file_replaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        append(&path, "old 1\nold 2\n");

        let mut reader = LineReader::new(&path);
        reader.open(StartAt::Beginning).unwrap();
        assert_eq!(reader.read_lines(false).unwrap().len(), 2);

        std::fs::rename(&path, dir.path().join("a.log.1")).unwrap();
        append(&path, "new 1\n");

        reader.recover().unwrap();
        assert_eq!(reader.read_lines(false).unwrap(), vec!["new 1"]);
    }

    #[test]
    fn test_blank_lines_dropped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        append(&path, "first\n\n\r\nsecond\n");

        let mut reader = LineReader::new(&path);
        reader.open(StartAt::Beginning).unwrap();

        assert_eq!(reader.read_lines(false).unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_missing_path_is_not_rotation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        append(&path, "kept\n");

        let mut reader = LineReader::new(&path);
        reader.open(StartAt::Beginning).unwrap();

        std::fs::remove_file(&path).unwrap();
        assert_eq!(reader.check_reopen().unwrap(), Reopen::Unchanged);
    }
}
