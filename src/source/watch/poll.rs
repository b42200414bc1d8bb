// SPDX-License-Identifier: Apache-2.0

//! Polling-based change detection, the fallback for file systems
//! without reliable native notifications.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use super::{PathEvent, PathWatch, WatchError};

/// File metadata snapshot for change detection
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileState {
    modified: SystemTime,
    size: u64,
}

impl FileState {
    fn from_metadata(metadata: &fs::Metadata) -> Option<Self> {
        Some(Self {
            modified: metadata.modified().ok()?,
            size: metadata.len(),
        })
    }
}

/// Polling-based watcher over one directory.
///
/// Scans the directory on an interval and reports files that appeared,
/// changed, or disappeared since the previous scan.
pub struct PollWatch {
    dir: PathBuf,
    states: HashMap<PathBuf, FileState>,
    poll_interval: Duration,
    last_poll: Instant,
}

impl PollWatch {
    pub fn new(dir: &Path, poll_interval: Duration) -> Self {
        let mut watch = Self {
            dir: dir.to_path_buf(),
            states: HashMap::new(),
            poll_interval,
            last_poll: Instant::now(),
        };

        // baseline scan so the first poll only reports changes
        let _ = watch.scan();
        watch
    }

    /// Scan the directory, returning events for every difference from
    /// the previous scan.
    fn scan(&mut self) -> Result<Vec<PathEvent>, WatchError> {
        let mut events = Vec::new();
        let mut seen: HashMap<PathBuf, FileState> = HashMap::with_capacity(self.states.len());

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // whole directory gone: everything known is removed
                for path in self.states.keys() {
                    events.push(PathEvent { path: path.clone() });
                }
                self.states.clear();
                self.last_poll = Instant::now();
                return Ok(events);
            }
            Err(e) => return Err(e.into()),
        };

        for entry in entries.flatten() {
            let metadata = match entry.metadata() {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };
            let state = match FileState::from_metadata(&metadata) {
                Some(s) => s,
                None => continue,
            };

            let path = entry.path();
            match self.states.get(&path) {
                None => events.push(PathEvent { path: path.clone() }),
                Some(old) if *old != state => events.push(PathEvent { path: path.clone() }),
                Some(_) => {}
            }
            seen.insert(path, state);
        }

        // anything not seen this pass was removed
        for path in self.states.keys() {
            if !seen.contains_key(path) {
                events.push(PathEvent { path: path.clone() });
            }
        }

        self.states = seen;
        self.last_poll = Instant::now();

        Ok(events)
    }
}

impl PathWatch for PollWatch {
    fn recv_timeout(&mut self, timeout: Duration) -> Result<Vec<PathEvent>, WatchError> {
        let deadline = Instant::now() + timeout;

        loop {
            if self.last_poll.elapsed() >= self.poll_interval {
                let events = self.scan()?;
                if !events.is_empty() {
                    return Ok(events);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }

            let until_poll = self.poll_interval.saturating_sub(self.last_poll.elapsed());
            let until_deadline = deadline.saturating_duration_since(now);
            let sleep = until_poll.min(until_deadline);
            if !sleep.is_zero() {
                std::thread::sleep(sleep);
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        "poll"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn watch_with_interval(dir: &Path, millis: u64) -> PollWatch {
        PollWatch::new(dir, Duration::from_millis(millis))
    }

    #[test]
    fn test_poll_detects_new_file() {
        let dir = TempDir::new().unwrap();
        let mut watch = watch_with_interval(dir.path(), 20);

        let path = dir.path().join("new.log");
        fs::write(&path, "x\n").unwrap();

        let events = watch.recv_timeout(Duration::from_millis(500)).unwrap();
        assert!(events.iter().any(|e| e.path == path));
    }

    #[test]
    fn test_poll_detects_modification() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        fs::write(&path, "initial\n").unwrap();

        let mut watch = watch_with_interval(dir.path(), 20);

        // mtime granularity can swallow rapid writes; size also changes here
        let mut f = fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"more\n").unwrap();
        f.flush().unwrap();

        let events = watch.recv_timeout(Duration::from_millis(500)).unwrap();
        assert!(events.iter().any(|e| e.path == path));
    }

    #[test]
    fn test_poll_detects_removal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        fs::write(&path, "x\n").unwrap();

        let mut watch = watch_with_interval(dir.path(), 20);
        fs::remove_file(&path).unwrap();

        let events = watch.recv_timeout(Duration::from_millis(500)).unwrap();
        assert!(events.iter().any(|e| e.path == path));
    }

    #[test]
    fn test_poll_timeout_with_no_changes() {
        let dir = TempDir::new().unwrap();
        let mut watch = watch_with_interval(dir.path(), 20);

        let start = Instant::now();
        let events = watch.recv_timeout(Duration::from_millis(80)).unwrap();
        assert!(events.is_empty());
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[test]
    fn test_poll_backend_name() {
        let dir = TempDir::new().unwrap();
        let watch = watch_with_interval(dir.path(), 20);
        assert_eq!(watch.backend_name(), "poll");
    }
}
