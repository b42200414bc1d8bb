// SPDX-License-Identifier: Apache-2.0

//! Line source for tailing a single log file.
//!
//! [`TailFile`] yields an append-only sequence of raw lines from a file
//! path, transparently reopening across rotation and truncation. The
//! blocking file I/O runs on a dedicated OS thread; lines cross to the
//! consumer over a bounded channel.
//!
//! Change detection uses native file system notifications (inotify /
//! FSEvents / ReadDirectoryChangesW) when available, with automatic
//! fallback to periodic polling.
//!
//! Blank lines are dropped at the source and never reach the consumer;
//! only lines with content are yielded.

pub mod config;
pub mod file_id;
pub mod reader;
mod tailer;
pub mod watch;

pub use config::{StartAt, TailFileConfig};
pub use file_id::FileId;
pub use reader::LineReader;
pub use watch::{WatchConfig, WatchMode};

use std::fs::File;
use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::bounded_channel::{bounded, BoundedReceiver};
use crate::error::{Error, Result};

/// One raw line of text read from the source, newline stripped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    text: String,
}

impl RawLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Handle to a running tail of one file.
///
/// `next_line` blocks until a line is available and returns `None`
/// exactly once: after [`TailFile::stop`] has been observed and queued
/// lines are drained, or at natural end of input in non-follow mode.
pub struct TailFile {
    lines_rx: BoundedReceiver<RawLine>,
    error_rx: BoundedReceiver<Error>,
    cancel: CancellationToken,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl TailFile {
    /// Open a tail of `path` and start the reader thread.
    ///
    /// With `must_exist` set, a path that cannot be opened right now is
    /// an immediate error; otherwise the source waits for the file to
    /// appear.
    ///
    /// The reader thread observes `cancel`: cancelling it (directly or
    /// via [`TailFile::stop`]) ends the tail and unblocks
    /// [`next_line`](TailFile::next_line) with `None` once queued lines
    /// are drained.
    pub fn open(
        path: impl Into<PathBuf>,
        config: TailFileConfig,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let path = path.into();

        if config.must_exist {
            File::open(&path).map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::FileNotFound(path.clone()),
                _ => Error::Io(e),
            })?;
        }
        let (lines_tx, lines_rx) = bounded::<RawLine>(config.channel_capacity);
        let (error_tx, error_rx) = bounded::<Error>(1);

        let thread_cancel = cancel.clone();
        let thread_config = config.clone();
        let thread_path = path.clone();
        let handle = std::thread::Builder::new()
            .name("jsontail-source".to_string())
            .spawn(move || {
                tailer::run_tail(thread_path, thread_config, thread_cancel, lines_tx, error_tx)
            })
            .map_err(Error::Io)?;

        Ok(Self {
            lines_rx,
            error_rx,
            cancel,
            handle: Some(handle),
        })
    }

    /// Blocking: receive the next line. Returns `None` once the source
    /// has stopped and all queued lines were consumed.
    pub fn next_line(&self) -> Option<RawLine> {
        self.lines_rx.recv_blocking()
    }

    /// Ask the source to stop. The reader thread exits within one watch
    /// cycle; queued lines remain receivable until drained.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Fatal source error, if the reader thread reported one before
    /// exiting. Distinct from line exhaustion.
    pub fn take_error(&self) -> Option<Error> {
        self.error_rx.try_recv()
    }
}

impl Drop for TailFile {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                debug!("tail reader thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn poll_config() -> TailFileConfig {
        TailFileConfig {
            watch: WatchConfig {
                mode: WatchMode::Poll,
                poll_interval: std::time::Duration::from_millis(20),
            },
            ..Default::default()
        }
    }

    fn open_tail(path: impl Into<PathBuf>, config: TailFileConfig) -> TailFile {
        TailFile::open(path, config, CancellationToken::new()).unwrap()
    }

    #[test]
    fn test_open_must_exist_missing() {
        let dir = TempDir::new().unwrap();
        let config = TailFileConfig {
            must_exist: true,
            ..poll_config()
        };

        let result = TailFile::open(dir.path().join("absent.log"), config, CancellationToken::new());
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }

    #[test]
    fn test_reads_existing_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "one\ntwo\n").unwrap();

        let tail = open_tail(&path, poll_config());

        assert_eq!(tail.next_line().unwrap().text(), "one");
        assert_eq!(tail.next_line().unwrap().text(), "two");

        tail.stop();
        assert!(tail.next_line().is_none());
        assert!(tail.take_error().is_none());
    }

    #[test]
    fn test_follows_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "first\n").unwrap();

        let tail = open_tail(&path, poll_config());
        assert_eq!(tail.next_line().unwrap().text(), "first");

        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "second").unwrap();
        f.flush().unwrap();

        assert_eq!(tail.next_line().unwrap().text(), "second");
        tail.stop();
    }

    #[test]
    fn test_waits_for_file_to_appear() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("late.log");

        let tail = open_tail(&path, poll_config());

        std::thread::sleep(std::time::Duration::from_millis(60));
        std::fs::write(&path, "arrived\n").unwrap();

        assert_eq!(tail.next_line().unwrap().text(), "arrived");
        tail.stop();
    }

    #[test]
    fn test_non_follow_ends_at_eof() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "only\n").unwrap();

        let config = TailFileConfig {
            follow: false,
            ..poll_config()
        };
        let tail = open_tail(&path, config);

        assert_eq!(tail.next_line().unwrap().text(), "only");
        // natural end of input, no stop needed
        assert!(tail.next_line().is_none());
    }

    #[test]
    fn test_truncation_reopens_from_start() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "aaaa\nbbbb\n").unwrap();

        let tail = open_tail(&path, poll_config());
        assert_eq!(tail.next_line().unwrap().text(), "aaaa");
        assert_eq!(tail.next_line().unwrap().text(), "bbbb");

        // truncate and rewrite with shorter content
        std::fs::write(&path, "cc\n").unwrap();

        assert_eq!(tail.next_line().unwrap().text(), "cc");
        tail.stop();
    }

    #[test]
    fn test_rotation_reopens_new_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "old-1\n").unwrap();

        let tail = open_tail(&path, poll_config());
        assert_eq!(tail.next_line().unwrap().text(), "old-1");

        // rotate: rename away, then create a fresh file at the path
        std::fs::rename(&path, dir.path().join("app.log.1")).unwrap();
        std::fs::write(&path, "new-1\n").unwrap();

        assert_eq!(tail.next_line().unwrap().text(), "new-1");
        tail.stop();
    }

    #[test]
    fn test_start_at_end_skips_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "skipped\n").unwrap();

        let config = TailFileConfig {
            start_at: StartAt::End,
            ..poll_config()
        };
        let tail = open_tail(&path, config);

        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "seen").unwrap();
        f.flush().unwrap();

        assert_eq!(tail.next_line().unwrap().text(), "seen");
        tail.stop();
    }

    #[test]
    fn test_stop_unblocks_blocked_next_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quiet.log");
        std::fs::write(&path, "only\n").unwrap();

        let tail = std::sync::Arc::new(open_tail(&path, poll_config()));
        assert_eq!(tail.next_line().unwrap().text(), "only");

        // stop from another thread while next_line is blocked on a file
        // that never grows again
        let stopper = tail.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(50));
            stopper.stop();
        });

        let start = std::time::Instant::now();
        assert!(tail.next_line().is_none());
        assert!(start.elapsed() < std::time::Duration::from_secs(2));
        handle.join().unwrap();
    }

    #[test]
    fn test_external_cancel_stops_tail() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quiet.log");
        std::fs::write(&path, "only\n").unwrap();

        let cancel = CancellationToken::new();
        let tail = TailFile::open(&path, poll_config(), cancel.clone()).unwrap();
        assert_eq!(tail.next_line().unwrap().text(), "only");

        cancel.cancel();
        assert!(tail.next_line().is_none());
    }
}
