// SPDX-License-Identifier: Apache-2.0

//! Change detection backends for the tail thread.
//!
//! Two strategies: native OS notifications (inotify on Linux, FSEvents
//! on macOS, ReadDirectoryChangesW on Windows) via the `notify` crate,
//! and a polling fallback for file systems where native watching is
//! unavailable or unreliable (NFS and friends). `Auto` mode tries
//! native first and falls back to polling.

mod native;
mod poll;

pub use native::NativeWatch;
pub use poll::PollWatch;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Watch mode configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WatchMode {
    /// Try native watching, fall back to polling on failure
    #[default]
    Auto,
    /// Native file system notifications only
    Native,
    /// Periodic polling only
    Poll,
}

impl std::str::FromStr for WatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(WatchMode::Auto),
            "native" => Ok(WatchMode::Native),
            "poll" | "polling" => Ok(WatchMode::Poll),
            _ => Err(format!(
                "Invalid watch mode '{}'. Valid options: auto, native, poll",
                s
            )),
        }
    }
}

/// Configuration for the change watcher
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Watch mode: auto, native, or poll
    pub mode: WatchMode,
    /// Poll interval in poll mode; also the wakeup bound in native
    /// mode so rotation checks never stall behind a quiet notifier
    pub poll_interval: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            mode: WatchMode::Auto,
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Error type for watcher operations
#[derive(Debug)]
pub enum WatchError {
    /// Failed to initialize the watcher
    Init(String),
    /// Failed to watch a path
    Watch(String),
    /// IO error
    Io(std::io::Error),
}

impl fmt::Display for WatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchError::Init(msg) => write!(f, "watcher initialization failed: {}", msg),
            WatchError::Watch(msg) => write!(f, "watch failed: {}", msg),
            WatchError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for WatchError {}

impl From<std::io::Error> for WatchError {
    fn from(e: std::io::Error) -> Self {
        WatchError::Io(e)
    }
}

/// A change notification for a watched path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEvent {
    pub path: PathBuf,
}

/// A source of change notifications for one directory.
///
/// The tail thread treats events as wakeups: any event (or an empty
/// timeout) triggers a read-and-check cycle, so missed or coalesced
/// events cost latency, never data.
pub trait PathWatch {
    /// Block until events arrive or the timeout expires. An empty
    /// vector means timeout.
    fn recv_timeout(&mut self, timeout: Duration) -> Result<Vec<PathEvent>, WatchError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Create a watcher for the directory containing the tailed file.
///
/// In `Auto` mode native watching is attempted first; failure falls
/// back to polling.
pub fn create_watch(
    config: &WatchConfig,
    dir: &Path,
) -> Result<Box<dyn PathWatch + Send>, WatchError> {
    match config.mode {
        WatchMode::Native => {
            let watch = NativeWatch::new(dir)?;
            Ok(Box::new(watch))
        }
        WatchMode::Poll => {
            let watch = PollWatch::new(dir, config.poll_interval);
            Ok(Box::new(watch))
        }
        WatchMode::Auto => match NativeWatch::new(dir) {
            Ok(watch) => {
                tracing::debug!("using native file system watcher");
                Ok(Box::new(watch))
            }
            Err(e) => {
                tracing::warn!(
                    "native file watching unavailable ({}), falling back to polling",
                    e
                );
                Ok(Box::new(PollWatch::new(dir, config.poll_interval)))
            }
        },
    }
}
