// SPDX-License-Identifier: Apache-2.0

//! Native file system watcher using the `notify` crate.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::{PathEvent, PathWatch, WatchError};

/// Native file system watcher using OS-level notifications
pub struct NativeWatch {
    // held for the callback registration, dropped on close
    _watcher: RecommendedWatcher,
    rx: Receiver<Result<Event, notify::Error>>,
    dir: PathBuf,
}

impl NativeWatch {
    /// Create a watcher covering the given directory, non-recursively
    pub fn new(dir: &Path) -> Result<Self, WatchError> {
        let (tx, rx) = channel();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )
        .map_err(|e| WatchError::Init(e.to_string()))?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::Watch(e.to_string()))?;

        Ok(Self {
            _watcher: watcher,
            rx,
            dir: dir.to_path_buf(),
        })
    }

    fn convert(event: Event) -> Vec<PathEvent> {
        match event.kind {
            // access events carry no content change
            EventKind::Access(_) => Vec::new(),
            _ => event
                .paths
                .into_iter()
                .map(|path| PathEvent { path })
                .collect(),
        }
    }
}

impl PathWatch for NativeWatch {
    fn recv_timeout(&mut self, timeout: Duration) -> Result<Vec<PathEvent>, WatchError> {
        let mut events = Vec::new();

        match self.rx.recv_timeout(timeout) {
            Ok(Ok(event)) => events.extend(Self::convert(event)),
            Ok(Err(e)) => {
                tracing::debug!(dir = ?self.dir, "notify error: {}", e);
            }
            Err(RecvTimeoutError::Timeout) => return Ok(events),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(WatchError::Watch("notify channel closed".to_string()))
            }
        }

        // drain whatever else is already queued
        while let Ok(res) = self.rx.try_recv() {
            if let Ok(event) = res {
                events.extend(Self::convert(event));
            }
        }

        Ok(events)
    }

    fn backend_name(&self) -> &'static str {
        "native"
    }
}
