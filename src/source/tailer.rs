// SPDX-License-Identifier: Apache-2.0

//! The blocking tail loop, run on a dedicated OS thread so file I/O
//! never stalls the async runtime.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bounded_channel::{BoundedSender, SendTimeoutError};
use crate::error::Error;
use crate::source::config::TailFileConfig;
use crate::source::reader::{LineReader, Reopen};
use crate::source::watch::create_watch;
use crate::source::RawLine;

/// Thread entry point: read lines from `path` and send them over
/// `lines_tx` until cancelled, the consumer goes away, or (non-follow)
/// the input is exhausted. A fatal condition is reported once over
/// `error_tx` before exit.
pub(crate) fn run_tail(
    path: PathBuf,
    config: TailFileConfig,
    cancel: CancellationToken,
    lines_tx: BoundedSender<RawLine>,
    error_tx: BoundedSender<Error>,
) {
    let dir = parent_dir(&path);

    // a missing directory can never produce the file; fail rather than
    // retry forever
    if !dir.exists() {
        let _ = error_tx.send_blocking(Error::Source(format!(
            "directory {} does not exist",
            dir.display()
        )));
        return;
    }

    let mut watch = match create_watch(&config.watch, &dir) {
        Ok(w) => w,
        Err(e) => {
            let _ = error_tx.send_blocking(Error::Source(e.to_string()));
            return;
        }
    };
    debug!(path = %path.display(), backend = watch.backend_name(), "tailing file");

    let mut reader = LineReader::new(&path);

    loop {
        if cancel.is_cancelled() {
            debug!(path = %path.display(), "tail cancelled");
            return;
        }

        if !reader.is_open() {
            match reader.open(config.start_at) {
                Ok(()) => {
                    info!(path = %path.display(), "opened log file");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    // wait for the file to show up
                }
                Err(e) => {
                    let _ = error_tx.send_blocking(Error::Source(format!(
                        "cannot open {}: {}",
                        path.display(),
                        e
                    )));
                    return;
                }
            }
        }

        if reader.is_open() {
            if config.reopen {
                match reader.check_reopen() {
                    Ok(Reopen::Unchanged) => {}
                    Ok(Reopen::Rotated) => {
                        info!(path = %path.display(), "file was rotated, reading from start")
                    }
                    Ok(Reopen::Truncated) => {
                        info!(path = %path.display(), "file was truncated, reading from start")
                    }
                    Err(e) => {
                        // transient: the file may be mid-replacement
                        debug!(path = %path.display(), "rotation check failed: {}", e);
                    }
                }
            }

            // batches are capped, so a large backlog streams through
            // the channel instead of accumulating in memory
            loop {
                match reader.read_lines(false) {
                    Ok(lines) => {
                        for line in lines {
                            if !send_line(&lines_tx, &cancel, line) {
                                return;
                            }
                        }
                        if reader.is_eof() {
                            break;
                        }
                        if cancel.is_cancelled() {
                            debug!(path = %path.display(), "tail cancelled");
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(path = %path.display(), "read failed: {}", e);
                        // keep the offset when the same file is still
                        // there, so consumed lines are not re-sent
                        if let Err(e) = reader.recover() {
                            debug!(path = %path.display(), "recover failed: {}", e);
                            reader.close();
                        }
                        break;
                    }
                }
            }

            if !config.follow && reader.is_eof() {
                // drain a trailing unterminated line, then end the stream
                if let Ok(rest) = reader.read_lines(true) {
                    for line in rest {
                        if !send_line(&lines_tx, &cancel, line) {
                            return;
                        }
                    }
                }
                debug!(path = %path.display(), "end of input reached");
                return;
            }
        }

        // wake on change notification or after the poll interval
        if let Err(e) = watch.recv_timeout(config.watch.poll_interval) {
            warn!(path = %path.display(), "watch failed: {}", e);
        }
    }
}

const SEND_RETRY_INTERVAL: std::time::Duration = std::time::Duration::from_millis(100);

/// Push one line to the consumer, re-checking the cancellation signal
/// while the channel is full. Returns false when the tail should stop.
fn send_line(
    lines_tx: &BoundedSender<RawLine>,
    cancel: &CancellationToken,
    line: String,
) -> bool {
    let mut item = RawLine::new(line);
    loop {
        match lines_tx.send_timeout(item, SEND_RETRY_INTERVAL) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(v)) => {
                if cancel.is_cancelled() {
                    return false;
                }
                item = v;
            }
            Err(SendTimeoutError::Disconnected(_)) => {
                debug!("line consumer disconnected, stopping tail");
                return false;
            }
        }
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
