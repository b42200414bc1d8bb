// SPDX-License-Identifier: Apache-2.0

//! The tail-and-publish loop.
//!
//! [`TailLoop`] owns one tail session: `run` connects the publisher,
//! opens the line source, and drives lines through decode and publish
//! on a blocking task until stopped or the input ends. `stop` is called
//! from another execution context; `run` returns once the consumption
//! task has fully exited.
//!
//! Session lifecycle: idle until `run`, running while the task consumes
//! lines, stopping once the cancellation token is observed, stopped when
//! the task exits. Stopped is terminal; a session does not restart.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::publish::{Publisher, PublisherClient};
use crate::record::RecordDecoder;
use crate::source::TailFile;

/// One tail session over one file, publishing to one sink
pub struct TailLoop<P: Publisher> {
    settings: Settings,
    publisher: P,
    cancel: CancellationToken,
    client: Mutex<Option<P::Client>>,
    started: AtomicBool,
    lines_processed: Arc<AtomicU64>,
}

impl<P: Publisher> TailLoop<P> {
    pub fn new(settings: Settings, publisher: P) -> Result<Self> {
        settings.validate()?;

        Ok(Self {
            settings,
            publisher,
            cancel: CancellationToken::new(),
            client: Mutex::new(None),
            started: AtomicBool::new(false),
            lines_processed: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Run the session, blocking until it stops.
    ///
    /// Returns an error for open-time fatal conditions (publisher
    /// connect failure, missing file with `must_exist`). Everything
    /// after the loop starts is recovered locally: malformed lines and
    /// publish failures are logged and skipped so the tail stays alive.
    /// Returns `Ok` on [`stop`](Self::stop) or, in non-follow mode, at
    /// natural end of input.
    pub async fn run(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::Config("tail session already started".to_string()));
        }

        let client = self.publisher.connect()?;
        *self.client.lock().expect("client lock poisoned") = Some(client.clone());

        // the source runs on a child token so cancelling the session
        // also stops the reader thread and unblocks `next_line`
        let source = TailFile::open(
            &self.settings.path,
            self.settings.source.clone(),
            self.cancel.child_token(),
        )?;

        info!(path = %self.settings.path.display(), "tail session running");

        let cancel = self.cancel.clone();
        let processed = self.lines_processed.clone();
        let handle = tokio::task::spawn_blocking(move || consume(source, client, cancel, processed));

        handle.await.map_err(|e| Error::Task(e.to_string()))?;

        info!(
            lines = self.lines_processed.load(Ordering::Relaxed),
            "tail session stopped"
        );
        Ok(())
    }

    /// Trigger shutdown: set the cancellation signal, which also stops
    /// the line source, and close the publisher client. Callable from a
    /// different execution context, once per run; does not wait for the
    /// loop - `run` returning is the completion signal.
    pub fn stop(&self) {
        self.cancel.cancel();
        if let Some(client) = self.client.lock().expect("client lock poisoned").take() {
            client.close();
        }
    }

    /// Lines decoded and published so far in this session
    pub fn lines_processed(&self) -> u64 {
        self.lines_processed.load(Ordering::Relaxed)
    }
}

/// The consumption loop, run on a blocking task. Lines are handled
/// strictly in append order: line N is decoded and published (or
/// skipped) before line N+1 is read.
fn consume<C: PublisherClient>(
    source: TailFile,
    client: C,
    cancel: CancellationToken,
    processed: Arc<AtomicU64>,
) {
    let decoder = RecordDecoder::new();

    while let Some(line) = source.next_line() {
        // non-blocking peek before processing each line
        if cancel.is_cancelled() {
            source.stop();
            break;
        }

        let record = match decoder.decode(line.text()) {
            Ok(record) => record,
            Err(e) => {
                error!(line = line.text(), "failed to decode log line: {}", e);
                continue;
            }
        };

        if let Err(e) = client.publish(record) {
            error!("failed to publish event: {}", e);
            continue;
        }

        processed.fetch_add(1, Ordering::Relaxed);
        debug!("event sent");
    }

    // a fatal source error at exit is logged, not propagated
    if let Some(e) = source.take_error() {
        error!("line source stopped: {}", e);
    }
}
