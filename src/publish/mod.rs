// SPDX-License-Identifier: Apache-2.0

//! Publisher boundary: where finished records leave the core.
//!
//! The tail loop treats publishing as fire-and-forget: a publish error
//! is logged and the loop continues. Batching, retries, and transport
//! I/O all live behind this boundary.
//!
//! Two implementations ship in-tree: [`ChannelPublisher`] hands records
//! to a bounded channel (the wiring used by tests and embedding hosts),
//! and [`BlackholePublisher`] drops them while counting.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::bounded_channel::{bounded, BoundedReceiver, BoundedSender};
use crate::error::{Error, Result};
use crate::record::Record;

/// A connected publisher client.
///
/// `publish` is called from the tail loop's blocking task; `close` may
/// race with an in-flight publish from another thread, in which case
/// the publish errors rather than crashing.
pub trait PublisherClient: Clone + Send + Sync + 'static {
    fn publish(&self, record: Record) -> Result<()>;

    fn close(&self);
}

/// Factory for publisher clients, owned by the host
pub trait Publisher {
    type Client: PublisherClient;

    fn connect(&self) -> Result<Self::Client>;
}

/// Publisher that forwards records into a bounded channel
pub struct ChannelPublisher {
    tx: BoundedSender<Record>,
}

impl ChannelPublisher {
    /// Create a publisher and the receiving half of its channel
    pub fn new(capacity: usize) -> (Self, BoundedReceiver<Record>) {
        let (tx, rx) = bounded(capacity);
        (Self { tx }, rx)
    }
}

impl Publisher for ChannelPublisher {
    type Client = ChannelClient;

    fn connect(&self) -> Result<ChannelClient> {
        Ok(ChannelClient {
            tx: self.tx.clone(),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }
}

#[derive(Clone)]
pub struct ChannelClient {
    tx: BoundedSender<Record>,
    closed: Arc<AtomicBool>,
}

impl PublisherClient for ChannelClient {
    fn publish(&self, record: Record) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Publish("client is closed".to_string()));
        }
        self.tx
            .send_blocking(record)
            .map_err(|_| Error::Publish("sink disconnected".to_string()))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Publisher that discards every record, keeping only a count.
/// Clones share the count, so a clone kept outside the loop can
/// observe how many records were accepted.
#[derive(Clone, Default)]
pub struct BlackholePublisher {
    published: Arc<AtomicU64>,
}

impl BlackholePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total records accepted across all clients
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl Publisher for BlackholePublisher {
    type Client = BlackholeClient;

    fn connect(&self) -> Result<BlackholeClient> {
        Ok(BlackholeClient {
            published: self.published.clone(),
        })
    }
}

#[derive(Clone)]
pub struct BlackholeClient {
    published: Arc<AtomicU64>,
}

impl PublisherClient for BlackholeClient {
    fn publish(&self, _record: Record) -> Result<()> {
        self.published.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn close(&self) {}
}
