// SPDX-License-Identifier: Apache-2.0

//! Periodic heartbeat variant: instead of tailing a file, emit a
//! synthetic counter event on a fixed period until cancelled.

use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use tokio::select;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::publish::PublisherClient;
use crate::record::{Record, Value, TIMESTAMP_FIELD};

/// Event type tag carried by heartbeat records
pub const HEARTBEAT_TYPE: &str = "heartbeat";

/// Emits `{@timestamp, type, counter}` every period, with `counter`
/// starting at 1 on the first tick.
pub struct Heartbeat<C> {
    client: C,
    period: Duration,
}

impl<C: PublisherClient> Heartbeat<C> {
    pub fn new(client: C, period: Duration) -> Self {
        Self { client, period }
    }

    pub async fn run(&mut self, cancel: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut counter: u64 = 0;
        loop {
            select! {
                _ = ticker.tick() => {
                    counter += 1;
                    if let Err(e) = self.client.publish(beat(counter)) {
                        error!("failed to publish heartbeat: {}", e);
                    }
                },
                _ = cancel.cancelled() => break,
            }
        }
        debug!(beats = counter, "heartbeat stopped");
    }
}

fn beat(counter: u64) -> Record {
    let mut record = Record::with_capacity(3);
    record.set(
        TIMESTAMP_FIELD,
        Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    record.set("type", Value::from(HEARTBEAT_TYPE));
    record.set("counter", Value::from(counter));
    record
}
