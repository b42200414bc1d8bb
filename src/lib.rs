// SPDX-License-Identifier: Apache-2.0

//! jsontail tails a JSON-lines log file and republishes each line as a
//! structured event to a pluggable sink.
//!
//! The core is the tail-and-publish loop in [`tail::TailLoop`]: it pulls
//! raw lines from a [`source::TailFile`], decodes them with
//! [`record::RecordDecoder`], and hands successful records to a
//! [`publish::Publisher`] client, observing a cancellation token for
//! prompt shutdown. Rotation and truncation of the watched file are
//! followed transparently.

pub mod bounded_channel;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod publish;
pub mod record;
pub mod source;
pub mod tail;

pub use config::Settings;
pub use error::{Error, Result};
pub use record::{Record, RecordDecoder, Value};
pub use tail::TailLoop;
