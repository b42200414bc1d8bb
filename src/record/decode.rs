// SPDX-License-Identifier: Apache-2.0

//! Decode one raw line into a [`Record`] and normalize its timestamp.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value as JsonValue;
use tracing::warn;

use super::{Record, Value};
use crate::error::{Error, Result};

/// Conventional timestamp field on JSON log lines
pub const TIMESTAMP_FIELD: &str = "@timestamp";

/// Decoder for JSON-lines records.
///
/// A line must be a well-formed JSON object; anything else is a decode
/// error for the caller to log and skip. After decoding, `@timestamp`
/// is normalized: a parsable RFC 3339 value is kept (re-emitted in
/// canonical UTC form), an unparsable or missing one is replaced with
/// the current wall-clock time and a warning is logged.
#[derive(Debug, Clone, Default)]
pub struct RecordDecoder;

impl RecordDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode a raw line into a normalized record
    pub fn decode(&self, line: &str) -> Result<Record> {
        let parsed: JsonValue = serde_json::from_str(line)?;

        let map = match parsed {
            JsonValue::Object(map) => map,
            _ => {
                return Err(Error::Decode(
                    "line is not a JSON object at the top level".to_string(),
                ))
            }
        };

        let mut record = Record::with_capacity(map.len());
        for (key, value) in map {
            record.set(key, Value::from(value));
        }

        self.normalize_timestamp(&mut record);

        Ok(record)
    }

    /// Normalize the `@timestamp` field in place: parsed values are
    /// kept and canonicalized, anything else becomes the current time
    /// with a warning.
    fn normalize_timestamp(&self, record: &mut Record) {
        let parsed = record
            .get_str(TIMESTAMP_FIELD)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok());

        let ts = match parsed {
            Some(ts) => ts.with_timezone(&Utc),
            None => {
                warn!(
                    value = record.get_str(TIMESTAMP_FIELD).unwrap_or(""),
                    "unparsable @timestamp on log line, substituting current time"
                );
                Utc::now()
            }
        };

        record.set(
            TIMESTAMP_FIELD,
            Value::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
    }
}
