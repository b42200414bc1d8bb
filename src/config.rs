// SPDX-License-Identifier: Apache-2.0

//! Settings consumed by a tail session. Loading these from a config
//! file or the environment is the host's concern; this crate only
//! receives the finished values.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::source::TailFileConfig;

/// Settings for one tail session
#[derive(Debug, Clone)]
pub struct Settings {
    /// Path of the JSON-lines log file to tail
    pub path: PathBuf,
    /// Emit period for the heartbeat variant
    pub period: Duration,
    /// Line source options (rotation, follow, watch mode)
    pub source: TailFileConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            period: Duration::from_secs(1),
            source: TailFileConfig::default(),
        }
    }
}

impl Settings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(Error::Config("log file path must be specified".into()));
        }

        if self.period.is_zero() {
            return Err(Error::Config("period must be greater than zero".into()));
        }

        Ok(())
    }
}
