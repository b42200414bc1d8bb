// SPDX-License-Identifier: Apache-2.0

//! Configuration for the line source.

use crate::source::watch::WatchConfig;

/// Where to start reading a newly opened file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StartAt {
    /// Read the file from the beginning
    #[default]
    Beginning,
    /// Only read lines appended after open
    End,
}

/// Options recognized by [`TailFile::open`](crate::source::TailFile::open)
#[derive(Debug, Clone)]
pub struct TailFileConfig {
    /// Reopen when the file at the path is replaced or truncated
    pub reopen: bool,
    /// Keep reading past EOF rather than ending the stream
    pub follow: bool,
    /// Fail at open time if the file is missing, instead of waiting
    /// for it to appear
    pub must_exist: bool,
    /// Where to start reading at open
    pub start_at: StartAt,
    /// Watch backend selection and poll interval
    pub watch: WatchConfig,
    /// Capacity of the line channel between the reader thread and
    /// the consumer
    pub channel_capacity: usize,
}

impl Default for TailFileConfig {
    fn default() -> Self {
        Self {
            reopen: true,
            follow: true,
            must_exist: false,
            start_at: StartAt::default(),
            watch: WatchConfig::default(),
            channel_capacity: 512,
        }
    }
}
