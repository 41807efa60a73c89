//! # Per-Sender Replay Guard
//!
//! Remembers the timestamp of the last accepted command per sender and
//! rejects anything that is not strictly newer.
//!
//! ## Security Design
//!
//! - Ordering is per sender; senders never affect each other
//! - Equal timestamps are rejected (a captured message cannot be replayed)
//! - Optional future-skew bound so a sender cannot lock itself out with a
//!   far-future timestamp
//!
//! The table is not internally synchronized. Owners wrap it in their own
//! lock so check-and-record is a single critical section.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use thiserror::Error;

/// Errors from replay checks.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplayError {
    /// The timestamp is not newer than the last accepted one.
    #[error("Stale command from {sender}: {timestamp} is not newer than {last_accepted}")]
    Stale {
        sender: String,
        timestamp: DateTime<Utc>,
        last_accepted: DateTime<Utc>,
    },

    /// The timestamp is too far in the future.
    #[error("Command from {sender} is in the future: {timestamp} (threshold: {threshold})")]
    FromFuture {
        sender: String,
        timestamp: DateTime<Utc>,
        threshold: DateTime<Utc>,
    },
}

/// Last accepted timestamp per sender.
#[derive(Debug, Default)]
pub struct SenderTimestampTable {
    last_accepted: HashMap<String, DateTime<Utc>>,
    max_future_skew: Option<Duration>,
}

impl SenderTimestampTable {
    /// Create an empty table without a future-skew bound.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table that also rejects timestamps more than `skew` ahead of
    /// the local clock.
    #[must_use]
    pub fn with_max_future_skew(skew: Duration) -> Self {
        Self {
            last_accepted: HashMap::new(),
            max_future_skew: Some(skew),
        }
    }

    /// Check a command timestamp and record it when accepted.
    ///
    /// # Errors
    ///
    /// - `ReplayError::FromFuture` - beyond the configured future skew
    /// - `ReplayError::Stale` - not strictly newer than the last accepted
    pub fn check_and_record(
        &mut self,
        sender: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), ReplayError> {
        if let Some(skew) = self.max_future_skew {
            let threshold = Utc::now() + skew;
            if timestamp > threshold {
                return Err(ReplayError::FromFuture {
                    sender: sender.to_string(),
                    timestamp,
                    threshold,
                });
            }
        }

        if let Some(&last) = self.last_accepted.get(sender) {
            if timestamp <= last {
                return Err(ReplayError::Stale {
                    sender: sender.to_string(),
                    timestamp,
                    last_accepted: last,
                });
            }
        }

        self.last_accepted.insert(sender.to_string(), timestamp);
        Ok(())
    }

    /// Last accepted timestamp of a sender.
    #[must_use]
    pub fn last_accepted(&self, sender: &str) -> Option<DateTime<Utc>> {
        self.last_accepted.get(sender).copied()
    }

    /// Number of senders tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.last_accepted.len()
    }

    /// Check if no sender has been seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.last_accepted.is_empty()
    }
}
