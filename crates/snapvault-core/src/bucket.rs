//! Bucket labels.
//!
//! An [`AsOfBucket`] partitions time for one cache key. Labels are ordered
//! lexicographically and that ordering is authoritative everywhere "latest"
//! is needed; creation timestamps are expected to agree but never consulted
//! for tie-breaks.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label for frozen sources whose single bucket never changes.
pub const FROZEN_BUCKET: &str = "frozen";

/// Default label format for time-derived buckets.
///
/// Second-resolution UTC timestamps keep labels strictly increasing even
/// when a sub-day TTL creates several buckets per calendar day.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%SZ";

/// A bucket label: one immutable snapshot slot under a cache key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AsOfBucket(String);

impl AsOfBucket {
    /// Wrap a literal label.
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// The label text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Label derived from a wall-clock instant (UTC, second resolution).
    pub fn for_timestamp(now: DateTime<Utc>) -> Self {
        Self(now.format(TIMESTAMP_FORMAT).to_string())
    }

    /// Resolve a configured bucket spec against "now".
    ///
    /// - a spec containing `%` is treated as a UTC format string
    ///   (`"%Y-%m-%d"` resolves to today's ISO date);
    /// - any other non-empty spec is a literal label (`"2025Q4"`);
    /// - `None` or empty falls back to [`AsOfBucket::for_timestamp`].
    pub fn resolve_spec(spec: Option<&str>, now: DateTime<Utc>) -> Self {
        match spec {
            Some(s) if s.contains('%') => Self(now.format(s).to_string()),
            Some(s) if !s.is_empty() => Self(s.to_string()),
            _ => Self::for_timestamp(now),
        }
    }
}

impl fmt::Display for AsOfBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AsOfBucket {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for AsOfBucket {
    fn from(label: String) -> Self {
        Self(label)
    }
}
