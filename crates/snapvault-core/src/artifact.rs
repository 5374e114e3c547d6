//! Cached artifacts and their metadata sidecars.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::bucket::AsOfBucket;
use crate::key::SnapshotKey;

/// Metadata persisted next to each payload as `meta.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    /// When the payload was written.
    pub created_at: DateTime<Utc>,

    /// Payload size in bytes.
    pub content_length: u64,

    /// Content digest (`sha256:...`), verified on every read.
    pub digest: String,

    /// Media type reported by the fetch collaborator, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

/// An immutable snapshot: raw payload plus coordinate and metadata.
///
/// Created exactly once per (key, bucket) on a cache miss, read any number
/// of times, never updated.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub key: SnapshotKey,
    pub bucket: AsOfBucket,
    pub payload: Bytes,
    pub meta: ArtifactMeta,
}

impl Artifact {
    /// Parse the payload as JSON, if it is JSON.
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.payload).ok()
    }
}

/// Compute the canonical content digest for a payload.
pub fn compute_digest(payload: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(payload)))
}
