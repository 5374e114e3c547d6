//! Cache policy engine.
//!
//! Given a key and the configured policy, [`decide`] resolves a fetch request
//! to either reusing an existing bucket or fetching into a target bucket.
//! "Most recent" always means the greatest label under the store's ordering,
//! never the greatest creation timestamp; labels and timestamps agree for
//! time-derived labels, but the label is authoritative.

use chrono::{DateTime, Utc};

use crate::bucket::{AsOfBucket, FROZEN_BUCKET};
use crate::error::{CacheError, CacheResult};
use crate::key::SnapshotKey;
use crate::store::BucketStore;

/// How fetch requests for a key interact with the cache.
///
/// A closed set: adding a mode is a compile-time-checked change across the
/// engine and the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachePolicy {
    /// Never read the cache; always fetch. The fetched result is still
    /// written under a fresh bucket to preserve the audit trail.
    Bypass,

    /// Reuse the latest bucket while it is younger than the TTL; otherwise
    /// fetch into a freshly derived label.
    Ttl { ttl_seconds: u64 },

    /// Once any bucket exists, reuse it forever. The first fetch creates the
    /// single frozen bucket.
    EternalFrozen,

    /// Reuse the exact bucket if present, otherwise fetch targeting it.
    ExplicitBucket { bucket: AsOfBucket },
}

/// Outcome of a policy decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Serve the artifact already stored under this bucket.
    Reuse(AsOfBucket),

    /// Invoke the fetch collaborator and write the result to this bucket.
    Fetch(AsOfBucket),
}

/// Resolve a policy against the store's current contents.
pub async fn decide(
    policy: &CachePolicy,
    key: &SnapshotKey,
    store: &dyn BucketStore,
    now: DateTime<Utc>,
) -> CacheResult<Decision> {
    match policy {
        CachePolicy::Bypass => Ok(Decision::Fetch(AsOfBucket::for_timestamp(now))),

        CachePolicy::Ttl { ttl_seconds } => match store.read_latest(key).await {
            Ok(artifact) => {
                let age = now - artifact.meta.created_at;
                if age.num_seconds() < *ttl_seconds as i64 {
                    Ok(Decision::Reuse(artifact.bucket))
                } else {
                    Ok(Decision::Fetch(AsOfBucket::for_timestamp(now)))
                }
            }
            Err(CacheError::NotFound { .. }) => {
                Ok(Decision::Fetch(AsOfBucket::for_timestamp(now)))
            }
            Err(e) => Err(e),
        },

        CachePolicy::EternalFrozen => match store.read_latest(key).await {
            Ok(artifact) => Ok(Decision::Reuse(artifact.bucket)),
            Err(CacheError::NotFound { .. }) => {
                Ok(Decision::Fetch(AsOfBucket::new(FROZEN_BUCKET)))
            }
            Err(e) => Err(e),
        },

        CachePolicy::ExplicitBucket { bucket } => match store.read_bucket(key, bucket).await {
            Ok(_) => Ok(Decision::Reuse(bucket.clone())),
            Err(CacheError::NotFound { .. }) => Ok(Decision::Fetch(bucket.clone())),
            Err(e) => Err(e),
        },
    }
}
