//! Session orchestration.
//!
//! A [`Session`] ties the policy engine, the bucket store, and the external
//! fetch collaborator together: consult the policy, serve a reuse decision
//! from the store, or fetch and persist on a miss. Only write conflicts are
//! handled here (the losing writer re-reads the winner's artifact);
//! everything else crosses the boundary to the caller verbatim.

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::{CacheError, CacheResult};
use crate::fetch::Fetcher;
use crate::key::SnapshotKey;
use crate::policy::{decide, CachePolicy, Decision};
use crate::store::BucketStore;
use crate::Artifact;

/// Cache session over one bucket store.
///
/// Policies are passed per call, not held by the session, so concurrent
/// sessions with different per-source policies can share a process.
#[derive(Debug, Clone)]
pub struct Session<S> {
    store: S,
}

impl<S: BucketStore> Session<S> {
    /// Create a session over a store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Read access to the underlying store, for inspection tooling.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolve a fetch request through the cache.
    ///
    /// Returns the artifact and whether it was served from the cache.
    pub async fn get(
        &self,
        key: &SnapshotKey,
        policy: &CachePolicy,
        fetcher: &dyn Fetcher,
    ) -> CacheResult<(Artifact, bool)> {
        let now = Utc::now();
        match decide(policy, key, &self.store, now).await? {
            Decision::Reuse(bucket) => {
                let artifact = self.store.read_bucket(key, &bucket).await.map_err(|e| {
                    // The policy just observed this bucket; a failed read is
                    // store corruption, never a miss.
                    match e {
                        CacheError::NotFound { key, bucket } => CacheError::Corruption {
                            key,
                            bucket,
                            message: "bucket vanished between decision and read".to_string(),
                        },
                        other => other,
                    }
                })?;
                debug!(key = %key, bucket = %artifact.bucket, "cache hit");
                Ok((artifact, true))
            }

            Decision::Fetch(bucket) => {
                let fetched =
                    fetcher
                        .fetch(&key.resource)
                        .await
                        .map_err(|source| CacheError::Fetch {
                            resource: key.resource.clone(),
                            source,
                        })?;

                match self
                    .store
                    .write_bucket(key, &bucket, fetched.body, fetched.media_type)
                    .await
                {
                    Ok(artifact) => {
                        debug!(key = %key, bucket = %bucket, "cache miss, bucket created");
                        Ok((artifact, false))
                    }
                    Err(CacheError::Conflict { .. }) => {
                        // A concurrent writer won the coordinate; serve its
                        // artifact instead of erroring.
                        warn!(key = %key, bucket = %bucket, "lost write race, reusing winner");
                        let artifact = self.store.read_bucket(key, &bucket).await?;
                        Ok((artifact, true))
                    }
                    Err(other) => Err(other),
                }
            }
        }
    }
}
