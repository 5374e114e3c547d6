//! Policy-driven snapshot cache for raw reference data.
//!
//! snapvault persists externally fetched payloads as immutable, time-bucketed
//! snapshots and decides per request whether to reuse a cached bucket, fetch
//! fresh, or create a new bucket. Historical buckets are retained indefinitely
//! for diffing and audit.
//!
//! # Quick Start
//!
//! ```no_run
//! use snapvault_core::{CachePolicy, FsBucketStore, Session, SnapshotKey};
//!
//! # async fn example(fetcher: &dyn snapvault_core::Fetcher) -> snapvault_core::CacheResult<()> {
//! let store = FsBucketStore::new("/var/lib/snapvault");
//! let session = Session::new(store);
//!
//! let key = SnapshotKey::untagged("justetf", "IE00B4L5Y983");
//! let policy = CachePolicy::Ttl { ttl_seconds: 3600 };
//!
//! let (artifact, was_hit) = session.get(&key, &policy, fetcher).await?;
//! println!("{} bytes (hit: {was_hit})", artifact.meta.content_length);
//! # Ok(())
//! # }
//! ```
//!
//! # Guarantees
//!
//! - A (key, bucket) coordinate is write-once: concurrent writers race on an
//!   exclusive publish and the loser observes [`CacheError::Conflict`].
//! - Published buckets are never mutated or deleted by this crate.
//! - Bucket labels are ordered lexicographically and the label, never the
//!   creation timestamp, decides which bucket is "latest".

pub mod artifact;
pub mod bucket;
pub mod config;
pub mod error;
pub mod fetch;
pub mod key;
pub mod policy;
pub mod session;
pub mod store;

pub use artifact::{compute_digest, Artifact, ArtifactMeta};
pub use bucket::{AsOfBucket, FROZEN_BUCKET};
pub use config::{CacheMode, SourcePolicy, SourceSpec, VaultConfig};
pub use error::{CacheError, CacheResult};
pub use fetch::{FetchError, FetchedPayload, Fetcher};
pub use key::SnapshotKey;
pub use policy::{decide, CachePolicy, Decision};
pub use session::Session;
pub use store::{BucketStore, FsBucketStore};
