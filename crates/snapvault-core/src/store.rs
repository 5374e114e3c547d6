//! Append-only bucket store.
//!
//! Artifacts live under a (key, bucket) coordinate and are write-once: a
//! finalized bucket is never overwritten or mutated, only read. Writes are
//! staged in a hidden directory and published with a single rename so a
//! partially-written artifact is never visible to readers and a concurrent
//! writer racing the same coordinate loses cleanly.
//!
//! # Layout
//!
//! ```text
//! <root>/<source>/<resource[#tag]>/
//!   ├── 2025-10-28T09-30-00Z/
//!   │   ├── payload.bin
//!   │   └── meta.json
//!   ├── 2025-10-29T09-30-00Z/
//!   └── .stage-<bucket>-<nonce>/   # in-flight write, never listed
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::artifact::{compute_digest, Artifact, ArtifactMeta};
use crate::bucket::AsOfBucket;
use crate::error::{CacheError, CacheResult};
use crate::key::SnapshotKey;

/// Payload file name inside a bucket directory.
pub const PAYLOAD_FILE: &str = "payload.bin";

/// Metadata sidecar name inside a bucket directory.
pub const META_FILE: &str = "meta.json";

const STAGE_PREFIX: &str = ".stage-";

/// Read/write access to bucketed artifacts for one store root.
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// All buckets for a key, ascending by label. Empty for unknown keys.
    async fn list_buckets(&self, key: &SnapshotKey) -> CacheResult<Vec<AsOfBucket>>;

    /// Read the artifact at an exact coordinate.
    async fn read_bucket(&self, key: &SnapshotKey, bucket: &AsOfBucket) -> CacheResult<Artifact>;

    /// Read the artifact under the greatest label for a key.
    async fn read_latest(&self, key: &SnapshotKey) -> CacheResult<Artifact>;

    /// Create the artifact at a coordinate. Write-once: fails with
    /// [`CacheError::Conflict`] if the coordinate exists, and with
    /// [`CacheError::OrderViolation`] if the label sorts strictly before the
    /// current latest bucket (unless backfill is enabled).
    async fn write_bucket(
        &self,
        key: &SnapshotKey,
        bucket: &AsOfBucket,
        payload: Bytes,
        media_type: Option<String>,
    ) -> CacheResult<Artifact>;
}

/// Filesystem-backed bucket store.
#[derive(Debug, Clone)]
pub struct FsBucketStore {
    root: PathBuf,
    allow_backfill: bool,
}

impl FsBucketStore {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            allow_backfill: false,
        }
    }

    /// Permit writes whose label sorts before the current latest bucket.
    /// Off by default; intended for controlled historical backfills only.
    pub fn with_backfill(mut self, allow: bool) -> Self {
        self.allow_backfill = allow;
        self
    }

    /// Default store root: `<platform data dir>/snapvault`.
    pub fn default_root() -> CacheResult<PathBuf> {
        let base = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| CacheError::Io {
                message: "could not determine data directory".to_string(),
            })?;
        Ok(base.join("snapvault"))
    }

    /// The store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding all buckets for a key.
    pub fn key_path(&self, key: &SnapshotKey) -> PathBuf {
        self.root.join(key.rel_dir())
    }

    /// Directory for one (key, bucket) coordinate.
    pub fn bucket_path(&self, key: &SnapshotKey, bucket: &AsOfBucket) -> PathBuf {
        self.key_path(key).join(bucket.as_str())
    }

    fn io_err(what: &str, e: std::io::Error) -> CacheError {
        CacheError::Io {
            message: format!("{what}: {e}"),
        }
    }

    fn corruption(key: &SnapshotKey, bucket: &AsOfBucket, message: impl Into<String>) -> CacheError {
        CacheError::Corruption {
            key: key.to_string(),
            bucket: bucket.to_string(),
            message: message.into(),
        }
    }

    async fn latest_label(&self, key: &SnapshotKey) -> CacheResult<Option<AsOfBucket>> {
        Ok(self.list_buckets(key).await?.pop())
    }
}

#[async_trait]
impl BucketStore for FsBucketStore {
    async fn list_buckets(&self, key: &SnapshotKey) -> CacheResult<Vec<AsOfBucket>> {
        let dir = self.key_path(key);
        let mut rd = match fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Self::io_err("listing buckets", e)),
        };

        let mut buckets = Vec::new();
        while let Some(entry) = rd
            .next_entry()
            .await
            .map_err(|e| Self::io_err("listing buckets", e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue; // stage dirs and other hidden entries
            }
            let is_dir = entry
                .file_type()
                .await
                .map_err(|e| Self::io_err("listing buckets", e))?
                .is_dir();
            if is_dir {
                buckets.push(AsOfBucket::new(name));
            }
        }
        buckets.sort();
        Ok(buckets)
    }

    async fn read_bucket(&self, key: &SnapshotKey, bucket: &AsOfBucket) -> CacheResult<Artifact> {
        let dir = self.bucket_path(key, bucket);
        match fs::metadata(&dir).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CacheError::NotFound {
                    key: key.to_string(),
                    bucket: bucket.to_string(),
                })
            }
            Err(e) => return Err(Self::io_err("reading bucket", e)),
        }

        // The coordinate exists; anything unreadable past this point is
        // corruption, not a miss.
        let meta_text = fs::read_to_string(dir.join(META_FILE))
            .await
            .map_err(|e| Self::corruption(key, bucket, format!("unreadable {META_FILE}: {e}")))?;
        let meta: ArtifactMeta = serde_json::from_str(&meta_text)
            .map_err(|e| Self::corruption(key, bucket, format!("invalid {META_FILE}: {e}")))?;

        let payload = fs::read(dir.join(PAYLOAD_FILE))
            .await
            .map_err(|e| Self::corruption(key, bucket, format!("unreadable {PAYLOAD_FILE}: {e}")))?;

        let actual = compute_digest(&payload);
        if actual != meta.digest {
            return Err(Self::corruption(
                key,
                bucket,
                format!("digest mismatch: expected {}, got {}", meta.digest, actual),
            ));
        }

        Ok(Artifact {
            key: key.clone(),
            bucket: bucket.clone(),
            payload: Bytes::from(payload),
            meta,
        })
    }

    async fn read_latest(&self, key: &SnapshotKey) -> CacheResult<Artifact> {
        match self.latest_label(key).await? {
            Some(bucket) => self.read_bucket(key, &bucket).await,
            None => Err(CacheError::NotFound {
                key: key.to_string(),
                bucket: "latest".to_string(),
            }),
        }
    }

    async fn write_bucket(
        &self,
        key: &SnapshotKey,
        bucket: &AsOfBucket,
        payload: Bytes,
        media_type: Option<String>,
    ) -> CacheResult<Artifact> {
        let key_dir = self.key_path(key);
        let final_dir = self.bucket_path(key, bucket);

        if fs::metadata(&final_dir).await.is_ok() {
            return Err(CacheError::Conflict {
                key: key.to_string(),
                bucket: bucket.to_string(),
            });
        }

        if !self.allow_backfill {
            if let Some(latest) = self.latest_label(key).await? {
                if *bucket < latest {
                    return Err(CacheError::OrderViolation {
                        key: key.to_string(),
                        attempted: bucket.to_string(),
                        latest: latest.to_string(),
                    });
                }
            }
        }

        let meta = ArtifactMeta {
            created_at: Utc::now(),
            content_length: payload.len() as u64,
            digest: compute_digest(&payload),
            media_type,
        };

        // Stage the full artifact, then publish with one rename. The rename
        // fails if another writer published the coordinate first.
        let stage_dir = key_dir.join(format!(
            "{STAGE_PREFIX}{}-{}",
            bucket.as_str(),
            Uuid::new_v4().simple()
        ));
        fs::create_dir_all(&stage_dir)
            .await
            .map_err(|e| Self::io_err("creating stage directory", e))?;

        let staged = async {
            fs::write(stage_dir.join(PAYLOAD_FILE), &payload)
                .await
                .map_err(|e| Self::io_err("staging payload", e))?;
            let meta_json = serde_json::to_string_pretty(&meta).map_err(|e| CacheError::Io {
                message: format!("serializing metadata: {e}"),
            })?;
            fs::write(stage_dir.join(META_FILE), meta_json)
                .await
                .map_err(|e| Self::io_err("staging metadata", e))
        }
        .await;

        if let Err(e) = staged {
            let _ = fs::remove_dir_all(&stage_dir).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&stage_dir, &final_dir).await {
            let _ = fs::remove_dir_all(&stage_dir).await;
            // Published buckets are never empty, so renaming onto one fails.
            if fs::metadata(&final_dir).await.is_ok() {
                warn!(key = %key, bucket = %bucket, "lost publish race");
                return Err(CacheError::Conflict {
                    key: key.to_string(),
                    bucket: bucket.to_string(),
                });
            }
            return Err(Self::io_err("publishing bucket", e));
        }

        debug!(
            key = %key,
            bucket = %bucket,
            bytes = meta.content_length,
            "published bucket"
        );

        Ok(Artifact {
            key: key.clone(),
            bucket: bucket.clone(),
            payload,
            meta,
        })
    }
}
