//! End-to-end behavior of the session across all cache policies.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration, Utc};
use tempfile::TempDir;

use snapvault_core::store::META_FILE;
use snapvault_core::{
    AsOfBucket, BucketStore, CacheError, CachePolicy, FetchError, FetchedPayload, Fetcher,
    FsBucketStore, Session, SnapshotKey, FROZEN_BUCKET,
};

/// Call-counting fetcher that serves payloads in order, repeating the last.
struct ScriptedFetcher {
    calls: AtomicUsize,
    payloads: Vec<&'static str>,
}

impl ScriptedFetcher {
    fn new(payloads: Vec<&'static str>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            payloads,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, _resource: &str) -> Result<FetchedPayload, FetchError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let body = self.payloads[n.min(self.payloads.len() - 1)];
        Ok(FetchedPayload::new(Bytes::from_static(body.as_bytes()))
            .with_media_type("application/json"))
    }
}

fn key() -> SnapshotKey {
    SnapshotKey::untagged("justetf", "IE00B4L5Y983")
}

fn session(tmp: &TempDir) -> Session<FsBucketStore> {
    Session::new(FsBucketStore::new(tmp.path().join("vault")))
}

/// Test surgery: move a bucket to an older label and backdate its metadata,
/// simulating a snapshot written in the past.
async fn backdate(
    store: &FsBucketStore,
    key: &SnapshotKey,
    bucket: &AsOfBucket,
    new_label: &str,
    age_seconds: i64,
) -> AsOfBucket {
    let relabeled = AsOfBucket::new(new_label);
    tokio::fs::rename(
        store.bucket_path(key, bucket),
        store.bucket_path(key, &relabeled),
    )
    .await
    .unwrap();

    let meta_path = store.bucket_path(key, &relabeled).join(META_FILE);
    let text = tokio::fs::read_to_string(&meta_path).await.unwrap();
    let mut meta: serde_json::Value = serde_json::from_str(&text).unwrap();
    let stale = Utc::now() - Duration::seconds(age_seconds);
    meta["created_at"] = serde_json::Value::String(stale.to_rfc3339());
    tokio::fs::write(&meta_path, serde_json::to_string_pretty(&meta).unwrap())
        .await
        .unwrap();
    relabeled
}

#[tokio::test]
async fn explicit_bucket_is_idempotent_across_changing_upstreams() {
    let tmp = TempDir::new().unwrap();
    let session = session(&tmp);
    let fetcher = ScriptedFetcher::new(vec!["{\"ter\":0.2}", "{\"ter\":0.9}"]);
    let policy = CachePolicy::ExplicitBucket {
        bucket: AsOfBucket::new("2025-10-28"),
    };

    let (first, hit1) = session.get(&key(), &policy, &fetcher).await.unwrap();
    let (second, hit2) = session.get(&key(), &policy, &fetcher).await.unwrap();

    assert!(!hit1);
    assert!(hit2);
    assert_eq!(first.payload, second.payload);
    assert_eq!(&second.payload[..], b"{\"ter\":0.2}");
    assert_eq!(fetcher.calls(), 1, "second call must not refetch");
}

#[tokio::test]
async fn ttl_serves_identical_payload_within_window() {
    let tmp = TempDir::new().unwrap();
    let session = session(&tmp);
    let fetcher = ScriptedFetcher::new(vec!["{\"ter\":0.2}", "{\"ter\":0.9}"]);
    let policy = CachePolicy::Ttl { ttl_seconds: 3600 };

    let (first, hit1) = session.get(&key(), &policy, &fetcher).await.unwrap();
    let (second, hit2) = session.get(&key(), &policy, &fetcher).await.unwrap();

    assert!(!hit1);
    assert!(hit2);
    assert_eq!(first.payload, second.payload);
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn ttl_expiry_creates_a_second_bucket() {
    let tmp = TempDir::new().unwrap();
    let session = session(&tmp);
    let fetcher = ScriptedFetcher::new(vec!["{\"ter\":0.2}", "{\"ter\":0.21}"]);
    let policy = CachePolicy::Ttl { ttl_seconds: 3600 };

    let (first, _) = session.get(&key(), &policy, &fetcher).await.unwrap();
    let before = session.store().list_buckets(&key()).await.unwrap();
    assert_eq!(before.len(), 1);

    let old = backdate(
        session.store(),
        &key(),
        &first.bucket,
        "2020-01-01T00-00-00Z",
        4000,
    )
    .await;

    let (third, hit3) = session.get(&key(), &policy, &fetcher).await.unwrap();
    assert!(!hit3, "expired bucket must not satisfy the request");
    assert_eq!(&third.payload[..], b"{\"ter\":0.21}");
    assert_eq!(fetcher.calls(), 2);

    let after = session.store().list_buckets(&key()).await.unwrap();
    assert_eq!(after.len(), 2, "a new bucket must be created on expiry");
    assert_eq!(after[0], old);
    assert!(after[0] < after[1], "buckets must list in ascending order");
}

#[tokio::test]
async fn eternal_frozen_never_refetches() {
    let tmp = TempDir::new().unwrap();
    let session = session(&tmp);
    let fetcher = ScriptedFetcher::new(vec!["constituents-v1", "constituents-v2"]);
    let policy = CachePolicy::EternalFrozen;

    let (first, hit1) = session.get(&key(), &policy, &fetcher).await.unwrap();
    assert!(!hit1);
    assert_eq!(first.bucket, AsOfBucket::new(FROZEN_BUCKET));

    // Even a decade of elapsed time changes nothing.
    let meta_path = session
        .store()
        .bucket_path(&key(), &first.bucket)
        .join(META_FILE);
    let text = tokio::fs::read_to_string(&meta_path).await.unwrap();
    let mut meta: serde_json::Value = serde_json::from_str(&text).unwrap();
    let stale = Utc::now() - Duration::days(3650);
    meta["created_at"] = serde_json::Value::String(stale.to_rfc3339());
    tokio::fs::write(&meta_path, serde_json::to_string_pretty(&meta).unwrap())
        .await
        .unwrap();

    let (second, hit2) = session.get(&key(), &policy, &fetcher).await.unwrap();
    assert!(hit2);
    assert_eq!(second.payload, first.payload);
    assert_eq!(fetcher.calls(), 1, "frozen sources are fetched exactly once");
}

#[tokio::test]
async fn bypass_fetches_on_every_call() {
    let tmp = TempDir::new().unwrap();
    let session = session(&tmp);
    let fetcher = ScriptedFetcher::new(vec!["fresh-1", "fresh-2"]);

    let (_, hit1) = session.get(&key(), &CachePolicy::Bypass, &fetcher).await.unwrap();
    session.get(&key(), &CachePolicy::Bypass, &fetcher).await.unwrap();

    assert!(!hit1);
    assert_eq!(fetcher.calls(), 2, "bypass must never be satisfied from cache");
    // The audit trail still records the fetches.
    assert!(!session.store().list_buckets(&key()).await.unwrap().is_empty());
}

#[tokio::test]
async fn end_to_end_ttl_scenario() {
    let tmp = TempDir::new().unwrap();
    let session = session(&tmp);
    let fetcher = ScriptedFetcher::new(vec![
        "{\"isin\":\"IE00B4L5Y983\",\"ter\":0.2}",
        "{\"isin\":\"IE00B4L5Y983\",\"ter\":0.2}",
    ]);
    let policy = CachePolicy::Ttl { ttl_seconds: 3600 };

    // t=0: miss, bucket created.
    let (a0, hit0) = session.get(&key(), &policy, &fetcher).await.unwrap();
    assert!(!hit0);

    // t=1800: hit with identical payload.
    let half = backdate(session.store(), &key(), &a0.bucket, "2025-01-01T00-00-00Z", 1800).await;
    let (a1, hit1) = session.get(&key(), &policy, &fetcher).await.unwrap();
    assert!(hit1);
    assert_eq!(a1.payload, a0.payload);
    assert_eq!(a1.bucket, half);

    // t=4000: miss, second bucket with a distinct, later-sorting label.
    backdate(session.store(), &key(), &half, "2025-01-01T00-00-00Z", 4000).await;
    let (a2, hit2) = session.get(&key(), &policy, &fetcher).await.unwrap();
    assert!(!hit2);
    assert_ne!(a2.bucket, half);

    let buckets = session.store().list_buckets(&key()).await.unwrap();
    assert_eq!(buckets.len(), 2);
    assert!(buckets[0] < buckets[1]);
}

/// Fetcher that publishes the coordinate itself before returning, standing in
/// for a concurrent writer that wins the race.
struct RacingFetcher {
    store: Arc<FsBucketStore>,
    key: SnapshotKey,
    bucket: AsOfBucket,
}

#[async_trait]
impl Fetcher for RacingFetcher {
    async fn fetch(&self, _resource: &str) -> Result<FetchedPayload, FetchError> {
        self.store
            .write_bucket(
                &self.key,
                &self.bucket,
                Bytes::from_static(b"winner"),
                None,
            )
            .await
            .unwrap();
        Ok(FetchedPayload::new(Bytes::from_static(b"loser")))
    }
}

#[tokio::test]
async fn losing_a_write_race_returns_the_winning_artifact_as_a_hit() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(FsBucketStore::new(tmp.path().join("vault")));
    let session = Session::new(FsBucketStore::new(tmp.path().join("vault")));
    let bucket = AsOfBucket::new("2025-10-28");
    let fetcher = RacingFetcher {
        store,
        key: key(),
        bucket: bucket.clone(),
    };
    let policy = CachePolicy::ExplicitBucket { bucket };

    let (artifact, was_hit) = session.get(&key(), &policy, &fetcher).await.unwrap();
    assert!(was_hit);
    assert_eq!(&artifact.payload[..], b"winner");
}

#[tokio::test]
async fn stale_explicit_label_surfaces_order_violation() {
    let tmp = TempDir::new().unwrap();
    let session = session(&tmp);
    let fetcher = ScriptedFetcher::new(vec!["x"]);

    session
        .store()
        .write_bucket(
            &key(),
            &AsOfBucket::new("2025-10-28"),
            Bytes::from_static(b"current"),
            None,
        )
        .await
        .unwrap();

    let policy = CachePolicy::ExplicitBucket {
        bucket: AsOfBucket::new("2025-10-27"),
    };
    let err = session.get(&key(), &policy, &fetcher).await.unwrap_err();
    assert!(matches!(err, CacheError::OrderViolation { .. }), "{err:?}");
}

#[tokio::test]
async fn unreadable_bucket_surfaces_corruption_not_a_miss() {
    let tmp = TempDir::new().unwrap();
    let session = session(&tmp);
    let fetcher = ScriptedFetcher::new(vec!["replacement"]);
    let bucket = AsOfBucket::new("2025-10-28");

    session
        .store()
        .write_bucket(&key(), &bucket, Bytes::from_static(b"snapshot"), None)
        .await
        .unwrap();
    tokio::fs::remove_file(
        session
            .store()
            .bucket_path(&key(), &bucket)
            .join("payload.bin"),
    )
    .await
    .unwrap();

    let policy = CachePolicy::ExplicitBucket { bucket };
    let err = session.get(&key(), &policy, &fetcher).await.unwrap_err();
    assert!(matches!(err, CacheError::Corruption { .. }), "{err:?}");
    assert_eq!(fetcher.calls(), 0, "corruption must never degrade to a refetch");
}
