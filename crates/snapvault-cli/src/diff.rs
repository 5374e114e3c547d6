//! Structural diff between two cached artifacts.
//!
//! JSON payloads are flattened to dotted leaf paths and compared as sets:
//! paths only in the candidate are `added`, paths only in the baseline are
//! `removed`, paths in both with different values are `changed`. Non-JSON
//! payloads fall back to a byte-level identical/different verdict.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use snapvault_core::Artifact;

/// One side of a diff.
#[derive(Debug, Clone, Serialize)]
pub struct BucketSummary {
    pub bucket: String,
    pub created_at: DateTime<Utc>,
    pub content_length: u64,
}

impl BucketSummary {
    fn of(artifact: &Artifact) -> Self {
        Self {
            bucket: artifact.bucket.to_string(),
            created_at: artifact.meta.created_at,
            content_length: artifact.meta.content_length,
        }
    }
}

/// Path-level differences between two JSON payloads.
#[derive(Debug, Clone, Serialize)]
pub struct DiffSet {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
}

impl DiffSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Diff report between a baseline and a candidate bucket of one key.
#[derive(Debug, Clone, Serialize)]
pub struct DiffReport {
    pub key: String,
    pub baseline: BucketSummary,
    pub candidate: BucketSummary,
    /// Present when both payloads parsed as JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paths: Option<DiffSet>,
    pub payload_identical: bool,
}

impl DiffReport {
    /// True when the two artifacts carry the same content.
    pub fn is_empty(&self) -> bool {
        match &self.paths {
            Some(paths) => paths.is_empty(),
            None => self.payload_identical,
        }
    }
}

/// Compute the structural difference between two artifacts of one key.
pub fn diff_artifacts(baseline: &Artifact, candidate: &Artifact) -> DiffReport {
    let payload_identical = baseline.payload == candidate.payload;

    let paths = match (baseline.json(), candidate.json()) {
        (Some(a), Some(b)) => {
            let mut base_leaves = BTreeMap::new();
            let mut cand_leaves = BTreeMap::new();
            flatten(&a, String::new(), &mut base_leaves);
            flatten(&b, String::new(), &mut cand_leaves);

            let added = cand_leaves
                .keys()
                .filter(|k| !base_leaves.contains_key(*k))
                .cloned()
                .collect();
            let removed = base_leaves
                .keys()
                .filter(|k| !cand_leaves.contains_key(*k))
                .cloned()
                .collect();
            let changed = base_leaves
                .iter()
                .filter(|(k, v)| cand_leaves.get(*k).is_some_and(|other| other != *v))
                .map(|(k, _)| k.clone())
                .collect();

            Some(DiffSet {
                added,
                removed,
                changed,
            })
        }
        _ => None,
    };

    DiffReport {
        key: baseline.key.to_string(),
        baseline: BucketSummary::of(baseline),
        candidate: BucketSummary::of(candidate),
        paths,
        payload_identical,
    }
}

/// Collect leaf paths: objects recurse by key, arrays by index.
fn flatten(value: &Value, prefix: String, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let path = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                flatten(v, path, out);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                let path = if prefix.is_empty() {
                    i.to_string()
                } else {
                    format!("{prefix}.{i}")
                };
                flatten(v, path, out);
            }
        }
        leaf => {
            out.insert(prefix, leaf.clone());
        }
    }
}
