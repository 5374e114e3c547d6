//! Cache key model.
//!
//! A [`SnapshotKey`] names a *lineage* of snapshots, not a single artifact:
//! every bucket ever written for the same (source, resource, tag) triple
//! lives under the same key.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Stable identity for a lineage of cached snapshots.
///
/// Equality and hashing are structural: two keys built from identical
/// arguments compare equal and hash identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotKey {
    /// Name of the upstream source (e.g. `justetf`).
    pub source: String,

    /// Logical resource identifier within the source (e.g. an ISIN).
    pub resource: String,

    /// Optional disambiguator for otherwise-identical resource fetches
    /// that must be cached separately. Empty when unused.
    #[serde(default)]
    pub tag: String,
}

impl SnapshotKey {
    /// Build a key from source, resource, and tag.
    pub fn new(
        source: impl Into<String>,
        resource: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            resource: resource.into(),
            tag: tag.into(),
        }
    }

    /// Build a key with an empty tag.
    pub fn untagged(source: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::new(source, resource, "")
    }

    /// Relative directory this key maps to inside a store root.
    ///
    /// The tag is folded into the resource segment (`resource#tag`) so that
    /// tagged and untagged lineages never collide.
    pub fn rel_dir(&self) -> PathBuf {
        let resource_seg = if self.tag.is_empty() {
            sanitize_component(&self.resource)
        } else {
            format!(
                "{}#{}",
                sanitize_component(&self.resource),
                sanitize_component(&self.tag)
            )
        };
        PathBuf::from(sanitize_component(&self.source)).join(resource_seg)
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tag.is_empty() {
            write!(f, "{}/{}", self.source, self.resource)
        } else {
            write!(f, "{}/{}#{}", self.source, self.resource, self.tag)
        }
    }
}

/// Replace path separators and other filesystem-hostile characters so each
/// key component maps to exactly one directory name.
fn sanitize_component(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    // A leading dot would hide the directory from bucket listings.
    if out.starts_with('.') {
        out.replace_range(..1, "_");
    }
    out
}
