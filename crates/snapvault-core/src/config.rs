//! Per-source policy configuration.
//!
//! Configuration is an explicit value handed to the session and tooling,
//! never ambient global state; concurrent sessions with different policies
//! can coexist in one process.
//!
//! ```yaml
//! root: /var/lib/snapvault
//! sources:
//!   justetf:
//!     url: "https://www.justetf.com/api/etfs/{resource}"
//!     mode: ttl
//!     ttl_seconds: 86400
//!   fca_firds:
//!     url: "https://api.data.fca.org.uk/fca_data_firds_files?q={resource}"
//!     mode: explicit_bucket
//!     as_of_bucket: "%Y-%m-%d"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bucket::AsOfBucket;
use crate::error::{CacheError, CacheResult};
use crate::key::SnapshotKey;
use crate::policy::CachePolicy;

/// Configured cache mode for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    Bypass,
    Ttl,
    EternalFrozen,
    ExplicitBucket,
}

impl FromStr for CacheMode {
    type Err = CacheError;

    /// Case-insensitive parse, matching how modes are written in config.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bypass" => Ok(Self::Bypass),
            "ttl" => Ok(Self::Ttl),
            "eternal_frozen" => Ok(Self::EternalFrozen),
            "explicit_bucket" => Ok(Self::ExplicitBucket),
            other => Err(CacheError::Config {
                message: format!("unknown cache mode '{other}'"),
            }),
        }
    }
}

/// Declarative caching policy for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePolicy {
    pub mode: CacheMode,

    /// Required iff `mode` is `ttl`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,

    /// Optional disambiguator folded into the cache key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_tag: Option<String>,

    /// Bucket spec for `explicit_bucket` mode: a UTC format string
    /// (`"%Y-%m-%d"`), a literal label (`"2025Q4"`), or absent for today's
    /// ISO date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of_bucket: Option<String>,
}

impl SourcePolicy {
    /// Validate the declaration and resolve it to a concrete policy.
    pub fn resolve(&self, now: DateTime<Utc>) -> CacheResult<CachePolicy> {
        match self.mode {
            CacheMode::Bypass => Ok(CachePolicy::Bypass),
            CacheMode::Ttl => {
                let ttl_seconds = self.ttl_seconds.ok_or_else(|| CacheError::Config {
                    message: "ttl_seconds is required when mode is ttl".to_string(),
                })?;
                Ok(CachePolicy::Ttl { ttl_seconds })
            }
            CacheMode::EternalFrozen => Ok(CachePolicy::EternalFrozen),
            CacheMode::ExplicitBucket => {
                let spec = self.as_of_bucket.as_deref().unwrap_or("%Y-%m-%d");
                Ok(CachePolicy::ExplicitBucket {
                    bucket: AsOfBucket::resolve_spec(Some(spec), now),
                })
            }
        }
    }

    /// Build the cache key for a resource under this policy's tag.
    pub fn key_for(&self, source: &str, resource: &str) -> SnapshotKey {
        SnapshotKey::new(source, resource, self.cache_tag.clone().unwrap_or_default())
    }
}

/// One configured source: where to fetch from plus how to cache it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// URL template; `{resource}` is replaced with the resource identifier.
    pub url: String,

    #[serde(flatten)]
    pub policy: SourcePolicy,
}

/// Top-level configuration: store root plus per-source declarations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Bucket store root directory.
    pub root: PathBuf,

    #[serde(default)]
    pub sources: BTreeMap<String, SourceSpec>,
}

impl VaultConfig {
    /// Parse a YAML document.
    pub fn from_yaml(text: &str) -> CacheResult<Self> {
        serde_yaml::from_str(text).map_err(|e| CacheError::Config {
            message: format!("invalid config: {e}"),
        })
    }

    /// Load and parse a YAML config file.
    pub async fn load(path: &Path) -> CacheResult<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CacheError::Config {
                message: format!("cannot read {}: {e}", path.display()),
            })?;
        Self::from_yaml(&text)
    }

    /// Look up a configured source by name.
    pub fn source(&self, name: &str) -> CacheResult<&SourceSpec> {
        self.sources.get(name).ok_or_else(|| CacheError::Config {
            message: format!("source '{name}' is not configured"),
        })
    }
}
