use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;
use tracing::debug;

use snapvault_core::{
    AsOfBucket, BucketStore, CacheError, CacheResult, FsBucketStore, Session, SnapshotKey,
    VaultConfig,
};
use snapvault_fetch::HttpFetcher;

use crate::args::{Cli, Command, DiffArgs, FetchArgs, KeyArgs, ListArgs, ShowArgs};
use crate::diff::diff_artifacts;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let outcome = match cli.cmd {
        Command::List(args) => run_list(args).await,
        Command::Show(args) => run_show(args).await,
        Command::Fetch(args) => run_fetch(args).await,
        Command::Diff(args) => run_diff(args).await,
    };

    match outcome {
        Ok(code) => Ok(code),
        Err(e) => {
            eprintln!("error: {e}");
            Ok(e.exit_code())
        }
    }
}

fn resolve_root(root: Option<PathBuf>) -> CacheResult<PathBuf> {
    match root {
        Some(root) => Ok(root),
        None => FsBucketStore::default_root(),
    }
}

fn key_of(args: &KeyArgs) -> SnapshotKey {
    SnapshotKey::new(&args.source, &args.resource, &args.tag)
}

async fn run_list(args: ListArgs) -> CacheResult<i32> {
    let store = FsBucketStore::new(resolve_root(args.key.root.clone())?);
    let key = key_of(&args.key);

    for bucket in store.list_buckets(&key).await? {
        println!("{bucket}");
    }
    Ok(0)
}

async fn run_show(args: ShowArgs) -> CacheResult<i32> {
    let store = FsBucketStore::new(resolve_root(args.key.root.clone())?);
    let key = key_of(&args.key);

    let artifact = match &args.bucket {
        Some(label) => store.read_bucket(&key, &AsOfBucket::new(label.clone())).await?,
        None => store.read_latest(&key).await?,
    };

    if args.meta {
        let meta = serde_json::to_string_pretty(&artifact.meta).map_err(|e| CacheError::Io {
            message: format!("rendering metadata: {e}"),
        })?;
        println!("{meta}");
    } else {
        // Payloads are raw bytes; write them through untouched.
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(&artifact.payload)
            .and_then(|()| stdout.flush())
            .map_err(|e| CacheError::Io {
                message: format!("writing payload to stdout: {e}"),
            })?;
    }
    Ok(0)
}

async fn run_fetch(args: FetchArgs) -> CacheResult<i32> {
    let config = VaultConfig::load(&args.config).await?;
    let spec = config.source(&args.source)?;

    let key = spec.policy.key_for(&args.source, &args.resource);
    let policy = spec.policy.resolve(Utc::now())?;
    debug!(key = %key, ?policy, "resolved source policy");

    let fetcher = HttpFetcher::new(spec.url.clone()).map_err(|e| CacheError::Config {
        message: format!("building fetcher for '{}': {e}", args.source),
    })?;

    let session = Session::new(FsBucketStore::new(&config.root));
    let (artifact, was_hit) = session.get(&key, &policy, &fetcher).await?;

    println!(
        "{} {} bucket={} bytes={}",
        if was_hit { "hit " } else { "miss" },
        key,
        artifact.bucket,
        artifact.meta.content_length
    );
    Ok(0)
}

async fn run_diff(args: DiffArgs) -> CacheResult<i32> {
    let store = FsBucketStore::new(resolve_root(args.key.root.clone())?);
    let key = key_of(&args.key);

    let baseline = store.read_bucket(&key, &AsOfBucket::new(args.from.clone())).await?;
    let candidate = store.read_bucket(&key, &AsOfBucket::new(args.to.clone())).await?;
    let report = diff_artifacts(&baseline, &candidate);

    if args.json {
        let rendered = serde_json::to_string_pretty(&report).map_err(|e| CacheError::Io {
            message: format!("rendering report: {e}"),
        })?;
        println!("{rendered}");
    } else {
        println!("{} {} -> {}", report.key, args.from, args.to);
        match &report.paths {
            Some(paths) => {
                for p in &paths.added {
                    println!("  + {p}");
                }
                for p in &paths.removed {
                    println!("  - {p}");
                }
                for p in &paths.changed {
                    println!("  ~ {p}");
                }
                if paths.is_empty() {
                    println!("  no structural differences");
                }
            }
            None => {
                println!(
                    "  non-JSON payloads: {}",
                    if report.payload_identical {
                        "byte-identical"
                    } else {
                        "differ"
                    }
                );
            }
        }
    }

    // Like a textual diff tool: nonzero when the buckets differ.
    Ok(if report.is_empty() { 0 } else { 1 })
}
