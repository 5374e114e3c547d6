use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "snapvault",
    version,
    about = "Inspect and drive the snapvault snapshot cache — immutable, time-bucketed raw data snapshots"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List buckets for a key, ascending by label
    List(ListArgs),
    /// Print an artifact's payload or metadata
    Show(ShowArgs),
    /// Fetch a configured source through the cache
    Fetch(FetchArgs),
    /// Structural diff between two buckets of one key
    Diff(DiffArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct KeyArgs {
    /// Source name (e.g. justetf)
    pub source: String,

    /// Resource identifier within the source (e.g. an ISIN)
    pub resource: String,

    /// Cache tag disambiguating separately cached fetches
    #[arg(long, default_value = "")]
    pub tag: String,

    /// Store root (default: platform data dir)
    #[arg(long, env = "SNAPVAULT_ROOT")]
    pub root: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ListArgs {
    #[command(flatten)]
    pub key: KeyArgs,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ShowArgs {
    #[command(flatten)]
    pub key: KeyArgs,

    /// Bucket label (default: latest)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Print the metadata sidecar instead of the payload
    #[arg(long)]
    pub meta: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct FetchArgs {
    /// Configured source name
    pub source: String,

    /// Resource identifier to fetch
    pub resource: String,

    /// Per-source policy configuration (YAML)
    #[arg(long, env = "SNAPVAULT_CONFIG")]
    pub config: PathBuf,
}

#[derive(clap::Args, Debug, Clone)]
pub struct DiffArgs {
    #[command(flatten)]
    pub key: KeyArgs,

    /// Baseline bucket label
    #[arg(long)]
    pub from: String,

    /// Candidate bucket label
    #[arg(long)]
    pub to: String,

    /// Emit the report as JSON
    #[arg(long)]
    pub json: bool,
}
