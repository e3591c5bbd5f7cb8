//! infrawatch: Namada infrastructure watcher.
//!
//! `sync` refreshes the infrastructure registry in one pass:
//! - merges endpoints listed in the community registry
//! - probes every RPC, indexer, MASP indexer and range indexer
//! - refreshes snapshot metadata from the supported providers
//! - replaces the registry document atomically
//!
//! `assets` flattens a chain-registry checkout into an asset summary.
//!
//! Only an unreadable or unwritable registry makes the process exit
//! non-zero; unreachable endpoints are recorded, not reported as errors.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

mod adapters;
mod assets;
mod config;
mod fetcher;
mod registry;
mod sync;

use config::SyncConfig;
use fetcher::HttpFetcher;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh endpoint status and merge community endpoints.
    Sync(SyncArgs),
    /// Flatten chain asset lists into a single summary file.
    Assets(AssetsArgs),
}

#[derive(Args, Debug)]
struct SyncArgs {
    /// YAML config file; flags below take precedence over it.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Infrastructure registry document.
    #[arg(long)]
    registry: Option<PathBuf>,
    /// Root of the community registry checkout.
    #[arg(long)]
    external_dir: Option<PathBuf>,
    /// Per-request timeout in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Concurrent probes per category (1 = sequential).
    #[arg(long)]
    concurrency: Option<usize>,
}

impl SyncArgs {
    fn resolve(self) -> Result<SyncConfig> {
        let mut config = match &self.config {
            Some(path) => SyncConfig::from_file(path)?,
            None => SyncConfig::default(),
        };
        if let Some(registry) = self.registry {
            config.registry = registry;
        }
        if let Some(external_dir) = self.external_dir {
            config.external_dir = external_dir;
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.timeout_secs = timeout_secs;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        Ok(config)
    }
}

#[derive(Args, Debug)]
struct AssetsArgs {
    /// Chain-registry checkout to walk.
    #[arg(long, default_value = "./chain-registry")]
    root: PathBuf,
    #[arg(long, default_value = "assets_summary.json")]
    output: PathBuf,
    /// JSON object mapping asset symbols to logo URIs.
    #[arg(long)]
    logos: Option<PathBuf>,
    /// JSON array of curated per-asset overrides.
    #[arg(long)]
    overrides: Option<PathBuf>,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "infrawatch=info".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    info!("🛰  infrawatch v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Sync(args) => run_sync(args).await,
        Command::Assets(args) => run_assets(args),
    }
}

async fn run_sync(args: SyncArgs) -> Result<()> {
    let config = args.resolve()?;
    info!(
        registry = %config.registry.display(),
        external_dir = %config.external_dir.display(),
        timeout_secs = config.timeout().as_secs(),
        concurrency = config.concurrency(),
        "Starting sync pass"
    );

    let fetcher = Arc::new(HttpFetcher::new(config.timeout())?);
    let now = chrono::Utc::now().timestamp();

    let summary = sync::driver::run_pass(&config, fetcher, now)
        .await
        .context("Sync pass failed")?;
    if summary.total() > 0 && summary.reachable() == 0 {
        warn!("No endpoint answered — check outbound connectivity");
    }
    Ok(())
}

fn run_assets(args: AssetsArgs) -> Result<()> {
    let mut summaries = assets::flatten(&args.root);

    if let Some(path) = &args.logos {
        let logos = assets::LogoIndex::load(path)?;
        let filled = logos.apply(&mut summaries);
        info!(filled, "Logo data applied");
    }
    if let Some(path) = &args.overrides {
        let overrides = assets::load_overrides(path)?;
        let patched = assets::apply_overrides(&mut summaries, &overrides);
        info!(overrides = overrides.len(), patched, "Overrides applied");
    }

    assets::write_summary(&args.output, &summaries)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("infrawatch.yaml");
        std::fs::write(&path, "registry: from-file.json\ntimeout_secs: 30\n").unwrap();

        let cli = Cli::parse_from([
            "infrawatch",
            "sync",
            "--config",
            path.to_str().unwrap(),
            "--timeout-secs",
            "5",
        ]);
        let Command::Sync(args) = cli.command else {
            panic!("expected sync command");
        };

        let config = args.resolve().unwrap();
        assert_eq!(config.registry, PathBuf::from("from-file.json"));
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.concurrency, 4);
    }

    #[test]
    fn test_assets_defaults() {
        let cli = Cli::parse_from(["infrawatch", "--json-logs", "assets"]);
        assert!(cli.json_logs);
        let Command::Assets(args) = cli.command else {
            panic!("expected assets command");
        };
        assert_eq!(args.root, PathBuf::from("./chain-registry"));
        assert_eq!(args.output, PathBuf::from("assets_summary.json"));
        assert!(args.logos.is_none());
    }
}
