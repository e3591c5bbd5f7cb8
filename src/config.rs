//! Sync configuration: built-in defaults, optionally overlaid by a YAML
//! file, then by command-line flags.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::adapters::snapshot::SnapshotUpstreams;
use crate::fetcher::DEFAULT_TIMEOUT;
use crate::registry::candidates::CandidateSource;

/// Where the community registry keeps each category's candidates.
/// A category without a source is never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateSources {
    pub rpc: Option<CandidateSource>,
    pub indexers: Option<CandidateSource>,
    pub masp_indexers: Option<CandidateSource>,
    pub range_indexers: Option<CandidateSource>,
}

impl Default for CandidateSources {
    fn default() -> Self {
        Self {
            rpc: Some(CandidateSource::new("rpc.json", "RPC Address")),
            indexers: Some(
                CandidateSource::new("indexers.json", "Indexer API URL")
                    .filtered("Which Indexer", "namada-indexer"),
            ),
            masp_indexers: Some(CandidateSource::new("masp-indexers.json", "Indexer API URL")),
            range_indexers: Some(
                CandidateSource::new("indexers.json", "Indexer API URL")
                    .filtered("Which Indexer", "undexer"),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// The infrastructure registry document.
    pub registry: PathBuf,
    /// Root of the community registry checkout.
    pub external_dir: PathBuf,
    pub timeout_secs: u64,
    /// Concurrent refreshes per category; 1 is strictly sequential.
    pub concurrency: usize,
    pub sources: CandidateSources,
    pub snapshots: SnapshotUpstreams,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            registry: PathBuf::from("namada/infrastructure.json"),
            external_dir: PathBuf::from("external-repo/user-and-dev-tools/mainnet"),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            concurrency: 4,
            sources: CandidateSources::default(),
            snapshots: SnapshotUpstreams::default(),
        }
    }
}

impl SyncConfig {
    /// Load a YAML config file; keys it omits keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.concurrency(), 4);
        let range = config.sources.range_indexers.unwrap();
        assert_eq!(range.file, "indexers.json");
        assert_eq!(range.filter.unwrap().equals, "undexer");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("infrawatch.yaml");
        std::fs::write(
            &path,
            "registry: data/infra.json\nconcurrency: 0\nsources:\n  masp_indexers: null\n",
        )
        .unwrap();

        let config = SyncConfig::from_file(&path).unwrap();
        assert_eq!(config.registry, PathBuf::from("data/infra.json"));
        assert_eq!(config.concurrency(), 1, "zero is clamped to sequential");
        assert_eq!(config.timeout_secs, 10);
        assert!(config.sources.masp_indexers.is_none());
        assert!(config.sources.rpc.is_some());
        assert_eq!(config.snapshots, SnapshotUpstreams::default());
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("infrawatch.yaml");
        std::fs::write(&path, "timeout_secs: [not, a, number]\n").unwrap();
        assert!(SyncConfig::from_file(&path).is_err());
    }
}
