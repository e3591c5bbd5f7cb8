//! Infrastructure registry: the persisted JSON document of known endpoints.
//!
//! The document is loaded wholesale at the start of a pass and replaced
//! wholesale at the end. Keys we don't model (top-level or per-record)
//! are carried through untouched.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

pub mod candidates;
pub mod reconcile;

use candidates::Candidate;

// ── Categories ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Rpc,
    Indexers,
    MaspIndexers,
    RangeIndexers,
    Snapshots,
}

impl Category {
    /// The document key holding this category's records.
    pub fn key(self) -> &'static str {
        match self {
            Category::Rpc => "rpc",
            Category::Indexers => "indexers",
            Category::MaspIndexers => "masp_indexers",
            Category::RangeIndexers => "range_indexers",
            Category::Snapshots => "snapshots",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ── Records ─────────────────────────────────────────────────────────

/// Behaviour shared by every URL-keyed endpoint record.
pub trait Endpoint: Clone + Send + Sync + 'static {
    fn url(&self) -> &str;

    /// A fresh record for a newly discovered endpoint: no status yet.
    fn from_candidate(candidate: &Candidate) -> Self;

    fn set_provider(&mut self, provider: String);
}

/// A Tendermint-style RPC node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcEndpoint {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub earliest_block_height: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub latest_block_height: Option<u64>,
    /// Whether the node has transaction indexing enabled.
    #[serde(default, deserialize_with = "lenient_flag")]
    pub indexer: Option<bool>,
    pub network: Option<String>,
    pub catchup: Option<bool>,
    pub active: Option<bool>,
    pub last_check: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A chain indexer (block/latest + chain/parameters API).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexerEndpoint {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub latest_block_height: Option<u64>,
    pub network: Option<String>,
    pub active: Option<bool>,
    pub last_check: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A shielded-pool indexer, height tracking only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaspIndexerEndpoint {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub latest_block_height: Option<u64>,
    pub active: Option<bool>,
    pub last_check: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An indexer that reports the block range it covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeIndexerEndpoint {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub earliest_block_height: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub latest_block_height: Option<u64>,
    pub network: Option<String>,
    pub active: Option<bool>,
    pub last_check: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A downloadable chain-state snapshot published by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub height: Option<u64>,
    /// Unix seconds.
    pub timestamp: Option<i64>,
    /// Bytes.
    #[serde(default, deserialize_with = "lenient_u64")]
    pub snapshot_size: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

macro_rules! impl_endpoint {
    ($ty:ident { $($status:ident),* }) => {
        impl Endpoint for $ty {
            fn url(&self) -> &str {
                &self.url
            }

            fn from_candidate(candidate: &Candidate) -> Self {
                Self {
                    url: candidate.url.clone(),
                    provider: candidate.provider.clone(),
                    $($status: None,)*
                    active: None,
                    last_check: None,
                    extra: Map::new(),
                }
            }

            fn set_provider(&mut self, provider: String) {
                self.provider = Some(provider);
            }
        }
    };
}

impl_endpoint!(RpcEndpoint { earliest_block_height, latest_block_height, indexer, network, catchup });
impl_endpoint!(IndexerEndpoint { latest_block_height, network });
impl_endpoint!(MaspIndexerEndpoint { latest_block_height });
impl_endpoint!(RangeIndexerEndpoint { earliest_block_height, latest_block_height, network });

/// Read an unsigned integer that may be stored as a JSON number or as a
/// decimal string. Anything else reads as unset.
pub fn parse_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_u64))
}

/// Read a flag stored either as a JSON bool or as Tendermint's
/// `"on"`/`"off"` strings.
pub fn parse_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.as_str() {
            "on" | "true" => Some(true),
            "off" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_flag))
}

// ── Document ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub rpc: Vec<RpcEndpoint>,
    #[serde(default)]
    pub indexers: Vec<IndexerEndpoint>,
    #[serde(default)]
    pub masp_indexers: Vec<MaspIndexerEndpoint>,
    #[serde(default, alias = "undexers")]
    pub range_indexers: Vec<RangeIndexerEndpoint>,
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Registry {
    /// Load the registry. Any failure here is fatal for the pass.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read registry {}", path.display()))?;
        let registry: Registry = serde_json::from_str(&content)
            .with_context(|| format!("Registry {} is not a valid document", path.display()))?;

        tracing::info!(
            path = %path.display(),
            rpc = registry.rpc.len(),
            indexers = registry.indexers.len(),
            masp_indexers = registry.masp_indexers.len(),
            range_indexers = registry.range_indexers.len(),
            snapshots = registry.snapshots.len(),
            "Registry loaded"
        );
        Ok(registry)
    }

    /// Replace the document on disk: temp file in the same directory,
    /// fsync, then rename over the target.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = to_pretty_json(self).context("Failed to serialize registry")?;
        let tmp_path = path.with_extension("json.tmp");

        {
            let mut file = fs::File::create(&tmp_path)
                .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
            file.write_all(&content)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }

        if let Err(e) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e).with_context(|| format!("Failed to replace registry {}", path.display()));
        }

        tracing::info!(path = %path.display(), "Registry saved");
        Ok(())
    }
}

/// Serialize with 4-space indentation, the layout the registry is kept in.
pub fn to_pretty_json<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "rpc": [{
                "url": "https://rpc1.example/",
                "provider": "Alpha",
                "earliest_block_height": "1",
                "latest_block_height": 100,
                "indexer": "on",
                "network": "namada.5f5de2dd1b88cba30586420",
                "catchup": false,
                "active": true,
                "last_check": 1700000000,
                "notes": "kept"
            }],
            "undexers": [{"url": "https://undexer.example"}],
            "snapshots": [{"provider": "itrocket", "url": "https://x/snap.tar.lz4"}],
            "explorers": [{"url": "https://explorer.example"}]
        })
    }

    #[test]
    fn test_parse_u64_accepts_numbers_and_strings() {
        assert_eq!(parse_u64(&json!(7)), Some(7));
        assert_eq!(parse_u64(&json!("12345")), Some(12345));
        assert_eq!(parse_u64(&json!("abc")), None);
        assert_eq!(parse_u64(&json!(-1)), None);
        assert_eq!(parse_u64(&Value::Null), None);
    }

    #[test]
    fn test_unknown_keys_survive_roundtrip() {
        let registry: Registry = serde_json::from_value(json!({
            "rpc": [{"url": "https://a", "notes": "kept"}],
            "explorers": [{"url": "https://explorer.example"}]
        }))
        .unwrap();

        let out = serde_json::to_value(&registry).unwrap();
        assert_eq!(out["rpc"][0]["notes"], "kept");
        assert_eq!(out["explorers"][0]["url"], "https://explorer.example");
    }

    #[test]
    fn test_legacy_undexers_key_is_accepted() {
        let registry: Registry = serde_json::from_value(json!({
            "undexers": [{"url": "https://undexer.example"}]
        }))
        .unwrap();
        assert_eq!(registry.range_indexers.len(), 1);
        assert_eq!(registry.range_indexers[0].url, "https://undexer.example");
    }

    #[test]
    fn test_missing_status_fields_load_as_unset() {
        let registry: Registry = serde_json::from_value(json!({
            "masp_indexers": [{"url": "https://masp.example"}]
        }))
        .unwrap();
        let masp = &registry.masp_indexers[0];
        assert_eq!(masp.latest_block_height, None);
        assert_eq!(masp.active, None);
        assert_eq!(masp.provider, None);
    }

    #[test]
    fn test_unset_status_serializes_as_null() {
        let candidate = Candidate {
            url: "https://new.example".into(),
            provider: Some("New".into()),
        };
        let rpc = RpcEndpoint::from_candidate(&candidate);
        let out = serde_json::to_value(&rpc).unwrap();
        assert_eq!(out["latest_block_height"], Value::Null);
        assert_eq!(out["active"], Value::Null);
        assert_eq!(out["provider"], "New");
    }

    #[test]
    fn test_load_rejects_invalid_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("infrastructure.json");
        fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(Registry::load(&path).is_err());

        fs::write(&path, "{ not json").unwrap();
        assert!(Registry::load(&path).is_err());

        assert!(Registry::load(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_save_replaces_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("infrastructure.json");
        fs::write(&path, "{}").unwrap();

        let mut registry = Registry::default();
        registry.snapshots.push(Snapshot {
            provider: "Mandragora".into(),
            url: "https://snap.example".into(),
            height: Some(42),
            timestamp: None,
            snapshot_size: Some(1024),
            extra: Map::new(),
        });
        registry.save(&path).unwrap();

        let reloaded = Registry::load(&path).unwrap();
        assert_eq!(reloaded, registry);
        assert!(!path.with_extension("json.tmp").exists());

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\n    \"snapshots\""), "4-space indent expected");
    }

    #[test]
    fn test_save_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone").join("infrastructure.json");
        assert!(Registry::default().save(&path).is_err());
    }

    #[test]
    fn test_full_document_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("infrastructure.json");
        fs::write(&path, serde_json::to_string(&sample()).unwrap()).unwrap();

        let registry = Registry::load(&path).unwrap();
        // Heights written as strings by older tooling load as numbers.
        assert_eq!(registry.rpc[0].earliest_block_height, Some(1));
        assert_eq!(registry.rpc[0].latest_block_height, Some(100));
        assert_eq!(registry.rpc[0].indexer, Some(true));
        assert_eq!(registry.range_indexers.len(), 1);
        assert_eq!(registry.snapshots[0].provider, "itrocket");
        assert!(registry.extra.contains_key("explorers"));
    }
}
