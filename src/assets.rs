//! Asset summary: flattens a chain-registry checkout into one file.
//!
//! Every directory may carry a `chain.json` (for the chain id) and an
//! `assetlist.json`. Each asset becomes one flat summary entry. Summaries
//! can then be enriched with logo URIs from a third-party mapping and
//! patched with hand-curated overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::registry::to_pretty_json;

const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Denom {
    pub denom: String,
    pub exponent: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSummary {
    pub chain_name: String,
    pub chain_id: String,
    pub base: String,
    pub name: String,
    pub display: String,
    pub symbol: String,
    pub denoms: Vec<Denom>,
    #[serde(rename = "logo_URIs")]
    pub logo_uris: Map<String, Value>,
}

// ── Input shapes ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChainFile {
    chain_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssetListFile {
    chain_name: Option<String>,
    #[serde(default)]
    assets: Vec<RawAsset>,
}

#[derive(Debug, Deserialize)]
struct RawAsset {
    #[serde(default)]
    base: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    display: String,
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    denom_units: Vec<Denom>,
    #[serde(default, rename = "logo_URIs")]
    logo_uris: Map<String, Value>,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

// ── Flattening ──────────────────────────────────────────────────────

/// Walk `root` and collect a summary for every listed asset.
/// Directories are visited in name order so output is stable.
pub fn flatten(root: &Path) -> Vec<AssetSummary> {
    info!(root = %root.display(), "Starting directory traversal");
    let mut summaries = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping unreadable path: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        summaries.extend(flatten_dir(entry.path()));
    }

    info!(assets = summaries.len(), "Directory traversal complete");
    summaries
}

fn flatten_dir(dir: &Path) -> Vec<AssetSummary> {
    let chain_path = dir.join("chain.json");
    let asset_path = dir.join("assetlist.json");

    let mut chain_id = UNKNOWN.to_string();
    if chain_path.is_file() {
        match read_json::<ChainFile>(&chain_path) {
            Ok(chain) => chain_id = chain.chain_id.unwrap_or_else(|| UNKNOWN.to_string()),
            Err(e) => error!(path = %chain_path.display(), "Failed to process chain file: {}", e),
        }
    }

    if !asset_path.is_file() {
        return vec![];
    }

    let list = match read_json::<AssetListFile>(&asset_path) {
        Ok(list) => list,
        Err(e) => {
            error!(path = %asset_path.display(), "Failed to process asset list: {}", e);
            return vec![];
        }
    };

    let chain_name = list.chain_name.unwrap_or_else(|| UNKNOWN.to_string());
    debug!(chain = %chain_name, chain_id = %chain_id, assets = list.assets.len(), "Processing chain");

    list.assets
        .into_iter()
        .map(|asset| AssetSummary {
            chain_name: chain_name.clone(),
            chain_id: chain_id.clone(),
            base: asset.base,
            name: asset.name,
            display: asset.display,
            symbol: asset.symbol,
            denoms: asset.denom_units,
            logo_uris: asset.logo_uris,
        })
        .collect()
}

// ── Enrichment ──────────────────────────────────────────────────────

/// Logo URIs keyed by lower-cased symbol.
pub struct LogoIndex(HashMap<String, Map<String, Value>>);

impl LogoIndex {
    /// Load a `{ "SYMBOL": { "png": "...", "svg": "..." } }` mapping.
    pub fn load(path: &Path) -> Result<Self> {
        let raw: HashMap<String, Map<String, Value>> = read_json(path)
            .with_context(|| format!("Failed to load logo data {}", path.display()))?;
        Ok(Self(raw.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect()))
    }

    /// Fill in logos for assets that have none. Returns how many were filled.
    pub fn apply(&self, assets: &mut [AssetSummary]) -> usize {
        let mut filled = 0;
        for asset in assets.iter_mut().filter(|a| a.logo_uris.is_empty()) {
            if let Some(logos) = self.0.get(&asset.symbol.to_lowercase()) {
                asset.logo_uris = logos.clone();
                filled += 1;
            }
        }
        filled
    }
}

/// A curated patch for one asset, matched by chain name and base denom.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetOverride {
    pub chain_name: String,
    pub base: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

pub fn load_overrides(path: &Path) -> Result<Vec<AssetOverride>> {
    read_json(path).with_context(|| format!("Failed to load overrides {}", path.display()))
}

/// Replace fields on matching assets. An override that would produce an
/// invalid summary is skipped. Returns how many assets were patched.
pub fn apply_overrides(assets: &mut [AssetSummary], overrides: &[AssetOverride]) -> usize {
    let mut patched = 0;
    for ov in overrides {
        for asset in assets
            .iter_mut()
            .filter(|a| a.chain_name == ov.chain_name && a.base == ov.base)
        {
            match patch(asset, &ov.fields) {
                Ok(updated) => {
                    *asset = updated;
                    patched += 1;
                }
                Err(e) => warn!(chain = %ov.chain_name, base = %ov.base, "Override skipped: {}", e),
            }
        }
    }
    patched
}

fn patch(asset: &AssetSummary, fields: &Map<String, Value>) -> serde_json::Result<AssetSummary> {
    let mut value = serde_json::to_value(asset)?;
    if let Value::Object(obj) = &mut value {
        for (key, field) in fields {
            obj.insert(key.clone(), field.clone());
        }
    }
    serde_json::from_value(value)
}

/// Write the summary. Nothing is written for an empty summary.
pub fn write_summary(path: &Path, assets: &[AssetSummary]) -> Result<bool> {
    if assets.is_empty() {
        warn!("No assets were extracted — check the input files or directory structure");
        return Ok(false);
    }
    let content = to_pretty_json(&assets).context("Failed to serialize asset summary")?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), assets = assets.len(), "Asset summary saved");
    Ok(true)
}
