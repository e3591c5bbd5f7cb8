//! Snapshot adapter: provider-specific metadata endpoints.
//!
//! Each supported provider publishes a small JSON document describing its
//! latest snapshot. The provider name on the record picks the endpoint and
//! the parser; records naming any other provider are nulled without a call.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::*;
use crate::registry::Snapshot;

/// Upstream locations, overridable from config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotUpstreams {
    /// Directory holding itrocket's `.current_state.json` and the archives.
    pub itrocket_base: String,
    /// Mandragora's snapshot info document.
    pub mandragora_info: String,
}

impl Default for SnapshotUpstreams {
    fn default() -> Self {
        Self {
            itrocket_base: "https://server-5.itrocket.net/mainnet/namada".to_string(),
            mandragora_info: "https://snapshots2.mandragora.io/namada-full/info.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotProvider {
    Itrocket,
    Mandragora,
}

/// Status lifted from a provider's metadata document.
#[derive(Debug, PartialEq)]
struct SnapshotStatus {
    /// Replacement download URL, when the provider names its archive.
    url: Option<String>,
    height: Option<u64>,
    timestamp: Option<i64>,
    size: Option<u64>,
}

impl SnapshotProvider {
    /// Provider names are matched exactly as they appear in the registry.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "itrocket" => Some(SnapshotProvider::Itrocket),
            "Mandragora" => Some(SnapshotProvider::Mandragora),
            _ => None,
        }
    }

    fn metadata_url(self, upstreams: &SnapshotUpstreams) -> String {
        match self {
            SnapshotProvider::Itrocket => endpoint(&upstreams.itrocket_base, "/.current_state.json"),
            SnapshotProvider::Mandragora => upstreams.mandragora_info.clone(),
        }
    }

    fn parse(self, body: &Value, upstreams: &SnapshotUpstreams) -> Result<SnapshotStatus, ProbeError> {
        match self {
            SnapshotProvider::Itrocket => {
                let url = body["snapshot_name"]
                    .as_str()
                    .filter(|name| !name.is_empty())
                    .map(|name| format!("{}/{}", upstreams.itrocket_base.trim_end_matches('/'), name));
                let timestamp = body["snapshot_block_time"]
                    .as_str()
                    .map(parse_iso8601)
                    .transpose()?;

                Ok(SnapshotStatus {
                    url,
                    height: parse_u64(&body["snapshot_height"]),
                    timestamp,
                    size: parse_u64(&body["snapshot_size"]),
                })
            }
            SnapshotProvider::Mandragora => {
                let timestamp = body["snapshot_taken_at"]
                    .as_str()
                    .map(parse_zulu)
                    .transpose()?;

                Ok(SnapshotStatus {
                    url: None,
                    height: parse_u64(&body["snapshot_height"]),
                    timestamp,
                    size: parse_u64(&body["data_size"]),
                })
            }
        }
    }
}

/// ISO-8601 with an offset or trailing `Z`; times without an offset are UTC.
fn parse_iso8601(value: &str) -> Result<i64, ProbeError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.timestamp())
        .or_else(|e| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|dt| dt.and_utc().timestamp())
                .map_err(|_| e)
        })
        .map_err(|source| ProbeError::Timestamp {
            value: value.to_string(),
            source,
        })
}

/// `2024-05-01T12:00:00.123456Z`, always UTC.
fn parse_zulu(value: &str) -> Result<i64, ProbeError> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.fZ")
        .map(|dt| dt.and_utc().timestamp())
        .map_err(|source| ProbeError::Timestamp {
            value: value.to_string(),
            source,
        })
}

pub struct SnapshotAdapter {
    upstreams: SnapshotUpstreams,
}

impl SnapshotAdapter {
    pub fn new(upstreams: SnapshotUpstreams) -> Self {
        Self { upstreams }
    }

    async fn probe(&self, provider: SnapshotProvider, fetcher: &dyn Fetcher) -> Result<SnapshotStatus, ProbeError> {
        let body = fetcher.fetch(&provider.metadata_url(&self.upstreams)).await?;
        provider.parse(&body, &self.upstreams)
    }
}

fn cleared(record: &Snapshot) -> Snapshot {
    Snapshot {
        height: None,
        timestamp: None,
        snapshot_size: None,
        ..record.clone()
    }
}

#[async_trait]
impl StatusAdapter for SnapshotAdapter {
    type Record = Snapshot;

    fn category(&self) -> Category {
        Category::Snapshots
    }

    // `now` is unused: snapshot records carry the provider's own timestamp.
    async fn refresh(&self, record: &Snapshot, fetcher: &dyn Fetcher, _now: i64) -> Snapshot {
        let Some(provider) = SnapshotProvider::from_name(&record.provider) else {
            warn!(provider = %record.provider, "Snapshot provider not supported");
            return cleared(record);
        };

        match self.probe(provider, fetcher).await {
            Ok(status) => {
                info!(provider = %record.provider, height = ?status.height, "Snapshot metadata refreshed");
                Snapshot {
                    url: status.url.unwrap_or_else(|| record.url.clone()),
                    height: status.height,
                    timestamp: status.timestamp,
                    snapshot_size: status.size,
                    ..record.clone()
                }
            }
            Err(e) => {
                warn!(provider = %record.provider, "Snapshot metadata unavailable: {}", e);
                cleared(record)
            }
        }
    }

    fn is_reachable(record: &Snapshot) -> bool {
        record.height.is_some()
    }
}
