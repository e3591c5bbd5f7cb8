//! Indexer adapter: latest block, then chain parameters.
//!
//! The two calls are treated as one probe: the indexer is only reported
//! active when both answer.

use async_trait::async_trait;
use tracing::{info, warn};

use super::*;
use crate::registry::IndexerEndpoint;

#[derive(Debug, Default)]
pub struct IndexerAdapter;

impl IndexerAdapter {
    async fn probe(&self, url: &str, fetcher: &dyn Fetcher) -> Result<(u64, Option<String>), ProbeError> {
        let latest = fetcher.fetch(&endpoint(url, "/api/v1/chain/block/latest")).await?;
        let height = required_height(&latest, "/block")?;

        let params = fetcher.fetch(&endpoint(url, "/api/v1/chain/parameters")).await?;
        let network = string_at(&params, "/chainId");

        Ok((height, network))
    }
}

#[async_trait]
impl StatusAdapter for IndexerAdapter {
    type Record = IndexerEndpoint;

    fn category(&self) -> Category {
        Category::Indexers
    }

    async fn refresh(&self, record: &IndexerEndpoint, fetcher: &dyn Fetcher, now: i64) -> IndexerEndpoint {
        let mut next = record.clone();
        next.last_check = Some(now);

        match self.probe(&record.url, fetcher).await {
            Ok((height, network)) => {
                info!(url = %record.url, height, "Indexer reachable");
                next.latest_block_height = Some(height);
                next.network = network;
                next.active = Some(true);
            }
            Err(e) => {
                warn!(url = %record.url, "Indexer unreachable: {}", e);
                next.latest_block_height = None;
                next.network = None;
                next.active = Some(false);
            }
        }

        next
    }

    fn is_reachable(record: &IndexerEndpoint) -> bool {
        record.active == Some(true)
    }
}
