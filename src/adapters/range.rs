//! Range indexer adapter: `/v4/status`.

use async_trait::async_trait;
use tracing::{info, warn};

use super::*;
use crate::registry::RangeIndexerEndpoint;

#[derive(Debug, Default)]
pub struct RangeIndexerAdapter;

struct RangeStatus {
    oldest: Option<u64>,
    latest: u64,
    chain_id: Option<String>,
}

impl RangeIndexerAdapter {
    async fn probe(&self, url: &str, fetcher: &dyn Fetcher) -> Result<RangeStatus, ProbeError> {
        let body = fetcher.fetch(&endpoint(url, "/v4/status")).await?;
        Ok(RangeStatus {
            oldest: height_at(&body, "/oldestBlock"),
            latest: required_height(&body, "/latestBlock")?,
            chain_id: string_at(&body, "/chainId"),
        })
    }
}

#[async_trait]
impl StatusAdapter for RangeIndexerAdapter {
    type Record = RangeIndexerEndpoint;

    fn category(&self) -> Category {
        Category::RangeIndexers
    }

    async fn refresh(&self, record: &RangeIndexerEndpoint, fetcher: &dyn Fetcher, now: i64) -> RangeIndexerEndpoint {
        let mut next = record.clone();
        next.last_check = Some(now);

        match self.probe(&record.url, fetcher).await {
            Ok(status) => {
                info!(url = %record.url, oldest = ?status.oldest, latest = status.latest, "Range indexer reachable");
                next.earliest_block_height = status.oldest;
                next.latest_block_height = Some(status.latest);
                next.network = status.chain_id;
                next.active = Some(true);
            }
            Err(e) => {
                warn!(url = %record.url, "Range indexer unreachable: {}", e);
                next.earliest_block_height = None;
                next.latest_block_height = None;
                next.network = None;
                next.active = Some(false);
            }
        }

        next
    }

    fn is_reachable(record: &RangeIndexerEndpoint) -> bool {
        record.active == Some(true)
    }
}
