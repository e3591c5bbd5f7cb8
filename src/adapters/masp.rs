//! MASP indexer adapter: `/api/v1/height`.

use async_trait::async_trait;
use tracing::{info, warn};

use super::*;
use crate::registry::MaspIndexerEndpoint;

#[derive(Debug, Default)]
pub struct MaspIndexerAdapter;

impl MaspIndexerAdapter {
    async fn probe(&self, url: &str, fetcher: &dyn Fetcher) -> Result<u64, ProbeError> {
        let body = fetcher.fetch(&endpoint(url, "/api/v1/height")).await?;
        required_height(&body, "/block_height")
    }
}

#[async_trait]
impl StatusAdapter for MaspIndexerAdapter {
    type Record = MaspIndexerEndpoint;

    fn category(&self) -> Category {
        Category::MaspIndexers
    }

    async fn refresh(&self, record: &MaspIndexerEndpoint, fetcher: &dyn Fetcher, now: i64) -> MaspIndexerEndpoint {
        let mut next = record.clone();
        next.last_check = Some(now);

        match self.probe(&record.url, fetcher).await {
            Ok(height) => {
                info!(url = %record.url, height, "MASP indexer reachable");
                next.latest_block_height = Some(height);
                next.active = Some(true);
            }
            Err(e) => {
                warn!(url = %record.url, "MASP indexer unreachable: {}", e);
                next.latest_block_height = None;
                next.active = Some(false);
            }
        }

        next
    }

    fn is_reachable(record: &MaspIndexerEndpoint) -> bool {
        record.active == Some(true)
    }
}
