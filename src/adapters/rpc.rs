//! RPC adapter: Tendermint `/status`.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use super::*;
use crate::registry::{parse_flag, RpcEndpoint};

#[derive(Debug, Default)]
pub struct RpcAdapter;

/// Fields lifted from a `/status` body.
#[derive(Debug, PartialEq)]
struct NodeStatus {
    earliest_block_height: Option<u64>,
    latest_block_height: u64,
    catching_up: bool,
    network: Option<String>,
    tx_index: Option<bool>,
}

impl NodeStatus {
    fn parse(body: &Value) -> Result<Self, ProbeError> {
        // Nodes answer with a JSON-RPC envelope; some proxies strip it.
        let status = body.get("result").unwrap_or(body);

        Ok(Self {
            earliest_block_height: height_at(status, "/sync_info/earliest_block_height"),
            latest_block_height: required_height(status, "/sync_info/latest_block_height")?,
            catching_up: status
                .pointer("/sync_info/catching_up")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            network: string_at(status, "/node_info/network"),
            tx_index: status.pointer("/node_info/other/tx_index").and_then(parse_flag),
        })
    }
}

impl RpcAdapter {
    async fn probe(&self, url: &str, fetcher: &dyn Fetcher) -> Result<NodeStatus, ProbeError> {
        let body = fetcher.fetch(&endpoint(url, "/status")).await?;
        NodeStatus::parse(&body)
    }
}

#[async_trait]
impl StatusAdapter for RpcAdapter {
    type Record = RpcEndpoint;

    fn category(&self) -> Category {
        Category::Rpc
    }

    async fn refresh(&self, record: &RpcEndpoint, fetcher: &dyn Fetcher, now: i64) -> RpcEndpoint {
        let mut next = record.clone();
        next.last_check = Some(now);

        match self.probe(&record.url, fetcher).await {
            Ok(status) => {
                info!(url = %record.url, height = status.latest_block_height, "RPC reachable");
                next.earliest_block_height = status.earliest_block_height;
                next.latest_block_height = Some(status.latest_block_height);
                next.indexer = status.tx_index;
                next.network = status.network;
                next.catchup = Some(status.catching_up);
                next.active = Some(true);
            }
            Err(e) => {
                warn!(url = %record.url, "RPC unreachable: {}", e);
                next.earliest_block_height = None;
                next.latest_block_height = None;
                next.indexer = None;
                next.network = None;
                next.catchup = None;
                next.active = Some(false);
            }
        }

        next
    }

    fn is_reachable(record: &RpcEndpoint) -> bool {
        record.active == Some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::fake::ScriptedFetcher;
    use crate::fetcher::HttpFetcher;
    use serde_json::{json, Map};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NOW: i64 = 1_717_000_000;

    fn record(url: &str) -> RpcEndpoint {
        RpcEndpoint {
            url: url.to_string(),
            provider: Some("Alpha".into()),
            earliest_block_height: Some(1),
            latest_block_height: Some(50),
            indexer: Some(true),
            network: Some("old-net".into()),
            catchup: Some(true),
            active: None,
            last_check: Some(1),
            extra: Map::new(),
        }
    }

    fn status_body() -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": -1,
            "result": {
                "node_info": {
                    "network": "namada.5f5de2dd1b88cba30586420",
                    "other": {"tx_index": "on"}
                },
                "sync_info": {
                    "earliest_block_height": "1",
                    "latest_block_height": "100",
                    "catching_up": false
                }
            }
        })
    }

    #[tokio::test]
    async fn test_success_populates_status() {
        let fetcher = ScriptedFetcher::new().with_body("https://rpc1.example/status", status_body());
        let out = RpcAdapter.refresh(&record("https://rpc1.example/"), &fetcher, NOW).await;

        assert_eq!(out.latest_block_height, Some(100));
        assert_eq!(out.earliest_block_height, Some(1));
        assert_eq!(out.catchup, Some(false));
        assert_eq!(out.indexer, Some(true));
        assert_eq!(out.network.as_deref(), Some("namada.5f5de2dd1b88cba30586420"));
        assert_eq!(out.active, Some(true));
        assert_eq!(out.last_check, Some(NOW));
        assert_eq!(out.provider.as_deref(), Some("Alpha"));
        assert_eq!(fetcher.calls(), vec!["https://rpc1.example/status".to_string()]);
    }

    #[tokio::test]
    async fn test_minimal_status_is_enough() {
        let body = json!({"result": {"sync_info": {"latest_block_height": 100, "catching_up": false}}});
        let fetcher = ScriptedFetcher::new().with_body("https://rpc1.example/status", body);
        let out = RpcAdapter.refresh(&record("https://rpc1.example/"), &fetcher, NOW).await;

        assert_eq!(out.latest_block_height, Some(100));
        assert_eq!(out.catchup, Some(false));
        assert_eq!(out.active, Some(true));
        assert_eq!(out.network, None);
    }

    #[tokio::test]
    async fn test_missing_height_is_failure() {
        let body = json!({"result": {"node_info": {"network": "x"}}});
        let fetcher = ScriptedFetcher::new().with_body("https://rpc1.example/status", body);
        let out = RpcAdapter.refresh(&record("https://rpc1.example"), &fetcher, NOW).await;

        assert_eq!(out.active, Some(false));
        assert_eq!(out.network, None);
        assert_eq!(out.latest_block_height, None);
    }

    #[tokio::test]
    async fn test_failure_nulls_every_status_field() {
        let fetcher = ScriptedFetcher::new().with_status("https://rpc1.example/status", 502);
        let before = record("https://rpc1.example");
        let out = RpcAdapter.refresh(&before, &fetcher, NOW).await;

        assert_eq!(out.earliest_block_height, None);
        assert_eq!(out.latest_block_height, None);
        assert_eq!(out.indexer, None);
        assert_eq!(out.network, None);
        assert_eq!(out.catchup, None);
        assert_eq!(out.active, Some(false));
        assert_eq!(out.last_check, Some(NOW));
        // Input untouched
        assert_eq!(before.latest_block_height, Some(50));
    }

    #[tokio::test]
    async fn test_timeout_against_live_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(status_body())
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(Duration::from_millis(50)).unwrap();
        let out = RpcAdapter.refresh(&record(&format!("{}/", server.uri())), &fetcher, NOW).await;

        assert_eq!(out.latest_block_height, None);
        assert_eq!(out.active, Some(false));
        assert_eq!(out.last_check, Some(NOW));
    }
}
