//! Provider adapters: one per endpoint category.
//!
//! An adapter knows its category's status path(s) and response shape. It
//! takes a record, asks the fetcher for the upstream status, and returns a
//! new record. Adapters are total: every failure resolves to the record's
//! failure branch (status nulled, `active = false`), never to an error.

use async_trait::async_trait;
use serde_json::Value;

use crate::fetcher::{FetchError, Fetcher};
use crate::registry::{parse_u64, Category};

pub mod indexer;
pub mod masp;
pub mod range;
pub mod rpc;
pub mod snapshot;

/// Why a status probe failed.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("missing or malformed field `{0}`")]
    Field(&'static str),
    #[error("unparseable timestamp `{value}`: {source}")]
    Timestamp {
        value: String,
        source: chrono::ParseError,
    },
}

#[async_trait]
pub trait StatusAdapter: Send + Sync + 'static {
    type Record: Clone + Send + Sync + 'static;

    fn category(&self) -> Category;

    /// Produce the refreshed record. `now` is the pass-start Unix time.
    async fn refresh(&self, record: &Self::Record, fetcher: &dyn Fetcher, now: i64) -> Self::Record;

    /// Whether a refreshed record counts as reachable in the pass summary.
    fn is_reachable(record: &Self::Record) -> bool;
}

/// Join a base URL and an absolute path without doubling the slash.
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// Walk a JSON pointer and read a block height (number or decimal string).
pub(crate) fn height_at(body: &Value, pointer: &'static str) -> Option<u64> {
    body.pointer(pointer).and_then(parse_u64)
}

/// As [`height_at`], but the field must be present.
pub(crate) fn required_height(body: &Value, pointer: &'static str) -> Result<u64, ProbeError> {
    height_at(body, pointer).ok_or(ProbeError::Field(pointer))
}

pub(crate) fn string_at(body: &Value, pointer: &str) -> Option<String> {
    body.pointer(pointer).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        assert_eq!(endpoint("https://rpc1.example/", "/status"), "https://rpc1.example/status");
        assert_eq!(endpoint("https://rpc1.example", "/status"), "https://rpc1.example/status");
    }

    #[test]
    fn test_required_height_reports_pointer() {
        let body = json!({"sync_info": {"latest_block_height": "5"}});
        assert_eq!(required_height(&body, "/sync_info/latest_block_height").unwrap(), 5);

        let err = required_height(&body, "/sync_info/earliest_block_height").unwrap_err();
        assert!(err.to_string().contains("/sync_info/earliest_block_height"));
    }
}
