//! Merge community candidates into a registry category.
//!
//! Identity is the URL with trailing slashes stripped, compared as a
//! literal, case-sensitive string. A known endpoint only has its provider
//! refreshed; live status is never taken from the community data. An
//! unknown endpoint is appended with no status so this pass checks it.

use super::candidates::Candidate;
use super::Endpoint;

/// Outcome counts of one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub matched: usize,
    pub added: usize,
}

/// Identity key for an endpoint URL.
pub fn normalize_url(url: &str) -> &str {
    url.trim_end_matches('/')
}

/// Merge `candidates` into `entries`, returning the new category.
///
/// Existing entries keep their order; new ones are appended in candidate
/// order. A candidate repeated within one batch lands only once.
pub fn merge<E: Endpoint>(entries: &[E], candidates: &[Candidate]) -> (Vec<E>, MergeStats) {
    let mut merged = entries.to_vec();
    let mut stats = MergeStats::default();

    for candidate in candidates {
        let key = normalize_url(&candidate.url);

        match merged.iter().position(|e| normalize_url(e.url()) == key) {
            Some(idx) => {
                if let Some(provider) = &candidate.provider {
                    merged[idx].set_provider(provider.clone());
                }
                stats.matched += 1;
            }
            None => {
                tracing::info!(url = %candidate.url, "New endpoint from community registry");
                merged.push(E::from_candidate(candidate));
                stats.added += 1;
            }
        }
    }

    (merged, stats)
}
