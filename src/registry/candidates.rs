//! Community registry candidates.
//!
//! The community project publishes one JSON array per category, with
//! human-oriented field names ("RPC Address", "Team or Contributor Name").
//! Each source describes where to find the file and which fields carry the
//! URL and provider name. Reading candidates never fails a pass: a missing
//! file means no candidates, a broken one is logged and skipped.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

/// An endpoint proposed by the community registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub url: String,
    pub provider: Option<String>,
}

/// Only entries whose `field` equals `equals` are eligible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFilter {
    pub field: String,
    pub equals: String,
}

/// Where one category's candidates live and how to read them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSource {
    /// File name, relative to the external registry root.
    pub file: String,
    pub url_field: String,
    #[serde(default = "default_provider_field")]
    pub provider_field: String,
    #[serde(default)]
    pub filter: Option<CandidateFilter>,
}

fn default_provider_field() -> String {
    "Team or Contributor Name".to_string()
}

impl CandidateSource {
    pub fn new(file: &str, url_field: &str) -> Self {
        Self {
            file: file.to_string(),
            url_field: url_field.to_string(),
            provider_field: default_provider_field(),
            filter: None,
        }
    }

    pub fn filtered(mut self, field: &str, equals: &str) -> Self {
        self.filter = Some(CandidateFilter {
            field: field.to_string(),
            equals: equals.to_string(),
        });
        self
    }

    /// Convert one raw entry, or `None` if it is ineligible.
    fn candidate_from(&self, entry: &Value) -> Option<Candidate> {
        if let Some(filter) = &self.filter {
            if entry[&filter.field].as_str() != Some(filter.equals.as_str()) {
                return None;
            }
        }

        let url = entry[&self.url_field].as_str()?.trim();
        if url.is_empty() {
            return None;
        }

        let provider = entry[&self.provider_field]
            .as_str()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        Some(Candidate {
            url: url.to_string(),
            provider,
        })
    }
}

/// Read the candidates for one source under `root`.
pub fn load_candidates(root: &Path, source: &CandidateSource) -> Vec<Candidate> {
    let path = root.join(&source.file);

    let content = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No candidate file — nothing to merge");
            return vec![];
        }
        Err(e) => {
            warn!(path = %path.display(), "Failed to read candidate file: {}", e);
            return vec![];
        }
    };

    let entries: Vec<Value> = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            warn!(path = %path.display(), "Candidate file is not a JSON array: {}", e);
            return vec![];
        }
    };

    let candidates: Vec<Candidate> = entries
        .iter()
        .filter_map(|entry| source.candidate_from(entry))
        .collect();

    debug!(
        path = %path.display(),
        entries = entries.len(),
        eligible = candidates.len(),
        "Candidates loaded"
    );
    candidates
}
