//! Engine settings, loadable from JSON

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::repository::DEFAULT_STORAGE_PREFIX;
use crate::types::PageKind;

/// Knobs for the repository and the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Prepended to `{domain}_{page_kind}` when writing to the backend
    pub storage_prefix: String,
    /// A search results page with this many paper items or fewer is stale
    pub search_results_stale_at_most: usize,
    /// A detail page with this many titles or fewer is stale
    pub paper_detail_stale_at_most: usize,
    /// After this long an unanswered learning request may be sent again
    pub learning_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_prefix: DEFAULT_STORAGE_PREFIX.to_string(),
            search_results_stale_at_most: 1,
            paper_detail_stale_at_most: 0,
            learning_timeout_secs: 600,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_storage_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.storage_prefix = prefix.into();
        self
    }

    pub fn with_stale_threshold(mut self, page_kind: PageKind, at_most: usize) -> Self {
        match page_kind {
            PageKind::SearchResults => self.search_results_stale_at_most = at_most,
            PageKind::PaperDetail => self.paper_detail_stale_at_most = at_most,
        }
        self
    }

    pub fn with_learning_timeout(mut self, timeout: Duration) -> Self {
        self.learning_timeout_secs = timeout.as_secs();
        self
    }

    pub fn stale_threshold(&self, page_kind: PageKind) -> usize {
        match page_kind {
            PageKind::SearchResults => self.search_results_stale_at_most,
            PageKind::PaperDetail => self.paper_detail_stale_at_most,
        }
    }

    pub fn learning_timeout(&self) -> Duration {
        Duration::from_secs(self.learning_timeout_secs)
    }
}
