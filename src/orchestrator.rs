//! Page pass orchestration
//!
//! Per (domain, page kind) the engine moves through
//! `Unlearned -> Learning -> Learned -> Stale -> Learning`. A pass extracts
//! with the cached set whenever the set still finds its anchor field, even
//! while a replacement is being learned. Otherwise it gives up on the page and
//! makes sure one learning request is on its way. It never waits for learning.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::EngineConfig;
use crate::error::{Result, SelectorError};
use crate::page::{Content, PageContent};
use crate::record::{build_item_records, build_page_record, PaperRecord};
use crate::repository::{KeyValueStore, SelectorRepository};
use crate::selector_set::{selector_key, SelectorSet};
use crate::types::PageKind;
use crate::validation::ValidationReport;

/// Why a learning request was sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LearningReason {
    /// Nothing cached for the key
    Unlearned,
    /// The cached set found too few anchor elements
    Stale { found: usize },
}

/// Page snapshot plus target key, for the learning service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningRequest {
    pub domain: String,
    pub page_kind: PageKind,
    pub url: String,
    pub html: String,
    pub reason: LearningReason,
    pub requested_at: DateTime<Utc>,
}

/// Learns selector sets out of band and saves them through the repository.
///
/// `submit` must hand the request off and return without waiting for the
/// result.
pub trait LearningService: Send + Sync {
    fn submit(&self, request: LearningRequest) -> Result<()>;
}

impl<T: LearningService + ?Sized> LearningService for Arc<T> {
    fn submit(&self, request: LearningRequest) -> Result<()> {
        (**self).submit(request)
    }
}

/// Forwards requests to a learner task over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelLearningService {
    sender: mpsc::UnboundedSender<LearningRequest>,
}

impl ChannelLearningService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LearningRequest>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl LearningService for ChannelLearningService {
    fn submit(&self, request: LearningRequest) -> Result<()> {
        self.sender
            .send(request)
            .map_err(|_| SelectorError::LearningUnavailable("learner task has stopped".to_string()))
    }
}

/// Where a key stands in the learning cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearningState {
    Unlearned,
    Learning {
        requested_at: DateTime<Utc>,
        /// Repository revision when the request went out
        revision: u64,
    },
    Learned,
    Stale,
}

/// Result of one page pass
#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    /// The cached set worked; records are ready for the consumer
    Extracted {
        records: Vec<PaperRecord>,
        /// Anchor field judged by its validation rule. Advisory only.
        validation: ValidationReport,
    },
    /// Nothing extracted, a learning request was submitted
    LearningRequested { reason: LearningReason },
    /// Nothing extracted, and a request for this key is already in flight
    AwaitingLearning,
    /// Nothing extracted and the learning service refused the request
    LearningUnavailable,
}

pub struct ExtractionOrchestrator<S, L> {
    repository: Arc<SelectorRepository<S>>,
    learner: L,
    config: EngineConfig,
    states: Mutex<HashMap<String, LearningState>>,
}

impl<S: KeyValueStore, L: LearningService> ExtractionOrchestrator<S, L> {
    pub fn new(repository: Arc<SelectorRepository<S>>, learner: L, config: EngineConfig) -> Self {
        Self {
            repository,
            learner,
            config,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn repository(&self) -> &Arc<SelectorRepository<S>> {
        &self.repository
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self, domain: &str, page_kind: PageKind) -> LearningState {
        self.current_state(&selector_key(domain, page_kind))
    }

    /// Run one pass over `page`
    pub async fn process_page(&self, page: &PageContent, page_kind: PageKind) -> PassOutcome {
        let domain = page.domain();
        let key = selector_key(&domain, page_kind);

        let set = self.repository.get_for_page(&page.url, page_kind).await;
        let revision = self.repository.revision(&domain, page_kind).await;

        let Some(set) = set else {
            return self.ensure_learning(&key, page, page_kind, LearningReason::Unlearned, revision);
        };

        if let LearningState::Learning {
            revision: requested_revision,
            ..
        } = self.current_state(&key)
        {
            if revision > requested_revision {
                tracing::info!(key = %key, revision, "Learned selector set arrived");
                self.set_state(&key, LearningState::Learned);
            }
        }

        self.extract_with(&set, &key, page, page_kind, revision)
    }

    // Synchronous on purpose: the parsed document must not live across an await.
    fn extract_with(
        &self,
        set: &SelectorSet,
        key: &str,
        page: &PageContent,
        page_kind: PageKind,
        revision: u64,
    ) -> PassOutcome {
        let document = page.document();
        let anchor = page_kind.anchor_field();
        let threshold = self.config.stale_threshold(page_kind);

        let items = match set.extract(anchor, Content::Document(&document)) {
            Some(items) if items.len() > threshold => items,
            found => {
                let found = found.map_or(0, |items| items.len());
                tracing::info!(
                    key = %key,
                    field = %anchor,
                    found,
                    threshold,
                    "Cached selector set looks stale, discarding pass"
                );
                return self.ensure_learning(key, page, page_kind, LearningReason::Stale { found }, revision);
            }
        };

        let validation = set.validate_results(&items, anchor);
        if !validation.valid {
            tracing::debug!(key = %key, errors = ?validation.errors, "Anchor field outside its validation rule");
        }

        let records = match page_kind {
            PageKind::SearchResults => build_item_records(set, &items, &page.url),
            PageKind::PaperDetail => vec![build_page_record(set, Content::Document(&document), &page.url)],
        };

        self.mark_learned(key);
        tracing::debug!(key = %key, records = records.len(), "Extraction pass complete");

        PassOutcome::Extracted { records, validation }
    }

    /// Submit a learning request unless one for `key` is already in flight
    fn ensure_learning(
        &self,
        key: &str,
        page: &PageContent,
        page_kind: PageKind,
        reason: LearningReason,
        revision: u64,
    ) -> PassOutcome {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(LearningState::Learning { requested_at, .. }) = states.get(key) {
            if !self.timed_out(*requested_at) {
                return PassOutcome::AwaitingLearning;
            }
            tracing::info!(key = %key, "Learning request timed out, sending again");
        }

        let now = Utc::now();
        let request = LearningRequest {
            domain: page.domain(),
            page_kind,
            url: page.url.clone(),
            html: page.html.clone(),
            reason,
            requested_at: now,
        };

        match self.learner.submit(request) {
            Ok(()) => {
                tracing::info!(key = %key, reason = ?reason, "Learning request submitted");
                states.insert(
                    key.to_string(),
                    LearningState::Learning {
                        requested_at: now,
                        revision,
                    },
                );
                PassOutcome::LearningRequested { reason }
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Learning request rejected");
                if let LearningReason::Stale { .. } = reason {
                    states.insert(key.to_string(), LearningState::Stale);
                }
                PassOutcome::LearningUnavailable
            }
        }
    }

    /// A healthy pass settles the key, unless a request is still in flight
    fn mark_learned(&self, key: &str) {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(LearningState::Learning { requested_at, .. }) = states.get(key) {
            if !self.timed_out(*requested_at) {
                return;
            }
        }
        states.insert(key.to_string(), LearningState::Learned);
    }

    fn timed_out(&self, requested_at: DateTime<Utc>) -> bool {
        (Utc::now() - requested_at)
            .to_std()
            .map(|age| age >= self.config.learning_timeout())
            .unwrap_or(false)
    }

    fn current_state(&self, key: &str) -> LearningState {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
            .unwrap_or(LearningState::Unlearned)
    }

    fn set_state(&self, key: &str, state: LearningState) {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), state);
    }
}
