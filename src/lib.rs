//! Adaptive selector engine for scraping publication records
//!
//! Pulls fields out of pages whose markup keeps changing:
//! - Extraction strategies (CSS path query or text pattern)
//! - Per-field validation rules
//! - Selector sets cached per (domain, page kind) over a key-value backend
//! - Learning state per key, with stale detection and de-duplicated requests
//! - C ABI for the page-rendering host

pub mod config;
pub mod error;
pub mod ffi;
pub mod orchestrator;
pub mod page;
pub mod record;
pub mod repository;
pub mod selector_set;
pub mod strategy;
pub mod types;
pub mod validation;

pub use config::EngineConfig;
pub use error::{Result, SelectorError};
pub use orchestrator::{
    ChannelLearningService, ExtractionOrchestrator, LearningReason, LearningRequest, LearningService,
    LearningState, PassOutcome,
};
pub use page::{Content, ExtractedValue, PageContent, ValidationSubject};
pub use record::PaperRecord;
pub use repository::{KeyValueStore, MemoryStore, SelectorRepository};
pub use selector_set::{SelectorSet, SetValidationReport};
pub use strategy::{ExtractionStrategy, PatternStrategy, RawStrategyConfig, StrategyBase, StructuralStrategy};
pub use types::{ExtractionMode, FieldName, PageKind};
pub use validation::{Predefined, ValidationCriteria, ValidationReport};
