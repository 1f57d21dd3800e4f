//! Extraction strategies
//!
//! A strategy turns page content into candidate values for one field. Two kinds
//! exist and the set is closed: structural (CSS path over the element tree) and
//! pattern (regular expression over raw text).

mod pattern_strategy;
mod structural_strategy;

pub use pattern_strategy::*;
pub use structural_strategy::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::page::{domain_from_url, Content, ExtractedValue};
use crate::types::{ExtractionMode, PageKind};
use crate::validation::{ValidationCriteria, ValidationReport};

/// Attributes every strategy carries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyBase {
    pub domain: String,
    pub page_kind: PageKind,
    #[serde(default)]
    pub description: String,
    pub validation: ValidationCriteria,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

impl StrategyBase {
    pub fn new(
        domain: impl Into<String>,
        page_kind: PageKind,
        description: impl Into<String>,
        validation: ValidationCriteria,
    ) -> Self {
        let now = Utc::now();
        Self {
            domain: domain.into(),
            page_kind,
            description: description.into(),
            validation,
            enabled: true,
            metadata: Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn matches_page(&self, url: &str, page_kind: PageKind) -> bool {
        self.page_kind == page_kind && !self.domain.is_empty() && domain_from_url(url) == self.domain
    }

    fn config_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.domain.trim().is_empty() {
            errors.push("domain must not be empty".to_string());
        }
        errors.extend(self.validation.config_errors());
        errors
    }
}

/// Loose fields a strategy is rebuilt from (learning output, manual edits)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawStrategyConfig {
    pub path_query: Option<String>,
    pub pattern: Option<String>,
    pub capture_group_index: Option<usize>,
    pub match_flags: Option<String>,
    pub description: Option<String>,
    pub validation: Option<ValidationCriteria>,
    pub metadata: Map<String, Value>,
}

impl RawStrategyConfig {
    pub fn structural(path_query: impl Into<String>) -> Self {
        Self {
            path_query: Some(path_query.into()),
            ..Default::default()
        }
    }

    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self {
            pattern: Some(pattern.into()),
            ..Default::default()
        }
    }

    pub fn with_capture_group(mut self, index: usize) -> Self {
        self.capture_group_index = Some(index);
        self
    }

    pub fn with_flags(mut self, flags: impl Into<String>) -> Self {
        self.match_flags = Some(flags.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_validation(mut self, validation: ValidationCriteria) -> Self {
        self.validation = Some(validation);
        self
    }
}

/// A live strategy of either kind
#[derive(Debug, Clone)]
pub enum ExtractionStrategy {
    Structural(StructuralStrategy),
    Pattern(PatternStrategy),
}

impl ExtractionStrategy {
    /// Build the concrete strategy for `mode` from raw fields.
    /// `base` already carries the resolved description and validation.
    pub fn build(mode: ExtractionMode, base: StrategyBase, raw: RawStrategyConfig) -> Self {
        match mode {
            ExtractionMode::Structural => ExtractionStrategy::Structural(StructuralStrategy::new(
                base,
                raw.path_query.unwrap_or_default(),
            )),
            ExtractionMode::Pattern => ExtractionStrategy::Pattern(PatternStrategy::new(
                base,
                raw.pattern.unwrap_or_default(),
                raw.capture_group_index.unwrap_or(0),
                raw.match_flags.unwrap_or_else(|| DEFAULT_MATCH_FLAGS.to_string()),
            )),
        }
    }

    pub fn mode(&self) -> ExtractionMode {
        match self {
            ExtractionStrategy::Structural(_) => ExtractionMode::Structural,
            ExtractionStrategy::Pattern(_) => ExtractionMode::Pattern,
        }
    }

    pub fn base(&self) -> &StrategyBase {
        match self {
            ExtractionStrategy::Structural(s) => &s.base,
            ExtractionStrategy::Pattern(p) => &p.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut StrategyBase {
        match self {
            ExtractionStrategy::Structural(s) => &mut s.base,
            ExtractionStrategy::Pattern(p) => &mut p.base,
        }
    }

    pub fn extract<'a>(&self, content: Content<'a>) -> Vec<ExtractedValue<'a>> {
        match self {
            ExtractionStrategy::Structural(s) => s
                .extract(content)
                .into_iter()
                .map(ExtractedValue::Node)
                .collect(),
            ExtractionStrategy::Pattern(p) => p
                .extract(content)
                .into_iter()
                .map(ExtractedValue::Text)
                .collect(),
        }
    }

    pub fn validate(&self) -> ValidationReport {
        match self {
            ExtractionStrategy::Structural(s) => s.validate(),
            ExtractionStrategy::Pattern(p) => p.validate(),
        }
    }

    pub fn matches_page(&self, url: &str, page_kind: PageKind) -> bool {
        self.base().matches_page(url, page_kind)
    }

    pub fn to_record(&self) -> Result<Value> {
        match self {
            ExtractionStrategy::Structural(s) => s.to_record(),
            ExtractionStrategy::Pattern(p) => p.to_record(),
        }
    }

    pub fn from_record(mode: ExtractionMode, record: Value) -> Result<Self> {
        Ok(match mode {
            ExtractionMode::Structural => {
                ExtractionStrategy::Structural(StructuralStrategy::from_record(record)?)
            }
            ExtractionMode::Pattern => ExtractionStrategy::Pattern(PatternStrategy::from_record(record)?),
        })
    }
}

#[cfg(test)]
pub(crate) fn test_base(domain: &str, page_kind: PageKind) -> StrategyBase {
    StrategyBase::new(
        domain,
        page_kind,
        "test strategy",
        crate::validation::Predefined::PaperList.criteria(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_build_dispatches_on_mode() {
        let base = test_base("scholar.google.com", PageKind::SearchResults);

        let s = ExtractionStrategy::build(
            ExtractionMode::Structural,
            base.clone(),
            RawStrategyConfig::structural(".gs_r"),
        );
        assert_eq!(s.mode(), ExtractionMode::Structural);

        let p = ExtractionStrategy::build(
            ExtractionMode::Pattern,
            base,
            RawStrategyConfig::pattern(r"\d+"),
        );
        assert_eq!(p.mode(), ExtractionMode::Pattern);
        match p {
            ExtractionStrategy::Pattern(p) => {
                assert_eq!(p.capture_group_index(), 0);
                assert_eq!(p.match_flags(), "g");
            }
            _ => panic!("expected pattern strategy"),
        }
    }

    #[test]
    fn test_extract_wraps_values_by_kind() {
        let html = Html::parse_document(r#"<div class="n">7</div><div class="n">42</div>"#);
        let base = test_base("example.com", PageKind::SearchResults);

        let s = ExtractionStrategy::build(
            ExtractionMode::Structural,
            base.clone(),
            RawStrategyConfig::structural("div.n"),
        );
        let values = s.extract(Content::Document(&html));
        assert_eq!(values.len(), 2);
        assert!(values.iter().all(|v| v.as_node().is_some()));
        assert_eq!(values[1].text(), "42");

        let p = ExtractionStrategy::build(
            ExtractionMode::Pattern,
            base,
            RawStrategyConfig::pattern(r">(\d+)<").with_capture_group(1),
        );
        let values = p.extract(Content::Document(&html));
        assert_eq!(
            values,
            vec![
                ExtractedValue::Text("7".to_string()),
                ExtractedValue::Text("42".to_string())
            ]
        );
    }

    #[test]
    fn test_base_validation_errors() {
        let mut base = test_base("", PageKind::PaperDetail);
        base.validation = ValidationCriteria::new(".*", 3, 1);
        let s = ExtractionStrategy::build(
            ExtractionMode::Structural,
            base,
            RawStrategyConfig::structural("h1"),
        );
        let report = s.validate();
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn test_matches_page() {
        let s = ExtractionStrategy::build(
            ExtractionMode::Structural,
            test_base("scholar.google.com", PageKind::SearchResults),
            RawStrategyConfig::structural(".gs_r"),
        );
        assert!(s.matches_page("https://scholar.google.com/scholar?q=x", PageKind::SearchResults));
        assert!(!s.matches_page("https://scholar.google.com/scholar?q=x", PageKind::PaperDetail));
        assert!(!s.matches_page("https://example.com/", PageKind::SearchResults));
        assert!(!s.matches_page("garbage", PageKind::SearchResults));
    }

    #[test]
    fn test_record_round_trip_through_mode() {
        let p = ExtractionStrategy::build(
            ExtractionMode::Pattern,
            test_base("example.com", PageKind::SearchResults),
            RawStrategyConfig::pattern(r"(a)(b)?").with_capture_group(2).with_flags("gi"),
        );
        let record = p.to_record().unwrap();
        let back = ExtractionStrategy::from_record(ExtractionMode::Pattern, record.clone()).unwrap();
        assert_eq!(back.to_record().unwrap(), record);

        // a pattern record is not a structural record
        assert!(ExtractionStrategy::from_record(ExtractionMode::Structural, record).is_err());
    }
}
