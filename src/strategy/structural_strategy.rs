//! CSS path query strategy
//!
//! Uses the scraper crate to select elements. Results are element handles, so
//! callers choose whether they need text, an attribute, or a nested query.

use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::StrategyBase;
use crate::error::Result;
use crate::page::Content;
use crate::validation::ValidationReport;

/// Persisted form of a structural strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralRecord {
    #[serde(flatten)]
    pub base: StrategyBase,
    pub path_query: String,
}

/// Strategy selecting elements by CSS path
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "StructuralRecord", into = "StructuralRecord")]
pub struct StructuralStrategy {
    pub base: StrategyBase,
    path_query: String,
    /// None when `path_query` does not parse
    selector: Option<Selector>,
}

impl StructuralStrategy {
    pub fn new(base: StrategyBase, path_query: impl Into<String>) -> Self {
        let path_query = path_query.into();
        let selector = Selector::parse(&path_query).ok();
        Self {
            base,
            path_query,
            selector,
        }
    }

    pub fn path_query(&self) -> &str {
        &self.path_query
    }

    /// Select matching elements. An unusable path yields an empty result.
    pub fn extract<'a>(&self, content: Content<'a>) -> Vec<ElementRef<'a>> {
        let Some(selector) = &self.selector else {
            tracing::debug!(
                domain = %self.base.domain,
                path_query = %self.path_query,
                "Skipping extraction, path query does not parse"
            );
            return vec![];
        };

        match content {
            Content::Document(doc) => doc.select(selector).collect(),
            Content::Element(el) => el.select(selector).collect(),
            Content::Text(_) => {
                tracing::debug!(
                    domain = %self.base.domain,
                    "Structural strategy given raw text, nothing to select"
                );
                vec![]
            }
        }
    }

    pub fn validate(&self) -> ValidationReport {
        let mut errors = self.base.config_errors();
        if self.path_query.trim().is_empty() {
            errors.push("pathQuery must not be empty".to_string());
        } else if let Err(e) = Selector::parse(&self.path_query) {
            errors.push(format!("pathQuery does not parse: {}", e));
        }
        ValidationReport::from_errors(errors)
    }

    pub fn matches_page(&self, url: &str, page_kind: crate::types::PageKind) -> bool {
        self.base.matches_page(url, page_kind)
    }

    pub fn to_record(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_record(record: Value) -> Result<Self> {
        Ok(serde_json::from_value(record)?)
    }
}

impl From<StructuralRecord> for StructuralStrategy {
    fn from(record: StructuralRecord) -> Self {
        StructuralStrategy::new(record.base, record.path_query)
    }
}

impl From<StructuralStrategy> for StructuralRecord {
    fn from(strategy: StructuralStrategy) -> Self {
        StructuralRecord {
            base: strategy.base,
            path_query: strategy.path_query,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_base;
    use crate::types::PageKind;
    use scraper::Html;

    const RESULTS_HTML: &str = r#"
    <html>
    <body>
        <div class="gs_r">
            <h3 class="gs_rt"><a href="/paper/1">Attention Is All You Need</a></h3>
            <div class="gs_rs">We propose a new simple network architecture.</div>
        </div>
        <div class="gs_r">
            <h3 class="gs_rt"><a href="/paper/2">Deep Residual Learning</a></h3>
        </div>
    </body>
    </html>
    "#;

    fn strategy(path: &str) -> StructuralStrategy {
        StructuralStrategy::new(test_base("scholar.google.com", PageKind::SearchResults), path)
    }

    #[test]
    fn test_extract_returns_element_handles() {
        let html = Html::parse_document(RESULTS_HTML);
        let titles = strategy(".gs_rt a").extract(Content::Document(&html));

        assert_eq!(titles.len(), 2);
        assert_eq!(titles[0].value().attr("href"), Some("/paper/1"));
        assert_eq!(
            titles[1].text().collect::<String>(),
            "Deep Residual Learning"
        );
    }

    #[test]
    fn test_extract_within_element() {
        let html = Html::parse_document(RESULTS_HTML);
        let items = strategy("div.gs_r").extract(Content::Document(&html));
        assert_eq!(items.len(), 2);

        let snippet = strategy(".gs_rs");
        assert_eq!(snippet.extract(Content::Element(items[0])).len(), 1);
        assert!(snippet.extract(Content::Element(items[1])).is_empty());
    }

    #[test]
    fn test_malformed_path_degrades_to_empty() {
        let html = Html::parse_document(RESULTS_HTML);
        let broken = strategy("div[[[");

        assert!(broken.extract(Content::Document(&html)).is_empty());
        let report = broken.validate();
        assert!(!report.valid);
        assert!(report.errors[0].contains("pathQuery"));
    }

    #[test]
    fn test_empty_inputs() {
        let html = Html::parse_document("");
        assert!(strategy(".gs_r").extract(Content::Document(&html)).is_empty());
        assert!(strategy(".gs_r").extract(Content::Text("<div class='gs_r'>")).is_empty());

        let report = strategy("  ").validate();
        assert_eq!(report.errors, vec!["pathQuery must not be empty".to_string()]);
    }

    #[test]
    fn test_extract_is_idempotent() {
        let html = Html::parse_document(RESULTS_HTML);
        let s = strategy("h3 a");
        let first = s.extract(Content::Document(&html));
        let second = s.extract(Content::Document(&html));
        assert_eq!(first.len(), second.len());
        assert_eq!(first, second);
    }

    #[test]
    fn test_record_round_trip_rebuilds_selector() {
        let mut s = strategy(".gs_rt a");
        s.base.metadata.insert("learnedBy".to_string(), Value::from("model-x"));

        let record = s.to_record().unwrap();
        assert_eq!(record["pathQuery"], ".gs_rt a");
        assert_eq!(record["pageKind"], "search_results");
        assert!(record.get("createdAt").is_some());

        let back = StructuralStrategy::from_record(record.clone()).unwrap();
        assert_eq!(back.to_record().unwrap(), record);

        let html = Html::parse_document(RESULTS_HTML);
        assert_eq!(back.extract(Content::Document(&html)).len(), 2);
    }
}
