//! Regular expression strategy over raw text
//!
//! Flags follow the familiar letter syntax: `g` global, `i` case-insensitive,
//! `m` multi-line, `s` dot matches newline, `u` accepted and ignored.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::StrategyBase;
use crate::error::Result;
use crate::page::Content;
use crate::types::PageKind;
use crate::validation::ValidationReport;

pub const DEFAULT_MATCH_FLAGS: &str = "g";

/// Persisted form of a pattern strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternRecord {
    #[serde(flatten)]
    pub base: StrategyBase,
    pub pattern: String,
    #[serde(default)]
    pub capture_group_index: usize,
    #[serde(default = "default_flags")]
    pub match_flags: String,
}

fn default_flags() -> String {
    DEFAULT_MATCH_FLAGS.to_string()
}

/// Strategy matching a regular expression against text
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "PatternRecord", into = "PatternRecord")]
pub struct PatternStrategy {
    pub base: StrategyBase,
    pattern: String,
    capture_group_index: usize,
    match_flags: String,
    global: bool,
    /// None when the pattern or its flags are unusable
    regex: Option<Regex>,
}

impl PatternStrategy {
    pub fn new(
        base: StrategyBase,
        pattern: impl Into<String>,
        capture_group_index: usize,
        match_flags: impl Into<String>,
    ) -> Self {
        let pattern = pattern.into();
        let match_flags = match_flags.into();
        let regex = compile(&pattern, &match_flags).ok();
        Self {
            base,
            global: match_flags.contains('g'),
            pattern,
            capture_group_index,
            match_flags,
            regex,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn capture_group_index(&self) -> usize {
        self.capture_group_index
    }

    pub fn match_flags(&self) -> &str {
        &self.match_flags
    }

    pub fn is_global(&self) -> bool {
        self.global
    }

    /// Matched strings, left to right. Each is the configured capture group,
    /// or the whole match when that group did not take part.
    pub fn extract(&self, content: Content<'_>) -> Vec<String> {
        let Some(regex) = &self.regex else {
            tracing::debug!(
                domain = %self.base.domain,
                pattern = %self.pattern,
                flags = %self.match_flags,
                "Skipping extraction, pattern does not compile"
            );
            return vec![];
        };

        let text = content.as_text();
        let mut values = Vec::new();

        // captures_iter steps past empty matches, so this always terminates
        for caps in regex.captures_iter(&text) {
            if let Some(m) = caps.get(self.capture_group_index).or_else(|| caps.get(0)) {
                values.push(m.as_str().to_string());
            }
            if !self.global {
                break;
            }
        }

        values
    }

    pub fn validate(&self) -> ValidationReport {
        let mut errors = self.base.config_errors();
        if self.pattern.is_empty() {
            errors.push("pattern must not be empty".to_string());
        } else if let Err(e) = compile(&self.pattern, &self.match_flags) {
            errors.push(e);
        }
        ValidationReport::from_errors(errors)
    }

    pub fn matches_page(&self, url: &str, page_kind: PageKind) -> bool {
        self.base.matches_page(url, page_kind)
    }

    pub fn to_record(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_record(record: Value) -> Result<Self> {
        Ok(serde_json::from_value(record)?)
    }
}

fn compile(pattern: &str, flags: &str) -> std::result::Result<Regex, String> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.chars() {
        match flag {
            'g' | 'u' => {}
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            other => return Err(format!("unsupported match flag '{}'", other)),
        }
    }
    builder
        .build()
        .map_err(|e| format!("pattern does not compile: {}", e))
}

impl From<PatternRecord> for PatternStrategy {
    fn from(record: PatternRecord) -> Self {
        PatternStrategy::new(
            record.base,
            record.pattern,
            record.capture_group_index,
            record.match_flags,
        )
    }
}

impl From<PatternStrategy> for PatternRecord {
    fn from(strategy: PatternStrategy) -> Self {
        PatternRecord {
            base: strategy.base,
            pattern: strategy.pattern,
            capture_group_index: strategy.capture_group_index,
            match_flags: strategy.match_flags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_base;

    fn strategy(pattern: &str, group: usize, flags: &str) -> PatternStrategy {
        PatternStrategy::new(
            test_base("scholar.google.com", PageKind::SearchResults),
            pattern,
            group,
            flags,
        )
    }

    #[test]
    fn test_global_returns_every_match() {
        let s = strategy(r"\d+", 0, "g");
        assert_eq!(
            s.extract(Content::Text("a1 b22 c333")),
            vec!["1", "22", "333"]
        );
    }

    #[test]
    fn test_non_global_returns_at_most_one() {
        let s = strategy(r"\d+", 0, "");
        assert_eq!(s.extract(Content::Text("a1 b22 c333")), vec!["1"]);
        assert!(s.extract(Content::Text("no digits")).is_empty());
    }

    #[test]
    fn test_capture_group_falls_back_to_whole_match() {
        let s = strategy(r"(\w)=(\d)?", 2, "g");
        assert_eq!(s.extract(Content::Text("a=1 b= c=3")), vec!["1", "b=", "3"]);

        // group index beyond the pattern
        let s = strategy(r"x(\d)", 5, "g");
        assert_eq!(s.extract(Content::Text("x1 x2")), vec!["x1", "x2"]);
    }

    #[test]
    fn test_empty_matches_terminate() {
        let s = strategy(r"a*", 0, "g");
        let values = s.extract(Content::Text("baab"));
        assert!(values.contains(&"aa".to_string()));
        assert!(values.len() <= 5);
    }

    #[test]
    fn test_flags() {
        let s = strategy(r"^pdf$", 0, "gim");
        assert_eq!(s.extract(Content::Text("PDF\nhtml\npdf")), vec!["PDF", "pdf"]);

        let s = strategy(r"a.b", 0, "gs");
        assert_eq!(s.extract(Content::Text("a\nb")), vec!["a\nb"]);
    }

    #[test]
    fn test_bad_pattern_is_reported_by_validate_not_extract() {
        let s = strategy(r"(\d+", 0, "g");
        assert!(s.extract(Content::Text("123")).is_empty());
        let report = s.validate();
        assert!(!report.valid);
        assert!(report.errors[0].contains("pattern does not compile"));

        let s = strategy(r"\d+", 0, "gy");
        assert!(s.extract(Content::Text("123")).is_empty());
        assert_eq!(s.validate().errors, vec!["unsupported match flag 'y'".to_string()]);

        assert!(!strategy("", 0, "g").validate().valid);
        assert!(strategy(r"\d+", 0, "g").validate().valid);
    }

    #[test]
    fn test_empty_content() {
        assert!(strategy(r"\d+", 0, "g").extract(Content::Text("")).is_empty());
    }

    #[test]
    fn test_record_round_trip() {
        let s = strategy(r#"href="([^"]+\.pdf)""#, 1, "gi");
        let record = s.to_record().unwrap();
        assert_eq!(record["captureGroupIndex"], 1);
        assert_eq!(record["matchFlags"], "gi");

        let back = PatternStrategy::from_record(record.clone()).unwrap();
        assert_eq!(back.to_record().unwrap(), record);
        assert_eq!(
            back.extract(Content::Text(r#"<a HREF="/a.pdf">x</a>"#)),
            vec!["/a.pdf"]
        );
    }

    #[test]
    fn test_record_defaults() {
        let mut record = strategy("x", 0, "g").to_record().unwrap();
        let obj = record.as_object_mut().unwrap();
        obj.remove("captureGroupIndex");
        obj.remove("matchFlags");

        let s = PatternStrategy::from_record(record).unwrap();
        assert_eq!(s.capture_group_index(), 0);
        assert_eq!(s.match_flags(), DEFAULT_MATCH_FLAGS);
        assert!(s.is_global());
    }
}
