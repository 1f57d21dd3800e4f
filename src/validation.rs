//! Acceptance rules for extracted values
//!
//! A rule is a content pattern every item must match plus bounds on how many
//! items an extraction may yield. Rules do not care which strategy produced the
//! values, so a structural and a pattern extractor for one field share them.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SelectorError;
use crate::page::ValidationSubject;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CriteriaRecord {
    content_regex: String,
    min_count: usize,
    max_count: usize,
}

/// Content pattern plus result-count bounds. The pattern is compiled once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "CriteriaRecord", into = "CriteriaRecord")]
pub struct ValidationCriteria {
    content_regex: String,
    min_count: usize,
    max_count: usize,
    regex: Option<Regex>,
}

impl From<CriteriaRecord> for ValidationCriteria {
    fn from(record: CriteriaRecord) -> Self {
        Self::new(record.content_regex, record.min_count, record.max_count)
    }
}

impl From<ValidationCriteria> for CriteriaRecord {
    fn from(criteria: ValidationCriteria) -> Self {
        Self {
            content_regex: criteria.content_regex,
            min_count: criteria.min_count,
            max_count: criteria.max_count,
        }
    }
}

impl PartialEq for ValidationCriteria {
    fn eq(&self, other: &Self) -> bool {
        self.content_regex == other.content_regex
            && self.min_count == other.min_count
            && self.max_count == other.max_count
    }
}

impl Eq for ValidationCriteria {}

impl ValidationCriteria {
    pub fn new(content_regex: impl Into<String>, min_count: usize, max_count: usize) -> Self {
        let content_regex = content_regex.into();
        let regex = Regex::new(&content_regex).ok();
        Self {
            content_regex,
            min_count,
            max_count,
            regex,
        }
    }

    pub fn content_regex(&self) -> &str {
        &self.content_regex
    }

    pub fn min_count(&self) -> usize {
        self.min_count
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    fn compile_error(&self) -> Option<String> {
        if self.regex.is_some() {
            return None;
        }
        Regex::new(&self.content_regex)
            .err()
            .map(|e| format!("contentRegex does not compile: {}", e))
    }

    /// Problems with the rule itself (not with any result)
    pub fn config_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.max_count < self.min_count {
            errors.push(format!(
                "maxCount ({}) is smaller than minCount ({})",
                self.max_count, self.min_count
            ));
        }
        errors.extend(self.compile_error());
        errors
    }

    /// Check `results` against the bounds and the content pattern
    pub fn evaluate<T: ValidationSubject>(&self, results: &[T]) -> ValidationReport {
        let mut errors = Vec::new();
        let count = results.len();

        if count < self.min_count {
            errors.push(format!(
                "found {} results, below the minimum of {}",
                count, self.min_count
            ));
        }
        if count > self.max_count {
            errors.push(format!(
                "found {} results, above the maximum of {}",
                count, self.max_count
            ));
        }

        match &self.regex {
            Some(re) => {
                for (index, item) in results.iter().enumerate() {
                    if !re.is_match(&item.content()) {
                        errors.push(format!(
                            "result {} does not match content pattern {}",
                            index, self.content_regex
                        ));
                    }
                }
            }
            None => errors.extend(self.compile_error()),
        }

        ValidationReport::from_errors(errors)
    }
}

/// Built-in rules for the common fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predefined {
    PaperList,
    Title,
    Pdf,
    Abstract,
    AllVersionsLink,
}

impl Predefined {
    pub fn criteria(&self) -> ValidationCriteria {
        match self {
            Predefined::PaperList => ValidationCriteria::new(r"(?s)^.{6,}$", 3, 30),
            Predefined::Title => ValidationCriteria::new(r"(?s)^.{10,}$", 1, 1),
            Predefined::Pdf => ValidationCriteria::new(r"(?s)^.*$", 0, 5),
            Predefined::Abstract => ValidationCriteria::new(r"(?s)^.{50,}$", 0, 1),
            Predefined::AllVersionsLink => ValidationCriteria::new(r"(?s)^.*$", 0, 1),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Predefined::PaperList => "paper_list",
            Predefined::Title => "title",
            Predefined::Pdf => "pdf",
            Predefined::Abstract => "abstract",
            Predefined::AllVersionsLink => "all_versions_link",
        }
    }
}

impl fmt::Display for Predefined {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Predefined {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paper_list" => Ok(Predefined::PaperList),
            "title" => Ok(Predefined::Title),
            "pdf" => Ok(Predefined::Pdf),
            "abstract" => Ok(Predefined::Abstract),
            "all_versions_link" => Ok(Predefined::AllVersionsLink),
            other => Err(SelectorError::UnknownCriteria(other.to_string())),
        }
    }
}

/// Outcome of a validation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: vec![],
        }
    }

    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}
