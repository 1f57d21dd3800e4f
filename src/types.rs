//! Closed enums shared across the engine

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SelectorError;
use crate::validation::Predefined;

/// Kind of page a selector set was learned for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    SearchResults,
    PaperDetail,
}

impl PageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageKind::SearchResults => "search_results",
            PageKind::PaperDetail => "paper_detail",
        }
    }

    /// Field whose result count decides whether a cached set still works.
    /// Detail pages carry no paper list, so their title stands in.
    pub fn anchor_field(&self) -> FieldName {
        match self {
            PageKind::SearchResults => FieldName::PaperItem,
            PageKind::PaperDetail => FieldName::Title,
        }
    }
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageKind {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "search_results" => Ok(PageKind::SearchResults),
            "paper_detail" => Ok(PageKind::PaperDetail),
            other => Err(SelectorError::UnknownPageKind(other.to_string())),
        }
    }
}

/// How an extractor pulls values out of a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// CSS path query over the element tree
    Structural,
    /// Regular expression over raw text
    Pattern,
}

impl ExtractionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMode::Structural => "structural",
            ExtractionMode::Pattern => "pattern",
        }
    }
}

impl fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractionMode {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "structural" => Ok(ExtractionMode::Structural),
            "pattern" => Ok(ExtractionMode::Pattern),
            other => Err(SelectorError::UnknownMode(other.to_string())),
        }
    }
}

/// Semantic fields of a publication entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    PaperItem,
    Title,
    Pdf,
    Abstract,
    AllVersionsLink,
}

impl FieldName {
    pub const ALL: [FieldName; 5] = [
        FieldName::PaperItem,
        FieldName::Title,
        FieldName::Pdf,
        FieldName::Abstract,
        FieldName::AllVersionsLink,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::PaperItem => "paper_item",
            FieldName::Title => "title",
            FieldName::Pdf => "pdf",
            FieldName::Abstract => "abstract",
            FieldName::AllVersionsLink => "all_versions_link",
        }
    }

    pub fn default_description(&self) -> &'static str {
        match self {
            FieldName::PaperItem => "Container of one paper entry in the result list",
            FieldName::Title => "Paper title",
            FieldName::Pdf => "Link to the PDF full text",
            FieldName::Abstract => "Abstract or snippet of the paper",
            FieldName::AllVersionsLink => "Link to all versions of the paper",
        }
    }

    pub fn default_validation(&self) -> Predefined {
        match self {
            FieldName::PaperItem => Predefined::PaperList,
            FieldName::Title => Predefined::Title,
            FieldName::Pdf => Predefined::Pdf,
            FieldName::Abstract => Predefined::Abstract,
            FieldName::AllVersionsLink => Predefined::AllVersionsLink,
        }
    }

    /// Fields whose value is the `href` of the matched element rather than its text
    pub fn is_link(&self) -> bool {
        matches!(self, FieldName::Pdf | FieldName::AllVersionsLink)
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldName {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldName::ALL
            .iter()
            .find(|f| f.as_str() == s)
            .copied()
            .ok_or_else(|| SelectorError::UnknownField(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_closed_enums() {
        assert_eq!("paper_detail".parse::<PageKind>().unwrap(), PageKind::PaperDetail);
        assert_eq!("pattern".parse::<ExtractionMode>().unwrap(), ExtractionMode::Pattern);
        assert_eq!(
            "all_versions_link".parse::<FieldName>().unwrap(),
            FieldName::AllVersionsLink
        );

        assert!(matches!(
            "xpath".parse::<ExtractionMode>(),
            Err(SelectorError::UnknownMode(m)) if m == "xpath"
        ));
        assert!("authors".parse::<FieldName>().is_err());
        assert!("listing".parse::<PageKind>().is_err());
    }

    #[test]
    fn test_serde_names_match_as_str() {
        for field in FieldName::ALL {
            let json = serde_json::to_value(field).unwrap();
            assert_eq!(json, serde_json::Value::String(field.as_str().to_string()));
        }
        assert_eq!(
            serde_json::to_value(PageKind::SearchResults).unwrap(),
            "search_results"
        );
    }
}
