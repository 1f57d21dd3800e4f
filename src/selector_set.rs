//! Composite selector sets
//!
//! One set per (site domain, page kind), holding at most one extractor per
//! semantic field. Sets are what gets learned, persisted and cached.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::page::{domain_from_url, Content, ExtractedValue, ValidationSubject};
use crate::strategy::{ExtractionStrategy, RawStrategyConfig, StrategyBase};
use crate::types::{ExtractionMode, FieldName, PageKind};
use crate::validation::{Predefined, ValidationCriteria, ValidationReport};

/// Key a selector set is cached and stored under: `{domain}_{page_kind}`
pub fn selector_key(domain: &str, page_kind: PageKind) -> String {
    format!("{}_{}", domain, page_kind.as_str())
}

/// One field bound to a strategy
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub field: FieldName,
    pub strategy: ExtractionStrategy,
    pub description: String,
}

impl ExtractorConfig {
    pub fn mode(&self) -> ExtractionMode {
        self.strategy.mode()
    }

    pub fn enabled(&self) -> bool {
        self.strategy.base().enabled
    }

    pub fn validation(&self) -> &ValidationCriteria {
        &self.strategy.base().validation
    }

    fn to_record(&self) -> Result<ExtractorRecord> {
        Ok(ExtractorRecord {
            mode: self.mode(),
            strategy: self.strategy.to_record()?,
            description: self.description.clone(),
        })
    }

    fn from_record(field: FieldName, record: ExtractorRecord) -> Result<Self> {
        Ok(Self {
            field,
            strategy: ExtractionStrategy::from_record(record.mode, record.strategy)?,
            description: record.description,
        })
    }
}

/// Persisted form of one extractor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorRecord {
    pub mode: ExtractionMode,
    pub strategy: Value,
    #[serde(default)]
    pub description: String,
}

/// Persisted form of a whole selector set
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorSetRecord {
    pub domain: String,
    pub page_kind: PageKind,
    #[serde(default)]
    pub extractors: BTreeMap<String, ExtractorRecord>,
}

/// Per-field validation of a whole set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetValidationReport {
    pub valid: bool,
    /// Field name (or `selector_set` for set-level problems) to its errors
    pub errors: BTreeMap<String, Vec<String>>,
}

/// Extractors for one site layout
#[derive(Debug, Clone)]
pub struct SelectorSet {
    pub domain: String,
    pub page_kind: PageKind,
    extractors: BTreeMap<FieldName, ExtractorConfig>,
}

impl SelectorSet {
    pub fn new(domain: impl Into<String>, page_kind: PageKind) -> Self {
        Self {
            domain: domain.into(),
            page_kind,
            extractors: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> String {
        selector_key(&self.domain, self.page_kind)
    }

    pub fn get_field(&self, field: FieldName) -> Option<&ExtractorConfig> {
        self.extractors.get(&field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &ExtractorConfig> {
        self.extractors.values()
    }

    /// Bind `field` to a strategy rebuilt from raw fields.
    ///
    /// Unknown field names or modes are errors. An existing field keeps its
    /// enabled flag and creation time.
    pub fn set_field(&mut self, field: &str, mode: &str, raw: RawStrategyConfig) -> Result<()> {
        let field: FieldName = field.parse()?;
        let mode: ExtractionMode = mode.parse()?;
        self.set_extractor(field, mode, raw);
        Ok(())
    }

    pub fn set_extractor(&mut self, field: FieldName, mode: ExtractionMode, raw: RawStrategyConfig) {
        let description = raw
            .description
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| field.default_description().to_string());
        let validation = raw
            .validation
            .clone()
            .unwrap_or_else(|| field.default_validation().criteria());

        let mut base = StrategyBase::new(
            self.domain.clone(),
            self.page_kind,
            description.clone(),
            validation,
        );
        base.metadata = raw.metadata.clone();
        if let Some(existing) = self.extractors.get(&field) {
            base.enabled = existing.enabled();
            base.created_at = existing.strategy.base().created_at;
        }
        base.updated_at = Utc::now();

        let strategy = ExtractionStrategy::build(mode, base, raw);
        self.extractors.insert(
            field,
            ExtractorConfig {
                field,
                strategy,
                description,
            },
        );
    }

    /// Returns false when the field is not configured
    pub fn set_enabled(&mut self, field: FieldName, enabled: bool) -> bool {
        match self.extractors.get_mut(&field) {
            Some(config) => {
                let base = config.strategy.base_mut();
                base.enabled = enabled;
                base.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// None when the field is missing or disabled
    pub fn extract<'a>(&self, field: FieldName, content: Content<'a>) -> Option<Vec<ExtractedValue<'a>>> {
        let config = self.extractors.get(&field)?;
        if !config.enabled() {
            return None;
        }
        Some(config.strategy.extract(content))
    }

    /// Judge `results` by the field's own rule, whatever strategy produced them
    pub fn validate_results<T: ValidationSubject>(&self, results: &[T], field: FieldName) -> ValidationReport {
        match self.extractors.get(&field) {
            Some(config) => config.validation().evaluate(results),
            None => ValidationReport::from_errors(vec![format!(
                "no extractor configured for field {}",
                field
            )]),
        }
    }

    pub fn validate_with_predefined<T: ValidationSubject>(
        results: &[T],
        criteria: Predefined,
    ) -> ValidationReport {
        criteria.criteria().evaluate(results)
    }

    pub fn validate(&self) -> SetValidationReport {
        let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();

        if self.domain.trim().is_empty() {
            errors
                .entry("selector_set".to_string())
                .or_default()
                .push("domain must not be empty".to_string());
        }

        for (field, config) in &self.extractors {
            let mut field_errors = config.strategy.validate().errors;
            let base = config.strategy.base();
            if base.domain != self.domain {
                field_errors.push(format!(
                    "strategy domain {} does not match set domain {}",
                    base.domain, self.domain
                ));
            }
            if base.page_kind != self.page_kind {
                field_errors.push(format!(
                    "strategy page kind {} does not match set page kind {}",
                    base.page_kind, self.page_kind
                ));
            }
            if !field_errors.is_empty() {
                errors.insert(field.to_string(), field_errors);
            }
        }

        SetValidationReport {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn matches_page(&self, url: &str, page_kind: PageKind) -> bool {
        self.page_kind == page_kind && !self.domain.is_empty() && domain_from_url(url) == self.domain
    }

    pub fn to_record(&self) -> Result<Value> {
        let mut extractors = BTreeMap::new();
        for (field, config) in &self.extractors {
            extractors.insert(field.to_string(), config.to_record()?);
        }
        let record = SelectorSetRecord {
            domain: self.domain.clone(),
            page_kind: self.page_kind,
            extractors,
        };
        Ok(serde_json::to_value(record)?)
    }

    /// Rebuild a set, including live strategies, from its record
    pub fn from_record(record: Value) -> Result<Self> {
        let record: SelectorSetRecord = serde_json::from_value(record)?;
        let mut extractors = BTreeMap::new();
        for (name, extractor) in record.extractors {
            let field: FieldName = name.parse()?;
            extractors.insert(field, ExtractorConfig::from_record(field, extractor)?);
        }
        Ok(Self {
            domain: record.domain,
            page_kind: record.page_kind,
            extractors,
        })
    }
}
