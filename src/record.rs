//! Publication records handed to the consumer
//!
//! A record is an identity plus whatever named fields the selector set could
//! fill. Link fields carry absolute URLs; every other field carries text.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::page::{Content, ExtractedValue};
use crate::selector_set::SelectorSet;
use crate::types::FieldName;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub identity: String,
    pub fields: BTreeMap<FieldName, Vec<String>>,
}

impl PaperRecord {
    pub fn first(&self, field: FieldName) -> Option<&str> {
        self.fields.get(&field)?.first().map(String::as_str)
    }
}

/// Turn one extracted value into the string the consumer sees for `field`
pub fn value_for_field(field: FieldName, value: &ExtractedValue<'_>, base: Option<&Url>) -> Option<String> {
    if field.is_link() {
        let href = match value {
            ExtractedValue::Node(_) => value.attr("href")?.to_string(),
            ExtractedValue::Text(s) => s.clone(),
        };
        return resolve_link(href.trim(), base);
    }

    let text = value.text();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Absolute http(s) URL for `href`, joined against `base` when relative
fn resolve_link(href: &str, base: Option<&Url>) -> Option<String> {
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with('#')
    {
        return None;
    }

    let absolute = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };

    if absolute.scheme() == "http" || absolute.scheme() == "https" {
        Some(absolute.to_string())
    } else {
        None
    }
}

/// Fill every non-item field of `set` from `scope`
fn fill_fields(set: &SelectorSet, scope: Content<'_>, base: Option<&Url>) -> BTreeMap<FieldName, Vec<String>> {
    let mut fields = BTreeMap::new();
    for field in FieldName::ALL {
        if field == FieldName::PaperItem {
            continue;
        }
        let Some(values) = set.extract(field, scope) else {
            continue;
        };
        let strings: Vec<String> = values
            .iter()
            .filter_map(|v| value_for_field(field, v, base))
            .collect();
        if !strings.is_empty() {
            fields.insert(field, strings);
        }
    }
    fields
}

fn identity_for(fields: &BTreeMap<FieldName, Vec<String>>, page_url: &str, index: usize) -> String {
    fields
        .get(&FieldName::Title)
        .and_then(|titles| titles.first())
        .cloned()
        .unwrap_or_else(|| format!("{}#{}", page_url, index))
}

/// One record per paper item, fields extracted within each item
pub fn build_item_records(set: &SelectorSet, items: &[ExtractedValue<'_>], page_url: &str) -> Vec<PaperRecord> {
    let base = Url::parse(page_url).ok();
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let scope = match item {
                ExtractedValue::Node(el) => Content::Element(*el),
                ExtractedValue::Text(s) => Content::Text(s),
            };
            let fields = fill_fields(set, scope, base.as_ref());
            PaperRecord {
                identity: identity_for(&fields, page_url, index),
                fields,
            }
        })
        .collect()
}

/// A single record from a detail page, fields extracted from the whole document
pub fn build_page_record(set: &SelectorSet, content: Content<'_>, page_url: &str) -> PaperRecord {
    let base = Url::parse(page_url).ok();
    let fields = fill_fields(set, content, base.as_ref());
    PaperRecord {
        identity: identity_for(&fields, page_url, 0),
        fields,
    }
}
