//! Page content handed in by the rendering environment, and the values
//! strategies pull out of it

use std::borrow::Cow;

use scraper::{ElementRef, Html};

/// Snapshot of one rendered page
#[derive(Debug, Clone)]
pub struct PageContent {
    pub url: String,
    pub html: String,
}

impl PageContent {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    /// Parse the snapshot into an element tree
    pub fn document(&self) -> Html {
        Html::parse_document(&self.html)
    }

    pub fn domain(&self) -> String {
        domain_from_url(&self.url)
    }
}

/// Host of `url`, or an empty string when `url` does not parse
pub fn domain_from_url(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .unwrap_or_default()
}

/// What a strategy runs against
#[derive(Debug, Clone, Copy)]
pub enum Content<'a> {
    Document(&'a Html),
    /// A sub-tree, e.g. one paper item when extracting its fields
    Element(ElementRef<'a>),
    Text(&'a str),
}

impl<'a> Content<'a> {
    /// Raw text view: serialized HTML for trees, the text itself otherwise
    pub fn as_text(&self) -> Cow<'a, str> {
        match *self {
            Content::Document(doc) => Cow::Owned(doc.root_element().html()),
            Content::Element(el) => Cow::Owned(el.html()),
            Content::Text(text) => Cow::Borrowed(text),
        }
    }
}

/// One extracted value.
///
/// Structural strategies hand back element handles; callers decide whether they
/// want the text or an attribute. Pattern strategies hand back strings.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedValue<'a> {
    Node(ElementRef<'a>),
    Text(String),
}

impl<'a> ExtractedValue<'a> {
    /// Trimmed text content of a node, or the string itself
    pub fn text(&self) -> String {
        match self {
            ExtractedValue::Node(el) => el.text().collect::<String>().trim().to_string(),
            ExtractedValue::Text(s) => s.clone(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            ExtractedValue::Node(el) => el.value().attr(name),
            ExtractedValue::Text(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<ElementRef<'a>> {
        match self {
            ExtractedValue::Node(el) => Some(*el),
            ExtractedValue::Text(_) => None,
        }
    }
}

/// Anything whose content can be checked against a validation pattern
pub trait ValidationSubject {
    fn content(&self) -> Cow<'_, str>;
}

impl ValidationSubject for ExtractedValue<'_> {
    fn content(&self) -> Cow<'_, str> {
        match self {
            ExtractedValue::Node(_) => Cow::Owned(self.text()),
            ExtractedValue::Text(s) => Cow::Borrowed(s),
        }
    }
}

impl ValidationSubject for String {
    fn content(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl ValidationSubject for &str {
    fn content(&self) -> Cow<'_, str> {
        Cow::Borrowed(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Selector;

    #[test]
    fn test_domain_from_url() {
        assert_eq!(
            domain_from_url("https://scholar.google.com/scholar?q=x"),
            "scholar.google.com"
        );
        assert_eq!(domain_from_url("HTTPS://Example.ORG/a"), "example.org");
        assert_eq!(domain_from_url("not a url"), "");
        assert_eq!(domain_from_url(""), "");
    }

    #[test]
    fn test_extracted_value_views() {
        let html = Html::parse_document(r#"<a class="pdf" href="/x.pdf">  [PDF] x.org </a>"#);
        let sel = Selector::parse("a.pdf").unwrap();
        let el = html.select(&sel).next().unwrap();

        let node = ExtractedValue::Node(el);
        assert_eq!(node.text(), "[PDF] x.org");
        assert_eq!(node.attr("href"), Some("/x.pdf"));
        assert_eq!(node.content(), "[PDF] x.org");
        assert!(node.as_node().is_some());

        let text = ExtractedValue::Text("plain".to_string());
        assert_eq!(text.attr("href"), None);
        assert_eq!(text.content(), "plain");
    }

    #[test]
    fn test_content_as_text() {
        let html = Html::parse_fragment("<p>hi</p>");
        assert!(Content::Document(&html).as_text().contains("<p>hi</p>"));
        assert_eq!(Content::Text("raw").as_text(), "raw");
    }
}
