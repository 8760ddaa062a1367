//! Plain-text extraction from raw HTML
//!
//! The document is walked once. Elements matching a boilerplate selector are
//! dropped together with their subtree, block-level elements end the current
//! paragraph and whitespace inside a paragraph collapses to single spaces.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use serde_json::Value;
use tracing::{debug, warn};

use crate::processor::error::ProcessError;

/// Elements whose contents are never page text
const ALWAYS_SKIPPED: &[&str] = &[
    "head", "script", "style", "noscript", "template", "svg", "canvas", "iframe",
];

/// Elements that start and end a paragraph
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "blockquote", "body", "br", "dd", "details", "div", "dl", "dt",
    "figcaption", "figure", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "html", "li", "main",
    "ol", "p", "pre", "section", "summary", "table", "td", "th", "tr", "ul",
];

/// Keys of a Next.js data blob that hold page copy
const NEXT_DATA_TEXT_KEYS: &[&str] = &["paragraph", "body", "content"];

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid title selector"));
static OG_TITLE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[property="og:title"]"#).expect("valid og:title selector")
});
static DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[name="description"]"#).expect("valid description selector")
});
static NEXT_DATA: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script#__NEXT_DATA__").expect("valid __NEXT_DATA__ selector"));
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));

/// Text and metadata extracted from one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPage {
    /// `og:title`, or the document title
    pub title: Option<String>,

    /// `meta[name=description]` content
    pub description: Option<String>,

    /// Whitespace-normalised paragraphs in document order
    pub paragraphs: Vec<String>,
}

impl ExtractedPage {
    /// The page text, paragraphs separated by blank lines
    pub fn text(&self) -> String {
        self.paragraphs.join("\n\n")
    }
}

/// Extracts page text while skipping boilerplate regions
#[derive(Debug)]
pub struct ContentExtractor {
    exclude: Vec<Selector>,
}

impl ContentExtractor {
    /// Compile the boilerplate selectors; invalid selectors are logged and ignored
    pub fn new(exclude_selectors: &[String]) -> Self {
        let exclude = exclude_selectors
            .iter()
            .filter_map(|selector| match Selector::parse(selector) {
                Ok(selector) => Some(selector),
                Err(e) => {
                    warn!("Failed to parse selector '{}': {}", selector, e);
                    None
                }
            })
            .collect();
        Self { exclude }
    }

    /// Extract title, description and paragraphs from an HTML document
    ///
    /// When the visible document has no text but carries a `__NEXT_DATA__`
    /// blob, the copy stored in that blob is used instead. A blob that is not
    /// valid JSON is a `ProcessError::Parse`.
    pub fn extract(&self, html: &str) -> Result<ExtractedPage, ProcessError> {
        let document = Html::parse_document(html);

        let mut collector = ParagraphCollector::default();
        self.walk(document.root_element(), &mut collector);
        let mut paragraphs = collector.finish();

        if paragraphs.is_empty() {
            if let Some(script) = document.select(&NEXT_DATA).next() {
                debug!("No visible text, falling back to __NEXT_DATA__");
                paragraphs = next_data_paragraphs(&script.text().collect::<String>())?;
            }
        }

        Ok(ExtractedPage {
            title: extract_title(&document),
            description: attr_content(&document, &DESCRIPTION),
            paragraphs,
        })
    }

    fn walk(&self, element: ElementRef<'_>, collector: &mut ParagraphCollector) {
        let name = element.value().name();
        if ALWAYS_SKIPPED.contains(&name) || self.exclude.iter().any(|s| s.matches(&element)) {
            return;
        }

        let block = BLOCK_ELEMENTS.contains(&name);
        if block {
            collector.break_paragraph();
        }

        for child in element.children() {
            match child.value() {
                Node::Text(text) => collector.push(text),
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        self.walk(child, collector);
                    }
                }
                _ => {}
            }
        }

        if block {
            collector.break_paragraph();
        }
    }
}

#[derive(Default)]
struct ParagraphCollector {
    current: String,
    paragraphs: Vec<String>,
}

impl ParagraphCollector {
    fn push(&mut self, text: &str) {
        self.current.push_str(text);
    }

    fn break_paragraph(&mut self) {
        let paragraph = normalize_whitespace(&self.current);
        if !paragraph.is_empty() {
            self.paragraphs.push(paragraph);
        }
        self.current.clear();
    }

    fn finish(mut self) -> Vec<String> {
        self.break_paragraph();
        self.paragraphs
    }
}

/// Collapse every whitespace run to one space and trim the ends
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn extract_title(document: &Html) -> Option<String> {
    attr_content(document, &OG_TITLE).or_else(|| {
        document
            .select(&TITLE)
            .next()
            .map(|title| normalize_whitespace(&title.text().collect::<String>()))
            .filter(|title| !title.is_empty())
    })
}

fn attr_content(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .and_then(|element| element.value().attr("content"))
        .map(normalize_whitespace)
        .filter(|content| !content.is_empty())
}

fn next_data_paragraphs(blob: &str) -> Result<Vec<String>, ProcessError> {
    let data: Value = serde_json::from_str(blob)
        .map_err(|e| ProcessError::Parse(format!("Invalid __NEXT_DATA__ payload: {}", e)))?;

    let mut raw = Vec::new();
    collect_text_values(&data, false, &mut raw);

    Ok(raw
        .into_iter()
        .map(|text| normalize_whitespace(&TAG.replace_all(text, "")))
        .filter(|text| !text.is_empty())
        .collect())
}

fn collect_text_values<'a>(value: &'a Value, under_text_key: bool, out: &mut Vec<&'a str>) {
    match value {
        Value::String(text) if under_text_key => out.push(text),
        Value::Array(items) => {
            for item in items {
                collect_text_values(item, under_text_key, out);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                collect_text_values(item, NEXT_DATA_TEXT_KEYS.contains(&key.as_str()), out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::ProcessorConfig;

    fn extractor() -> ContentExtractor {
        ContentExtractor::new(&ProcessorConfig::default().exclude_selectors)
    }

    #[test]
    fn test_strips_footer_boilerplate() {
        let page = extractor()
            .extract("<p>We build tools.</p><footer>copyright</footer>")
            .unwrap();
        assert_eq!(page.paragraphs, vec!["We build tools."]);
    }

    #[test]
    fn test_paragraphs_and_inline_text() {
        let html = r#"
            <html><head><title>About  us</title><style>p { color: red }</style></head>
            <body>
              <nav><a href="/">Home</a></nav>
              <h1>About</h1>
              <p>We   <b>build</b>
                 tools.</p>
              <div class="sidebar">Related posts</div>
              <ul><li>Fast</li><li>Reliable</li></ul>
              <script>var x = 1;</script>
            </body></html>"#;

        let page = extractor().extract(html).unwrap();
        assert_eq!(page.title.as_deref(), Some("About us"));
        assert_eq!(page.paragraphs, vec!["About", "We build tools.", "Fast", "Reliable"]);
        assert_eq!(page.text(), "About\n\nWe build tools.\n\nFast\n\nReliable");
    }

    #[test]
    fn test_metadata() {
        let html = r#"<html><head>
            <title>Fallback</title>
            <meta property="og:title" content="Acme | About">
            <meta name="description" content=" Tools for teams. ">
            </head><body><p>Text</p></body></html>"#;

        let page = extractor().extract(html).unwrap();
        assert_eq!(page.title.as_deref(), Some("Acme | About"));
        assert_eq!(page.description.as_deref(), Some("Tools for teams."));
    }

    #[test]
    fn test_whitespace_only_document() {
        let page = extractor().extract("  \n\t ").unwrap();
        assert!(page.paragraphs.is_empty());
        assert!(page.title.is_none());
    }

    #[test]
    fn test_next_data_fallback() {
        let html = r#"<html><body><div id="__next"></div>
            <script id="__NEXT_DATA__" type="application/json">
            {"props":{"pageProps":{"title":"ignored","blocks":[
                {"paragraph":"<p>Design at <strong>scale</strong>.</p>"},
                {"body":"Second block","meta":{"content":"Third"}}
            ]}}}
            </script></body></html>"#;

        let page = extractor().extract(html).unwrap();
        assert_eq!(page.paragraphs, vec!["Design at scale.", "Second block", "Third"]);
    }

    #[test]
    fn test_invalid_next_data_is_parse_error() {
        let html = r#"<html><body><script id="__NEXT_DATA__">{not json</script></body></html>"#;
        let result = extractor().extract(html);
        assert!(matches!(result, Err(ProcessError::Parse(_))));
    }

    #[test]
    fn test_invalid_selector_is_ignored() {
        let extractor = ContentExtractor::new(&["[[[".to_string(), "footer".to_string()]);
        let page = extractor.extract("<p>Kept</p><footer>Dropped</footer>").unwrap();
        assert_eq!(page.paragraphs, vec!["Kept"]);
    }
}
