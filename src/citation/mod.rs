pub mod collapse;
pub mod processor;

pub use collapse::{collapse_citations, CollapseResult};
pub use processor::{CitationEvent, CitationInfo, CitationProcessor};

use indexmap::IndexMap;
use regex_lite::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Citation number -> document, iterated in insertion order.
///
/// Order matters: new numbers are handed out in the order documents were
/// first cited, not by the numbers they were cited under.
pub type CitationMapping<D = SearchDoc> = IndexMap<u32, D>;

/// A document that citation markers can point at.
///
/// Identity is the document id: two values with the same id are the same
/// source, whatever their titles or links say.
pub trait CitedDocument: Clone {
    fn document_id(&self) -> &str;

    /// Link rendered into hyperlinked citations.
    fn link(&self) -> Option<&str> {
        None
    }
}

/// Minimal search result as handed over by the retrieval layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDoc {
    pub document_id: String,
    #[serde(default)]
    pub semantic_identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl SearchDoc {
    #[must_use]
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            semantic_identifier: String::new(),
            link: None,
        }
    }

    #[must_use]
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.semantic_identifier = title.into();
        self
    }
}

impl CitedDocument for SearchDoc {
    fn document_id(&self) -> &str {
        &self.document_id
    }

    fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }
}

/// Complete markers: `[[1]]`-style doubles (groups 1-3) or `[1]` / `[1, 2]`
/// singles (groups 4-6). Full-width `【】` and `［］` brackets are accepted.
static CITATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([\[【［]{2})(\d+)([\]】］]{2})|([\[【［])(\d+(?:, ?\d+)*)([\]】］])")
        .expect("citation pattern is hardcoded and must be valid")
});

/// A marker that may still be completed by the next token: `[`, `[[1`, `[1, `.
static POSSIBLE_CITATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\[【［]+(?:\d+,? ?)*$")
        .expect("partial citation pattern is hardcoded and must be valid")
});

pub(crate) fn citation_pattern() -> &'static Regex {
    &CITATION_PATTERN
}

pub(crate) fn ends_with_possible_citation(text: &str) -> bool {
    POSSIBLE_CITATION_PATTERN.is_match(text)
}

/// Bracket and number parts of one matched marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Marker<'t> {
    pub open: &'t str,
    pub body: &'t str,
    pub close: &'t str,
}

impl<'t> Marker<'t> {
    pub fn from_captures(caps: &Captures<'t>) -> Option<Self> {
        let (open, body, close) = if caps.get(2).is_some() {
            (caps.get(1)?, caps.get(2)?, caps.get(3)?)
        } else {
            (caps.get(4)?, caps.get(5)?, caps.get(6)?)
        };
        Some(Self {
            open: open.as_str(),
            body: body.as_str(),
            close: close.as_str(),
        })
    }

    /// Comma-separated entries of the marker, trimmed, empties skipped.
    pub fn entries(&self) -> impl Iterator<Item = &'t str> {
        self.body
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
    }
}
