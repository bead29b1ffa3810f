use serde::{Deserialize, Serialize};
use std::ops::{Range, RangeInclusive};

use crate::config::SnippetConfig;
use crate::fuzzy::partial_ratio_alignment;
use crate::normalize::normalize_with_mapping;

// Grounds a model-quoted snippet in its source document.
//
// Two phases, first hit wins:
// 1. Exact match after normalization, mapped back through the position map.
// 2. Partial-ratio fuzzy alignment over the raw texts, accepted only above
//    the configured score.
//
// Key invariants:
// - Returned indices are inclusive char indices into the original content.
// - When the normalized snippet occurs literally, the leftmost occurrence is
//   returned and the fuzzy phase never runs.
// - "Not located" is a value (`-1`/`-1`), never an error.

/// Where a snippet was found in the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetMatch {
    pub snippet_located: bool,
    pub start_idx: i64,
    pub end_idx: i64,
}

impl SnippetMatch {
    pub const NOT_FOUND: SnippetMatch = SnippetMatch {
        snippet_located: false,
        start_idx: -1,
        end_idx: -1,
    };

    fn located(start: usize, end: usize) -> Self {
        Self {
            snippet_located: true,
            start_idx: i64::try_from(start).unwrap_or(i64::MAX),
            end_idx: i64::try_from(end).unwrap_or(i64::MAX),
        }
    }

    /// Inclusive char range of the match, if located.
    #[must_use]
    pub fn char_range(&self) -> Option<RangeInclusive<usize>> {
        if !self.snippet_located {
            return None;
        }
        let start = usize::try_from(self.start_idx).ok()?;
        let end = usize::try_from(self.end_idx).ok()?;
        (start <= end).then_some(start..=end)
    }

    /// Half-open UTF-8 byte range of the match in `content`, for slicing.
    #[must_use]
    pub fn byte_range(&self, content: &str) -> Option<Range<usize>> {
        let chars = self.char_range()?;
        let mut indices = content.char_indices().map(|(byte, _)| byte);
        let start = indices.nth(*chars.start())?;
        let end = indices
            .nth(chars.end() - chars.start())
            .unwrap_or(content.len());
        Some(start..end)
    }
}

/// Locates LLM-quoted snippets inside fetched documents.
#[derive(Debug, Clone)]
pub struct SnippetLocator {
    fuzzy_min_score: f64,
}

impl Default for SnippetLocator {
    fn default() -> Self {
        Self::new(&SnippetConfig::default())
    }
}

impl SnippetLocator {
    #[must_use]
    pub fn new(config: &SnippetConfig) -> Self {
        Self {
            fuzzy_min_score: config.fuzzy_min_score,
        }
    }

    /// Find where `snippet` lives in `content`.
    #[must_use]
    pub fn locate(&self, content: &str, snippet: &str) -> SnippetMatch {
        if content.is_empty() || snippet.is_empty() {
            return SnippetMatch::NOT_FOUND;
        }

        if let Some((start, end)) = normalize_and_match(content, snippet) {
            tracing::trace!(start, end, "snippet located by normalized match");
            return SnippetMatch::located(start, end);
        }

        if let Some((start, end)) = token_based_match(content, snippet, self.fuzzy_min_score) {
            return SnippetMatch::located(start, end);
        }

        SnippetMatch::NOT_FOUND
    }
}

/// Locate `snippet` in `content` with the default settings.
#[must_use]
pub fn find_snippet_in_content(content: &str, snippet: &str) -> SnippetMatch {
    SnippetLocator::default().locate(content, snippet)
}

fn normalize_and_match(content: &str, snippet: &str) -> Option<(usize, usize)> {
    let norm_content = normalize_with_mapping(content);
    let norm_snippet = normalize_with_mapping(snippet);
    if norm_content.is_empty() || norm_snippet.is_empty() {
        return None;
    }

    let pos = norm_content.find(&norm_snippet)?;
    let last = pos + norm_snippet.char_len() - 1;
    let content_last = content.chars().count() - 1;

    let mut start = norm_content.original_index(pos)?;
    let mut end = norm_content.original_end_inclusive(last)?;

    // The model often echoes a bracket or punctuation that normalization
    // stripped from the snippet; widen the span by the same amount.
    let leading_stripped = norm_snippet.original_index(0)?;
    start = start.saturating_sub(leading_stripped);

    let snippet_last = snippet.chars().count() - 1;
    let snippet_last_used = norm_snippet.original_end_inclusive(norm_snippet.char_len() - 1)?;
    let trailing_stripped = snippet_last.saturating_sub(snippet_last_used);
    end = (end + trailing_stripped).min(content_last);

    Some((start, end))
}

fn token_based_match(content: &str, snippet: &str, min_score: f64) -> Option<(usize, usize)> {
    let alignment = partial_ratio_alignment(content, snippet, 0.0)?;
    tracing::debug!(
        score = alignment.score,
        min_score,
        "snippet fell back to fuzzy alignment"
    );
    if alignment.score < min_score || alignment.src_end == 0 {
        return None;
    }
    Some((alignment.src_start, alignment.src_end - 1))
}

#[cfg(test)]
#[path = "snippet_tests.rs"]
mod tests;
