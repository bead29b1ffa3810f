use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::{
    citation_pattern, ends_with_possible_citation, CitationMapping, CitedDocument, Marker,
    SearchDoc,
};
use crate::config::{CitationConfig, CitationMode};

// Streaming citation processor.
//
// Consumes answer text token by token and rewrites bracketed citation markers
// as they complete, according to the configured `CitationMode`.
//
// Key invariants:
// - A partial marker at the end of the buffered segment (`[`, `[[1`, `[1, `)
//   is held back until the next token resolves it.
// - Markers inside a fenced code block are never touched.
// - Every resolved number lands in `seen_citations`, whatever the mode.
// - Text from the stop pattern onward is never emitted.

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// First citation of a document, reported ahead of its rendered marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationInfo {
    pub citation_number: u32,
    pub document_id: String,
}

/// Output of [`CitationProcessor::process_token`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CitationEvent {
    /// Text safe to display.
    Text { text: String },
    /// A document cited for the first time (hyperlink mode only).
    Citation(CitationInfo),
}

const CODE_FENCE: &str = "```";
/// Non-citation chars after which a document may be announced again.
const RECENT_CITATION_WINDOW: usize = 5;
/// Following chars that absorb the space left by a removed marker.
const REMOVED_MARKER_ABSORBERS: &str = ".,;:!?)]}";

#[inline]
fn in_code_block(text: &str) -> bool {
    memchr::memmem::find_iter(text.as_bytes(), CODE_FENCE.as_bytes()).count() % 2 == 1
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

/// Streaming citation rewriter with a dynamic number -> document mapping.
#[derive(Debug, Clone)]
pub struct CitationProcessor<D = SearchDoc> {
    mode: CitationMode,
    stop_pattern: Option<String>,
    citation_to_doc: CitationMapping<D>,
    seen_citations: CitationMapping<D>,
    /// Everything accepted so far, before rewriting.
    llm_out: String,
    /// Text held for citation processing.
    curr_segment: String,
    /// Text held while it could still be the start of the stop pattern.
    hold: String,
    stopped: bool,
    cited_documents: Vec<D>,
    cited_document_ids: FxHashSet<String>,
    recent_cited_documents: FxHashSet<String>,
    non_citation_count: usize,
}

impl<D: CitedDocument> Default for CitationProcessor<D> {
    fn default() -> Self {
        Self::new(CitationMode::default())
    }
}

impl<D: CitedDocument> CitationProcessor<D> {
    #[must_use]
    pub fn new(mode: CitationMode) -> Self {
        Self {
            mode,
            stop_pattern: None,
            citation_to_doc: CitationMapping::new(),
            seen_citations: CitationMapping::new(),
            llm_out: String::new(),
            curr_segment: String::new(),
            hold: String::new(),
            stopped: false,
            cited_documents: Vec::new(),
            cited_document_ids: FxHashSet::default(),
            recent_cited_documents: FxHashSet::default(),
            non_citation_count: 0,
        }
    }

    #[must_use]
    pub fn from_config(config: &CitationConfig) -> Self {
        Self::new(config.mode).with_stop_pattern(config.stop_pattern.clone())
    }

    /// Discard everything from `pattern` onward. Empty patterns are ignored.
    #[must_use]
    pub fn with_stop_pattern(mut self, pattern: Option<String>) -> Self {
        self.stop_pattern = pattern.filter(|p| !p.is_empty());
        self
    }

    #[must_use]
    pub fn mode(&self) -> CitationMode {
        self.mode
    }

    /// Merge `mapping` into the known citations.
    ///
    /// Without `overwrite`, numbers that are already mapped keep their
    /// document, so a later tool reusing a number cannot steal it.
    pub fn update_mapping(&mut self, mapping: CitationMapping<D>, overwrite: bool) {
        for (number, doc) in mapping {
            if overwrite {
                self.citation_to_doc.insert(number, doc);
            } else {
                self.citation_to_doc.entry(number).or_insert(doc);
            }
        }
    }

    /// Smallest number above every mapped citation.
    #[must_use]
    pub fn next_citation_number(&self) -> u32 {
        self.citation_to_doc
            .keys()
            .max()
            .map_or(1, |max| max + 1)
    }

    /// Documents in first-cited order (hyperlink mode only).
    #[must_use]
    pub fn cited_documents(&self) -> &[D] {
        &self.cited_documents
    }

    #[must_use]
    pub fn cited_document_ids(&self) -> Vec<&str> {
        self.cited_documents
            .iter()
            .map(CitedDocument::document_id)
            .collect()
    }

    #[must_use]
    pub fn num_cited_documents(&self) -> usize {
        self.cited_document_ids.len()
    }

    /// Every resolved citation keyed by the number it appeared under, in
    /// first-seen order.
    #[must_use]
    pub fn seen_citations(&self) -> &CitationMapping<D> {
        &self.seen_citations
    }

    /// Allow recently announced documents to be announced again.
    pub fn reset_recent_citations(&mut self) {
        self.recent_cited_documents.clear();
    }

    /// Feed one token; `None` ends the stream and flushes held text.
    pub fn process_token(&mut self, token: Option<&str>) -> Vec<CitationEvent> {
        let mut out = Vec::new();
        self.process_token_into(token, &mut out);
        out
    }

    /// Like [`Self::process_token`], appending into a caller-owned buffer.
    pub fn process_token_into(&mut self, token: Option<&str>, out: &mut Vec<CitationEvent>) {
        let Some(token) = token else {
            self.flush(out);
            return;
        };
        if self.stopped {
            return;
        }

        let token = match self.screen_stop_pattern(token) {
            Some(token) => token,
            None => return,
        };

        self.curr_segment.push_str(&token);
        self.llm_out.push_str(&token);
        self.tag_bare_code_fence();

        let possible_citation = ends_with_possible_citation(&self.curr_segment);
        if !in_code_block(&self.llm_out) {
            self.rewrite_complete_markers(out);
        }

        if !possible_citation && !self.curr_segment.is_empty() {
            let text = std::mem::take(&mut self.curr_segment);
            self.non_citation_count += text.chars().count();
            out.push(CitationEvent::Text { text });
        }
    }

    fn flush(&mut self, out: &mut Vec<CitationEvent>) {
        let mut text = std::mem::take(&mut self.curr_segment);
        // A held stop-pattern prefix that never completed is ordinary text.
        if !self.stopped {
            text.push_str(&std::mem::take(&mut self.hold));
        }
        if !text.is_empty() {
            out.push(CitationEvent::Text { text });
        }
    }

    /// Returns the text to process, or `None` when it is held or discarded.
    fn screen_stop_pattern(&mut self, token: &str) -> Option<String> {
        let Some(stop) = self.stop_pattern.as_deref() else {
            return Some(token.to_owned());
        };

        let mut next_hold = std::mem::take(&mut self.hold);
        next_hold.push_str(token);

        if let Some(pos) = next_hold.find(stop) {
            tracing::debug!("stop pattern reached; discarding the rest of the stream");
            self.stopped = true;
            next_hold.truncate(pos);
            return (!next_hold.is_empty()).then_some(next_hold);
        }
        if stop.starts_with(next_hold.as_str()) {
            self.hold = next_hold;
            return None;
        }
        Some(next_hold)
    }

    /// A fence opened without a language renders as plain text.
    fn tag_bare_code_fence(&mut self) {
        let segment = &self.curr_segment;
        if !segment.contains('`') || segment.ends_with('`') {
            return;
        }
        let opens_bare = segment
            .split(CODE_FENCE)
            .nth(1)
            .is_some_and(|after| after.starts_with('\n'));
        if opens_bare && in_code_block(&self.llm_out) {
            self.curr_segment = segment.replace(CODE_FENCE, "```plaintext");
        }
    }

    fn rewrite_complete_markers(&mut self, out: &mut Vec<CitationEvent>) {
        let segment = std::mem::take(&mut self.curr_segment);
        let segment_start = self.llm_out.len().saturating_sub(segment.len());
        let mut match_idx = 0usize;
        let mut matched_any = false;

        for caps in citation_pattern().captures_iter(&segment) {
            let (Some(whole), Some(marker)) = (caps.get(0), Marker::from_captures(&caps)) else {
                continue;
            };
            let mut intermatch = &segment[match_idx..whole.start()];
            self.non_citation_count += intermatch.chars().count();

            let has_leading_space = match intermatch.chars().next_back() {
                Some(ch) => ch.is_whitespace(),
                // Back-to-back markers render without a separating space.
                None if matched_any => true,
                None => self
                    .llm_out
                    .get(..segment_start)
                    .and_then(|before| before.chars().next_back())
                    .is_some_and(char::is_whitespace),
            };

            if self.non_citation_count > RECENT_CITATION_WINDOW {
                self.recent_cited_documents.clear();
            }

            let (rendered, infos) = self.resolve_marker(&marker, has_leading_space);

            match self.mode {
                CitationMode::Hyperlink => {
                    push_text(out, intermatch);
                    out.extend(infos.into_iter().map(CitationEvent::Citation));
                    push_text(out, &rendered);
                }
                CitationMode::KeepMarkers => {
                    push_text(out, intermatch);
                    push_text(out, whole.as_str());
                }
                CitationMode::Remove => {
                    let remaining = &segment[whole.end()..];
                    let absorbs_space = remaining.chars().next().is_some_and(|ch| {
                        ch.is_whitespace() || REMOVED_MARKER_ABSORBERS.contains(ch)
                    });
                    if absorbs_space && intermatch.ends_with(char::is_whitespace) {
                        intermatch = intermatch.trim_end();
                    }
                    push_text(out, intermatch);
                }
            }

            self.non_citation_count = 0;
            match_idx = whole.end();
            matched_any = true;
        }

        if matched_any {
            self.curr_segment = segment[match_idx..].to_owned();
            self.non_citation_count = self.curr_segment.chars().count();
        } else {
            self.curr_segment = segment;
        }
    }

    /// Track every number in `marker` and render it for hyperlink mode.
    fn resolve_marker(
        &mut self,
        marker: &Marker<'_>,
        has_leading_space: bool,
    ) -> (String, Vec<CitationInfo>) {
        let mut infos = Vec::new();
        let mut parts: Vec<String> = Vec::new();

        for entry in marker.entries() {
            let Ok(number) = entry.parse::<u32>() else {
                tracing::warn!(entry, "invalid citation number");
                continue;
            };
            let Some(doc) = self.citation_to_doc.get(&number).cloned() else {
                tracing::warn!(
                    citation_number = number,
                    known = self.citation_to_doc.len(),
                    "citation number not found in mapping"
                );
                continue;
            };
            self.seen_citations.insert(number, doc.clone());

            if self.mode != CitationMode::Hyperlink {
                continue;
            }
            parts.push(format!("[[{number}]]({})", doc.link().unwrap_or_default()));

            let doc_id = doc.document_id().to_owned();
            if !self.recent_cited_documents.insert(doc_id.clone()) {
                continue;
            }
            if self.cited_document_ids.insert(doc_id.clone()) {
                self.cited_documents.push(doc);
                infos.push(CitationInfo {
                    citation_number: number,
                    document_id: doc_id,
                });
            }
        }

        let mut rendered = parts.join(" ");
        if !rendered.is_empty() && !has_leading_space {
            rendered.insert(0, ' ');
        }
        (rendered, infos)
    }
}

#[inline]
fn push_text(out: &mut Vec<CitationEvent>, text: &str) {
    if !text.is_empty() {
        out.push(CitationEvent::Text {
            text: text.to_owned(),
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
