use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use super::{citation_pattern, CitationMapping, CitedDocument, Marker};

// Citation renumbering against a cross-turn registry.
//
// Key invariants:
// - Numbers already in `existing` are never renumbered or reused.
// - A document already shown under number `k` resolves to `k` again.
// - Markers keep their bracket style and separators; only the digits change.
// - Numbers the incoming mapping does not know are left verbatim.

/// Renumbered text plus the registry to persist for the next pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollapseResult<D> {
    pub updated_text: String,
    pub combined_mapping: CitationMapping<D>,
}

/// Renumber citation markers in `answer_text` to the smallest stable numbers.
///
/// `incoming` is keyed by the numbers as they literally appear in the text.
/// The result's mapping is `existing` plus the documents that received a new
/// number; references resolved to an existing number are not re-added.
#[must_use]
pub fn collapse_citations<D: CitedDocument>(
    answer_text: &str,
    existing: &CitationMapping<D>,
    incoming: &CitationMapping<D>,
) -> CollapseResult<D> {
    let mut doc_to_existing: FxHashMap<&str, u32> = FxHashMap::default();
    for (&number, doc) in existing {
        doc_to_existing.entry(doc.document_id()).or_insert(number);
    }

    let mut next_number = existing.keys().max().map_or(1, |max| max + 1);
    let mut old_to_new: FxHashMap<u32, u32> = FxHashMap::default();
    let mut assigned: FxHashMap<&str, u32> = FxHashMap::default();
    let mut combined = existing.clone();

    for (&old_number, doc) in incoming {
        let doc_id = doc.document_id();

        // Already shown under this very number.
        if existing
            .get(&old_number)
            .is_some_and(|shown| shown.document_id() == doc_id)
        {
            old_to_new.insert(old_number, old_number);
            continue;
        }

        let new_number = if let Some(&number) = doc_to_existing.get(doc_id) {
            number
        } else if let Some(&number) = assigned.get(doc_id) {
            number
        } else {
            let number = next_number;
            next_number += 1;
            assigned.insert(doc_id, number);
            combined.insert(number, doc.clone());
            number
        };
        old_to_new.insert(old_number, new_number);
    }

    let updated_text = if old_to_new.is_empty() {
        answer_text.to_owned()
    } else {
        rewrite_markers(answer_text, &old_to_new)
    };

    tracing::trace!(
        renumbered = old_to_new.len(),
        added = combined.len() - existing.len(),
        "collapsed citations"
    );

    CollapseResult {
        updated_text,
        combined_mapping: combined,
    }
}

fn rewrite_markers(text: &str, old_to_new: &FxHashMap<u32, u32>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0usize;
    for caps in citation_pattern().captures_iter(text) {
        let (Some(whole), Some(marker)) = (caps.get(0), Marker::from_captures(&caps)) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        out.push_str(marker.open);
        push_renumbered(&mut out, marker.body, old_to_new);
        out.push_str(marker.close);
        last = whole.end();
    }
    out.push_str(&text[last..]);
    out
}

/// Copy a marker body, swapping each digit run for its new number.
fn push_renumbered(out: &mut String, body: &str, old_to_new: &FxHashMap<u32, u32>) {
    let mut rest = body;
    while let Some(start) = rest.find(|ch: char| ch.is_ascii_digit()) {
        out.push_str(&rest[..start]);
        let digits_len = rest[start..]
            .find(|ch: char| !ch.is_ascii_digit())
            .unwrap_or(rest.len() - start);
        let digits = &rest[start..start + digits_len];
        match digits
            .parse::<u32>()
            .ok()
            .and_then(|old| old_to_new.get(&old))
        {
            Some(new) => {
                let _ = write!(out, "{new}");
            }
            None => out.push_str(digits),
        }
        rest = &rest[start + digits_len..];
    }
    out.push_str(rest);
}
