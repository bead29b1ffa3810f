use super::*;

fn span(content: &str, snippet: &str) -> (i64, i64) {
    let result = find_snippet_in_content(content, snippet);
    assert!(result.snippet_located, "expected {snippet:?} to be located");
    (result.start_idx, result.end_idx)
}

fn matched_text<'a>(content: &'a str, snippet: &str) -> &'a str {
    let result = find_snippet_in_content(content, snippet);
    let range = result.byte_range(content).expect("located");
    &content[range]
}

// -- exact after normalization --------------------------------------------

#[test]
fn locates_plain_word_next_to_cjk() {
    let content = "Hello, world! 你好世界";
    assert_eq!(span(content, "world"), (7, 11));
    assert_eq!(matched_text(content, "world"), "world");
}

#[test]
fn locates_cjk_text() {
    let content = "Hello, world! 你好世界";
    assert_eq!(span(content, "世界"), (16, 17));
    assert_eq!(matched_text(content, "世界"), "世界");
}

#[test]
fn trailing_punctuation_in_snippet_extends_end() {
    let content = "Hello, world! 你好世界";
    assert_eq!(span(content, "world!"), (7, 12));
}

#[test]
fn leading_bracket_in_snippet_extends_start() {
    let content = "See [note] The answer is 42.";
    assert_eq!(span(content, "] The answer"), (9, 20));
    assert_eq!(matched_text(content, "] The answer"), "] The answer");
}

#[test]
fn ignores_case_and_whitespace_differences() {
    let content = "The   Quick\nBrown fox";
    assert_eq!(span(content, "quick brown"), (6, 16));
}

#[test]
fn html_entities_in_content_are_covered_by_span() {
    let content = "Fish &amp; Chips are great";
    assert_eq!(matched_text(content, "Fish & Chips"), "Fish &amp; Chips");
}

#[test]
fn decomposed_accents_match_precomposed_snippet() {
    let content = "Cafe\u{301} society";
    assert_eq!(span(content, "caf\u{e9}"), (0, 4));
}

#[test]
fn zero_width_chars_do_not_break_matching() {
    let content = "pass\u{200B}word reset";
    assert_eq!(span(content, "password"), (0, 8));
}

#[test]
fn first_occurrence_wins() {
    let content = "echo one, echo two";
    assert_eq!(span(content, "echo"), (0, 3));
}

#[test]
fn exact_match_takes_precedence_over_fuzzy() {
    // "is a test" also aligns fuzzily with "this is a test"; the literal hit wins.
    let content = "this is a test. And yes, is a test.";
    assert_eq!(span(content, "is a test"), (5, 13));
}

// -- fuzzy fallback -----------------------------------------------------------

#[test]
fn reworded_snippet_falls_back_to_fuzzy() {
    let content = "The mitochondria is the powerhouse of the cell, as every student learns.";
    let snippet = "mitochondria are the powerhouse of the cell";
    let result = find_snippet_in_content(content, snippet);
    assert!(result.snippet_located);
    assert!((3..=4).contains(&result.start_idx), "{result:?}");
    assert!((45..=46).contains(&result.end_idx), "{result:?}");
}

#[test]
fn strict_locator_rejects_fuzzy_candidates() {
    let locator = SnippetLocator::new(&SnippetConfig {
        fuzzy_min_score: 100.0,
    });
    let content = "The mitochondria is the powerhouse of the cell.";
    let result = locator.locate(content, "mitochondria are the powerhouse of the cell");
    assert_eq!(result, SnippetMatch::NOT_FOUND);
}

// -- negative results ---------------------------------------------------------

#[test]
fn unrelated_snippet_is_not_located() {
    let content = "The quick brown fox jumps over the lazy dog near the riverbank.";
    let result = find_snippet_in_content(content, "This is a bad snippet");
    assert!(!result.snippet_located);
    assert_eq!((result.start_idx, result.end_idx), (-1, -1));
    assert!(result.char_range().is_none());
    assert!(result.byte_range(content).is_none());
}

#[test]
fn empty_inputs_are_not_located() {
    assert_eq!(find_snippet_in_content("", "x"), SnippetMatch::NOT_FOUND);
    assert_eq!(find_snippet_in_content("x", ""), SnippetMatch::NOT_FOUND);
}

#[test]
fn punctuation_only_snippet_is_not_located() {
    assert_eq!(
        find_snippet_in_content("Some content here.", "?!..."),
        SnippetMatch::NOT_FOUND
    );
}

#[test]
fn serializes_with_wire_field_names() {
    let json = serde_json::to_value(SnippetMatch::NOT_FOUND).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"snippet_located": false, "start_idx": -1, "end_idx": -1})
    );
}
