use serde_json::json;

use stream_align::citation::{
    collapse_citations, CitationEvent, CitationMapping, CitationProcessor, SearchDoc,
};
use stream_align::config::CitationMode;
use stream_align::normalize::normalize_with_mapping;
use stream_align::snippet::{find_snippet_in_content, SnippetMatch};
use stream_align::stream::{
    Delta, DeltaChunk, FunctionFragment, ThinkTokenRedirector, ToolCallFragment,
};

fn docs(entries: &[(u32, &str)]) -> CitationMapping {
    entries
        .iter()
        .map(|(n, id)| (*n, SearchDoc::new(*id)))
        .collect()
}

fn think_args(id: Option<&str>, name: Option<&str>, arguments: &str) -> Delta {
    Delta::ToolCalls(vec![ToolCallFragment {
        index: 0,
        id: id.map(str::to_string),
        type_: id.map(|_| "function".to_string()),
        function: Some(FunctionFragment {
            name: name.map(str::to_string),
            arguments: Some(arguments.to_string()),
        }),
    }])
}

// ---------------------------------------------------------------------------
// Citation collapsing across turns
// ---------------------------------------------------------------------------

#[test]
fn collapse_reuses_numbers_for_known_documents() {
    let existing = docs(&[(1, "docA")]);
    let incoming = docs(&[(1, "docB"), (2, "docA")]);

    let result = collapse_citations("See [1] and [2]", &existing, &incoming);

    assert_eq!(result.updated_text, "See [2] and [1]");
    assert_eq!(result.combined_mapping, docs(&[(1, "docA"), (2, "docB")]));
}

#[test]
fn collapse_numbering_is_stable_over_a_conversation() {
    let turn_one = collapse_citations("Intro [3] [7]", &CitationMapping::new(), &docs(&[(3, "a"), (7, "b")]));
    assert_eq!(turn_one.updated_text, "Intro [1] [2]");

    let turn_two = collapse_citations(
        "Later [1], [2] and [3]",
        &turn_one.combined_mapping,
        &docs(&[(1, "b"), (2, "c"), (3, "a")]),
    );
    assert_eq!(turn_two.updated_text, "Later [2], [3] and [1]");
    assert_eq!(turn_two.combined_mapping, docs(&[(1, "a"), (2, "b"), (3, "c")]));

    // Nothing in turn one's numbering moved.
    for (number, doc) in &turn_one.combined_mapping {
        assert_eq!(turn_two.combined_mapping.get(number), Some(doc));
    }
}

#[test]
fn collapse_is_idempotent() {
    let existing = docs(&[(1, "docA")]);
    let incoming = docs(&[(4, "docC"), (5, "docA")]);
    let first = collapse_citations("x [4] y [[5]] z 【4, 5】", &existing, &incoming);

    let second = collapse_citations(&first.updated_text, &first.combined_mapping, &first.combined_mapping);
    assert_eq!(second.updated_text, first.updated_text);
    assert_eq!(second.combined_mapping, first.combined_mapping);
}

#[test]
fn collapse_result_serializes_with_string_keys() {
    let result = collapse_citations("[9]", &CitationMapping::new(), &docs(&[(9, "d9")]));
    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["updated_text"], "[1]");
    assert_eq!(value["combined_mapping"]["1"]["document_id"], "d9");
}

// ---------------------------------------------------------------------------
// Snippet location
// ---------------------------------------------------------------------------

#[test]
fn snippet_in_mixed_script_content_is_bounded_exactly() {
    let content = "Hello, world! 你好世界";
    let found = find_snippet_in_content(content, "world");

    assert!(found.snippet_located);
    assert_eq!((found.start_idx, found.end_idx), (7, 11));
    let range = found.byte_range(content).unwrap();
    assert_eq!(&content[range], "world");

    let found = find_snippet_in_content(content, "你好");
    assert_eq!((found.start_idx, found.end_idx), (14, 15));
}

#[test]
fn unrelated_snippet_is_not_located() {
    let content = "Rust compiles to fast native code without a garbage collector.";
    let found = find_snippet_in_content(content, "This is a bad snippet");
    assert_eq!(found, SnippetMatch::NOT_FOUND);
    assert_eq!(
        serde_json::to_value(found).unwrap(),
        json!({"snippet_located": false, "start_idx": -1, "end_idx": -1})
    );
}

#[test]
fn exact_match_returns_leftmost_occurrence() {
    let content = "alpha beta gamma. ALPHA  BETA gamma.";
    let found = find_snippet_in_content(content, "Alpha Beta");
    assert_eq!((found.start_idx, found.end_idx), (0, 9));
}

#[test]
fn position_map_points_into_original_text() {
    let content = "Caf\u{301}\u{200B} &amp;  Na\u{ef}ve \u{201C}quote\u{201D}";
    let original_len = content.chars().count();
    let normalized = normalize_with_mapping(content);

    assert_eq!(normalized.map.len(), normalized.text.chars().count());
    assert!(normalized.map.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(normalized.map.iter().all(|&idx| idx < original_len));
}

// ---------------------------------------------------------------------------
// Think-tool redirection
// ---------------------------------------------------------------------------

#[test]
fn think_tool_arguments_stream_as_reasoning() {
    let mut redirector = ThinkTokenRedirector::default();
    let mut reasoning = Vec::new();

    for delta in [
        think_args(Some("call_1"), Some("think_tool"), "{\"reasoning\": \""),
        think_args(None, None, "I think "),
        think_args(None, None, "X is true\"}"),
    ] {
        match redirector.process(Some(delta)) {
            Some(Delta::Reasoning(text)) => reasoning.push(text),
            None => {}
            other => panic!("unexpected delta {other:?}"),
        }
        assert!(redirector.state().working_buffer().chars().count() <= 2);
    }

    assert_eq!(reasoning.concat(), "I think X is true");
    assert!(reasoning.iter().all(|text| !text.contains('"') && !text.contains('}')));

    let Some(Delta::ToolCalls(calls)) = redirector.process(None) else {
        panic!("flush must rebuild the tool call");
    };
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].id.as_deref(), Some("call_1"));
    assert_eq!(calls[0].name(), Some("think_tool"));
    assert_eq!(calls[0].arguments(), Some("{\"reasoning\": \"I think X is true\"}"));
}

#[test]
fn redirected_stream_round_trips_through_wire_chunks() {
    let mut redirector = ThinkTokenRedirector::default();
    let chunks = [
        json!({"content": "Let me check."}),
        json!({"tool_calls": [{"index": 0, "id": "call_9", "type": "function",
                               "function": {"name": "think_tool", "arguments": "{\"reasoning\":\""}}]}),
        json!({"tool_calls": [{"index": 0, "function": {"arguments": "line\\none\"}"}}]}),
    ];

    let mut out = Vec::new();
    for chunk in chunks {
        let chunk: DeltaChunk = serde_json::from_value(chunk).unwrap();
        for delta in chunk.into_deltas() {
            out.extend(redirector.process(Some(delta)));
        }
    }
    out.extend(redirector.process(None));

    let wire: Vec<serde_json::Value> = out
        .into_iter()
        .map(|delta| serde_json::to_value(DeltaChunk::from(delta)).unwrap())
        .collect();
    assert_eq!(wire[0], json!({"content": "Let me check."}));
    let reasoning: String = wire[1..wire.len() - 1]
        .iter()
        .map(|chunk| chunk["reasoning_content"].as_str().unwrap_or_default())
        .collect();
    assert_eq!(reasoning, "line\none");
    assert_eq!(
        wire[wire.len() - 1]["tool_calls"][0]["function"]["arguments"],
        "{\"reasoning\":\"line\\none\"}"
    );
}

// ---------------------------------------------------------------------------
// Streaming citations
// ---------------------------------------------------------------------------

#[test]
fn streamed_citations_match_collapsed_numbering() {
    let mut processor: CitationProcessor = CitationProcessor::new(CitationMode::KeepMarkers);
    processor.update_mapping(docs(&[(1, "a"), (2, "b")]), false);

    let mut events = Vec::new();
    for token in ["Fact [", "2", "] and [1", "]."] {
        processor.process_token_into(Some(token), &mut events);
    }
    processor.process_token_into(None, &mut events);

    let text: String = events
        .iter()
        .filter_map(|event| match event {
            CitationEvent::Text { text } => Some(text.as_str()),
            CitationEvent::Citation(_) => None,
        })
        .collect();
    assert_eq!(text, "Fact [2] and [1].");
    assert_eq!(processor.seen_citations().len(), 2);
}

#[test]
fn streamed_answer_collapses_in_reading_order() {
    let mut processor: CitationProcessor = CitationProcessor::new(CitationMode::KeepMarkers);
    processor.update_mapping(docs(&[(3, "docB"), (7, "docA")]), false);

    let mut events = Vec::new();
    for token in ["First [7] then ", "[3]."] {
        processor.process_token_into(Some(token), &mut events);
    }
    processor.process_token_into(None, &mut events);
    let text: String = events
        .iter()
        .filter_map(|event| match event {
            CitationEvent::Text { text } => Some(text.as_str()),
            CitationEvent::Citation(_) => None,
        })
        .collect();

    let result = collapse_citations(&text, &CitationMapping::new(), processor.seen_citations());
    assert_eq!(result.updated_text, "First [1] then [2].");
    assert_eq!(result.combined_mapping, docs(&[(1, "docA"), (2, "docB")]));
}
