pub mod json_string;
pub mod think;

pub use json_string::JsonStringDecoder;
pub use think::{
    process_think_token, RedirectorPhase, ThinkRedirectorState, ThinkTokenRedirector,
    HOLDBACK_CHARS,
};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// One incremental unit of model output.
///
/// Each value carries exactly one kind of payload. Upstream chunks that mix
/// several kinds are split with [`DeltaChunk::into_deltas`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    Content(String),
    Reasoning(String),
    ToolCalls(Vec<ToolCallFragment>),
}

/// Partial tool call as streamed by OpenAI-compatible providers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallFragment {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionFragment>,
}

/// Function part of a [`ToolCallFragment`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionFragment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

impl ToolCallFragment {
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.function.as_ref()?.name.as_deref()
    }

    #[must_use]
    pub fn arguments(&self) -> Option<&str> {
        self.function.as_ref()?.arguments.as_deref()
    }
}

/// Chat-completions `delta` object, the JSON form of [`Delta`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallFragment>>,
}

impl DeltaChunk {
    /// Split into single-kind deltas: reasoning, then content, then tool calls.
    /// Empty strings and empty tool-call lists are skipped.
    #[must_use]
    pub fn into_deltas(self) -> SmallVec<[Delta; 1]> {
        let mut deltas = SmallVec::new();
        if let Some(reasoning) = self.reasoning_content.filter(|text| !text.is_empty()) {
            deltas.push(Delta::Reasoning(reasoning));
        }
        if let Some(content) = self.content.filter(|text| !text.is_empty()) {
            deltas.push(Delta::Content(content));
        }
        if let Some(calls) = self.tool_calls.filter(|calls| !calls.is_empty()) {
            deltas.push(Delta::ToolCalls(calls));
        }
        deltas
    }
}

impl From<Delta> for DeltaChunk {
    fn from(delta: Delta) -> Self {
        match delta {
            Delta::Content(text) => Self {
                content: Some(text),
                ..Self::default()
            },
            Delta::Reasoning(text) => Self {
                reasoning_content: Some(text),
                ..Self::default()
            },
            Delta::ToolCalls(calls) => Self {
                tool_calls: Some(calls),
                ..Self::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mixed_chunk_splits_in_stable_order() {
        let chunk: DeltaChunk = serde_json::from_value(json!({
            "content": "visible",
            "reasoning_content": "hidden",
            "tool_calls": [{"index": 0, "id": "call_1", "type": "function",
                            "function": {"name": "search", "arguments": "{}"}}]
        }))
        .unwrap();
        let deltas = chunk.into_deltas();
        assert_eq!(deltas.len(), 3);
        assert_eq!(deltas[0], Delta::Reasoning("hidden".into()));
        assert_eq!(deltas[1], Delta::Content("visible".into()));
        let Delta::ToolCalls(calls) = &deltas[2] else {
            panic!("expected tool calls, got {:?}", deltas[2]);
        };
        assert_eq!(calls[0].name(), Some("search"));
        assert_eq!(calls[0].arguments(), Some("{}"));
        assert_eq!(calls[0].type_.as_deref(), Some("function"));
    }

    #[test]
    fn empty_fields_produce_no_deltas() {
        let chunk: DeltaChunk =
            serde_json::from_value(json!({"content": "", "tool_calls": []})).unwrap();
        assert!(chunk.into_deltas().is_empty());
    }

    #[test]
    fn delta_serializes_to_single_field() {
        let json = serde_json::to_value(DeltaChunk::from(Delta::Reasoning("r".into()))).unwrap();
        assert_eq!(json, json!({"reasoning_content": "r"}));

        let fragment = ToolCallFragment {
            index: 2,
            function: Some(FunctionFragment {
                name: None,
                arguments: Some("x".into()),
            }),
            ..ToolCallFragment::default()
        };
        let json = serde_json::to_value(DeltaChunk::from(Delta::ToolCalls(vec![fragment]))).unwrap();
        assert_eq!(
            json,
            json!({"tool_calls": [{"index": 2, "function": {"arguments": "x"}}]})
        );
    }
}
