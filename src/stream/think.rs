use rustc_hash::FxHashMap;

use super::json_string::JsonStringDecoder;
use super::{Delta, FunctionFragment, ToolCallFragment};
use crate::config::ThinkRedirectorConfig;

// Think-token redirector.
//
// Watches a delta stream for the "think" tool call and re-emits its
// `reasoning` argument as reasoning deltas while it streams, so models
// without native reasoning output can still show their chain of thought.
//
// Key invariants:
// - Before the target call is identified every delta passes through untouched.
// - Once identified, everything that is not the target's reasoning is dropped.
// - `working_buffer` never holds more than `HOLDBACK_CHARS` chars between
//   calls, so the closing `"}` of the JSON envelope is never released.
// - The flush emits the target call exactly once, with the verbatim
//   arguments as they arrived.

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Phase of the redirector state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectorPhase {
    /// No target tool call seen yet.
    #[default]
    Idle,
    /// Target identified; waiting for the JSON prefix to complete.
    Accumulating,
    /// Prefix stripped; interior text is released as reasoning.
    Stripped,
    /// Flushed. Further input is ignored.
    Done,
}

/// Tool-call fragments seen before their call was identified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct UnresolvedCall {
    id: Option<String>,
    arguments: String,
}

/// Per-stream state of a [`ThinkTokenRedirector`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThinkRedirectorState {
    phase: RedirectorPhase,
    target_index: Option<u32>,
    target_id: Option<String>,
    /// Raw target arguments, for the reconstructed call.
    full_arguments: String,
    json_prefix_stripped: bool,
    /// Arguments seen while still looking for the prefix.
    parse_buffer: String,
    /// Interior text held back from release.
    working_buffer: String,
    decoder: JsonStringDecoder,
    unresolved: FxHashMap<u32, UnresolvedCall>,
}

impl ThinkRedirectorState {
    #[must_use]
    pub fn phase(&self) -> RedirectorPhase {
        self.phase
    }

    /// Whether the target tool call has been identified.
    #[must_use]
    pub fn found(&self) -> bool {
        self.target_index.is_some()
    }

    #[must_use]
    pub fn target_index(&self) -> Option<u32> {
        self.target_index
    }

    #[must_use]
    pub fn target_id(&self) -> Option<&str> {
        self.target_id.as_deref()
    }

    #[must_use]
    pub fn full_arguments(&self) -> &str {
        &self.full_arguments
    }

    #[must_use]
    pub fn json_prefix_stripped(&self) -> bool {
        self.json_prefix_stripped
    }

    #[must_use]
    pub fn working_buffer(&self) -> &str {
        &self.working_buffer
    }
}

// ---------------------------------------------------------------------------
// Redirector
// ---------------------------------------------------------------------------

/// Chars withheld from every release: the envelope's closing `"}`.
pub const HOLDBACK_CHARS: usize = 2;

/// Streaming state machine turning the think tool's arguments into reasoning.
#[derive(Debug, Clone)]
pub struct ThinkTokenRedirector {
    tool_name: String,
    json_prefixes: Vec<String>,
    state: ThinkRedirectorState,
}

impl Default for ThinkTokenRedirector {
    fn default() -> Self {
        Self::new(&ThinkRedirectorConfig::default())
    }
}

impl ThinkTokenRedirector {
    #[must_use]
    pub fn new(config: &ThinkRedirectorConfig) -> Self {
        Self::with_state(config, ThinkRedirectorState::default())
    }

    /// Resume from a previously extracted state.
    #[must_use]
    pub fn with_state(config: &ThinkRedirectorConfig, state: ThinkRedirectorState) -> Self {
        Self {
            tool_name: config.tool_name.clone(),
            json_prefixes: config.json_prefixes.clone(),
            state,
        }
    }

    #[must_use]
    pub fn state(&self) -> &ThinkRedirectorState {
        &self.state
    }

    #[must_use]
    pub fn into_state(self) -> ThinkRedirectorState {
        self.state
    }

    /// Consume one delta; `None` is the end-of-stream flush.
    ///
    /// Returns the delta to forward, if any.
    pub fn process(&mut self, delta: Option<Delta>) -> Option<Delta> {
        if self.state.phase == RedirectorPhase::Done {
            return None;
        }
        let Some(delta) = delta else {
            return self.flush();
        };

        match delta {
            Delta::ToolCalls(fragments) => self.on_tool_calls(fragments),
            other if self.state.found() => {
                tracing::trace!(?other, "dropping delta while redirecting think tool");
                None
            }
            other => Some(other),
        }
    }

    fn on_tool_calls(&mut self, fragments: Vec<ToolCallFragment>) -> Option<Delta> {
        let mut reasoning = String::new();

        for fragment in &fragments {
            let Some(target_index) = self.state.target_index else {
                if fragment.name() == Some(self.tool_name.as_str()) {
                    self.identify(fragment, &mut reasoning);
                } else {
                    self.remember_unresolved(fragment);
                }
                continue;
            };

            if fragment.index != target_index {
                if fragment.name() == Some(self.tool_name.as_str()) {
                    tracing::debug!(
                        index = fragment.index,
                        target_index,
                        "ignoring second think tool call"
                    );
                }
                continue;
            }
            self.absorb_fragment(fragment, &mut reasoning);
        }

        if !self.state.found() {
            return Some(Delta::ToolCalls(fragments));
        }
        (!reasoning.is_empty()).then_some(Delta::Reasoning(reasoning))
    }

    fn identify(&mut self, fragment: &ToolCallFragment, reasoning: &mut String) {
        tracing::debug!(
            index = fragment.index,
            tool = %self.tool_name,
            "think tool call identified"
        );
        self.state.phase = RedirectorPhase::Accumulating;
        self.state.target_index = Some(fragment.index);

        let earlier = self.state.unresolved.remove(&fragment.index);
        self.state.unresolved.clear();
        if let Some(earlier) = earlier {
            self.state.target_id = earlier.id;
            if !earlier.arguments.is_empty() {
                self.absorb_arguments(&earlier.arguments, reasoning);
            }
        }
        self.absorb_fragment(fragment, reasoning);
    }

    fn remember_unresolved(&mut self, fragment: &ToolCallFragment) {
        let entry = self.state.unresolved.entry(fragment.index).or_default();
        if entry.id.is_none() {
            entry.id.clone_from(&fragment.id);
        }
        if let Some(arguments) = fragment.arguments() {
            entry.arguments.push_str(arguments);
        }
    }

    fn absorb_fragment(&mut self, fragment: &ToolCallFragment, reasoning: &mut String) {
        if self.state.target_id.is_none() {
            self.state.target_id.clone_from(&fragment.id);
        }
        if let Some(arguments) = fragment.arguments().filter(|args| !args.is_empty()) {
            self.absorb_arguments(arguments, reasoning);
        }
    }

    fn absorb_arguments(&mut self, arguments: &str, reasoning: &mut String) {
        self.state.full_arguments.push_str(arguments);

        match self.state.phase {
            RedirectorPhase::Accumulating => {
                self.state.parse_buffer.push_str(arguments);
                if !self.strip_prefix() {
                    return;
                }
            }
            RedirectorPhase::Stripped => self.state.working_buffer.push_str(arguments),
            RedirectorPhase::Idle | RedirectorPhase::Done => return,
        }

        self.release(reasoning);
    }

    /// Drop everything up to and including the earliest JSON prefix.
    fn strip_prefix(&mut self) -> bool {
        let buffer = &self.state.parse_buffer;
        let Some(content_start) = self
            .json_prefixes
            .iter()
            .filter_map(|prefix| buffer.find(prefix.as_str()).map(|pos| (pos, pos + prefix.len())))
            .min()
            .map(|(_, end)| end)
        else {
            return false;
        };

        self.state.working_buffer = self.state.parse_buffer[content_start..].to_owned();
        self.state.parse_buffer.clear();
        self.state.phase = RedirectorPhase::Stripped;
        self.state.json_prefix_stripped = true;
        tracing::debug!("think tool JSON prefix stripped");
        true
    }

    /// Decode all but the last `HOLDBACK_CHARS` chars of the working buffer.
    fn release(&mut self, reasoning: &mut String) {
        let buffer = &mut self.state.working_buffer;
        if !self.state.decoder.is_closed() && buffer.contains('"') {
            // Closing quote already buffered: nothing left to hold back.
            let mut lookahead = self.state.decoder.clone();
            let decoded = lookahead.push(buffer);
            if lookahead.is_closed() {
                reasoning.push_str(&decoded);
                self.state.decoder = lookahead;
                buffer.clear();
                return;
            }
        }
        let total = buffer.chars().count();
        if total <= HOLDBACK_CHARS {
            return;
        }
        let split = buffer
            .char_indices()
            .nth(total - HOLDBACK_CHARS)
            .map_or(buffer.len(), |(pos, _)| pos);
        let kept = buffer.split_off(split);
        let released = std::mem::replace(buffer, kept);
        self.state.decoder.push_into(&released, reasoning);
    }

    fn flush(&mut self) -> Option<Delta> {
        self.state.phase = RedirectorPhase::Done;
        let Some(index) = self.state.target_index else {
            tracing::trace!("think redirector flushed without a target call");
            return None;
        };

        if !self.state.decoder.is_closed() {
            tracing::debug!(
                held = self.state.working_buffer.len(),
                "think tool arguments ended before the reasoning string closed"
            );
        }
        tracing::debug!(
            index,
            arguments_len = self.state.full_arguments.len(),
            "emitting reconstructed think tool call"
        );

        Some(Delta::ToolCalls(vec![ToolCallFragment {
            index,
            id: Some(self.state.target_id.clone().unwrap_or_default()),
            type_: Some("function".to_owned()),
            function: Some(FunctionFragment {
                name: Some(self.tool_name.clone()),
                arguments: Some(self.state.full_arguments.clone()),
            }),
        }]))
    }
}

/// Functional form of [`ThinkTokenRedirector::process`].
///
/// The state is created on first use and handed back after every step.
#[must_use]
pub fn process_think_token(
    config: &ThinkRedirectorConfig,
    delta: Option<Delta>,
    state: Option<ThinkRedirectorState>,
) -> (Option<Delta>, ThinkRedirectorState) {
    let mut redirector = ThinkTokenRedirector::with_state(config, state.unwrap_or_default());
    let out = redirector.process(delta);
    (out, redirector.into_state())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
