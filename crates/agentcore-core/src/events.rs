// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use agentcore_tools::{events::TodoItem, ToolCall};

/// Which compaction path produced a `ContextCompacted` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionStrategyUsed {
    /// Rolling LLM summary into Markdown checkpoint sections.
    Structured,
    /// Rolling LLM summary into free-form prose.
    Narrative,
    /// Old messages dropped without a model call (budget too tight to summarize).
    Emergency,
}

/// Coarse-grained phase of the agent loop, emitted via
/// [`AgentEvent::StateChanged`] so consumers can render a status line
/// without having to infer it from the finer-grained events below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// Not currently processing a turn.
    Idle,
    /// Assembling the windowed history, system prompt, and dynamic context
    /// for the next model request.
    PreparingMessages,
    /// Waiting on the model's streamed response.
    AwaitingLlm,
    /// Running (after approval) the tool calls the model requested.
    HandlingToolCalls,
    /// Running the post-turn Reflector/Curator pass over the Playbook.
    Reflecting,
}

/// Events emitted by the agent during a single turn.
/// Consumers (the CLI runner, tests) subscribe to these to drive their output.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// A text chunk streamed from the model
    TextDelta(String),
    /// A complete text response from the model (after streaming finishes)
    TextComplete(String),
    /// A thinking/reasoning chunk from the model (extended thinking API).
    /// Consumers should accumulate deltas and finalise them into a Thinking
    /// segment when the model signals the end of the reasoning block.
    ThinkingDelta(String),
    /// A complete thinking/reasoning block (accumulated from ThinkingDelta events).
    ThinkingComplete(String),
    /// The model has requested a tool call
    ToolCallStarted(ToolCall),
    /// A tool call finished
    ToolCallFinished {
        call_id: String,
        tool_name: String,
        output: String,
        is_error: bool,
    },
    /// Context was compacted; statistics for the consumer.
    ContextCompacted {
        tokens_before: usize,
        tokens_after: usize,
        strategy: CompactionStrategyUsed,
        /// The tool-round number at which compaction fired (0 = pre-submit).
        turn: u32,
    },
    /// Current token usage update
    TokenUsage {
        input: u32,
        output: u32,
        /// Tokens served from the provider's prompt cache this turn.
        cache_read: u32,
        /// Tokens written into the provider's prompt cache this turn.
        cache_write: u32,
        /// Running total of cache-read tokens across the session.
        cache_read_total: u64,
        /// Running total of cache-write tokens across the session.
        cache_write_total: u64,
        /// The session's current context window budget.
        max_tokens: usize,
    },
    /// The agent has finished processing the current user turn
    TurnComplete,
    /// The current streaming turn was cancelled; `partial_text` holds
    /// whatever was committed to the session before the abort.
    Aborted { partial_text: String },
    /// A recoverable error occurred
    Error(String),
    /// The todo list was updated
    TodoUpdate(Vec<TodoItem>),
    /// The agent loop moved to a new coarse-grained phase.
    StateChanged(AgentState),
}
