// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use agentcore_memory::Playbook;
use agentcore_model::Message;
use uuid::Uuid;

/// One saved turn in the conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub role: String,
    pub content: String,
}

/// In-memory conversation session.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub messages: Vec<Message>,
    /// Approximate total token count for the current message list.
    pub token_count: usize,
    /// Maximum context tokens (set from model config / provider limits).
    pub max_tokens: usize,
    /// Maximum output tokens the current model can produce, reserved out of
    /// `max_tokens` when computing the input budget.
    pub max_output_tokens: usize,
    /// Estimated token overhead of items sent with every request but not
    /// tracked in `token_count` — tool schemas and the dynamic context block.
    /// Recomputed once per turn in the agent loop.
    pub schema_overhead: usize,
    /// Running correction factor applied to the chars/4 token estimate,
    /// updated from the provider's actual reported input token counts.
    pub calibration_factor: f32,
    /// Lifetime total of tokens served from the provider's prompt cache.
    pub cache_read_total: u64,
    /// Lifetime total of tokens written into the provider's prompt cache.
    pub cache_write_total: u64,
    /// Long-term memory distilled by the Reflector/Curator across turns.
    pub playbook: Playbook,
}

impl Session {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            messages: Vec::new(),
            token_count: 0,
            max_tokens,
            max_output_tokens: 0,
            schema_overhead: 0,
            calibration_factor: 1.0,
            cache_read_total: 0,
            cache_write_total: 0,
            playbook: Playbook::new(),
        }
    }

    pub fn push(&mut self, msg: Message) {
        self.token_count += msg.approx_tokens();
        self.messages.push(msg);
    }

    pub fn push_many(&mut self, msgs: impl IntoIterator<Item = Message>) {
        for m in msgs {
            self.push(m);
        }
    }

    /// Tokens available for input (history + schemas + dynamic context),
    /// after reserving room for the model's maximum output.
    pub fn input_budget(&self) -> usize {
        self.max_tokens.saturating_sub(self.max_output_tokens)
    }

    /// Fraction of the input budget consumed, including schema overhead and
    /// calibration, used to decide when compaction should fire.
    pub fn context_fraction(&self) -> f32 {
        let budget = self.input_budget();
        if budget == 0 {
            return 0.0;
        }
        let effective =
            ((self.token_count + self.schema_overhead) as f32) * self.calibration_factor;
        effective / (budget as f32)
    }

    pub fn is_near_limit(&self, threshold: f32) -> bool {
        self.context_fraction() >= threshold
    }

    /// Recalculate token count from scratch (call after compaction).
    pub fn recalculate_tokens(&mut self) {
        self.token_count = self.messages.iter().map(|m| m.approx_tokens()).sum();
    }

    /// Replace the message list and recalculate token count (for resubmit / edit).
    pub fn replace_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.recalculate_tokens();
    }

    /// Record cache token usage reported by the provider for the lifetime totals.
    pub fn add_cache_usage(&mut self, read: u32, write: u32) {
        self.cache_read_total += read as u64;
        self.cache_write_total += write as u64;
    }

    /// Nudge `calibration_factor` toward the ratio of actual to estimated
    /// input tokens for the turn that just completed.  Uses a simple
    /// exponential moving average so a single noisy sample can't whipsaw
    /// the estimate.
    pub fn update_calibration(&mut self, actual_input: u32, estimated: usize) {
        if estimated == 0 {
            return;
        }
        let sample = actual_input as f32 / estimated as f32;
        const ALPHA: f32 = 0.3;
        self.calibration_factor = self.calibration_factor * (1.0 - ALPHA) + sample * ALPHA;
        self.calibration_factor = self.calibration_factor.clamp(0.5, 3.0);
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
