// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The on-disk shape of a session. Deliberately a separate type from
//! [`agentcore_core::Session`]: the in-memory model carries nothing about
//! where it lives on disk or when it was first created, and the document
//! carries no token-budget bookkeeping that the in-memory model doesn't
//! already own — the two are kept distinct so neither has to grow fields it
//! doesn't need for the other's sake.
use std::path::PathBuf;

use agentcore_core::Session;
use agentcore_memory::Playbook;
use agentcore_model::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current on-disk schema version. Bump when a field is added or removed in
/// a way that changes the meaning of an existing key.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDocument {
    #[serde(default = "default_version")]
    pub version: u32,
    pub id: String,
    pub working_directory: Option<PathBuf>,
    pub messages: Vec<Message>,
    pub token_count: usize,
    pub max_tokens: usize,
    pub max_output_tokens: usize,
    pub schema_overhead: usize,
    pub calibration_factor: f32,
    pub cache_read_total: u64,
    pub cache_write_total: u64,
    pub playbook: Playbook,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Keys from a future schema version that this build doesn't know about.
    /// Round-tripped verbatim so an older build never destroys newer fields
    /// on save.
    #[serde(flatten)]
    pub unknown_fields: serde_json::Map<String, serde_json::Value>,
}

fn default_version() -> u32 {
    SCHEMA_VERSION
}

impl SessionDocument {
    /// Snapshot an in-memory session. `created_at` should be carried over
    /// from a prior document on re-save; pass `Utc::now()` for a brand-new
    /// session.
    pub fn from_session(
        session: &Session,
        working_directory: Option<PathBuf>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            version: SCHEMA_VERSION,
            id: session.id.clone(),
            working_directory,
            messages: session.messages.clone(),
            token_count: session.token_count,
            max_tokens: session.max_tokens,
            max_output_tokens: session.max_output_tokens,
            schema_overhead: session.schema_overhead,
            calibration_factor: session.calibration_factor,
            cache_read_total: session.cache_read_total,
            cache_write_total: session.cache_write_total,
            playbook: session.playbook.clone(),
            created_at,
            updated_at: Utc::now(),
        }
    }

    /// Reconstruct an in-memory session from this document.
    pub fn into_session(self) -> Session {
        Session {
            id: self.id,
            messages: self.messages,
            token_count: self.token_count,
            max_tokens: self.max_tokens,
            max_output_tokens: self.max_output_tokens,
            schema_overhead: self.schema_overhead,
            calibration_factor: self.calibration_factor,
            cache_read_total: self.cache_read_total,
            cache_write_total: self.cache_write_total,
            playbook: self.playbook,
        }
    }
}
