// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

use crate::bullet::Tag;

/// One atomic mutation against a [`crate::Playbook`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DeltaOperation {
    Add {
        section: String,
        content: String,
        #[serde(default)]
        metadata: Option<serde_json::Value>,
    },
    Update {
        bullet_id: String,
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        metadata: Option<serde_json::Value>,
    },
    Tag { bullet_id: String, tag: Tag },
    Remove { bullet_id: String },
}

/// An ordered set of [`DeltaOperation`]s produced by the curator for a single
/// iteration, applied to the playbook all-or-nothing.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeltaBatch {
    pub reasoning: String,
    pub operations: Vec<DeltaOperation>,
}

impl DeltaBatch {
    pub fn empty(reasoning: impl Into<String>) -> Self {
        Self { reasoning: reasoning.into(), operations: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
