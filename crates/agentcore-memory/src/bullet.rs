// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tag applied to a bullet after it either helped, hurt, or had no bearing
/// on an iteration's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    Helpful,
    Harmful,
    Neutral,
}

/// One atomic strategy distilled into the playbook.
///
/// `id` is permanent: a bullet is never recycled, only removed. Counters are
/// updated only via [`crate::DeltaOperation::Tag`] so every mutation to a
/// bullet's effectiveness goes through the same atomic path as everything
/// else in the playbook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bullet {
    pub id: String,
    pub section: String,
    pub content: String,
    pub helpful: u32,
    pub harmful: u32,
    pub neutral: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Cached embedding of `content`, tagged with the model that produced it
    /// so a model swap invalidates stale vectors instead of mixing spaces.
    pub embedding: Option<(String, Vec<f32>)>,
}

impl Bullet {
    pub fn new(id: String, section: String, content: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            section,
            content,
            helpful: 0,
            harmful: 0,
            neutral: 0,
            created_at: now,
            updated_at: now,
            embedding: None,
        }
    }

    /// `(helpful - harmful) / max(1, helpful + harmful + neutral)`, in `[-1, 1]`.
    pub fn effectiveness(&self) -> f32 {
        let total = self.helpful + self.harmful + self.neutral;
        let denom = total.max(1) as f32;
        (self.helpful as f32 - self.harmful as f32) / denom
    }

    /// `(effectiveness + 1) / 2`, normalized into `[0, 1]`. Untested bullets
    /// (all counters zero) score a neutral 0.5.
    pub fn effectiveness_score(&self) -> f32 {
        (self.effectiveness() + 1.0) / 2.0
    }

    /// `1 / (1 + days_since_updated * k)`, in `(0, 1]`.
    pub fn recency_score(&self, now: DateTime<Utc>, k: f32) -> f32 {
        let days = (now - self.updated_at).num_seconds().max(0) as f32 / 86_400.0;
        1.0 / (1.0 + days * k)
    }

    pub fn tag(&mut self, tag: Tag) {
        match tag {
            Tag::Helpful => self.helpful += 1,
            Tag::Harmful => self.harmful += 1,
            Tag::Neutral => self.neutral += 1,
        }
        self.updated_at = Utc::now();
    }
}
