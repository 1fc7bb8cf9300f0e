// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bullet::Bullet;
use crate::delta::{DeltaBatch, DeltaOperation};
use crate::error::PlaybookError;

/// Weights for the hybrid selection score; need not sum to 1.0 but
/// conventionally do. `gamma = 0.0` disables semantic scoring entirely.
#[derive(Debug, Clone, Copy)]
pub struct SelectionWeights {
    pub alpha: f32,
    pub beta: f32,
    pub gamma: f32,
    pub recency_k: f32,
}

/// Structured long-term memory: bullets grouped by section, mutated only
/// through [`Playbook::apply_delta_batch`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Playbook {
    pub bullets: HashMap<String, Bullet>,
    pub sections: HashMap<String, Vec<String>>,
    /// Section names in first-seen order. `sections` is a `HashMap` (whose
    /// iteration order is unspecified), so this is the only record of which
    /// section was introduced first; `render` groups by this order rather
    /// than by iterating `sections` directly.
    #[serde(default)]
    section_order: Vec<String>,
    next_counter: u64,
}

fn section_prefix(section: &str) -> String {
    let slug: String = section
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(3)
        .collect::<String>()
        .to_lowercase();
    if slug.is_empty() {
        "gen".to_string()
    } else {
        slug
    }
}

impl Playbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bullets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bullets.is_empty()
    }

    /// Apply every operation in `batch` against a scratch copy; if any
    /// operation fails, `self` is left untouched and the error is returned.
    /// Only on full success is the scratch copy committed.
    pub fn apply_delta_batch(&mut self, batch: &DeltaBatch, max_ops: usize) -> Result<(), PlaybookError> {
        if batch.operations.len() > max_ops {
            return Err(PlaybookError::BatchTooLarge { max: max_ops, actual: batch.operations.len() });
        }
        let mut scratch = self.clone();
        for (index, op) in batch.operations.iter().enumerate() {
            scratch.apply_one(op).map_err(|reason| PlaybookError::BatchRejected { reason, index })?;
        }
        *self = scratch;
        Ok(())
    }

    fn apply_one(&mut self, op: &DeltaOperation) -> Result<(), String> {
        match op {
            DeltaOperation::Add { section, content, .. } => {
                let prefix = section_prefix(section);
                let id = format!("{prefix}-{}", self.next_counter);
                self.next_counter += 1;
                self.bullets.insert(id.clone(), Bullet::new(id.clone(), section.clone(), content.clone()));
                if !self.sections.contains_key(section) {
                    self.section_order.push(section.clone());
                }
                self.sections.entry(section.clone()).or_default().push(id);
                Ok(())
            }
            DeltaOperation::Update { bullet_id, content, .. } => {
                let bullet = self
                    .bullets
                    .get_mut(bullet_id)
                    .ok_or_else(|| format!("unknown bullet id: {bullet_id}"))?;
                if let Some(content) = content {
                    bullet.content = content.clone();
                    bullet.embedding = None; // stale: content changed
                }
                bullet.updated_at = Utc::now();
                Ok(())
            }
            DeltaOperation::Tag { bullet_id, tag } => {
                let bullet = self
                    .bullets
                    .get_mut(bullet_id)
                    .ok_or_else(|| format!("unknown bullet id: {bullet_id}"))?;
                bullet.tag(*tag);
                Ok(())
            }
            DeltaOperation::Remove { bullet_id } => {
                let bullet = self
                    .bullets
                    .remove(bullet_id)
                    .ok_or_else(|| format!("unknown bullet id: {bullet_id}"))?;
                if let Some(list) = self.sections.get_mut(&bullet.section) {
                    list.retain(|id| id != bullet_id);
                }
                Ok(())
            }
        }
    }

    /// Rank bullets by the hybrid score and return at most `k` ids, grouped
    /// by section preserving each section's insertion order, ties broken by
    /// most recent `updated_at` then lexicographic id.
    pub fn rank(
        &self,
        query_embedding: Option<&[f32]>,
        k: usize,
        weights: SelectionWeights,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        if k >= self.bullets.len() && (weights.gamma == 0.0 || query_embedding.is_none()) {
            let mut ids: Vec<String> = self.bullets.keys().cloned().collect();
            ids.sort();
            return ids;
        }

        let mut scored: Vec<(String, f32, DateTime<Utc>)> = self
            .bullets
            .values()
            .map(|b| {
                let eff = b.effectiveness_score();
                let rec = b.recency_score(now, weights.recency_k);
                let sem = match (query_embedding, &b.embedding) {
                    (Some(q), Some((_, emb))) => (cosine(q, emb) + 1.0) / 2.0,
                    _ => 0.5,
                };
                let final_score = weights.alpha * eff + weights.beta * rec + weights.gamma * sem;
                (b.id.clone(), final_score, b.updated_at)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.2.cmp(&a.2))
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.into_iter().take(k).map(|(id, _, _)| id).collect()
    }

    /// Render the selected bullet ids as a sectioned markdown-like listing,
    /// grouped by section in the playbook's own insertion order.
    pub fn render(&self, selected: &[String]) -> String {
        if selected.is_empty() {
            return String::new();
        }
        let selected_set: std::collections::HashSet<&str> = selected.iter().map(String::as_str).collect();
        let mut out = String::from("## Playbook\n");
        for section in &self.section_order {
            let Some(ids) = self.sections.get(section) else { continue };
            let mut in_section: Vec<&String> = ids.iter().filter(|id| selected_set.contains(id.as_str())).collect();
            if in_section.is_empty() {
                continue;
            }
            in_section.sort_by_key(|id| ids.iter().position(|x| x == *id).unwrap_or(usize::MAX));
            out.push_str(&format!("\n### {section}\n"));
            for id in in_section {
                if let Some(b) = self.bullets.get(id) {
                    out.push_str(&format!(
                        "- [{id}] {} (helpful={}, harmful={}, neutral={})\n",
                        b.content, b.helpful, b.harmful, b.neutral
                    ));
                }
            }
        }
        out
    }

    /// Convenience wrapper: rank then render in one call.
    pub fn as_context(
        &self,
        query_embedding: Option<&[f32]>,
        k: usize,
        weights: SelectionWeights,
        now: DateTime<Utc>,
    ) -> String {
        let selected = self.rank(query_embedding, k, weights, now);
        self.render(&selected)
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    if len == 0 {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f32, 0.0f32, 0.0f32);
    for i in 0..len {
        dot += a[i] * b[i];
        na += a[i] * a[i];
        nb += b[i] * b[i];
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

impl Default for SelectionWeights {
    fn default() -> Self {
        Self { alpha: 0.5, beta: 0.3, gamma: 0.2, recency_k: 0.1 }
    }
}
