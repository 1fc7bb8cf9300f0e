// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Self-curating playbook memory for the agent loop.
//!
//! A [`Playbook`] is a flat store of [`Bullet`]s — atomic strategies learned
//! from past iterations — grouped into sections. It is mutated only through
//! [`Playbook::apply_delta_batch`] and queried through [`Playbook::as_context`],
//! which performs hybrid (effectiveness + recency + semantic) selection.
//! [`reflect`] and [`curate`] close the loop: after an iteration completes,
//! they turn its outcome into a [`DeltaBatch`] applied back to the playbook.
mod bullet;
mod delta;
mod embedding;
mod error;
mod playbook;
mod reflect;

pub use bullet::{Bullet, Tag};
pub use delta::{DeltaBatch, DeltaOperation};
pub use embedding::{Embedder, EmbeddingCache, HttpEmbedder};
pub use error::PlaybookError;
pub use playbook::{Playbook, SelectionWeights};
pub use reflect::{curate, reflect, IterationOutcome, Reflection, ToolCallOutcome, MAX_DELTA_BATCH_OPS};
