// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

/// Errors surfaced while mutating or querying a [`crate::Playbook`].
///
/// All variants are recoverable at the call site: a failed delta batch
/// leaves the playbook untouched, and a failed embedding lookup degrades
/// the semantic scoring term rather than aborting selection.
#[derive(Debug, thiserror::Error)]
pub enum PlaybookError {
    #[error("unknown bullet id: {0}")]
    UnknownBullet(String),
    #[error("delta batch rejected: {reason} (operation {index})")]
    BatchRejected { reason: String, index: usize },
    #[error("delta batch exceeds the maximum of {max} operations (had {actual})")]
    BatchTooLarge { max: usize, actual: usize },
    #[error("playbook store error: {0}")]
    Store(#[source] anyhow::Error),
}
