// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no saved session with id {0}")]
    NotFound(String),
    #[error("no saved sessions in {0}")]
    Empty(std::path::PathBuf),
    #[error("failed to read session store directory: {0}")]
    Io(#[source] std::io::Error),
    #[error("failed to (de)serialize session document: {0}")]
    Serde(#[source] serde_json::Error),
}
