// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Versioned JSON session persistence under `~/.config/agentcore/sessions/`.
//!
//! Writes go through a temp file in the same directory followed by
//! `fs::rename`, so a crash mid-write never leaves a half-written document
//! in place of a good one — the rename is atomic on the same filesystem.
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::document::SessionDocument;
use crate::error::SessionError;

/// One row of [`SessionStore::list`] — cheap to compute without fully
/// deserializing every session's message history.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: String,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
    pub working_directory: Option<PathBuf>,
}

pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Default location: `<config dir>/agentcore/sessions/`, created if
    /// missing.
    pub fn discover() -> anyhow::Result<Self> {
        let base = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("could not determine the platform config directory"))?;
        let dir = base.join("agentcore").join("sessions");
        fs::create_dir_all(&dir).map_err(SessionError::Io)?;
        Ok(Self::new(dir))
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Persist `doc` atomically under its own id.
    pub fn save(&self, doc: &SessionDocument) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir).map_err(SessionError::Io)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(SessionError::Io)?;
        serde_json::to_writer_pretty(&mut tmp, doc).map_err(SessionError::Serde)?;
        tmp.persist(self.path_for(&doc.id))
            .map_err(|e| SessionError::Io(e.error))?;
        Ok(())
    }

    pub fn load(&self, id: &str) -> anyhow::Result<SessionDocument> {
        let path = self.path_for(id);
        if !path.exists() {
            return Err(SessionError::NotFound(id.to_string()).into());
        }
        let data = fs::read_to_string(&path).map_err(SessionError::Io)?;
        serde_json::from_str(&data).map_err(|e| SessionError::Serde(e).into())
    }

    /// Load the document with the greatest `updated_at` timestamp.
    pub fn load_latest(&self) -> anyhow::Result<SessionDocument> {
        let mut best: Option<SessionDocument> = None;
        for entry in self.read_entries()? {
            if best.as_ref().map(|b| entry.updated_at > b.updated_at).unwrap_or(true) {
                best = Some(entry);
            }
        }
        best.ok_or_else(|| SessionError::Empty(self.dir.clone()).into())
    }

    /// Summaries of every saved session, most recently updated first.
    pub fn list(&self, limit: usize) -> anyhow::Result<Vec<SessionSummary>> {
        let mut docs = self.read_entries()?;
        docs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(docs
            .into_iter()
            .take(limit)
            .map(|d| SessionSummary {
                id: d.id,
                updated_at: d.updated_at,
                message_count: d.messages.len(),
                working_directory: d.working_directory,
            })
            .collect())
    }

    fn read_entries(&self) -> anyhow::Result<Vec<SessionDocument>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut docs = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(SessionError::Io)? {
            let entry = entry.map_err(SessionError::Io)?;
            if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_document(&entry.path()) {
                Ok(doc) => docs.push(doc),
                Err(err) => {
                    tracing::warn!(path = %entry.path().display(), error = %err, "skipping unreadable session document");
                }
            }
        }
        Ok(docs)
    }
}

fn read_document(path: &Path) -> anyhow::Result<SessionDocument> {
    let data = fs::read_to_string(path).map_err(SessionError::Io)?;
    serde_json::from_str(&data).map_err(|e| SessionError::Serde(e).into())
}
