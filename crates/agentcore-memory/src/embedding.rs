// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Mutex;

/// Provider-agnostic embedding generator. Implementations talk to whatever
/// HTTP endpoint produces vectors for a batch of strings; failures are the
/// caller's responsibility to degrade gracefully (the playbook always falls
/// back to a neutral semantic score rather than propagating an error).
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_id(&self) -> &str;
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Embedding driver for any OpenAI-compatible `/embeddings` endpoint.
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl HttpEmbedder {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self { client: reqwest::Client::new(), endpoint: endpoint.into(), api_key, model: model.into() }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        #[derive(serde::Serialize)]
        struct Req<'a> {
            model: &'a str,
            input: &'a [String],
        }
        #[derive(serde::Deserialize)]
        struct RespItem {
            embedding: Vec<f32>,
        }
        #[derive(serde::Deserialize)]
        struct Resp {
            data: Vec<RespItem>,
        }

        let mut req = self.client.post(&self.endpoint).json(&Req { model: &self.model, input: texts });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp: Resp = req.send().await?.error_for_status()?.json().await?;
        Ok(resp.data.into_iter().map(|d| d.embedding).collect())
    }
}

fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// SQLite-backed cache of `(sha256(text), model_id) -> embedding`, sharing a
/// database file with the playbook's bullet store. Corrupt or missing files
/// degrade to an empty cache rather than failing the caller.
pub struct EmbeddingCache {
    conn: Mutex<Connection>,
}

impl EmbeddingCache {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS embeddings (
                content_hash TEXT NOT NULL,
                model_id TEXT NOT NULL,
                vector BLOB NOT NULL,
                PRIMARY KEY (content_hash, model_id)
            )",
            [],
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute(
            "CREATE TABLE embeddings (
                content_hash TEXT NOT NULL,
                model_id TEXT NOT NULL,
                vector BLOB NOT NULL,
                PRIMARY KEY (content_hash, model_id)
            )",
            [],
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lookup(&self, hash: &str, model_id: &str) -> Option<Vec<f32>> {
        let conn = self.conn.lock().ok()?;
        let mut stmt = conn
            .prepare("SELECT vector FROM embeddings WHERE content_hash = ?1 AND model_id = ?2")
            .ok()?;
        let bytes: Option<Vec<u8>> = stmt.query_row([hash, model_id], |row| row.get(0)).ok();
        bytes.map(|b| bytes_to_vec(&b))
    }

    fn store(&self, hash: &str, model_id: &str, vector: &[f32]) {
        let Ok(conn) = self.conn.lock() else { return };
        let bytes = vec_to_bytes(vector);
        let _ = conn.execute(
            "INSERT OR REPLACE INTO embeddings (content_hash, model_id, vector) VALUES (?1, ?2, ?3)",
            rusqlite::params![hash, model_id, bytes],
        );
    }

    /// Return the cached embedding for `text`, generating and storing it via
    /// `embedder` on a miss. Any I/O or network failure is logged and
    /// returned as `None` rather than propagated.
    pub async fn get_or_generate(&self, text: &str, embedder: &dyn Embedder) -> Option<Vec<f32>> {
        let hash = content_hash(text);
        if let Some(v) = self.lookup(&hash, embedder.model_id()) {
            return Some(v);
        }
        match embedder.embed_batch(std::slice::from_ref(&text.to_string())).await {
            Ok(mut vectors) if !vectors.is_empty() => {
                let vector = vectors.remove(0);
                self.store(&hash, embedder.model_id(), &vector);
                Some(vector)
            }
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(error = %err, "embedding generation failed, degrading to neutral semantic score");
                None
            }
        }
    }
}

fn vec_to_bytes(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn bytes_to_vec(b: &[u8]) -> Vec<f32> {
    b.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()
}
