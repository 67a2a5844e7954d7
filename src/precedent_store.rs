//! SQLite-backed semantic precedent index.
//!
//! Reference clauses are embedded once (`cra precedents seed`) and stored as
//! little-endian `f32` BLOBs next to their text. A query embeds the clause
//! under analysis and ranks every row of the active model by cosine
//! similarity in Rust.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use std::path::Path;

use clause_audit_core::error::PrecedentError;
use clause_audit_core::models::text_hash;
use clause_audit_core::precedent::{parse_corpus, SimilarityStore};

use crate::config::{Config, EmbeddingConfig};
use crate::db;
use crate::embedding::{self, EmbeddingProvider};

/// [`SimilarityStore`] over the `precedents` table.
pub struct SqlitePrecedentStore {
    pool: SqlitePool,
    embedding: EmbeddingConfig,
    model: String,
}

impl SqlitePrecedentStore {
    pub fn new(pool: SqlitePool, embedding: EmbeddingConfig) -> Self {
        let model = embedding.model.clone().unwrap_or_default();
        Self {
            pool,
            embedding,
            model,
        }
    }

    /// Open an existing index. Fails if the file does not exist.
    pub async fn open(db_path: &Path, embedding: &EmbeddingConfig) -> Result<Self> {
        let pool = db::connect_existing(db_path).await?;
        Ok(Self::new(pool, embedding.clone()))
    }

    /// Number of stored references for the active model.
    pub async fn count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM precedents WHERE model = ?")
            .bind(&self.model)
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn nearest(&self, query_vec: &[f32], top_k: usize) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT text, embedding FROM precedents WHERE model = ? ORDER BY id")
            .bind(&self.model)
            .fetch_all(&self.pool)
            .await?;

        let candidates: Vec<(String, Vec<f32>)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                (row.get("text"), embedding::blob_to_vec(&blob))
            })
            .collect();

        Ok(rank_by_similarity(query_vec, candidates, top_k))
    }
}

#[async_trait]
impl SimilarityStore for SqlitePrecedentStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<String>, PrecedentError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = embedding::embed_query(&self.embedding, text)
            .await
            .map_err(|e| PrecedentError::Lookup(format!("{:#}", e)))?;
        self.nearest(&query_vec, top_k)
            .await
            .map_err(|e| PrecedentError::Lookup(format!("{:#}", e)))
    }
}

/// Order `candidates` by cosine similarity to `query_vec`, descending, and
/// keep `top_k`. Ties keep input order.
pub fn rank_by_similarity(
    query_vec: &[f32],
    candidates: Vec<(String, Vec<f32>)>,
    top_k: usize,
) -> Vec<String> {
    let mut scored: Vec<(f32, String)> = candidates
        .into_iter()
        .map(|(text, vec)| (embedding::cosine_similarity(query_vec, &vec), text))
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);
    scored.into_iter().map(|(_, text)| text).collect()
}

/// Insert or replace one reference keyed by text hash and model.
pub async fn upsert_precedent(
    pool: &SqlitePool,
    text: &str,
    model: &str,
    dims: usize,
    vector: &[f32],
) -> Result<()> {
    let blob = embedding::vec_to_blob(vector);

    sqlx::query(
        r#"
        INSERT INTO precedents (text, text_hash, model, dims, embedding)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(text_hash, model) DO UPDATE SET
            text = excluded.text,
            dims = excluded.dims,
            embedding = excluded.embedding
        "#,
    )
    .bind(text)
    .bind(text_hash(text))
    .bind(model)
    .bind(dims as i64)
    .bind(blob)
    .execute(pool)
    .await?;

    Ok(())
}

/// Hashes already indexed under `model`.
async fn indexed_hashes(pool: &SqlitePool, model: &str) -> Result<HashSet<String>> {
    let hashes: Vec<String> = sqlx::query_scalar("SELECT text_hash FROM precedents WHERE model = ?")
        .bind(model)
        .fetch_all(pool)
        .await?;
    Ok(hashes.into_iter().collect())
}

/// Outcome of a seeding run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedStats {
    pub total: usize,
    pub skipped: usize,
    pub embedded: usize,
    pub failed: usize,
}

/// Embed and upsert every corpus entry not yet indexed for the active model.
pub async fn seed(
    pool: &SqlitePool,
    embedding_cfg: &EmbeddingConfig,
    corpus: &[String],
) -> Result<SeedStats> {
    let provider = embedding::create_provider(embedding_cfg)?;
    let model_name = provider.model_name().to_string();

    let existing = indexed_hashes(pool, &model_name).await?;
    let mut seen = HashSet::new();
    let pending: Vec<String> = corpus
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(text_hash(t)))
        .filter(|t| !existing.contains(&text_hash(t)))
        .map(str::to_string)
        .collect();

    let mut stats = SeedStats {
        total: corpus.len(),
        skipped: corpus.len() - pending.len(),
        ..SeedStats::default()
    };

    for batch in pending.chunks(embedding_cfg.batch_size.max(1)) {
        match embedding::embed_texts(embedding_cfg, batch).await {
            Ok(vectors) => {
                for (text, vec) in batch.iter().zip(vectors.iter()) {
                    if vec.len() != provider.dims() {
                        tracing::warn!(
                            expected = provider.dims(),
                            got = vec.len(),
                            "embedding dimension mismatch; skipping reference"
                        );
                        stats.failed += 1;
                        continue;
                    }
                    upsert_precedent(pool, text, &model_name, provider.dims(), vec).await?;
                    stats.embedded += 1;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, size = batch.len(), "embedding batch failed");
                stats.failed += batch.len();
            }
        }
    }

    Ok(stats)
}

/// `cra precedents seed`: load the corpus and index it.
pub async fn run_seed(config: &Config, corpus_override: Option<&Path>) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let corpus_path = corpus_override.unwrap_or(&config.precedents.corpus_path);
    let raw = std::fs::read_to_string(corpus_path)
        .with_context(|| format!("Failed to read corpus: {}", corpus_path.display()))?;
    let corpus = parse_corpus(&raw)
        .map_err(|e| anyhow::anyhow!("Invalid corpus {}: {}", corpus_path.display(), e))?;

    let pool = db::connect(&config.precedents.db_path).await?;
    crate::migrate::create_schema(&pool).await?;
    let stats = seed(&pool, &config.embedding, &corpus).await?;
    pool.close().await;

    println!("precedents seed");
    println!("  corpus: {}", corpus_path.display());
    println!("  references: {}", stats.total);
    println!("  already indexed: {}", stats.skipped);
    println!("  embedded: {}", stats.embedded);
    println!("  failed: {}", stats.failed);
    Ok(())
}
