//! SQLite-backed knowledge store.
//!
//! Chunks and their embeddings live in SQLite; search embeds the query and
//! ranks the scope's chunks by brute-force cosine similarity.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::{HitMetadata, KnowledgeSearch, RetrievalHit, SearchScope};
use crate::core::errors::ApiError;
use crate::llm::Embedder;

pub struct SqliteKnowledgeStore {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
}

impl SqliteKnowledgeStore {
    pub async fn with_path(db_path: PathBuf, embedder: Arc<dyn Embedder>) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let store = Self { pool, embedder };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS knowledge_chunks (
                chunk_id TEXT PRIMARY KEY,
                chatbot_id TEXT NOT NULL,
                source_id TEXT NOT NULL,
                source_name TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL,
                url TEXT,
                title TEXT,
                embedding BLOB,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_knowledge_scope ON knowledge_chunks(chatbot_id, source_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm_a * norm_b;

        if denom <= f32::EPSILON {
            0.0
        } else {
            (dot / denom).clamp(0.0, 1.0)
        }
    }

    pub async fn count(&self, scope: Option<&SearchScope>) -> Result<usize, ApiError> {
        let count: i64 = if let Some(scope) = scope {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM knowledge_chunks WHERE chatbot_id = ?1 AND source_id = ?2",
            )
            .bind(&scope.chatbot_id)
            .bind(&scope.source_id)
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)?
        } else {
            sqlx::query_scalar("SELECT COUNT(*) FROM knowledge_chunks")
                .fetch_one(&self.pool)
                .await
                .map_err(ApiError::internal)?
        };

        Ok(count as usize)
    }

    /// Ranks the scope's chunks against an already-embedded query.
    pub async fn search_by_embedding(
        &self,
        query_embedding: &[f32],
        scope: &SearchScope,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<RetrievalHit>, ApiError> {
        let rows = sqlx::query(
            "SELECT source_id, source_name, content, url, title, embedding
             FROM knowledge_chunks
             WHERE chatbot_id = ?1 AND source_id = ?2",
        )
        .bind(&scope.chatbot_id)
        .bind(&scope.source_id)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        let mut scored: Vec<RetrievalHit> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Vec<u8> = row.try_get("embedding").unwrap_or_default();
                if embedding_bytes.is_empty() {
                    return None;
                }
                let stored = Self::deserialize_embedding(&embedding_bytes);
                let score = Self::cosine_similarity(query_embedding, &stored);
                if score <= threshold {
                    return None;
                }

                Some(RetrievalHit {
                    content: row.try_get("content").unwrap_or_default(),
                    score,
                    source_id: row.try_get("source_id").unwrap_or_default(),
                    source_name: row.try_get("source_name").unwrap_or_default(),
                    metadata: HitMetadata {
                        url: row.try_get("url").unwrap_or_default(),
                        title: row.try_get("title").unwrap_or_default(),
                    },
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit.max(1));

        Ok(scored)
    }
}

#[async_trait]
impl KnowledgeSearch for SqliteKnowledgeStore {
    async fn search(
        &self,
        query: &str,
        scope: &SearchScope,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<RetrievalHit>, ApiError> {
        let embeddings = self.embedder.embed(&[query.to_string()]).await?;
        let query_embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Internal("Embedder returned no vector".to_string()))?;

        self.search_by_embedding(&query_embedding, scope, limit, threshold)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Maps a few known words onto fixed axes.
    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
            Ok(inputs
                .iter()
                .map(|text| {
                    let text = text.to_lowercase();
                    vec![
                        if text.contains("pricing") { 1.0 } else { 0.0 },
                        if text.contains("refund") { 1.0 } else { 0.0 },
                        0.1,
                    ]
                })
                .collect())
        }
    }

    /// A chunk as stored for one knowledge source.
    #[derive(Debug, Clone)]
    struct KnowledgeChunk {
        chunk_id: String,
        chatbot_id: String,
        source_id: String,
        source_name: String,
        content: String,
        url: Option<String>,
        title: Option<String>,
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    async fn seed(store: &SqliteKnowledgeStore, items: Vec<(KnowledgeChunk, Vec<f32>)>) {
        for (chunk, embedding) in items {
            sqlx::query(
                "INSERT INTO knowledge_chunks
                 (chunk_id, chatbot_id, source_id, source_name, content, url, title, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .bind(&chunk.chunk_id)
            .bind(&chunk.chatbot_id)
            .bind(&chunk.source_id)
            .bind(&chunk.source_name)
            .bind(&chunk.content)
            .bind(&chunk.url)
            .bind(&chunk.title)
            .bind(serialize_embedding(&embedding))
            .execute(&store.pool)
            .await
            .unwrap();
        }
    }

    async fn test_store() -> (tempfile::TempDir, SqliteKnowledgeStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = SqliteKnowledgeStore::with_path(tmp.path().join("kb.db"), Arc::new(AxisEmbedder))
            .await
            .unwrap();
        (tmp, store)
    }

    fn make_chunk(id: &str, source: &str, content: &str, url: Option<&str>) -> KnowledgeChunk {
        KnowledgeChunk {
            chunk_id: id.to_string(),
            chatbot_id: "bot".to_string(),
            source_id: source.to_string(),
            source_name: format!("{source} docs"),
            content: content.to_string(),
            url: url.map(str::to_string),
            title: Some(format!("{id} title")),
        }
    }

    #[tokio::test]
    async fn search_ranks_within_scope_above_threshold() {
        let (_tmp, store) = test_store().await;

        seed(
            &store,
            vec![
                (make_chunk("c1", "kb1", "Pricing starts at $10", Some("https://x/pricing")), vec![1.0, 0.0, 0.1]),
                (make_chunk("c2", "kb1", "Refunds within 30 days", None), vec![0.0, 1.0, 0.1]),
                (make_chunk("c3", "kb2", "Pricing for enterprise", None), vec![1.0, 0.0, 0.1]),
            ],
        )
        .await;

        let scope = SearchScope::new("bot", "kb1");
        let hits = store.search("What is the pricing?", &scope, 8, 0.55).await.unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "Pricing starts at $10");
        assert_eq!(hits[0].source_name, "kb1 docs");
        assert_eq!(hits[0].url(), Some("https://x/pricing"));
        assert!(hits[0].score > 0.99);
    }

    #[tokio::test]
    async fn count_is_scoped_per_source() {
        let (_tmp, store) = test_store().await;
        seed(
            &store,
            vec![
                (make_chunk("c1", "kb1", "a", None), vec![1.0, 0.0, 0.0]),
                (make_chunk("c2", "kb2", "b", None), vec![1.0, 0.0, 0.0]),
            ],
        )
        .await;

        let scope = SearchScope::new("bot", "kb1");
        assert_eq!(store.count(Some(&scope)).await.unwrap(), 1);
        assert_eq!(store.count(None).await.unwrap(), 2);
    }

    #[test]
    fn embedding_blob_round_trips() {
        let original = vec![0.25_f32, -1.5, 3.0];
        let bytes = serialize_embedding(&original);
        assert_eq!(SqliteKnowledgeStore::deserialize_embedding(&bytes), original);
    }
}
