//! Fan-out retrieval over every (query, knowledge source) pair.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use sha2::{Digest, Sha256};

use crate::chatbot::KnowledgeSource;
use crate::core::config::defaults::RetrievalConfig;
use crate::core::errors::ApiError;
use crate::rag::{KnowledgeSearch, RetrievalHit, SearchScope};

/// Characters of content that identify a chunk for deduplication.
const CONTENT_KEY_CHARS: usize = 100;

/// A source that could not be searched for one query.
#[derive(Debug, Clone)]
pub struct SourceFailure {
    pub source_id: String,
    pub query: String,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct MergedHits {
    /// Deduplicated hits in fan-out order.
    pub hits: Vec<RetrievalHit>,
    /// Highest-scoring above-threshold hit per URL, duplicates included.
    pub best_by_url: HashMap<String, RetrievalHit>,
    pub failures: Vec<SourceFailure>,
}

/// One (query, source) search outcome, tagged so failures stay attributable.
pub(crate) struct SourceOutcome {
    pub query: String,
    pub source: KnowledgeSource,
    pub result: Result<Vec<RetrievalHit>, ApiError>,
}

pub struct MultiSourceRetriever {
    search: Arc<dyn KnowledgeSearch>,
    config: RetrievalConfig,
}

impl MultiSourceRetriever {
    pub fn new(search: Arc<dyn KnowledgeSearch>, config: RetrievalConfig) -> Self {
        Self { search, config }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub async fn retrieve(
        &self,
        chatbot_id: &str,
        queries: &[String],
        sources: &[KnowledgeSource],
    ) -> MergedHits {
        self.retrieve_with(
            chatbot_id,
            queries,
            sources,
            self.config.limit,
            self.config.threshold,
        )
        .await
    }

    pub async fn retrieve_with(
        &self,
        chatbot_id: &str,
        queries: &[String],
        sources: &[KnowledgeSource],
        limit: usize,
        threshold: f32,
    ) -> MergedHits {
        if queries.is_empty() || sources.is_empty() {
            return MergedHits::default();
        }

        let pairs: Vec<(String, KnowledgeSource)> = queries
            .iter()
            .flat_map(|q| sources.iter().map(move |s| (q.clone(), s.clone())))
            .collect();
        let concurrency = pairs.len().min(self.config.max_concurrency).max(1);
        let timeout = Duration::from_secs(self.config.timeout_secs);

        tracing::debug!(
            chatbot_id,
            queries = queries.len(),
            sources = sources.len(),
            concurrency,
            "Starting knowledge retrieval"
        );

        // `buffered` keeps results in submission order regardless of completion order.
        let outcomes: Vec<SourceOutcome> = stream::iter(pairs)
            .map(|(query, source)| {
                let search = self.search.clone();
                let scope = SearchScope::new(chatbot_id, source.id.clone());
                async move {
                    let result = match tokio::time::timeout(
                        timeout,
                        search.search(&query, &scope, limit, threshold),
                    )
                    .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(ApiError::GatewayTimeout(format!(
                            "search timed out after {:?}",
                            timeout
                        ))),
                    };
                    SourceOutcome {
                        query,
                        source,
                        result,
                    }
                }
            })
            .buffered(concurrency)
            .collect()
            .await;

        let merged = merge_hits(outcomes, threshold);
        for failure in &merged.failures {
            tracing::warn!(
                source_id = %failure.source_id,
                query = %failure.query,
                error = %failure.error,
                "Knowledge source search failed; skipping"
            );
        }
        merged
    }
}

/// Dedup key: hex SHA-256 of the first 100 characters of a chunk.
pub fn content_key(content: &str) -> String {
    let prefix: String = content.chars().take(CONTENT_KEY_CHARS).collect();
    hex::encode(Sha256::digest(prefix.as_bytes()))
}

/// Folds ordered search outcomes into one deduplicated hit list.
///
/// The first occurrence of a content key wins, but every above-threshold
/// occurrence feeds `best_by_url`. Hits at or below `threshold` are dropped
/// even if the backend returned them.
pub(crate) fn merge_hits(outcomes: Vec<SourceOutcome>, threshold: f32) -> MergedHits {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = MergedHits::default();

    for outcome in outcomes {
        let hits = match outcome.result {
            Ok(hits) => hits,
            Err(e) => {
                merged.failures.push(SourceFailure {
                    source_id: outcome.source.id.clone(),
                    query: outcome.query,
                    error: e.to_string(),
                });
                continue;
            }
        };

        for mut hit in hits {
            if hit.score <= threshold {
                continue;
            }
            if hit.source_name.trim().is_empty() {
                hit.source_name = if outcome.source.name.is_empty() {
                    outcome.source.id.clone()
                } else {
                    outcome.source.name.clone()
                };
            }

            // Duplicates still count towards their URL's best score.
            if let Some(url) = hit.url() {
                let replace = merged
                    .best_by_url
                    .get(url)
                    .map_or(true, |best| hit.score > best.score);
                if replace {
                    merged.best_by_url.insert(url.to_string(), hit.clone());
                }
            }

            if !seen.insert(content_key(&hit.content)) {
                continue;
            }
            merged.hits.push(hit);
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::{hit, source, FakeSearch};

    fn outcome(query: &str, source_id: &str, hits: Vec<RetrievalHit>) -> SourceOutcome {
        SourceOutcome {
            query: query.to_string(),
            source: source(source_id),
            result: Ok(hits),
        }
    }

    #[test]
    fn content_key_uses_only_the_prefix() {
        let base = "a".repeat(100);
        assert_eq!(
            content_key(&format!("{base}tail one")),
            content_key(&format!("{base}different tail"))
        );
        assert_ne!(content_key("alpha"), content_key("beta"));
        assert_eq!(content_key("x").len(), 64);
    }

    #[test]
    fn first_occurrence_wins_and_best_url_tracks_max() {
        let outcomes = vec![
            outcome("q1", "s1", vec![hit("s1", "same content", 0.60, Some("https://a"))]),
            outcome("q2", "s1", vec![
                hit("s1", "same content", 0.90, Some("https://a")),
                hit("s1", "other content", 0.80, Some("https://a")),
            ]),
        ];

        let merged = merge_hits(outcomes, 0.55);
        assert_eq!(merged.hits.len(), 2);
        assert_eq!(merged.hits[0].score, 0.60);
        assert_eq!(merged.hits[1].content, "other content");
        assert_eq!(merged.best_by_url["https://a"].score, 0.90);
    }

    #[test]
    fn hits_at_threshold_are_discarded() {
        let outcomes = vec![outcome("q", "s1", vec![
            hit("s1", "exactly at", 0.55, Some("https://at")),
            hit("s1", "above", 0.56, None),
        ])];

        let merged = merge_hits(outcomes, 0.55);
        assert_eq!(merged.hits.len(), 1);
        assert!(merged.best_by_url.is_empty());
    }

    #[test]
    fn missing_source_name_comes_from_source_config() {
        let mut unnamed = hit("s1", "body", 0.9, None);
        unnamed.source_name.clear();

        let merged = merge_hits(vec![outcome("q", "s1", vec![unnamed])], 0.55);
        assert_eq!(merged.hits[0].source_name, "Source s1");
    }

    #[test]
    fn merge_is_deterministic_for_same_input() {
        let build = || {
            vec![
                outcome("q1", "s1", vec![hit("s1", "a", 0.7, Some("https://1"))]),
                outcome("q1", "s2", vec![hit("s2", "b", 0.8, Some("https://2"))]),
                outcome("q2", "s1", vec![hit("s1", "c", 0.9, Some("https://1"))]),
            ]
        };
        let first = merge_hits(build(), 0.55);
        let second = merge_hits(build(), 0.55);
        assert_eq!(first.hits, second.hits);
        assert_eq!(first.best_by_url, second.best_by_url);
    }

    #[tokio::test]
    async fn failing_source_is_skipped_and_recorded() {
        let search = Arc::new(
            FakeSearch::new()
                .with_hits("s1", vec![hit("s1", "good chunk", 0.8, Some("https://ok"))])
                .failing("s2"),
        );
        let retriever = MultiSourceRetriever::new(search.clone(), RetrievalConfig::default());

        let merged = retriever
            .retrieve("bot", &["q".to_string()], &[source("s1"), source("s2")])
            .await;

        assert_eq!(merged.hits.len(), 1);
        assert_eq!(merged.failures.len(), 1);
        assert_eq!(merged.failures[0].source_id, "s2");
        assert_eq!(search.calls().len(), 2);
    }

    #[tokio::test]
    async fn every_query_searches_every_source() {
        let search = Arc::new(FakeSearch::new());
        let retriever = MultiSourceRetriever::new(search.clone(), RetrievalConfig::default());

        retriever
            .retrieve(
                "bot",
                &["q1".to_string(), "q2".to_string()],
                &[source("s1"), source("s2")],
            )
            .await;

        let mut calls = search.calls();
        calls.sort();
        assert_eq!(
            calls,
            vec![
                ("q1".to_string(), "s1".to_string()),
                ("q1".to_string(), "s2".to_string()),
                ("q2".to_string(), "s1".to_string()),
                ("q2".to_string(), "s2".to_string()),
            ]
        );
    }

    /// Answers every query with the same chunk, slowing down chosen queries.
    struct SlowQuerySearch {
        slow_query: String,
        completed: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl KnowledgeSearch for SlowQuerySearch {
        async fn search(
            &self,
            query: &str,
            scope: &SearchScope,
            _limit: usize,
            _threshold: f32,
        ) -> Result<Vec<RetrievalHit>, ApiError> {
            if query == self.slow_query {
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
            self.completed.lock().unwrap().push(query.to_string());
            let score = if query == self.slow_query { 0.70 } else { 0.95 };
            Ok(vec![hit(&scope.source_id, "Plans start at $10/month", score, Some("https://p"))])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn original_query_wins_even_when_it_finishes_last() {
        let search = Arc::new(SlowQuerySearch {
            slow_query: "pricing".to_string(),
            completed: std::sync::Mutex::new(Vec::new()),
        });
        let retriever = MultiSourceRetriever::new(search.clone(), RetrievalConfig::default());

        let merged = retriever
            .retrieve(
                "bot",
                &["pricing".to_string(), "how much does it cost".to_string()],
                &[source("s1")],
            )
            .await;

        assert_eq!(
            *search.completed.lock().unwrap(),
            vec!["how much does it cost".to_string(), "pricing".to_string()]
        );
        assert_eq!(merged.hits.len(), 1);
        assert_eq!(merged.hits[0].score, 0.70);
        assert_eq!(merged.best_by_url["https://p"].score, 0.95);
        assert!(merged.failures.is_empty());
    }

    #[tokio::test]
    async fn no_sources_means_no_calls() {
        let search = Arc::new(FakeSearch::new());
        let retriever = MultiSourceRetriever::new(search.clone(), RetrievalConfig::default());

        let merged = retriever.retrieve("bot", &["q".to_string()], &[]).await;
        assert!(merged.hits.is_empty());
        assert!(search.calls().is_empty());
    }
}
