use std::cmp::Ordering;
use std::collections::HashSet;

use crate::core::config::defaults::SelectionConfig;
use crate::rag::RetrievalHit;

/// Trims merged hits to a bounded set that adds new information.
pub struct DiversitySelector {
    config: SelectionConfig,
}

impl DiversitySelector {
    pub fn new(config: SelectionConfig) -> Self {
        Self { config }
    }

    pub fn select(&self, hits: &[RetrievalHit]) -> Vec<RetrievalHit> {
        let mut ranked: Vec<&RetrievalHit> = hits.iter().collect();
        // `sort_by` is stable, so equal scores keep merge order.
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        let mut seen_terms: HashSet<String> = HashSet::new();
        let mut accepted: Vec<RetrievalHit> = Vec::new();

        for hit in ranked {
            if accepted.len() >= self.config.max_chunks {
                break;
            }

            let terms = self.terms(&hit.content);
            let novelty = if terms.is_empty() {
                0.0
            } else {
                let unseen = terms.iter().filter(|t| !seen_terms.contains(*t)).count();
                unseen as f32 / terms.len() as f32
            };

            let accept = hit.score > self.config.high_confidence
                || novelty > self.config.novelty_threshold
                || accepted.len() < self.config.min_accepted;
            if !accept {
                tracing::trace!(score = hit.score, novelty, "Skipping redundant chunk");
                continue;
            }

            seen_terms.extend(terms);
            accepted.push(hit.clone());
        }

        accepted
    }

    fn terms(&self, content: &str) -> HashSet<String> {
        content
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.chars().count() > self.config.min_term_len)
            .map(str::to_lowercase)
            .collect()
    }
}
