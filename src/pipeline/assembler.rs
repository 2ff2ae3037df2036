//! Context assembly.
//!
//! Renders selected hits into the prompt's knowledge block and extracts the
//! citations shown under the answer.

use std::cmp::Ordering;
use std::collections::HashMap;

use super::types::{ContextBlock, SourceCitation};
use crate::rag::RetrievalHit;

const CHUNK_SEPARATOR: &str = "\n\n---\n\n";

pub struct ContextAssembler {
    max_citations: usize,
}

impl ContextAssembler {
    pub fn new(max_citations: usize) -> Self {
        Self { max_citations }
    }

    /// Build the context block from already-selected hits.
    pub fn build_context(&self, selected: Vec<RetrievalHit>) -> ContextBlock {
        if selected.is_empty() {
            return ContextBlock::default();
        }

        let blocks: Vec<String> = selected
            .iter()
            .enumerate()
            .map(|(i, hit)| {
                format!(
                    "[Chunk {} | Relevance: {}% | Source: {}]\n{}",
                    i + 1,
                    (hit.score * 100.0).round() as i64,
                    hit.source_name,
                    hit.content.trim()
                )
            })
            .collect();

        let text = format!(
            "Retrieved knowledge ({} chunks):\n\n{}",
            selected.len(),
            blocks.join(CHUNK_SEPARATOR)
        );

        ContextBlock {
            hits: selected,
            text,
        }
    }

    /// Top citations by score, one per URL. Ties break on URL ascending.
    pub fn citations(
        &self,
        context: &ContextBlock,
        best_by_url: &HashMap<String, RetrievalHit>,
        threshold: f32,
    ) -> Vec<SourceCitation> {
        if context.is_empty() {
            return Vec::new();
        }

        let mut citations: Vec<SourceCitation> = best_by_url
            .iter()
            .filter(|(_, hit)| hit.score > threshold)
            .map(|(url, hit)| SourceCitation {
                title: citation_title(hit, url),
                url: url.clone(),
                score: hit.score,
            })
            .collect();

        citations.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.url.cmp(&b.url))
        });
        citations.truncate(self.max_citations);
        citations
    }
}

fn citation_title(hit: &RetrievalHit, url: &str) -> String {
    [hit.metadata.title.as_deref(), Some(hit.source_name.as_str())]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|t| !t.is_empty())
        .unwrap_or(url)
        .to_string()
}
