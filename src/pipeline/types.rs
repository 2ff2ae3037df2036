use std::fmt;

use serde::Serialize;

use crate::chatbot::Trigger;
use crate::rag::RetrievalHit;

/// A cited source, keyed by URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceCitation {
    pub title: String,
    pub url: String,
    pub score: f32,
}

/// Selected hits plus their rendered prompt text. Empty means "no grounding".
#[derive(Debug, Clone, Default)]
pub struct ContextBlock {
    pub hits: Vec<RetrievalHit>,
    pub text: String,
}

impl ContextBlock {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub answer_html: String,
    pub citations: Vec<SourceCitation>,
    pub triggered_logics: Vec<Trigger>,
    pub conversation_id: String,
}

/// Turn lifecycle. `Persisted` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    Expanding,
    Retrieving,
    Composing,
    Generating,
    Formatting,
    Persisted,
    Failed,
}

impl PipelineStage {
    pub fn can_transition_to(self, next: PipelineStage) -> bool {
        use PipelineStage::*;
        matches!(
            (self, next),
            (Received, Expanding)
                | (Received, Failed)
                | (Expanding, Retrieving)
                | (Retrieving, Composing)
                | (Composing, Generating)
                | (Generating, Formatting)
                | (Generating, Failed)
                | (Formatting, Persisted)
                | (Formatting, Failed)
        )
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Received => "received",
            PipelineStage::Expanding => "expanding",
            PipelineStage::Retrieving => "retrieving",
            PipelineStage::Composing => "composing",
            PipelineStage::Generating => "generating",
            PipelineStage::Formatting => "formatting",
            PipelineStage::Persisted => "persisted",
            PipelineStage::Failed => "failed",
        };
        f.write_str(name)
    }
}
