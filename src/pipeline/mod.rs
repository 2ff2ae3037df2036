//! Retrieval-augmented answering pipeline.
//!
//! One turn runs: query expansion, multi-source retrieval, diversity
//! selection, context assembly, trigger evaluation, prompt composition,
//! generation, formatting, persistence. [`Pipeline`] sequences the stages;
//! each stage lives in its own module and is usable on its own.

pub mod assembler;
pub mod expander;
pub mod formatter;
pub mod generator;
pub mod orchestrator;
pub mod prompt;
pub mod retriever;
pub mod selector;
pub mod triggers;
pub mod types;

#[cfg(test)]
mod test_support;

pub use orchestrator::Pipeline;
pub use retriever::{content_key, MergedHits, MultiSourceRetriever, SourceFailure};
pub use types::{ContextBlock, PipelineResult, PipelineStage, SourceCitation};
