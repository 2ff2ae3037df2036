//! Knowledge retrieval backend.
//!
//! This module provides:
//! - `KnowledgeSearch`: the vector-search capability the pipeline consumes
//! - `SqliteKnowledgeStore`: an embedded implementation over SQLite

mod sqlite;
mod store;

pub use sqlite::SqliteKnowledgeStore;
pub use store::{HitMetadata, KnowledgeSearch, RetrievalHit, SearchScope};
