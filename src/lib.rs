pub mod chatbot;
pub mod core;
pub mod history;
pub mod llm;
pub mod pipeline;
pub mod rag;
pub mod server;
pub mod state;
