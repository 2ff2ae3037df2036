use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[source] anyhow::Error),

    #[error("Failed to initialize conversation store: {0}")]
    History(#[source] anyhow::Error),

    #[error("Failed to initialize knowledge store: {0}")]
    Knowledge(#[source] anyhow::Error),
}
