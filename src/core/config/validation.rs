use super::defaults::AppConfig;
use crate::core::errors::ApiError;

pub fn validate_config(config: &AppConfig) -> Result<(), ApiError> {
    validate_unit_interval("retrieval.threshold", config.retrieval.threshold)?;
    validate_unit_interval("selection.high_confidence", config.selection.high_confidence)?;
    validate_unit_interval(
        "selection.novelty_threshold",
        config.selection.novelty_threshold,
    )?;

    validate_nonzero("retrieval.limit", config.retrieval.limit as u64)?;
    validate_nonzero(
        "retrieval.max_concurrency",
        config.retrieval.max_concurrency as u64,
    )?;
    validate_nonzero("retrieval.timeout_secs", config.retrieval.timeout_secs)?;
    validate_nonzero("selection.max_chunks", config.selection.max_chunks as u64)?;
    validate_nonzero("history.max_messages", config.history.max_messages as u64)?;
    validate_nonzero("generation.max_tokens", config.generation.max_tokens as u64)?;
    validate_nonzero("generation.timeout_secs", config.generation.timeout_secs)?;
    if config.expansion.enabled {
        validate_nonzero("expansion.timeout_secs", config.expansion.timeout_secs)?;
    }

    if config.history.lookback_minutes <= 0 {
        return Err(ApiError::BadRequest(
            "history.lookback_minutes must be positive".to_string(),
        ));
    }

    if !(0.0..=2.0).contains(&config.generation.temperature) {
        return Err(ApiError::BadRequest(
            "generation.temperature must be between 0.0 and 2.0".to_string(),
        ));
    }

    if config.generation.default_model.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "generation.default_model must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_unit_interval(path: &str, value: f32) -> Result<(), ApiError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ApiError::BadRequest(format!(
            "{} must be between 0.0 and 1.0",
            path
        )));
    }
    Ok(())
}

fn validate_nonzero(path: &str, value: u64) -> Result<(), ApiError> {
    if value == 0 {
        return Err(ApiError::BadRequest(format!("{} must be at least 1", path)));
    }
    Ok(())
}
