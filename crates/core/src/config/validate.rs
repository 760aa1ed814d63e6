use super::{types::Config, ConfigError, FetchStrategyKind};

/// Largest batch the task-creation endpoint accepts.
pub const MAX_BATCH_SIZE: usize = 100;

/// Validate configuration
/// Currently validates:
/// - API credentials are present (missing fields are rejected by serde)
/// - Batch, flush, and concurrency limits are non-zero and within API limits
/// - Retry rank window is not inverted
/// - Poll interval is non-zero when polling
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.api.username.trim().is_empty() || config.api.password.is_empty() {
        return Err(ConfigError::ValidationError(
            "api.username and api.password must be set".to_string(),
        ));
    }

    if config.submit.batch_size == 0 || config.submit.batch_size > MAX_BATCH_SIZE {
        return Err(ConfigError::ValidationError(format!(
            "submit.batch_size must be between 1 and {}",
            MAX_BATCH_SIZE
        )));
    }

    if config.submit.flush_threshold == 0 {
        return Err(ConfigError::ValidationError(
            "submit.flush_threshold cannot be 0".to_string(),
        ));
    }

    if config.fetch.max_concurrent == 0 {
        return Err(ConfigError::ValidationError(
            "fetch.max_concurrent cannot be 0".to_string(),
        ));
    }

    if config.fetch.request_chunk == 0 {
        return Err(ConfigError::ValidationError(
            "fetch.request_chunk cannot be 0".to_string(),
        ));
    }

    if config.fetch.strategy == FetchStrategyKind::Poll && config.fetch.poll_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "fetch.poll_interval_secs cannot be 0 when strategy is poll".to_string(),
        ));
    }

    if config.retry.rank_group_min > config.retry.rank_group_max {
        return Err(ConfigError::ValidationError(format!(
            "retry.rank_group_min ({}) is greater than retry.rank_group_max ({})",
            config.retry.rank_group_min, config.retry.rank_group_max
        )));
    }

    if config.retry.profiles.is_empty() {
        return Err(ConfigError::ValidationError(
            "retry.profiles needs at least one entry".to_string(),
        ));
    }

    Ok(())
}
