//! Configuration loading for the worker runtime
//!
//! Settings are read from named environment variables (spec §6), with an
//! optional `.env` file loaded first for local development, mirroring the
//! reference crate's layered `config` + `dotenvy` setup. Every required
//! field missing at startup produces a diagnostic naming the variable
//! rather than a generic deserialization failure.

mod models;
mod sources;
mod validation;

pub use models::WorkerConfig;
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl WorkerConfig {
    /// Load and validate configuration from the process environment
    /// (plus `.env`, if present).
    pub fn load() -> Result<Self, ConfigError> {
        let raw = sources::load()?;
        Ok(validation::validate(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn load_surfaces_missing_field_as_validation_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe {
            std::env::remove_var("API_ENDPOINT");
            std::env::remove_var("WORKER_USERNAME");
            std::env::remove_var("WORKER_PASSWORD");
            std::env::remove_var("JOB_TYPES");
            std::env::remove_var("DATA_PATH");
            std::env::remove_var("CACHE_PATH");
            std::env::remove_var("AWS_REGION");
        }
        let err = WorkerConfig::load().unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }
}
