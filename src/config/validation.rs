use std::collections::BTreeSet;
use std::path::PathBuf;

use thiserror::Error;

use super::models::{
    RawConfig, WorkerConfig, default_http_timeout_poll_ms, default_http_timeout_result_ms,
    default_idle_timeout_ms, default_poll_interval_ms,
};
use crate::handlers::JobType;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("missing required environment variable: {0}")]
    MissingField(&'static str),

    #[error("JOB_TYPES is empty; at least one job type must be configured")]
    EmptyJobTypes,

    #[error("unrecognized job type '{0}' in JOB_TYPES")]
    UnknownJobType(String),
}

/// Turn a [`RawConfig`] into a validated [`WorkerConfig`], failing fast with
/// a diagnostic naming the offending variable (spec §4.A).
pub fn validate(raw: RawConfig) -> Result<WorkerConfig, ValidationError> {
    let api_endpoint = required(raw.api_endpoint, "API_ENDPOINT")?;
    let worker_username = required(raw.worker_username, "WORKER_USERNAME")?;
    let worker_password = required(raw.worker_password, "WORKER_PASSWORD")?;
    let job_types_raw = required(raw.job_types, "JOB_TYPES")?;
    let data_path = required(raw.data_path, "DATA_PATH")?;
    let cache_path = required(raw.cache_path, "CACHE_PATH")?;
    let aws_region = required(raw.aws_region, "AWS_REGION")?;

    let job_types = parse_job_types(&job_types_raw)?;

    Ok(WorkerConfig {
        api_endpoint,
        worker_username,
        worker_password,
        job_types,
        data_path: PathBuf::from(data_path),
        cache_path: PathBuf::from(cache_path),
        aws_region,
        s3_endpoint: raw.s3_endpoint,
        poll_interval_ms: raw.poll_interval_ms.unwrap_or_else(default_poll_interval_ms),
        idle_timeout_ms: raw.idle_timeout_ms.unwrap_or_else(default_idle_timeout_ms),
        sentry_dsn: raw.sentry_dsn,
        http_timeout_poll_ms: raw
            .http_timeout_poll_ms
            .unwrap_or_else(default_http_timeout_poll_ms),
        http_timeout_result_ms: raw
            .http_timeout_result_ms
            .unwrap_or_else(default_http_timeout_result_ms),
    })
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField(name)),
    }
}

fn parse_job_types(raw: &str) -> Result<BTreeSet<JobType>, ValidationError> {
    let mut set = BTreeSet::new();
    for tag in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let job_type =
            JobType::parse(tag).ok_or_else(|| ValidationError::UnknownJobType(tag.to_string()))?;
        set.insert(job_type);
    }
    if set.is_empty() {
        return Err(ValidationError::EmptyJobTypes);
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_raw() -> RawConfig {
        RawConfig {
            api_endpoint: Some("https://api.example.com".into()),
            worker_username: Some("user".into()),
            worker_password: Some("pass".into()),
            job_types: Some("TEST,REGIONAL_ASSESSMENT".into()),
            data_path: Some("/data".into()),
            cache_path: Some("/cache".into()),
            aws_region: Some("us-east-1".into()),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_valid_config() {
        let config = validate(base_raw()).unwrap();
        assert_eq!(config.job_types.len(), 2);
        assert_eq!(config.poll_interval_ms, 5000);
        assert_eq!(config.idle_timeout_ms, 600_000);
    }

    #[test]
    fn missing_required_field_names_it() {
        let mut raw = base_raw();
        raw.api_endpoint = None;
        let err = validate(raw).unwrap_err();
        assert!(matches!(err, ValidationError::MissingField("API_ENDPOINT")));
    }

    #[test]
    fn unknown_job_type_is_rejected() {
        let mut raw = base_raw();
        raw.job_types = Some("NOT_A_TYPE".into());
        let err = validate(raw).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownJobType(ref t) if t == "NOT_A_TYPE"));
    }

    #[test]
    fn empty_job_types_is_rejected() {
        let mut raw = base_raw();
        raw.job_types = Some("   ".into());
        let err = validate(raw).unwrap_err();
        assert!(matches!(err, ValidationError::MissingField("JOB_TYPES")));
    }

    #[test]
    fn whitespace_and_case_insensitive_job_types() {
        let mut raw = base_raw();
        raw.job_types = Some(" test , regional_assessment ".into());
        let config = validate(raw).unwrap();
        assert!(config.job_types.contains(&JobType::Test));
        assert!(config.job_types.contains(&JobType::RegionalAssessment));
    }
}
