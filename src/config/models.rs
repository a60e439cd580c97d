use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::handlers::JobType;

/// Raw configuration as deserialized from environment/dotenv, before
/// required-field validation. Every field is optional here so that a
/// missing required variable produces a named diagnostic instead of a
/// generic deserialize error (spec §4.A).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfig {
    pub api_endpoint: Option<String>,
    pub worker_username: Option<String>,
    pub worker_password: Option<String>,
    pub job_types: Option<String>,
    pub data_path: Option<String>,
    pub cache_path: Option<String>,
    pub aws_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub idle_timeout_ms: Option<u64>,
    pub sentry_dsn: Option<String>,
    pub http_timeout_poll_ms: Option<u64>,
    pub http_timeout_result_ms: Option<u64>,
}

/// Immutable startup configuration, owned by the worker for its lifetime
/// (spec §3 `WorkerConfig`).
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub api_endpoint: String,
    pub worker_username: String,
    pub worker_password: String,
    pub job_types: BTreeSet<JobType>,
    pub data_path: PathBuf,
    pub cache_path: PathBuf,
    pub aws_region: String,
    pub s3_endpoint: Option<String>,
    pub poll_interval_ms: u64,
    pub idle_timeout_ms: u64,
    pub sentry_dsn: Option<String>,
    pub http_timeout_poll_ms: u64,
    pub http_timeout_result_ms: u64,
}

pub fn default_poll_interval_ms() -> u64 {
    5000
}

pub fn default_idle_timeout_ms() -> u64 {
    600_000
}

pub fn default_http_timeout_poll_ms() -> u64 {
    30_000
}

pub fn default_http_timeout_result_ms() -> u64 {
    60_000
}
