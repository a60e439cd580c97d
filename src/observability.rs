//! Observability: counters plus a best-effort error-reporting sink
//!
//! The worker doesn't ship a metrics exporter or a log aggregator (spec
//! §1, out of scope); what it does carry is the minimal "count what
//! happened" and "tell someone when something alert-worthy happened"
//! surface the runtime itself depends on (spec §6 `SENTRY_DSN`, §7
//! "observability alert emitted").

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::error::{FailureKind, JobFailure};

/// Metrics handle for recording counters.
#[derive(Debug, Default)]
pub struct Metrics {
    jobs_succeeded: AtomicU64,
    jobs_failed: AtomicU64,
    polls: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_succeeded(&self) {
        self.jobs_succeeded.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_succeeded", "metric incremented");
    }

    pub fn job_failed(&self, kind: FailureKind) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_failed", kind = %kind, "metric incremented");
    }

    pub fn poll(&self) {
        self.polls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_succeeded: self.jobs_succeeded.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            polls: self.polls.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub polls: u64,
}

/// Best-effort failure reporting sink. A no-op unless `SENTRY_DSN` is
/// configured, in which case failures alert-worthy per
/// [`FailureKind::is_alert_worthy`] are forwarded.
#[async_trait]
pub trait ErrorReporter: Send + Sync {
    async fn report(&self, context: &str, failure: &JobFailure);
}

pub struct NoopReporter;

#[async_trait]
impl ErrorReporter for NoopReporter {
    async fn report(&self, _context: &str, _failure: &JobFailure) {}
}

/// Minimal Sentry-compatible event reporter. Posts a small JSON envelope
/// to the configured DSN's `store` endpoint; failures to report are
/// themselves only logged, never propagated (a broken observability
/// sink must not take down the worker).
pub struct SentryReporter {
    client: reqwest::Client,
    dsn: String,
}

impl SentryReporter {
    pub fn new(dsn: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            dsn,
        }
    }
}

#[async_trait]
impl ErrorReporter for SentryReporter {
    async fn report(&self, context: &str, failure: &JobFailure) {
        if !failure.kind.is_alert_worthy() {
            return;
        }

        let payload = serde_json::json!({
            "message": failure.message,
            "level": "error",
            "extra": { "context": context, "kind": failure.kind.as_str() },
        });

        if let Err(err) = self.client.post(&self.dsn).json(&payload).send().await {
            tracing::warn!(error = %err, "failed to report failure to observability sink");
        }
    }
}

/// Build the configured reporter: [`SentryReporter`] if a DSN is set,
/// [`NoopReporter`] otherwise.
pub fn reporter_for(sentry_dsn: Option<&str>) -> Box<dyn ErrorReporter> {
    match sentry_dsn {
        Some(dsn) if !dsn.trim().is_empty() => Box::new(SentryReporter::new(dsn.to_string())),
        _ => Box::new(NoopReporter),
    }
}
