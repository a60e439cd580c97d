//! The polling + claim + dispatch + reporting state machine
//!
//! States: `STARTING → POLLING ⇄ WORKING → STOPPING → DONE`, plus
//! `POLLING → STOPPING` on idle timeout. Modeled as a `Worker` aggregate
//! (config, auth client, regional data, handler registry) rather than
//! process-wide statics, per the design note resolving the reference
//! system's mutable-singleton pattern into owned values.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

use crate::assessment::{self, AssessmentError};
use crate::auth::{AuthClient, AuthError};
use crate::config::WorkerConfig;
use crate::error::{FailureKind, JobFailure};
use crate::handlers::{HandlerContext, HandlerRegistry, JobAssignment, JobInput, JobType};
use crate::observability::{reporter_for, ErrorReporter, Metrics};
use crate::regional::RegionalData;

const RESULT_POST_ATTEMPTS: u32 = 3;
const RESULT_POST_BASE_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to construct auth client: {0}")]
    AuthClient(#[from] AuthError),

    #[error("failed to warm regional data: {0}")]
    RegionalDataWarmup(#[from] AssessmentError),
}

/// The long-running worker aggregate (spec §4.G).
pub struct Worker {
    config: WorkerConfig,
    auth: Arc<AuthClient>,
    regional_data: Arc<RegionalData>,
    registry: HandlerRegistry,
    metrics: Metrics,
    reporter: Box<dyn ErrorReporter>,
}

impl Worker {
    /// `STARTING`: instantiate the auth client and warm the regional
    /// dataset before the polling loop begins, so the first claimed job
    /// doesn't pay that cost (spec §4.E).
    pub async fn bootstrap(config: WorkerConfig) -> Result<Self, StartupError> {
        let auth = Arc::new(AuthClient::with_timeout(
            config.api_endpoint.clone(),
            config.worker_username.clone(),
            config.worker_password.clone(),
            Duration::from_millis(config.http_timeout_poll_ms),
        )?);

        info!(data_path = %config.data_path.display(), "warming regional data");
        let regional_data = Arc::new(assessment::initialize_data(&config.data_path)?);

        let reporter = reporter_for(config.sentry_dsn.as_deref());

        Ok(Self {
            config,
            auth,
            regional_data,
            registry: HandlerRegistry::with_defaults(),
            metrics: Metrics::new(),
            reporter,
        })
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Run the `POLLING ⇄ WORKING` loop until idle timeout or a
    /// termination signal, then `STOPPING`. Returns the process exit
    /// code (spec §6: 0 on normal shutdown).
    pub async fn run(mut self) -> i32 {
        let poll_types: Vec<&str> = self.config.job_types.iter().map(JobType::as_tag).collect();
        let poll_path = format!("/jobs/poll?types={}", poll_types.join(","));
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let idle_timeout = Duration::from_millis(self.config.idle_timeout_ms);

        // Idle clock tracks time since the worker last had real work to
        // do, not mere API reachability; a fleet that keeps reaching an
        // API that only ever answers "no job" is exactly the idle case
        // the autoscale shutdown exists for (spec §1, §8 scenario 5).
        let mut idle_since = Instant::now();

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                return 1;
            }
        };

        loop {
            if idle_since.elapsed() >= idle_timeout {
                info!("idle timeout reached, stopping");
                break;
            }

            let poll_then_wait = async {
                match self.auth.get::<JobAssignment>(&poll_path).await {
                    Ok(Some(assignment)) => {
                        self.metrics.poll();
                        Some(assignment)
                    }
                    Ok(None) => {
                        self.metrics.poll();
                        tokio::time::sleep(poll_interval).await;
                        None
                    }
                    Err(err) => {
                        warn!(error = %err, "poll failed");
                        self.report_startup_like_failure(&err).await;
                        tokio::time::sleep(poll_interval).await;
                        None
                    }
                }
            };

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("received SIGINT, stopping");
                    break;
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, stopping");
                    break;
                }
                assignment = poll_then_wait => {
                    if let Some(assignment) = assignment {
                        idle_since = Instant::now();
                        self.handle_job(assignment).await;
                    }
                }
            }
        }

        0
    }

    async fn report_startup_like_failure(&self, err: &AuthError) {
        let kind = match err {
            AuthError::AuthFailure(_) => FailureKind::AuthFailure,
            _ => FailureKind::Transient,
        };
        self.reporter
            .report("poll", &JobFailure::new(kind, err.to_string()))
            .await;
    }

    /// `WORKING`: dispatch one claimed assignment and report its
    /// terminal outcome. One job in flight at a time (spec §4.G, §5
    /// "at-most-one-in-flight").
    async fn handle_job(&self, assignment: JobAssignment) {
        info!(job_id = %assignment.job_id, job_type = %assignment.job_type, "claimed job");

        let ctx = HandlerContext {
            storage_uri: assignment.storage_uri.clone(),
            aws_region: self.config.aws_region.clone(),
            s3_endpoint: self.config.s3_endpoint.clone(),
            cache_dir: self.config.cache_path.clone(),
            data_dir: self.config.data_path.clone(),
            auth: Arc::clone(&self.auth),
            regional_data: Arc::clone(&self.regional_data),
            storage_override: None,
        };

        let outcome = self.dispatch(&assignment, &ctx).await;

        match &outcome {
            Ok(_) => self.metrics.job_succeeded(),
            Err(failure) => {
                self.metrics.job_failed(failure.kind);
                self.reporter.report(&assignment.job_id, failure).await;
            }
        }

        self.post_result(&assignment.assignment_id, outcome).await;
    }

    async fn dispatch(&self, assignment: &JobAssignment, ctx: &HandlerContext) -> Result<Value, JobFailure> {
        let handler = self.registry.get(assignment.job_type).map_err(|e| {
            JobFailure::new(FailureKind::UnknownJobType, e.to_string())
        })?;

        let input = JobInput::decode(assignment.job_type, &assignment.input_payload)
            .map_err(|e| JobFailure::new(e.failure_kind(), e.to_string()))?;

        let output = handler
            .handle(input, ctx)
            .await
            .map_err(|e| JobFailure::new(e.failure_kind(), e.to_string()))?;

        if output.job_type() != assignment.job_type {
            return Err(JobFailure::new(
                FailureKind::Internal,
                format!(
                    "handler for {} returned a {} output",
                    assignment.job_type,
                    output.job_type()
                ),
            ));
        }

        Ok(output.to_json())
    }

    /// `POST /jobs/assignments/<id>/result`, retried up to
    /// [`RESULT_POST_ATTEMPTS`] times with exponential backoff; if all
    /// attempts fail the assignment is abandoned to the API's own
    /// lease-expiry mechanism (spec §4.G step 5).
    async fn post_result(&self, assignment_id: &str, outcome: Result<Value, JobFailure>) {
        let path = format!("/jobs/assignments/{assignment_id}/result");
        let payload = match outcome {
            Ok(output) => ResultPayload {
                status: "succeeded",
                output: Some(output),
                error: None,
            },
            Err(failure) => ResultPayload {
                status: "failed",
                output: None,
                error: Some(ResultError {
                    kind: failure.kind.as_str().to_string(),
                    message: failure.message,
                }),
            },
        };

        let mut backoff = RESULT_POST_BASE_BACKOFF;
        for attempt in 1..=RESULT_POST_ATTEMPTS {
            match self.auth.post::<_, Value>(&path, &payload).await {
                Ok(_) => return,
                Err(err) if attempt < RESULT_POST_ATTEMPTS => {
                    warn!(assignment_id, attempt, error = %err, "result POST failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(err) => {
                    error!(assignment_id, attempts = attempt, error = %err, "result POST exhausted retries, abandoning assignment");
                    self.reporter
                        .report(assignment_id, &JobFailure::new(FailureKind::Transient, err.to_string()))
                        .await;
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ResultPayload {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ResultError>,
}

#[derive(Debug, Serialize)]
struct ResultError {
    kind: String,
    message: String,
}
