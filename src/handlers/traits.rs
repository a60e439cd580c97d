use async_trait::async_trait;

use super::types::{DispatchError, HandlerContext, JobInput, JobOutput, JobType};

/// A handler for exactly one [`JobType`] (spec §3, §4.D dispatch).
/// Modeled on the reference crate's manifest-processing trait, collapsed
/// from its three-step `prepare_manifest` / `build_tasks` / `finalize_job`
/// pipeline into a single `handle` call: each of this worker's job kinds
/// is a single request/response computation rather than a multi-task
/// download fan-out.
#[async_trait]
pub trait JobHandler: Send + Sync {
    fn job_type(&self) -> JobType;

    async fn handle(&self, input: JobInput, ctx: &HandlerContext) -> Result<JobOutput, DispatchError>;
}
