//! Typed job handlers
//!
//! Each job type the worker understands gets one [`JobHandler`]
//! implementation, looked up through a [`HandlerRegistry`] keyed by
//! [`JobType`] rather than the reference crate's string-keyed registry
//! (spec §3, §4.D dispatch).

mod bounds;
mod dataspec;
mod regional;
mod registry;
mod suitability;
mod test;
mod traits;
pub mod types;

pub use registry::{HandlerRegistry, RegistryError};
pub use traits::JobHandler;
pub use types::{
    CriteriaOverride, DispatchError, HandlerContext, JobAssignment, JobInput, JobOutput, JobType,
};

/// Build the [`crate::storage::StorageClient`] a handler should upload
/// through: the context's test-only override when set, otherwise a real
/// per-job client built from `aws_region`/`s3_endpoint` (spec §4.C, §4.G).
pub(crate) fn storage_client_for(ctx: &HandlerContext) -> crate::storage::StorageClient {
    match &ctx.storage_override {
        Some(store) => crate::storage::StorageClient::with_store(std::sync::Arc::clone(store)),
        None => crate::storage::StorageClient::for_job(ctx.aws_region.clone(), ctx.s3_endpoint.clone()),
    }
}
