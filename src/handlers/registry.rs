use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use super::traits::JobHandler;
use super::types::JobType;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no handler registered for job type: {0}")]
    NotFound(JobType),
}

/// Maps each configured [`JobType`] to the handler that executes it
/// (spec §3 `HandlerRegistry`, §4.D dispatch step 1). `BTreeMap` keeps
/// `job_types()` output in a deterministic order for logging and the
/// `--config-check` report.
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: BTreeMap<JobType, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(handler.job_type(), handler);
    }

    pub fn get(&self, job_type: JobType) -> Result<Arc<dyn JobHandler>, RegistryError> {
        self.handlers
            .get(&job_type)
            .cloned()
            .ok_or(RegistryError::NotFound(job_type))
    }

    pub fn has_handler(&self, job_type: JobType) -> bool {
        self.handlers.contains_key(&job_type)
    }

    pub fn job_types(&self) -> impl Iterator<Item = &JobType> {
        self.handlers.keys()
    }

    /// Registry carrying a handler for every job type the worker knows
    /// about. The process's configured `JOB_TYPES` (spec §6) narrows
    /// which of these the poll loop actually requests.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(super::test::TestHandler));
        registry.register(Arc::new(super::regional::RegionalAssessmentHandler));
        registry.register(Arc::new(super::suitability::SuitabilityAssessmentHandler));
        registry.register(Arc::new(super::dataspec::DataSpecificationHandler));
        registry
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
