use std::time::Duration;

use async_trait::async_trait;

use super::traits::JobHandler;
use super::types::{DispatchError, HandlerContext, JobInput, JobOutput, JobType, TestOutput};

/// Connectivity-check handler (spec §3 `TEST`): does no real work, just
/// sleeps long enough that operators can observe a job transition
/// through `POLLING` → `WORKING` → `POLLING` end to end.
pub struct TestHandler;

#[async_trait]
impl JobHandler for TestHandler {
    fn job_type(&self) -> JobType {
        JobType::Test
    }

    async fn handle(&self, _input: JobInput, _ctx: &HandlerContext) -> Result<JobOutput, DispatchError> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(JobOutput::Test(TestOutput {}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ctx() -> HandlerContext {
        HandlerContext {
            storage_uri: "s3://bucket/key".to_string(),
            aws_region: "us-east-1".to_string(),
            s3_endpoint: None,
            cache_dir: std::env::temp_dir(),
            data_dir: std::env::temp_dir(),
            auth: Arc::new(crate::auth::AuthClient::new("https://example.com", "u", "p")),
            regional_data: Arc::new(crate::regional::RegionalData {
                regions: Default::default(),
            }),
            storage_override: None,
        }
    }

    #[tokio::test]
    async fn test_handler_returns_empty_output() {
        let handler = TestHandler;
        let input = JobInput::decode(JobType::Test, &serde_json::json!({})).unwrap();
        let output = handler.handle(input, &ctx()).await.unwrap();
        assert_eq!(output.job_type(), JobType::Test);
    }
}
