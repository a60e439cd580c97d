use async_trait::async_trait;

use super::bounds::build_regional_parameters;
use super::storage_client_for;
use super::traits::JobHandler;
use super::types::{DispatchError, HandlerContext, JobInput, JobOutput, JobType, RegionalAssessmentOutput};
use crate::assessment;
use crate::cache::{regional_components, fingerprint, DiskCache};

const OUTPUT_FILENAME: &str = "regional_assessment.tiff";

/// Computes a regional suitability raster for a reef region, caching the
/// rendered COG by the fingerprint of its resolved parameters (spec §3
/// `REGIONAL_ASSESSMENT`, §5 caching).
pub struct RegionalAssessmentHandler;

#[async_trait]
impl JobHandler for RegionalAssessmentHandler {
    fn job_type(&self) -> JobType {
        JobType::RegionalAssessment
    }

    async fn handle(&self, input: JobInput, ctx: &HandlerContext) -> Result<JobOutput, DispatchError> {
        let input = match input {
            JobInput::Regional(i) => i,
            _ => return Err(DispatchError::Internal("dispatched wrong input variant".to_string())),
        };

        let params = build_regional_parameters(&input.region, &input.criteria, &ctx.regional_data)
            .map_err(|e| DispatchError::InvalidInput(e.to_string()))?;

        let hash = fingerprint(&regional_components(&params));
        let key = format!("{hash}_{}_regional_assessment", params.region);
        let cache = DiskCache::new(&ctx.cache_dir);

        let bytes = if cache.exists(&key, "tiff") {
            cache
                .read(&key, "tiff")
                .await
                .map_err(|e| DispatchError::Internal(e.to_string()))?
        } else {
            let rendered = assessment::assess_region(&params).map_err(|e| DispatchError::Internal(e.to_string()))?;
            cache
                .write_atomic(&key, "tiff", &rendered)
                .await
                .map_err(|e| DispatchError::Internal(e.to_string()))?;
            rendered
        };

        let target = format!("{}/{OUTPUT_FILENAME}", ctx.storage_uri.trim_end_matches('/'));
        storage_client_for(ctx)
            .upload(&target, bytes)
            .await
            .map_err(|e| DispatchError::UploadFailure(e.to_string()))?;

        Ok(JobOutput::Regional(RegionalAssessmentOutput {
            cog_path: OUTPUT_FILENAME.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use crate::regional::{BoundedCriteriaRaw, RegionEntry, RegionalData};

    fn regional_data() -> RegionalData {
        let mut criteria = BTreeMap::new();
        criteria.insert("depth".to_string(), BoundedCriteriaRaw { min: 3.0, max: 40.0, ..Default::default() });
        let mut regions = BTreeMap::new();
        regions.insert(
            "GBR".to_string(),
            RegionEntry {
                name: "Great Barrier Reef".to_string(),
                criteria,
            },
        );
        RegionalData { regions }
    }

    fn ctx(cache_dir: std::path::PathBuf) -> HandlerContext {
        HandlerContext {
            storage_uri: "s3://bucket/out.tiff".to_string(),
            aws_region: "us-east-1".to_string(),
            s3_endpoint: None,
            cache_dir,
            data_dir: std::env::temp_dir(),
            auth: Arc::new(crate::auth::AuthClient::new("https://example.com", "u", "p")),
            regional_data: Arc::new(regional_data()),
            storage_override: None,
        }
    }

    #[tokio::test]
    async fn unknown_region_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let handler = RegionalAssessmentHandler;
        let input = JobInput::decode(JobType::RegionalAssessment, &serde_json::json!({ "region": "ATLANTIS" }))
            .unwrap();
        let err = handler.handle(input, &ctx(dir.path().to_path_buf())).await.unwrap_err();
        assert!(matches!(err, DispatchError::InvalidInput(_)));
    }
}
