use async_trait::async_trait;
use serde_json::json;

use super::bounds::build_regional_parameters;
use super::storage_client_for;
use super::traits::JobHandler;
use super::types::{
    DispatchError, HandlerContext, JobInput, JobOutput, JobType, SuitabilityAssessmentOutput,
    SuitabilityAssessmentParameters,
};
use crate::assessment::{self, DEFAULT_SUITABILITY_THRESHOLD};
use crate::cache::{fingerprint, suitability_components, DiskCache};

const DEFAULT_X_DIST: f64 = 0.01;
const DEFAULT_Y_DIST: f64 = 0.01;
const OUTPUT_FILENAME: &str = "suitable.geojson";

/// Scores candidate sites within a region and writes a GeoJSON
/// `FeatureCollection` of those passing the suitability threshold (spec
/// §3 `SUITABILITY_ASSESSMENT`). Cached at the same granularity as a
/// regional assessment, plus the three suitability-only fields (spec §9
/// design note).
pub struct SuitabilityAssessmentHandler;

#[async_trait]
impl JobHandler for SuitabilityAssessmentHandler {
    fn job_type(&self) -> JobType {
        JobType::SuitabilityAssessment
    }

    async fn handle(&self, input: JobInput, ctx: &HandlerContext) -> Result<JobOutput, DispatchError> {
        let input = match input {
            JobInput::Suitability(i) => i,
            _ => return Err(DispatchError::Internal("dispatched wrong input variant".to_string())),
        };

        let regional = build_regional_parameters(&input.region, &input.criteria, &ctx.regional_data)
            .map_err(|e| DispatchError::InvalidInput(e.to_string()))?;

        let params = SuitabilityAssessmentParameters {
            regional,
            threshold: input.threshold.unwrap_or(DEFAULT_SUITABILITY_THRESHOLD),
            x_dist: input.x_dist.unwrap_or(DEFAULT_X_DIST),
            y_dist: input.y_dist.unwrap_or(DEFAULT_Y_DIST),
        };

        let hash = fingerprint(&suitability_components(&params));
        let key = format!("{hash}_{}_suitability_assessment", params.regional.region);
        let cache = DiskCache::new(&ctx.cache_dir);

        let bytes = if cache.exists(&key, "geojson") {
            cache
                .read(&key, "geojson")
                .await
                .map_err(|e| DispatchError::Internal(e.to_string()))?
        } else {
            let sites = assessment::assess_sites(&params.regional).map_err(|e| DispatchError::Internal(e.to_string()))?;
            let kept = assessment::filter_sites(sites, params.threshold, params.x_dist, params.y_dist);
            let geojson = to_geojson(&kept);
            let rendered = serde_json::to_vec(&geojson).map_err(|e| DispatchError::Internal(e.to_string()))?;
            cache
                .write_atomic(&key, "geojson", &rendered)
                .await
                .map_err(|e| DispatchError::Internal(e.to_string()))?;
            rendered
        };

        // The rendered artifact remains in the disk cache after upload
        // so a repeat request with the same parameters is a cache hit;
        // only the uploaded copy is transient.
        let target = format!("{}/{OUTPUT_FILENAME}", ctx.storage_uri.trim_end_matches('/'));
        storage_client_for(ctx)
            .upload(&target, bytes)
            .await
            .map_err(|e| DispatchError::UploadFailure(e.to_string()))?;

        Ok(JobOutput::Suitability(SuitabilityAssessmentOutput {
            geojson_path: OUTPUT_FILENAME.to_string(),
        }))
    }
}

/// `null` when no site passed the threshold, otherwise a standard
/// GeoJSON `FeatureCollection` (spec §4.H step 3).
fn to_geojson(sites: &[assessment::SiteCandidate]) -> serde_json::Value {
    if sites.is_empty() {
        return serde_json::Value::Null;
    }

    let features: Vec<_> = sites
        .iter()
        .map(|s| {
            json!({
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [s.lon, s.lat] },
                "properties": { "score": s.score },
            })
        })
        .collect();

    json!({ "type": "FeatureCollection", "features": features })
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
            storage_uri: "s3://bucket/jobs/42".to_string(),
            aws_region: "us-east-1".to_string(),
            s3_endpoint: None,
            cache_dir,
            data_dir: std::env::temp_dir(),
            auth: Arc::new(crate::auth::AuthClient::new("https://example.com", "u", "p")),
            regional_data: Arc::new(regional_data()),
            storage_override: None,
        }
    }

    #[test]
    fn empty_site_list_serializes_as_null() {
        let geojson = to_geojson(&[]);
        assert!(geojson.is_null());
    }

    #[test]
    fn nonempty_site_list_serializes_as_feature_collection() {
        let sites = [assessment::SiteCandidate { lon: 145.0, lat: -16.0, score: 0.9 }];
        let geojson = to_geojson(&sites);
        assert_eq!(geojson["type"], "FeatureCollection");
        assert_eq!(geojson["features"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_region_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let handler = SuitabilityAssessmentHandler;
        let input =
            JobInput::decode(JobType::SuitabilityAssessment, &serde_json::json!({ "region": "ATLANTIS" })).unwrap();
        let err = handler.handle(input, &ctx(dir.path().to_path_buf())).await.unwrap_err();
        assert!(matches!(err, DispatchError::InvalidInput(_)));
    }
}
