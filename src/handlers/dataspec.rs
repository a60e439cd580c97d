use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::traits::JobHandler;
use super::types::{DataSpecUpdateOutput, DispatchError, HandlerContext, JobInput, JobOutput, JobType};
use crate::auth::AuthError;

/// Pushes the worker's in-memory regional dataset to the dispatch API's
/// data-specification endpoint (spec §3 `DATA_SPECIFICATION_UPDATE`).
/// `cache_buster` is accepted but never interpreted: its only purpose is
/// to make an otherwise-identical request non-idempotent on the API
/// side (spec §4.H).
pub struct DataSpecificationHandler;

#[derive(Debug, Serialize)]
struct DataSpecPayload {
    regions: Vec<RegionPayload>,
}

#[derive(Debug, Serialize)]
struct RegionPayload {
    code: String,
    name: String,
    criteria: Vec<CriterionPayload>,
}

#[derive(Debug, Serialize)]
struct CriterionPayload {
    id: String,
    min: f64,
    max: f64,
    default_min: f64,
    default_max: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<String>,
}

#[async_trait]
impl JobHandler for DataSpecificationHandler {
    fn job_type(&self) -> JobType {
        JobType::DataSpecificationUpdate
    }

    async fn handle(&self, input: JobInput, ctx: &HandlerContext) -> Result<JobOutput, DispatchError> {
        match input {
            JobInput::DataSpec(_) => {}
            _ => return Err(DispatchError::Internal("dispatched wrong input variant".to_string())),
        };

        let payload = build_payload(&ctx.regional_data);

        let _: Value = ctx
            .auth
            .post("/admin/data-specification", &payload)
            .await
            .map_err(classify)?;

        Ok(JobOutput::DataSpec(DataSpecUpdateOutput {}))
    }
}

/// Project the regional dataset into the admin API's expected shape:
/// every region's criteria with their current bounds, display metadata,
/// and recommended defaults (spec §4.H step 1).
fn build_payload(regional_data: &crate::regional::RegionalData) -> DataSpecPayload {
    let regions = regional_data
        .regions
        .iter()
        .map(|(code, entry)| RegionPayload {
            code: code.clone(),
            name: entry.name.clone(),
            criteria: entry
                .criteria
                .iter()
                .map(|(id, bound)| {
                    let (default_min, default_max) = bound.default_bounds();
                    CriterionPayload {
                        id: id.clone(),
                        min: bound.min,
                        max: bound.max,
                        default_min,
                        default_max,
                        label: bound.label.clone(),
                        unit: bound.unit.clone(),
                    }
                })
                .collect(),
        })
        .collect();

    DataSpecPayload { regions }
}

fn classify(err: AuthError) -> DispatchError {
    match err {
        AuthError::AuthFailure(_) => DispatchError::Internal(err.to_string()),
        AuthError::Transient(_) => DispatchError::Internal(format!("transient: {err}")),
        AuthError::BadRequest(_) => DispatchError::InvalidInput(err.to_string()),
        AuthError::Protocol(_) => DispatchError::Internal(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regional::{BoundedCriteriaRaw, RegionEntry, RegionalData};
    use std::collections::BTreeMap;

    #[test]
    fn build_payload_falls_back_to_current_bounds_when_default_unset() {
        let mut criteria = BTreeMap::new();
        criteria.insert(
            "depth".to_string(),
            BoundedCriteriaRaw {
                min: 3.0,
                max: 40.0,
                label: Some("Depth".to_string()),
                unit: Some("m".to_string()),
                ..Default::default()
            },
        );
        let mut regions = BTreeMap::new();
        regions.insert(
            "GBR".to_string(),
            RegionEntry {
                name: "Great Barrier Reef".to_string(),
                criteria,
            },
        );
        let data = RegionalData { regions };

        let payload = build_payload(&data);
        assert_eq!(payload.regions.len(), 1);
        let region = &payload.regions[0];
        assert_eq!(region.code, "GBR");
        let criterion = &region.criteria[0];
        assert_eq!(criterion.default_min, 3.0);
        assert_eq!(criterion.default_max, 40.0);
        assert_eq!(criterion.label.as_deref(), Some("Depth"));
    }

    #[test]
    fn build_payload_honors_explicit_default_bounds() {
        let mut criteria = BTreeMap::new();
        criteria.insert(
            "depth".to_string(),
            BoundedCriteriaRaw {
                min: 3.0,
                max: 40.0,
                default_min: Some(5.0),
                default_max: Some(35.0),
                ..Default::default()
            },
        );
        let mut regions = BTreeMap::new();
        regions.insert(
            "GBR".to_string(),
            RegionEntry {
                name: "Great Barrier Reef".to_string(),
                criteria,
            },
        );
        let data = RegionalData { regions };

        let payload = build_payload(&data);
        let criterion = &payload.regions[0].criteria[0];
        assert_eq!(criterion.default_min, 5.0);
        assert_eq!(criterion.default_max, 35.0);
    }
}
