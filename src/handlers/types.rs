use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FailureKind;
use crate::regional::BoundedCriteria;

/// Closed enumeration of job kinds the worker may handle (spec §3).
/// Extensible in principle (new kinds need only a handler + schema), but
/// the wire tags are fixed for the four kinds the source system defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum JobType {
    #[serde(rename = "TEST")]
    Test,
    #[serde(rename = "REGIONAL_ASSESSMENT")]
    RegionalAssessment,
    #[serde(rename = "SUITABILITY_ASSESSMENT")]
    SuitabilityAssessment,
    #[serde(rename = "DATA_SPECIFICATION_UPDATE")]
    DataSpecificationUpdate,
}

impl JobType {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "TEST" => Some(Self::Test),
            "REGIONAL_ASSESSMENT" => Some(Self::RegionalAssessment),
            "SUITABILITY_ASSESSMENT" => Some(Self::SuitabilityAssessment),
            "DATA_SPECIFICATION_UPDATE" => Some(Self::DataSpecificationUpdate),
            _ => None,
        }
    }

    pub fn as_tag(self) -> &'static str {
        match self {
            JobType::Test => "TEST",
            JobType::RegionalAssessment => "REGIONAL_ASSESSMENT",
            JobType::SuitabilityAssessment => "SUITABILITY_ASSESSMENT",
            JobType::DataSpecificationUpdate => "DATA_SPECIFICATION_UPDATE",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Received from the API when a claim succeeds (spec §3 `JobAssignment`).
#[derive(Debug, Clone, Deserialize)]
pub struct JobAssignment {
    pub assignment_id: String,
    pub job_id: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub input_payload: Value,
    pub storage_uri: String,
    #[serde(default)]
    pub storage_scheme: Option<String>,
}

/// Per-job immutable context handed to a handler (spec §3
/// `HandlerContext`).
pub struct HandlerContext {
    pub storage_uri: String,
    pub aws_region: String,
    pub s3_endpoint: Option<String>,
    pub cache_dir: std::path::PathBuf,
    pub data_dir: std::path::PathBuf,
    pub auth: std::sync::Arc<crate::auth::AuthClient>,
    pub regional_data: std::sync::Arc<crate::regional::RegionalData>,
    /// Test-only seam mirroring [`crate::storage::StorageClient::with_store`]:
    /// always `None` in production, where handlers build a real
    /// `StorageClient` from `aws_region`/`s3_endpoint` per job. Tests set
    /// this to swap in an in-memory store without touching real S3.
    pub storage_override: Option<std::sync::Arc<dyn object_store::ObjectStore>>,
}

/// Error raised while decoding, validating, or executing a job. Converts
/// into a [`FailureKind`] for reporting (spec §7).
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown job type: {0}")]
    UnknownJobType(JobType),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("upload failed: {0}")]
    UploadFailure(String),
}

impl DispatchError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            DispatchError::UnknownJobType(_) => FailureKind::UnknownJobType,
            DispatchError::InvalidInput(_) => FailureKind::InvalidInput,
            DispatchError::Internal(_) => FailureKind::Internal,
            DispatchError::UploadFailure(_) => FailureKind::UploadFailure,
        }
    }
}

/// A per-criterion override supplied by the caller. Either bound may be
/// absent, in which case the regional default applies (spec §4.H bounds
/// merging rule).
#[derive(Debug, Clone, Copy, Default)]
pub struct CriteriaOverride {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Parse the flexible `<criterion>_min` / `<criterion>_max` fields a
/// caller may include alongside `region` (spec §9 design note: a single
/// criteria map keyed by id, decoded from a flexible JSON object, rather
/// than one hard-coded Rust field per criterion).
pub fn parse_criteria_overrides(obj: &Map<String, Value>) -> BTreeMap<String, CriteriaOverride> {
    let mut map: BTreeMap<String, CriteriaOverride> = BTreeMap::new();
    for (key, value) in obj {
        if let Some(id) = key.strip_suffix("_min") {
            map.entry(id.to_string()).or_default().min = value.as_f64();
        } else if let Some(id) = key.strip_suffix("_max") {
            map.entry(id.to_string()).or_default().max = value.as_f64();
        }
    }
    map
}

#[derive(Debug, Clone)]
pub struct TestInput {
    pub id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestOutput {}

#[derive(Debug, Clone)]
pub struct RegionalAssessmentInput {
    pub region: String,
    pub reef_type: Option<String>,
    pub criteria: BTreeMap<String, CriteriaOverride>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionalAssessmentOutput {
    pub cog_path: String,
}

#[derive(Debug, Clone)]
pub struct SuitabilityAssessmentInput {
    pub region: String,
    pub reef_type: Option<String>,
    pub criteria: BTreeMap<String, CriteriaOverride>,
    pub threshold: Option<f64>,
    pub x_dist: Option<f64>,
    pub y_dist: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuitabilityAssessmentOutput {
    pub geojson_path: String,
}

#[derive(Debug, Clone)]
pub struct DataSpecUpdateInput {
    /// Opaque; presence (not value) forces the API to treat the call as
    /// non-idempotent (spec §4.H). The worker never interprets it.
    pub cache_buster: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DataSpecUpdateOutput {}

/// Resolved parameters for a regional assessment, derived from (input,
/// regional data) via bounds-merging (spec §3 `AssessmentParameters`).
#[derive(Debug, Clone)]
pub struct RegionalAssessmentParameters {
    pub region: String,
    pub criteria: BTreeMap<String, BoundedCriteria>,
}

/// Suitability is regional-plus-three-fields, flattened rather than
/// built via mutual recursion with the regional builder (spec §9 design
/// note).
#[derive(Debug, Clone)]
pub struct SuitabilityAssessmentParameters {
    pub regional: RegionalAssessmentParameters,
    pub threshold: f64,
    pub x_dist: f64,
    pub y_dist: f64,
}

/// Tagged union of per-job-type typed inputs (spec §3 `JobInput`).
#[derive(Debug, Clone)]
pub enum JobInput {
    Test(TestInput),
    Regional(RegionalAssessmentInput),
    Suitability(SuitabilityAssessmentInput),
    DataSpec(DataSpecUpdateInput),
}

impl JobInput {
    /// Decode a raw JSON payload against the schema for `job_type` (spec
    /// §4.D dispatch step 2).
    pub fn decode(job_type: JobType, raw: &Value) -> Result<JobInput, DispatchError> {
        match job_type {
            JobType::Test => Ok(JobInput::Test(TestInput {
                id: raw.get("id").and_then(Value::as_i64),
            })),
            JobType::RegionalAssessment => decode_regional(raw).map(JobInput::Regional),
            JobType::SuitabilityAssessment => decode_suitability(raw).map(JobInput::Suitability),
            JobType::DataSpecificationUpdate => Ok(JobInput::DataSpec(DataSpecUpdateInput {
                cache_buster: raw.get("cache_buster").cloned(),
            })),
        }
    }
}

fn as_object(raw: &Value) -> Result<&Map<String, Value>, DispatchError> {
    raw.as_object()
        .ok_or_else(|| DispatchError::InvalidInput("expected a JSON object".to_string()))
}

fn decode_regional(raw: &Value) -> Result<RegionalAssessmentInput, DispatchError> {
    let obj = as_object(raw)?;
    let region = obj
        .get("region")
        .and_then(Value::as_str)
        .ok_or_else(|| DispatchError::InvalidInput("missing 'region'".to_string()))?
        .to_string();
    let reef_type = obj.get("reef_type").and_then(Value::as_str).map(str::to_string);
    let criteria = parse_criteria_overrides(obj);
    Ok(RegionalAssessmentInput {
        region,
        reef_type,
        criteria,
    })
}

fn decode_suitability(raw: &Value) -> Result<SuitabilityAssessmentInput, DispatchError> {
    let obj = as_object(raw)?;
    let region = obj
        .get("region")
        .and_then(Value::as_str)
        .ok_or_else(|| DispatchError::InvalidInput("missing 'region'".to_string()))?
        .to_string();
    let reef_type = obj.get("reef_type").and_then(Value::as_str).map(str::to_string);
    let criteria = parse_criteria_overrides(obj);
    let threshold = obj.get("threshold").and_then(Value::as_f64);
    let x_dist = obj.get("x_dist").and_then(Value::as_f64);
    let y_dist = obj.get("y_dist").and_then(Value::as_f64);
    Ok(SuitabilityAssessmentInput {
        region,
        reef_type,
        criteria,
        threshold,
        x_dist,
        y_dist,
    })
}

/// Tagged union of per-job-type typed outputs (spec §3 `JobOutput`).
#[derive(Debug, Clone)]
pub enum JobOutput {
    Test(TestOutput),
    Regional(RegionalAssessmentOutput),
    Suitability(SuitabilityAssessmentOutput),
    DataSpec(DataSpecUpdateOutput),
}

impl JobOutput {
    pub fn job_type(&self) -> JobType {
        match self {
            JobOutput::Test(_) => JobType::Test,
            JobOutput::Regional(_) => JobType::RegionalAssessment,
            JobOutput::Suitability(_) => JobType::SuitabilityAssessment,
            JobOutput::DataSpec(_) => JobType::DataSpecificationUpdate,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            JobOutput::Test(o) => serde_json::to_value(o),
            JobOutput::Regional(o) => serde_json::to_value(o),
            JobOutput::Suitability(o) => serde_json::to_value(o),
            JobOutput::DataSpec(o) => serde_json::to_value(o),
        }
        .expect("job output types are always representable as JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_type_round_trips_through_tags() {
        for t in [
            JobType::Test,
            JobType::RegionalAssessment,
            JobType::SuitabilityAssessment,
            JobType::DataSpecificationUpdate,
        ] {
            assert_eq!(JobType::parse(t.as_tag()), Some(t));
        }
    }

    #[test]
    fn job_type_parse_is_case_insensitive() {
        assert_eq!(JobType::parse("test"), Some(JobType::Test));
        assert_eq!(JobType::parse("not_a_type"), None);
    }

    #[test]
    fn parse_criteria_overrides_groups_min_max() {
        let raw: Value = serde_json::json!({
            "region": "GBR",
            "depth_min": 5.0,
            "depth_max": 30.0,
            "turbidity_max": 2.5,
        });
        let obj = raw.as_object().unwrap();
        let overrides = parse_criteria_overrides(obj);
        assert_eq!(overrides.len(), 2);
        assert_eq!(overrides["depth"].min, Some(5.0));
        assert_eq!(overrides["depth"].max, Some(30.0));
        assert_eq!(overrides["turbidity"].min, None);
        assert_eq!(overrides["turbidity"].max, Some(2.5));
    }

    #[test]
    fn decode_regional_reads_region_and_criteria() {
        let raw = serde_json::json!({
            "region": "GBR",
            "reef_type": "slopes",
            "depth_min": 5.0,
            "depth_max": 30.0,
        });
        let input = JobInput::decode(JobType::RegionalAssessment, &raw).unwrap();
        match input {
            JobInput::Regional(r) => {
                assert_eq!(r.region, "GBR");
                assert_eq!(r.reef_type.as_deref(), Some("slopes"));
                assert_eq!(r.criteria["depth"].min, Some(5.0));
            }
            _ => panic!("expected regional input"),
        }
    }

    #[test]
    fn decode_regional_requires_region() {
        let raw = serde_json::json!({ "depth_min": 5.0 });
        let err = JobInput::decode(JobType::RegionalAssessment, &raw).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidInput(_)));
    }

    #[test]
    fn output_job_type_matches_variant() {
        let out = JobOutput::Regional(RegionalAssessmentOutput {
            cog_path: "x.tiff".into(),
        });
        assert_eq!(out.job_type(), JobType::RegionalAssessment);
    }
}
