//! Boundary to the external reef-assessment computation
//!
//! The worker doesn't implement the geospatial suitability model itself
//! (spec §1 non-goal); this module is the seam a real deployment would
//! wire up to that library. It owns loading the regional default dataset
//! from `DATA_PATH` and the two computation entry points handlers call
//! into, with a built-in fallback dataset so the worker runs without a
//! populated data directory.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::handlers::types::RegionalAssessmentParameters;
use crate::regional::{BoundedCriteria, RegionEntry, RegionalData};

/// Suitability score floor below which a candidate site is dropped from
/// the output, absent an explicit `threshold` override (spec §4.H).
pub const DEFAULT_SUITABILITY_THRESHOLD: f64 = 0.5;

#[derive(Debug, Error)]
pub enum AssessmentError {
    #[error("failed to read regional data from {0}: {1}")]
    DataLoad(String, String),

    #[error("assessment computation failed: {0}")]
    Computation(String),
}

/// A candidate site produced by [`assess_sites`], before filtering.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SiteCandidate {
    pub lon: f64,
    pub lat: f64,
    pub score: f64,
}

/// Load the regional default dataset from `<data_path>/regions.json`, or
/// fall back to a small built-in dataset (covering `"GBR"`) if the file
/// is absent, so the worker is runnable without external fixtures.
pub fn initialize_data(data_path: &Path) -> Result<RegionalData, AssessmentError> {
    let candidate = data_path.join("regions.json");
    if candidate.exists() {
        let raw = std::fs::read_to_string(&candidate)
            .map_err(|e| AssessmentError::DataLoad(candidate.display().to_string(), e.to_string()))?;
        let data: RegionalData = serde_json::from_str(&raw)
            .map_err(|e| AssessmentError::DataLoad(candidate.display().to_string(), e.to_string()))?;
        return Ok(data);
    }

    Ok(default_regional_data())
}

fn default_regional_data() -> RegionalData {
    use crate::regional::BoundedCriteriaRaw;

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
    criteria.insert(
        "flow".to_string(),
        BoundedCriteriaRaw {
            min: 0.1,
            max: 2.0,
            label: Some("Current flow".to_string()),
            unit: Some("m/s".to_string()),
            ..Default::default()
        },
    );
    criteria.insert(
        "slope".to_string(),
        BoundedCriteriaRaw {
            min: 0.0,
            max: 15.0,
            label: Some("Slope".to_string()),
            unit: Some("deg".to_string()),
            ..Default::default()
        },
    );
    criteria.insert(
        "tide".to_string(),
        BoundedCriteriaRaw {
            min: 0.0,
            max: 3.5,
            label: Some("Tidal range".to_string()),
            unit: Some("m".to_string()),
            ..Default::default()
        },
    );
    criteria.insert(
        "turbidity".to_string(),
        BoundedCriteriaRaw {
            min: 0.0,
            max: 5.0,
            label: Some("Turbidity".to_string()),
            unit: Some("NTU".to_string()),
            ..Default::default()
        },
    );
    criteria.insert(
        "wave_height".to_string(),
        BoundedCriteriaRaw {
            min: 0.0,
            max: 2.5,
            label: Some("Wave height".to_string()),
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

    RegionalData { regions }
}

/// Render a regional COG (cloud-optimized GeoTIFF) for the resolved
/// parameters. Stubbed as a deterministic placeholder raster; a real
/// deployment replaces this with a call into the geospatial library.
pub fn assess_region(params: &RegionalAssessmentParameters) -> Result<Vec<u8>, AssessmentError> {
    if params.criteria.is_empty() {
        return Err(AssessmentError::Computation(
            "no criteria resolved for region".to_string(),
        ));
    }
    Ok(placeholder_raster(&params.region, &params.criteria))
}

fn placeholder_raster(region: &str, criteria: &BTreeMap<String, BoundedCriteria>) -> Vec<u8> {
    let mut out = format!("COG:{region}\n").into_bytes();
    for (id, bound) in criteria {
        out.extend(format!("{id}={:.3},{:.3}\n", bound.min, bound.max).into_bytes());
    }
    out
}

/// Score candidate sites within the resolved region. Stubbed as a
/// deterministic grid sweep over the region's bounds.
pub fn assess_sites(params: &RegionalAssessmentParameters) -> Result<Vec<SiteCandidate>, AssessmentError> {
    if params.criteria.is_empty() {
        return Err(AssessmentError::Computation(
            "no criteria resolved for region".to_string(),
        ));
    }

    let depth = params
        .criteria
        .get("depth")
        .copied()
        .unwrap_or(BoundedCriteria { min: 0.0, max: 1.0 });

    let mut sites = Vec::new();
    for i in 0..5 {
        let t = i as f64 / 4.0;
        let score = 1.0 - ((depth.min + (depth.max - depth.min) * t) / depth.max.max(1.0)).min(1.0);
        sites.push(SiteCandidate {
            lon: 145.0 + t,
            lat: -16.0 - t,
            score,
        });
    }
    Ok(sites)
}

/// Keep only sites at or above `threshold`, spaced at least `x_dist` /
/// `y_dist` apart in degrees (spec §4.H suitability filtering).
pub fn filter_sites(sites: Vec<SiteCandidate>, threshold: f64, x_dist: f64, y_dist: f64) -> Vec<SiteCandidate> {
    let mut kept: Vec<SiteCandidate> = Vec::new();
    for site in sites.into_iter().filter(|s| s.score >= threshold) {
        let too_close = kept
            .iter()
            .any(|k| (k.lon - site.lon).abs() < x_dist && (k.lat - site.lat).abs() < y_dist);
        if !too_close {
            kept.push(site);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_regional_data_includes_gbr() {
        let data = default_regional_data();
        assert!(data.get("GBR").is_some());
    }

    #[test]
    fn initialize_data_falls_back_without_fixture_file() {
        let dir = tempfile::tempdir().unwrap();
        let data = initialize_data(dir.path()).unwrap();
        assert!(data.get("GBR").is_some());
    }

    #[test]
    fn assess_region_rejects_empty_criteria() {
        let params = RegionalAssessmentParameters {
            region: "GBR".to_string(),
            criteria: BTreeMap::new(),
        };
        assert!(assess_region(&params).is_err());
    }

    #[test]
    fn filter_sites_drops_below_threshold_and_dedupes_nearby() {
        let sites = vec![
            SiteCandidate { lon: 145.0, lat: -16.0, score: 0.9 },
            SiteCandidate { lon: 145.01, lat: -16.01, score: 0.95 },
            SiteCandidate { lon: 146.0, lat: -17.0, score: 0.2 },
        ];
        let kept = filter_sites(sites, 0.5, 0.5, 0.5);
        assert_eq!(kept.len(), 1);
    }
}
