//! Content-addressed disk cache for assessment artifacts
//!
//! Regional and suitability outputs are expensive to recompute, so the
//! worker keys a disk cache on a stable hash of the resolved parameters
//! (spec §5, §4.F). Unlike Rust's default `HashMap`/`DefaultHasher`, which
//! is reseeded per-process and therefore unstable across restarts, the
//! fingerprint here is computed with `sha2`, matching the corpus's usual
//! choice for deterministic content hashes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::handlers::types::{RegionalAssessmentParameters, SuitabilityAssessmentParameters};
use crate::regional::{BoundedCriteria, CRITERIA_REGISTRY};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to write cache entry at {0}: {1}")]
    Write(String, std::io::Error),

    #[error("failed to read cache entry at {0}: {1}")]
    Read(String, std::io::Error),
}

/// Hash `components` into a stable decimal-string fingerprint. Components
/// are joined with `"|"` per spec §4.F step 2 before hashing.
pub fn fingerprint(components: &[String]) -> String {
    let joined = components.join("|");
    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    let digest = hasher.finalize();
    let bytes: [u8; 8] = digest[..8].try_into().expect("sha256 digest is at least 8 bytes");
    u64::from_be_bytes(bytes).to_string()
}

/// Emit `[id, min_str, max_str]` for each criterion present in `criteria`,
/// walked in `CRITERIA_REGISTRY`'s fixed order rather than incidental
/// `BTreeMap` order (spec §4.F step 1: "fixed sorted order over the
/// global criteria registry"). A criterion absent from the registry
/// (not expected in practice, but not ruled out by the data model)
/// still contributes, appended afterward in its own sorted order so it
/// is never silently dropped from the fingerprint.
fn criteria_components(criteria: &BTreeMap<String, BoundedCriteria>) -> Vec<String> {
    let mut components = Vec::new();
    for id in CRITERIA_REGISTRY {
        if let Some(bound) = criteria.get(*id) {
            components.push((*id).to_string());
            components.push(format!("{:.6}", bound.min));
            components.push(format!("{:.6}", bound.max));
        }
    }
    for (id, bound) in criteria {
        if !CRITERIA_REGISTRY.contains(&id.as_str()) {
            components.push(id.clone());
            components.push(format!("{:.6}", bound.min));
            components.push(format!("{:.6}", bound.max));
        }
    }
    components
}

/// Components that identify a regional assessment's resolved parameters.
pub fn regional_components(params: &RegionalAssessmentParameters) -> Vec<String> {
    let mut components = vec![format!("region:{}", params.region)];
    components.extend(criteria_components(&params.criteria));
    components
}

/// Components that identify a suitability assessment's resolved
/// parameters: region, then the three suitability-only fields, then the
/// criteria block (spec §4.F step 1: "for suitability: append threshold,
/// x_dist, y_dist ... before the criteria block").
pub fn suitability_components(params: &SuitabilityAssessmentParameters) -> Vec<String> {
    let mut components = vec![format!("region:{}", params.regional.region)];
    components.push(format!("threshold:{:.6}", params.threshold));
    components.push(format!("x_dist:{:.6}", params.x_dist));
    components.push(format!("y_dist:{:.6}", params.y_dist));
    components.extend(criteria_components(&params.regional.criteria));
    components
}

/// A single content-addressed entry under the configured cache root.
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path for a cache entry named by `key` with the given extension.
    pub fn path(&self, key: &str, extension: &str) -> PathBuf {
        self.root.join(format!("{key}.{extension}"))
    }

    pub fn exists(&self, key: &str, extension: &str) -> bool {
        self.path(key, extension).exists()
    }

    pub async fn read(&self, key: &str, extension: &str) -> Result<Vec<u8>, CacheError> {
        let path = self.path(key, extension);
        tokio::fs::read(&path)
            .await
            .map_err(|e| CacheError::Read(path.display().to_string(), e))
    }

    /// Write `data` atomically: stage into a `.tmp` sibling, then rename
    /// into place, so a reader never observes a partially written file
    /// (spec §5 "writes are atomic").
    pub async fn write_atomic(&self, key: &str, extension: &str, data: &[u8]) -> Result<PathBuf, CacheError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| CacheError::Write(self.root.display().to_string(), e))?;

        let final_path = self.path(key, extension);
        let tmp_path = self.root.join(format!("{key}.{extension}.tmp"));

        tokio::fs::write(&tmp_path, data)
            .await
            .map_err(|e| CacheError::Write(tmp_path.display().to_string(), e))?;
        tokio::fs::rename(&tmp_path, &final_path)
            .await
            .map_err(|e| CacheError::Write(final_path.display().to_string(), e))?;

        Ok(final_path)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_for_the_same_components() {
        let a = fingerprint(&["region:GBR".to_string(), "depth:3.0:40.0".to_string()]);
        let b = fingerprint(&["region:GBR".to_string(), "depth:3.0:40.0".to_string()]);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_distinguishes_component_boundaries() {
        let a = fingerprint(&["a".to_string(), "bc".to_string()]);
        let b = fingerprint(&["ab".to_string(), "c".to_string()]);
        assert_ne!(a, b);
    }

    #[test]
    fn fingerprint_is_order_sensitive() {
        let a = fingerprint(&["x".to_string(), "y".to_string()]);
        let b = fingerprint(&["y".to_string(), "x".to_string()]);
        assert_ne!(a, b);
    }

    #[test]
    fn criteria_components_follow_registry_order_not_btreemap_order() {
        let mut criteria = BTreeMap::new();
        criteria.insert("wave_height".to_string(), BoundedCriteria { min: 1.0, max: 2.0 });
        criteria.insert("aaaa_not_in_registry".to_string(), BoundedCriteria { min: 9.0, max: 9.0 });

        let components = criteria_components(&criteria);

        // "aaaa_not_in_registry" sorts first in a plain BTreeMap walk, but
        // CRITERIA_REGISTRY lists "wave_height" and every criterion in it
        // is emitted before any criterion outside it.
        assert_eq!(components[0], "wave_height");
        assert_eq!(components[3], "aaaa_not_in_registry");
    }

    #[tokio::test]
    async fn write_atomic_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        cache.write_atomic("abc123", "tiff", b"raster-bytes").await.unwrap();

        assert!(cache.exists("abc123", "tiff"));
        let data = cache.read("abc123", "tiff").await.unwrap();
        assert_eq!(data, b"raster-bytes");
    }

    #[test]
    fn suitability_components_put_threshold_and_distances_before_criteria() {
        let mut criteria = BTreeMap::new();
        criteria.insert("depth".to_string(), BoundedCriteria { min: 3.0, max: 40.0 });

        let params = SuitabilityAssessmentParameters {
            regional: RegionalAssessmentParameters {
                region: "GBR".to_string(),
                criteria,
            },
            threshold: 0.7,
            x_dist: 0.01,
            y_dist: 0.02,
        };

        let components = suitability_components(&params);
        // region, then threshold/x_dist/y_dist, then the criteria block
        // (spec §4.F step 1: suitability fields come before criteria).
        assert_eq!(components[0], "region:GBR");
        assert!(components[1].starts_with("threshold:"));
        assert!(components[2].starts_with("x_dist:"));
        assert!(components[3].starts_with("y_dist:"));
        assert_eq!(components[4], "depth");
    }
}
