//! Regional default data: the per-region criteria bounds and reef
//! metadata used to fill in any criterion a caller didn't override
//! (spec §3 `RegionalData`, §4.H bounds merging).

use std::collections::BTreeMap;

use serde::Deserialize;

/// Fixed, alphabetically sorted registry of known assessment criteria.
/// Sorted order matters: it is folded into the parameter fingerprint
/// (spec §5) so the same resolved parameters always hash the same way
/// regardless of the order criteria appeared in a request payload.
pub const CRITERIA_REGISTRY: &[&str] = &["depth", "flow", "slope", "tide", "turbidity", "wave_height"];

/// A resolved `[min, max]` bound for one criterion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundedCriteria {
    pub min: f64,
    pub max: f64,
}

/// Default bounds for every criterion in a single region, keyed by
/// criterion id.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionEntry {
    pub name: String,
    pub criteria: BTreeMap<String, BoundedCriteriaRaw>,
}

/// A region's default bound for one criterion, plus the display metadata
/// and optional separate "recommended" default bound the
/// `DATA_SPECIFICATION_UPDATE` handler projects out to the API (spec §3
/// `BoundedCriteria`, §4.H data-spec payload: "bounds + display metadata
/// + default bounds, defaults fall back to current bounds if unset").
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoundedCriteriaRaw {
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub default_min: Option<f64>,
    #[serde(default)]
    pub default_max: Option<f64>,
}

impl BoundedCriteriaRaw {
    /// The bounds presented as the criterion's "recommended default" in
    /// the data-spec payload, falling back to the current bound when no
    /// separate default was configured.
    pub fn default_bounds(&self) -> (f64, f64) {
        (self.default_min.unwrap_or(self.min), self.default_max.unwrap_or(self.max))
    }
}

impl From<&BoundedCriteriaRaw> for BoundedCriteria {
    fn from(raw: &BoundedCriteriaRaw) -> Self {
        BoundedCriteria { min: raw.min, max: raw.max }
    }
}

/// The full set of known regions, keyed by region code (e.g. `"GBR"`).
/// Loaded once at startup and held for the worker's lifetime (spec §9
/// design note: a single memory-resident snapshot per worker process,
/// not a shared on-disk cache revisioned across processes).
#[derive(Debug, Clone, Deserialize)]
pub struct RegionalData {
    pub regions: BTreeMap<String, RegionEntry>,
}

impl RegionalData {
    pub fn get(&self, region: &str) -> Option<&RegionEntry> {
        self.regions.get(region)
    }

    pub fn region_codes(&self) -> impl Iterator<Item = &String> {
        self.regions.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn criteria_registry_is_sorted() {
        let mut sorted = CRITERIA_REGISTRY.to_vec();
        sorted.sort_unstable();
        assert_eq!(CRITERIA_REGISTRY, sorted.as_slice());
    }
}
