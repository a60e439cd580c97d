use std::collections::BTreeMap;

use thiserror::Error;

use super::types::{CriteriaOverride, RegionalAssessmentParameters};
use crate::regional::{BoundedCriteria, RegionalData};

#[derive(Debug, Error)]
pub enum BoundsMergeError {
    #[error("unknown region: {0}")]
    UnknownRegion(String),

    #[error("criterion '{0}' has no regional default and no override")]
    MissingCriterion(String),

    #[error("criterion '{0}' has min {1} greater than max {2}")]
    InvertedBounds(String, f64, f64),
}

/// Merge a caller's criteria overrides onto a region's defaults (spec
/// §4.H). Iterates the union of criteria named in the region and in
/// the overrides: a criterion present only in the region keeps its
/// default bound; one present in both takes the override's bound for
/// whichever side (min/max) it supplies, falling back to the default
/// otherwise; one present only in the override is rejected as
/// `MissingCriterion` unless it supplies neither bound, in which case
/// it is silently omitted.
pub fn build_regional_parameters(
    region_code: &str,
    overrides: &BTreeMap<String, CriteriaOverride>,
    regional_data: &RegionalData,
) -> Result<RegionalAssessmentParameters, BoundsMergeError> {
    let region = regional_data
        .get(region_code)
        .ok_or_else(|| BoundsMergeError::UnknownRegion(region_code.to_string()))?;

    let mut ids: Vec<&String> = region.criteria.keys().chain(overrides.keys()).collect();
    ids.sort_unstable();
    ids.dedup();

    let mut criteria = BTreeMap::new();
    for id in ids {
        let default = region.criteria.get(id).map(BoundedCriteria::from);
        let override_ = overrides.get(id);

        let (min, max) = match (default, override_) {
            (Some(default), Some(o)) => (o.min.unwrap_or(default.min), o.max.unwrap_or(default.max)),
            (Some(default), None) => (default.min, default.max),
            // Both user bounds null and no regional entry: omitted rather
            // than an error (spec §8 property 3).
            (None, Some(o)) if o.min.is_none() && o.max.is_none() => continue,
            // Any other criterion absent from the region is rejected,
            // whether the override supplies one bound or both (spec
            // §4.H: "a criterion is included iff it is present in the
            // regional data"; only the both-null case above is omitted).
            (None, Some(_)) => return Err(BoundsMergeError::MissingCriterion(id.clone())),
            (None, None) => unreachable!("id came from the union of both maps' keys"),
        };

        if min > max {
            return Err(BoundsMergeError::InvertedBounds(id.clone(), min, max));
        }

        criteria.insert(id.clone(), BoundedCriteria { min, max });
    }

    Ok(RegionalAssessmentParameters {
        region: region_code.to_string(),
        criteria,
    })
}
