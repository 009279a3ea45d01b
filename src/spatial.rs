//! Airport and route features joined from reference statistics.

use serde::{Deserialize, Serialize};

use crate::features::{FeatureDType, FeatureError, FeatureTable, FeatureValue};
use crate::reference::ReferenceStatistics;
use crate::table::route_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistanceCategory {
    VeryShort,
    Short,
    Medium,
    Long,
    VeryLong,
}

impl DistanceCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VeryShort => "Very Short",
            Self::Short => "Short",
            Self::Medium => "Medium",
            Self::Long => "Long",
            Self::VeryLong => "Very Long",
        }
    }
}

/// Right-closed bins over (0, 5000]; anything else is unclassified.
pub fn distance_category(distance: f64) -> Option<DistanceCategory> {
    if distance.is_nan() || distance <= 0.0 {
        return None;
    }
    if distance <= 300.0 {
        Some(DistanceCategory::VeryShort)
    } else if distance <= 600.0 {
        Some(DistanceCategory::Short)
    } else if distance <= 1000.0 {
        Some(DistanceCategory::Medium)
    } else if distance <= 2000.0 {
        Some(DistanceCategory::Long)
    } else if distance <= 5000.0 {
        Some(DistanceCategory::VeryLong)
    } else {
        None
    }
}

pub fn apply_spatial_features(
    table: &mut FeatureTable,
    stats: &ReferenceStatistics,
) -> Result<(), FeatureError> {
    let records = table.records();
    let origins: Vec<String> = records.iter().map(|r| r.origin.clone()).collect();
    let dests: Vec<String> = records.iter().map(|r| r.dest.clone()).collect();
    let routes: Vec<String> = records
        .iter()
        .map(|r| route_key(&r.origin, &r.dest))
        .collect();
    let categories: Vec<FeatureValue> = records
        .iter()
        .map(|r| FeatureValue::Category(distance_category(r.distance).map(DistanceCategory::as_str)))
        .collect();

    table.push_floats("origin_freq_rank", stats.origin_freq_rank.apply_all(&origins))?;
    table.push_floats("dest_freq_rank", stats.dest_freq_rank.apply_all(&dests))?;
    if let Some(rates) = &stats.origin_delay_rate {
        table.push_floats("origin_delay_rate", rates.apply_all(&origins))?;
    }
    if let Some(rates) = &stats.dest_delay_rate {
        table.push_floats("dest_delay_rate", rates.apply_all(&dests))?;
    }
    table.push_flags(
        "origin_is_hub",
        origins.iter().map(|o| stats.origin_hubs.contains(o)).collect(),
    )?;
    table.push_flags(
        "dest_is_hub",
        dests.iter().map(|d| stats.dest_hubs.contains(d)).collect(),
    )?;
    table.push_column(
        "route",
        FeatureDType::Text,
        routes.iter().cloned().map(FeatureValue::Text).collect(),
    )?;
    table.push_floats("route_freq_rank", stats.route_freq_rank.apply_all(&routes))?;
    if let Some(rates) = &stats.route_delay_rate {
        table.push_floats("route_delay_rate", rates.apply_all(&routes))?;
    }
    table.push_column("distance_category", FeatureDType::Category, categories)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_bins_are_right_closed() {
        assert_eq!(distance_category(0.0), None);
        assert_eq!(distance_category(-5.0), None);
        assert_eq!(distance_category(1.0), Some(DistanceCategory::VeryShort));
        assert_eq!(distance_category(300.0), Some(DistanceCategory::VeryShort));
        assert_eq!(distance_category(300.5), Some(DistanceCategory::Short));
        assert_eq!(distance_category(600.0), Some(DistanceCategory::Short));
        assert_eq!(distance_category(1000.0), Some(DistanceCategory::Medium));
        assert_eq!(distance_category(2000.0), Some(DistanceCategory::Long));
        assert_eq!(distance_category(5000.0), Some(DistanceCategory::VeryLong));
        assert_eq!(distance_category(5000.1), None);
        assert_eq!(distance_category(f64::NAN), None);
    }

    #[test]
    fn category_labels_match_output_values() {
        assert_eq!(DistanceCategory::VeryShort.as_str(), "Very Short");
        assert_eq!(DistanceCategory::VeryLong.as_str(), "Very Long");
    }
}
