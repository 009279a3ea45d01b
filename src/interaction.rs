//! Compound risk flags built from already-materialized columns.
//!
//! Each flag is only emitted when every column it reads is present, so the
//! composer degrades gracefully when an upstream stage skipped a feature
//! (for example rate features on an unlabeled reference).

use crate::features::{FeatureDType, FeatureError, FeatureTable, FeatureValue};
use crate::reference::ReferenceStatistics;
use crate::spatial::DistanceCategory;
use crate::temporal::TimePeriod;

pub const NORTHERN_HUBS: [&str; 10] = [
    "ORD", "DTW", "MSP", "BOS", "JFK", "LGA", "EWR", "CLE", "PIT", "SEA",
];
pub const WINTER_MONTHS: [u32; 5] = [11, 12, 1, 2, 3];

const MAJOR_CARRIER_RANK: f64 = 0.8;
const BUSY_AIRPORT_RANK: f64 = 0.8;

/// Flags summed into `delay_risk_score`, when present.
pub const RISK_FLAGS: [&str; 4] = [
    "high_risk_combo",
    "rush_at_busy_airport",
    "winter_in_north",
    "peak_weekend",
];

pub fn apply_interaction_features(
    table: &mut FeatureTable,
    stats: &ReferenceStatistics,
) -> Result<(), FeatureError> {
    if let (Some(origin), Some(dest)) = (
        flags(table, "origin_is_hub", is_set),
        flags(table, "dest_is_hub", is_set),
    ) {
        table.push_flags("hub_to_hub", both(origin, dest))?;
    }

    if let (Some(weekend), Some(peak)) = (
        flags(table, "is_weekend", is_set),
        flags(table, "is_peak_travel_season", is_set),
    ) {
        table.push_flags("peak_weekend", both(weekend, peak))?;
    }

    if let (Some(late), Some(weekend)) = (
        flags(table, "time_period", |v| {
            matches!(
                v.as_category(),
                Some(p) if p == TimePeriod::Evening.as_str() || p == TimePeriod::Night.as_str()
            )
        }),
        flags(table, "is_weekend", is_set),
    ) {
        table.push_flags("evening_weekend", both(late, weekend))?;
    }

    if let (Some(major), Some(hub)) = (
        flags(table, "carrier_size_rank", |v| above(v, MAJOR_CARRIER_RANK)),
        flags(table, "origin_is_hub", is_set),
    ) {
        table.push_flags("major_carrier_at_hub", both(major, hub))?;
    }

    if let (Some(long), Some(peak)) = (
        flags(table, "distance_category", |v| {
            matches!(
                v.as_category(),
                Some(c) if c == DistanceCategory::Long.as_str() || c == DistanceCategory::VeryLong.as_str()
            )
        }),
        flags(table, "is_peak_travel_season", is_set),
    ) {
        table.push_flags("long_distance_peak", both(long, peak))?;
    }

    if let (Some(carrier_bad), Some(route_bad)) = (
        stats
            .carrier_delay_rate_mean
            .and_then(|mean| flags(table, "carrier_delay_rate", |v| above(v, mean))),
        stats
            .route_delay_rate_mean
            .and_then(|mean| flags(table, "route_delay_rate", |v| above(v, mean))),
    ) {
        table.push_flags("high_risk_combo", both(carrier_bad, route_bad))?;
    }

    if let (Some(morning), Some(evening)) = (
        flags(table, "dep_hour", |v| hour_in(v, 6, 9)),
        flags(table, "dep_hour", |v| hour_in(v, 16, 19)),
    ) {
        let rush: Vec<bool> = morning.iter().zip(&evening).map(|(m, e)| *m || *e).collect();
        table.push_flags("morning_rush", morning)?;
        table.push_flags("evening_rush", evening)?;

        if let Some(busy) = flags(table, "origin_freq_rank", |v| above(v, BUSY_AIRPORT_RANK)) {
            table.push_flags("rush_at_busy_airport", both(rush, busy))?;
        }
    }

    let winter_north: Vec<bool> = table
        .records()
        .iter()
        .map(|r| WINTER_MONTHS.contains(&r.month) && NORTHERN_HUBS.contains(&r.origin.as_str()))
        .collect();
    table.push_flags("winter_in_north", winter_north)?;

    let present: Vec<Vec<bool>> = RISK_FLAGS
        .iter()
        .filter_map(|name| flags(table, name, is_set))
        .collect();
    if !present.is_empty() {
        let scores = (0..table.len())
            .map(|row| FeatureValue::Int(present.iter().filter(|flag| flag[row]).count() as i64))
            .collect();
        table.push_column("delay_risk_score", FeatureDType::Int, scores)?;
    }

    Ok(())
}

fn flags(
    table: &FeatureTable,
    name: &str,
    predicate: impl Fn(&FeatureValue) -> bool,
) -> Option<Vec<bool>> {
    table
        .column(name)
        .map(|column| column.iter().map(predicate).collect())
}

fn both(a: Vec<bool>, b: Vec<bool>) -> Vec<bool> {
    a.into_iter().zip(b).map(|(x, y)| x && y).collect()
}

fn is_set(value: &FeatureValue) -> bool {
    value.as_int() == Some(1)
}

// Missing values never exceed a threshold.
fn above(value: &FeatureValue, threshold: f64) -> bool {
    value.as_f64().is_some_and(|v| v > threshold)
}

fn hour_in(value: &FeatureValue, first: i64, last: i64) -> bool {
    value.as_int().is_some_and(|hour| (first..=last).contains(&hour))
}
