//! Sine/cosine encodings of periodic calendar and clock values.

use std::f64::consts::PI;

use crate::features::{FeatureDType, FeatureError, FeatureTable, FeatureValue};

pub const HOURS_PER_DAY: f64 = 24.0;
pub const DAYS_PER_WEEK: f64 = 7.0;
pub const MONTHS_PER_YEAR: f64 = 12.0;
/// Fixed for every month.
pub const DAYS_PER_MONTH: f64 = 31.0;
pub const MINUTES_PER_DAY: f64 = 24.0 * 60.0;

pub fn encode(value: f64, period: f64) -> (f64, f64) {
    let angle = 2.0 * PI * value / period;
    (angle.sin(), angle.cos())
}

/// Fraction of the day elapsed at `hour:minute`.
pub fn time_of_day(hour: i64, minute: i64) -> f64 {
    (hour * 60 + minute) as f64 / MINUTES_PER_DAY
}

pub fn apply_cyclical_features(table: &mut FeatureTable) -> Result<(), FeatureError> {
    let hours: Vec<i64> = match table.column("dep_hour") {
        Some(_) => table.require_int_column("dep_hour")?,
        None => table.records().iter().map(|r| r.dep_hour()).collect(),
    };

    let records = table.records();
    let encoded: [(&str, Vec<(f64, f64)>); 5] = [
        (
            "dep_hour",
            hours
                .iter()
                .map(|hour| encode(*hour as f64, HOURS_PER_DAY))
                .collect(),
        ),
        (
            "day_of_week",
            records
                .iter()
                .map(|r| encode(f64::from(r.day_of_week) - 1.0, DAYS_PER_WEEK))
                .collect(),
        ),
        (
            "month",
            records
                .iter()
                .map(|r| encode(f64::from(r.month) - 1.0, MONTHS_PER_YEAR))
                .collect(),
        ),
        (
            "day_of_month",
            records
                .iter()
                .map(|r| encode(f64::from(r.day_of_month) - 1.0, DAYS_PER_MONTH))
                .collect(),
        ),
        (
            "time_of_day",
            records
                .iter()
                .map(|r| encode(time_of_day(r.dep_hour(), r.dep_minute()), 1.0))
                .collect(),
        ),
    ];

    for (name, values) in encoded {
        let (sin, cos): (Vec<_>, Vec<_>) = values
            .into_iter()
            .map(|(s, c)| (FeatureValue::Float(Some(s)), FeatureValue::Float(Some(c))))
            .unzip();
        table.push_column(&format!("{name}_sin"), FeatureDType::Float, sin)?;
        table.push_column(&format!("{name}_cos"), FeatureDType::Float, cos)?;
    }
    Ok(())
}
