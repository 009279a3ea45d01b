//! Calendar and clock features derived from a single row.

use serde::{Deserialize, Serialize};

use crate::features::{FeatureDType, FeatureError, FeatureTable, FeatureValue};

/// Approximate US holiday dates, not year-aware.
pub const US_HOLIDAYS: [&str; 19] = [
    "01-01", "01-15", "02-14", "02-15", "03-17", "04-05", "04-15", "05-05", "05-25", "06-19",
    "07-04", "09-01", "10-31", "11-11", "11-25", "11-26", "12-24", "12-25", "12-31",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimePeriod {
    Night,
    Morning,
    Afternoon,
    Evening,
}

impl TimePeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Night => "Night",
            Self::Morning => "Morning",
            Self::Afternoon => "Afternoon",
            Self::Evening => "Evening",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Winter => "Winter",
            Self::Spring => "Spring",
            Self::Summer => "Summer",
            Self::Fall => "Fall",
        }
    }
}

/// Right-closed buckets; hours outside 0..=23 land in the nearest end bucket.
pub fn time_period(hour: i64) -> TimePeriod {
    match hour {
        h if h <= 5 => TimePeriod::Night,
        6..=11 => TimePeriod::Morning,
        12..=17 => TimePeriod::Afternoon,
        _ => TimePeriod::Evening,
    }
}

pub fn season(month: u32) -> Option<Season> {
    match month {
        12 | 1 | 2 => Some(Season::Winter),
        3..=5 => Some(Season::Spring),
        6..=8 => Some(Season::Summer),
        9..=11 => Some(Season::Fall),
        _ => None,
    }
}

pub fn is_weekend(day_of_week: u32) -> bool {
    matches!(day_of_week, 6 | 7)
}

pub fn month_day(month: u32, day_of_month: u32) -> String {
    format!("{month:02}-{day_of_month:02}")
}

pub fn is_holiday(month: u32, day_of_month: u32) -> bool {
    US_HOLIDAYS.contains(&month_day(month, day_of_month).as_str())
}

pub fn is_peak_travel_season(month: u32, day_of_month: u32) -> bool {
    let summer = (6..=8).contains(&month);
    let late_december = month == 12 && day_of_month >= 15;
    let early_january = month == 1 && day_of_month <= 5;
    summer || late_december || early_january
}

pub fn apply_temporal_features(table: &mut FeatureTable) -> Result<(), FeatureError> {
    let n = table.len();
    let mut dep_hour = Vec::with_capacity(n);
    let mut dep_minute = Vec::with_capacity(n);
    let mut period = Vec::with_capacity(n);
    let mut weekend = Vec::with_capacity(n);
    let mut seasons = Vec::with_capacity(n);
    let mut month_days = Vec::with_capacity(n);
    let mut holiday = Vec::with_capacity(n);
    let mut peak = Vec::with_capacity(n);

    for record in table.records() {
        let hour = record.dep_hour();
        dep_hour.push(FeatureValue::Int(hour));
        dep_minute.push(FeatureValue::Int(record.dep_minute()));
        period.push(FeatureValue::Category(Some(time_period(hour).as_str())));
        weekend.push(is_weekend(record.day_of_week));
        seasons.push(FeatureValue::Category(season(record.month).map(Season::as_str)));
        month_days.push(FeatureValue::Text(month_day(record.month, record.day_of_month)));
        holiday.push(is_holiday(record.month, record.day_of_month));
        peak.push(is_peak_travel_season(record.month, record.day_of_month));
    }

    table.push_column("dep_hour", FeatureDType::Int, dep_hour)?;
    table.push_column("dep_minute", FeatureDType::Int, dep_minute)?;
    table.push_column("time_period", FeatureDType::Category, period)?;
    table.push_flags("is_weekend", weekend)?;
    table.push_column("season", FeatureDType::Category, seasons)?;
    table.push_column("month_day", FeatureDType::Text, month_days)?;
    table.push_flags("is_holiday", holiday)?;
    table.push_flags("is_peak_travel_season", peak)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_period_buckets_are_right_closed_and_clamped() {
        assert_eq!(time_period(0), TimePeriod::Night);
        assert_eq!(time_period(-1), TimePeriod::Night);
        assert_eq!(time_period(5), TimePeriod::Night);
        assert_eq!(time_period(6), TimePeriod::Morning);
        assert_eq!(time_period(11), TimePeriod::Morning);
        assert_eq!(time_period(12), TimePeriod::Afternoon);
        assert_eq!(time_period(17), TimePeriod::Afternoon);
        assert_eq!(time_period(18), TimePeriod::Evening);
        assert_eq!(time_period(23), TimePeriod::Evening);
        assert_eq!(time_period(24), TimePeriod::Evening);
    }

    #[test]
    fn seasons_follow_meteorological_months() {
        let expected = [
            (1, Season::Winter),
            (2, Season::Winter),
            (3, Season::Spring),
            (5, Season::Spring),
            (6, Season::Summer),
            (8, Season::Summer),
            (9, Season::Fall),
            (11, Season::Fall),
            (12, Season::Winter),
        ];
        for (month, season_name) in expected {
            assert_eq!(season(month), Some(season_name), "month {month}");
        }
        assert_eq!(season(0), None);
        assert_eq!(season(13), None);
    }

    #[test]
    fn holidays_use_zero_padded_month_day() {
        assert_eq!(US_HOLIDAYS.len(), 19);
        assert_eq!(month_day(7, 4), "07-04");
        assert!(is_holiday(7, 4));
        assert!(is_holiday(12, 25));
        assert!(!is_holiday(7, 5));
        assert!(!is_holiday(1, 2));
    }

    #[test]
    fn peak_season_clauses_are_independent() {
        assert!(is_peak_travel_season(6, 1));
        assert!(is_peak_travel_season(8, 31));
        assert!(is_peak_travel_season(12, 15));
        assert!(!is_peak_travel_season(12, 14));
        assert!(is_peak_travel_season(1, 5));
        assert!(!is_peak_travel_season(1, 6));
        assert!(!is_peak_travel_season(2, 3));
        assert!(!is_peak_travel_season(5, 31));
    }

    #[test]
    fn weekend_is_saturday_and_sunday() {
        assert!(!is_weekend(1));
        assert!(!is_weekend(5));
        assert!(is_weekend(6));
        assert!(is_weekend(7));
    }
}
