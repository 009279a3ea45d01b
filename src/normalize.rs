//! Raw input cleanup: categorical prefixes on calendar fields and Y/N delay labels.

use csv::StringRecord;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::table::{
    FlightRecord, RawTable, TableError, CARRIER_COLUMN, DAY_OF_MONTH_COLUMN, DAY_OF_WEEK_COLUMN,
    DEP_TIME_COLUMN, DEST_COLUMN, DISTANCE_COLUMN, LABEL_COLUMN, MONTH_COLUMN, ORIGIN_COLUMN,
    ROUTE_COLUMN,
};

pub const DEFAULT_CATEGORY_PREFIX: &str = "c-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeConfig {
    pub category_prefix: String,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            category_prefix: DEFAULT_CATEGORY_PREFIX.to_string(),
        }
    }
}

/// Cleaned copy of a raw table together with its parsed records.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    headers: StringRecord,
    rows: Vec<StringRecord>,
    records: Vec<FlightRecord>,
    has_label: bool,
}

impl NormalizedTable {
    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    pub fn rows(&self) -> &[StringRecord] {
        &self.rows
    }

    pub fn records(&self) -> &[FlightRecord] {
        &self.records
    }

    pub fn has_label(&self) -> bool {
        self.has_label
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct ColumnIndexes {
    month: usize,
    day_of_month: usize,
    day_of_week: usize,
    dep_time: usize,
    carrier: usize,
    origin: usize,
    dest: usize,
    distance: usize,
    label: Option<usize>,
    route: Option<usize>,
}

impl ColumnIndexes {
    fn resolve(raw: &RawTable) -> Result<Self, TableError> {
        Ok(Self {
            month: raw.require_column(MONTH_COLUMN)?,
            day_of_month: raw.require_column(DAY_OF_MONTH_COLUMN)?,
            day_of_week: raw.require_column(DAY_OF_WEEK_COLUMN)?,
            dep_time: raw.require_column(DEP_TIME_COLUMN)?,
            carrier: raw.require_column(CARRIER_COLUMN)?,
            origin: raw.require_column(ORIGIN_COLUMN)?,
            dest: raw.require_column(DEST_COLUMN)?,
            distance: raw.require_column(DISTANCE_COLUMN)?,
            label: raw.column_index(LABEL_COLUMN),
            route: raw.column_index(ROUTE_COLUMN),
        })
    }
}

/// Returns a cleaned copy of `raw`; the input table is left as-is.
pub fn normalize(raw: &RawTable, cfg: &NormalizeConfig) -> Result<NormalizedTable, TableError> {
    let idx = ColumnIndexes::resolve(raw)?;
    let mut rows = Vec::with_capacity(raw.len());
    let mut records = Vec::with_capacity(raw.len());
    let mut stripped_fields = 0u64;
    let mut unrecognized_labels = 0u64;

    for (row_no, record) in raw.rows().iter().enumerate() {
        let mut fields: Vec<String> = record.iter().map(str::to_string).collect();

        for col in [idx.month, idx.day_of_month, idx.day_of_week] {
            if let Some(stripped) = strip_category_prefix(&fields[col], &cfg.category_prefix) {
                fields[col] = stripped.to_string();
                stripped_fields += 1;
            }
        }

        let delayed = match idx.label {
            Some(col) => {
                let label = parse_label(&fields[col]);
                if label.is_none() && !fields[col].trim().is_empty() {
                    unrecognized_labels += 1;
                }
                fields[col] = label.map(|v| v.to_string()).unwrap_or_default();
                label
            }
            None => None,
        };

        records.push(FlightRecord {
            carrier: fields[idx.carrier].trim().to_string(),
            origin: fields[idx.origin].trim().to_string(),
            dest: fields[idx.dest].trim().to_string(),
            distance: parse_field(row_no, DISTANCE_COLUMN, &fields[idx.distance])?,
            dep_time: parse_int(row_no, DEP_TIME_COLUMN, &fields[idx.dep_time])?,
            month: parse_field(row_no, MONTH_COLUMN, &fields[idx.month])?,
            day_of_month: parse_field(row_no, DAY_OF_MONTH_COLUMN, &fields[idx.day_of_month])?,
            day_of_week: parse_field(row_no, DAY_OF_WEEK_COLUMN, &fields[idx.day_of_week])?,
            delayed,
            route: idx
                .route
                .map(|col| fields[col].trim().to_string())
                .filter(|route| !route.is_empty()),
        });
        rows.push(StringRecord::from(fields));
    }

    info!(
        component = "normalize",
        event = "normalize.finish",
        rows = records.len(),
        has_label = idx.label.is_some(),
        stripped_fields,
        unrecognized_labels
    );

    Ok(NormalizedTable {
        headers: raw.headers().clone(),
        rows,
        records,
        has_label: idx.label.is_some(),
    })
}

fn strip_category_prefix<'a>(raw: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return None;
    }
    raw.trim().strip_prefix(prefix)
}

// Anything outside the yes/no vocabulary is an unknown outcome, not a bad row.
fn parse_label(raw: &str) -> Option<u8> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "1" | "1.0" => Some(1),
        "n" | "no" | "0" | "0.0" => Some(0),
        _ => None,
    }
}

fn parse_field<T: std::str::FromStr>(
    row: usize,
    column: &'static str,
    raw: &str,
) -> Result<T, TableError> {
    raw.trim().parse::<T>().map_err(|_| TableError::ParseField {
        row,
        column,
        value: raw.to_string(),
    })
}

// Some exports write integer columns as floats ("1430.0").
fn parse_int(row: usize, column: &'static str, raw: &str) -> Result<i64, TableError> {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Ok(value);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 => Ok(value as i64),
        _ => Err(TableError::ParseField {
            row,
            column,
            value: raw.to_string(),
        }),
    }
}
