//! Feature table: the normalized source rows widened with typed derived columns.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::normalize::NormalizedTable;
use crate::table::{write_atomic, FlightRecord, TableError};

pub const FEATURE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureDType {
    Int,
    Float,
    Category,
    Text,
}

impl FeatureDType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Category => "category",
            Self::Text => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureColumn {
    pub name: String,
    pub dtype: FeatureDType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: u32,
    pub fingerprint: String,
    pub columns: Vec<FeatureColumn>,
}

/// A single derived cell. `None` payloads serialize as an empty field.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Int(i64),
    Float(Option<f64>),
    Category(Option<&'static str>),
    Text(String),
}

impl FeatureValue {
    pub fn flag(value: bool) -> Self {
        Self::Int(i64::from(value))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => *v,
            Self::Category(_) | Self::Text(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_category(&self) -> Option<&str> {
        match self {
            Self::Category(v) => *v,
            Self::Text(v) => Some(v.as_str()),
            Self::Int(_) | Self::Float(_) => None,
        }
    }

    fn render(&self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Float(Some(v)) if v.is_finite() => v.to_string(),
            Self::Float(_) => String::new(),
            Self::Category(v) => v.unwrap_or_default().to_string(),
            Self::Text(v) => v.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("feature stage requires column '{column}'")]
    MissingColumn { column: String },
    #[error("column '{column}' is not of type {expected:?}")]
    ColumnType {
        column: String,
        expected: FeatureDType,
    },
    #[error("column '{column}' has {actual} values, table has {expected} rows")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("schema version mismatch: expected {expected}, got {actual}")]
    SchemaVersionMismatch { expected: u32, actual: u32 },
    #[error("schema fingerprint mismatch: expected {expected}, got {actual}")]
    SchemaFingerprintMismatch { expected: String, actual: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    source: NormalizedTable,
    columns: Vec<FeatureColumn>,
    values: Vec<Vec<FeatureValue>>,
}

impl FeatureTable {
    pub fn new(source: NormalizedTable) -> Self {
        Self {
            source,
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn source(&self) -> &NormalizedTable {
        &self.source
    }

    pub fn records(&self) -> &[FlightRecord] {
        self.source.records()
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&[FeatureValue]> {
        self.position(name).map(|idx| self.values[idx].as_slice())
    }

    pub fn require_column(&self, name: &str) -> Result<&[FeatureValue], FeatureError> {
        self.column(name).ok_or_else(|| FeatureError::MissingColumn {
            column: name.to_string(),
        })
    }

    pub fn require_int_column(&self, name: &str) -> Result<Vec<i64>, FeatureError> {
        self.require_column(name)?
            .iter()
            .map(|value| {
                value.as_int().ok_or_else(|| FeatureError::ColumnType {
                    column: name.to_string(),
                    expected: FeatureDType::Int,
                })
            })
            .collect()
    }

    pub fn value(&self, row: usize, name: &str) -> Option<&FeatureValue> {
        self.column(name).and_then(|column| column.get(row))
    }

    /// Appends a derived column. Re-deriving an existing name replaces it in place.
    pub fn push_column(
        &mut self,
        name: &str,
        dtype: FeatureDType,
        values: Vec<FeatureValue>,
    ) -> Result<(), FeatureError> {
        if values.len() != self.len() {
            return Err(FeatureError::LengthMismatch {
                column: name.to_string(),
                expected: self.len(),
                actual: values.len(),
            });
        }

        let column = FeatureColumn {
            name: name.to_string(),
            dtype,
        };
        match self.position(name) {
            Some(idx) => {
                self.columns[idx] = column;
                self.values[idx] = values;
            }
            None => {
                self.columns.push(column);
                self.values.push(values);
            }
        }
        Ok(())
    }

    pub fn push_flags(&mut self, name: &str, flags: Vec<bool>) -> Result<(), FeatureError> {
        let values = flags.into_iter().map(FeatureValue::flag).collect();
        self.push_column(name, FeatureDType::Int, values)
    }

    pub fn push_floats(&mut self, name: &str, values: Vec<Option<f64>>) -> Result<(), FeatureError> {
        let values = values.into_iter().map(FeatureValue::Float).collect();
        self.push_column(name, FeatureDType::Float, values)
    }

    /// Integer counts; a missing count is written as 0.
    pub fn push_counts(&mut self, name: &str, values: Vec<Option<f64>>) -> Result<(), FeatureError> {
        let values = values
            .into_iter()
            .map(|value| FeatureValue::Int(value.unwrap_or_default().round() as i64))
            .collect();
        self.push_column(name, FeatureDType::Int, values)
    }

    pub fn schema(&self) -> FeatureSchema {
        FeatureSchema {
            version: FEATURE_SCHEMA_VERSION,
            fingerprint: schema_fingerprint(FEATURE_SCHEMA_VERSION, &self.columns),
            columns: self.columns.clone(),
        }
    }

    /// Source columns shadowed by a derived column of the same name are dropped.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, FeatureError> {
        let kept_source: Vec<usize> = self
            .source
            .headers()
            .iter()
            .enumerate()
            .filter(|(_, header)| !self.has_column(header))
            .map(|(idx, _)| idx)
            .collect();

        let mut writer = csv::Writer::from_writer(Vec::new());

        let mut header: Vec<&str> = kept_source
            .iter()
            .filter_map(|idx| self.source.headers().get(*idx))
            .collect();
        header.extend(self.columns.iter().map(|column| column.name.as_str()));
        writer.write_record(&header)?;

        for (row_idx, row) in self.source.rows().iter().enumerate() {
            let mut fields: Vec<String> = kept_source
                .iter()
                .map(|idx| row.get(*idx).unwrap_or_default().to_string())
                .collect();
            fields.extend(self.values.iter().map(|column| column[row_idx].render()));
            writer.write_record(&fields)?;
        }

        writer
            .into_inner()
            .map_err(|err| FeatureError::Table(TableError::Io(err.into_error())))
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), FeatureError> {
        let bytes = self.to_csv_bytes()?;
        write_atomic(path, &bytes)?;
        debug!(
            component = "features",
            event = "features.table.written",
            path = %path.display(),
            rows = self.len(),
            feature_columns = self.columns.len(),
            bytes = bytes.len()
        );
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }
}

pub fn assert_schema_compatible(
    expected_version: u32,
    expected_fingerprint: &str,
    actual: &FeatureSchema,
) -> Result<(), FeatureError> {
    if expected_version != actual.version {
        return Err(FeatureError::SchemaVersionMismatch {
            expected: expected_version,
            actual: actual.version,
        });
    }

    if expected_fingerprint != actual.fingerprint {
        return Err(FeatureError::SchemaFingerprintMismatch {
            expected: expected_fingerprint.to_string(),
            actual: actual.fingerprint.clone(),
        });
    }

    Ok(())
}

fn schema_fingerprint(version: u32, columns: &[FeatureColumn]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("version:{version};"));
    hasher.update("columns:");
    for column in columns {
        hasher.update(column.name.as_bytes());
        hasher.update(format!(":{};", column.dtype.as_str()));
    }
    hex::encode(hasher.finalize())
}
