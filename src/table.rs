//! Delimited text tables and the typed flight record parsed from them.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use csv::StringRecord;
use thiserror::Error;

pub const MONTH_COLUMN: &str = "Month";
pub const DAY_OF_MONTH_COLUMN: &str = "DayofMonth";
pub const DAY_OF_WEEK_COLUMN: &str = "DayOfWeek";
pub const DEP_TIME_COLUMN: &str = "DepTime";
pub const CARRIER_COLUMN: &str = "UniqueCarrier";
pub const ORIGIN_COLUMN: &str = "Origin";
pub const DEST_COLUMN: &str = "Dest";
pub const DISTANCE_COLUMN: &str = "Distance";
pub const LABEL_COLUMN: &str = "dep_delayed_15min";
pub const ROUTE_COLUMN: &str = "route";

pub const REQUIRED_COLUMNS: [&str; 8] = [
    MONTH_COLUMN,
    DAY_OF_MONTH_COLUMN,
    DAY_OF_WEEK_COLUMN,
    DEP_TIME_COLUMN,
    CARRIER_COLUMN,
    ORIGIN_COLUMN,
    DEST_COLUMN,
    DISTANCE_COLUMN,
];

#[derive(Debug, Error)]
pub enum TableError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("required column '{column}' is missing")]
    MissingColumn { column: String },
    #[error("row {row}: failed to parse {column} value '{value}'")]
    ParseField {
        row: usize,
        column: &'static str,
        value: String,
    },
    #[error("invalid output path: {}", .0.display())]
    InvalidPath(PathBuf),
}

/// Header plus string records, exactly as read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    headers: StringRecord,
    rows: Vec<StringRecord>,
}

impl RawTable {
    pub fn new(headers: StringRecord, rows: Vec<StringRecord>) -> Self {
        Self { headers, rows }
    }

    pub fn read_csv(path: &Path) -> Result<Self, TableError> {
        let file = fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TableError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);
        let headers = reader.headers()?.clone();

        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?);
        }

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    pub fn rows(&self) -> &[StringRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize, TableError> {
        self.column_index(name)
            .ok_or_else(|| TableError::MissingColumn {
                column: name.to_string(),
            })
    }
}

/// One parsed flight row. Never mutated after normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightRecord {
    pub carrier: String,
    pub origin: String,
    pub dest: String,
    pub distance: f64,
    pub dep_time: i64,
    pub month: u32,
    pub day_of_month: u32,
    pub day_of_week: u32,
    pub delayed: Option<u8>,
    /// Route key carried by a snapshot that already materialized `route`.
    pub route: Option<String>,
}

impl FlightRecord {
    pub fn dep_hour(&self) -> i64 {
        self.dep_time.div_euclid(100)
    }

    pub fn dep_minute(&self) -> i64 {
        self.dep_time.rem_euclid(100)
    }

    pub fn route_key(&self) -> String {
        match &self.route {
            Some(route) => route.clone(),
            None => route_key(&self.origin, &self.dest),
        }
    }

    pub fn label(&self) -> Option<f64> {
        self.delayed.map(f64::from)
    }
}

pub fn route_key(origin: &str, dest: &str) -> String {
    format!("{origin}_{dest}")
}

pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), TableError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| TableError::InvalidPath(path.to_path_buf()))?;
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    fs::rename(tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_header_and_rows_in_order() {
        let csv = "Month,Origin\nc-1,ORD\nc-2,ATL\n";
        let table = RawTable::from_reader(csv.as_bytes()).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.column_index("Origin"), Some(1));
        assert_eq!(&table.rows()[1][1], "ATL");
    }

    #[test]
    fn missing_column_names_the_column() {
        let table = RawTable::from_reader("Month\n1\n".as_bytes()).unwrap();
        match table.require_column("DepTime").unwrap_err() {
            TableError::MissingColumn { column } => assert_eq!(column, "DepTime"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn dep_hour_and_minute_split_hhmm() {
        let record = FlightRecord {
            carrier: "AA".to_string(),
            origin: "ORD".to_string(),
            dest: "JFK".to_string(),
            distance: 740.0,
            dep_time: 1430,
            month: 12,
            day_of_month: 20,
            day_of_week: 7,
            delayed: None,
            route: None,
        };

        assert_eq!(record.dep_hour(), 14);
        assert_eq!(record.dep_minute(), 30);
        assert_eq!(record.route_key(), "ORD_JFK");
    }

    #[test]
    fn atomic_write_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/out/table.csv");

        write_atomic(&path, b"a,b\n1,2\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "a,b\n1,2\n");
        assert!(!dir.path().join("nested/out/table.csv.tmp").exists());
    }
}
