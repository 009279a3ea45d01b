use std::fs;
use std::path::Path;

use delay_features::{
    run_pipeline, run_test_pass, run_training_pass, FeatureError, PassMode, PipelineConfig,
    PipelineError, ReferenceSource, TableError, LABEL_COLUMN,
};
use tempfile::tempdir;

const TRAIN_CSV: &str = "\
Month,DayofMonth,DayOfWeek,DepTime,UniqueCarrier,Origin,Dest,Distance,dep_delayed_15min
c-12,c-20,c-7,1430,AA,ORD,JFK,740,Y
c-12,c-21,c-1,905,AA,ORD,JFK,740,N
c-1,c-5,c-3,1730,UA,SFO,LAX,337,N
c-7,c-4,c-6,2215,DL,ATL,ORD,606,Y
c-3,c-17,c-5,600,AA,ORD,LAX,1745,N
c-6,c-10,c-2,45,UA,SFO,JFK,2586,Y
";

const TEST_CSV: &str = "\
Month,DayofMonth,DayOfWeek,DepTime,UniqueCarrier,Origin,Dest,Distance
c-12,c-20,c-7,1430,ZZ,ORD,JFK,740
c-5,c-25,c-1,815,AA,BOS,ORD,867
";

const LABELED_TEST_CSV: &str = "\
Month,DayofMonth,DayOfWeek,DepTime,UniqueCarrier,Origin,Dest,Distance,dep_delayed_15min
c-12,c-20,c-7,1430,ZZ,ORD,JFK,740,Y
c-5,c-25,c-1,815,AA,BOS,ORD,867,Y
";

fn seed(root: &Path, test_csv: &str) -> PipelineConfig {
    let cfg = PipelineConfig::rooted_at(root);
    fs::create_dir_all(cfg.train_input.parent().unwrap()).unwrap();
    fs::write(&cfg.train_input, TRAIN_CSV).unwrap();
    fs::write(&cfg.test_input, test_csv).unwrap();
    cfg
}

struct Output {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Output {
    fn read(path: &Path) -> Self {
        let mut reader = csv::Reader::from_path(path).expect("output should exist");
        let headers = reader
            .headers()
            .unwrap()
            .iter()
            .map(str::to_string)
            .collect();
        let rows = reader
            .records()
            .map(|record| record.unwrap().iter().map(str::to_string).collect())
            .collect();
        Self { headers, rows }
    }

    fn cell(&self, row: usize, name: &str) -> &str {
        let idx = self
            .headers
            .iter()
            .position(|header| header == name)
            .unwrap_or_else(|| panic!("column {name} should exist"));
        &self.rows[row][idx]
    }

    fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|header| header == name)
    }
}

#[test]
fn pipeline_writes_outputs_and_snapshot() {
    let dir = tempdir().unwrap();
    let cfg = seed(dir.path(), TEST_CSV);

    let report = run_pipeline(&cfg).expect("pipeline succeeds");

    assert_eq!(report.training.mode, PassMode::Training);
    assert_eq!(report.training.reference, ReferenceSource::SelfReference);
    assert_eq!(report.training.rows, 6);
    assert_eq!(
        report.training.snapshot_path.as_deref(),
        Some(cfg.snapshot_path().as_path())
    );
    assert_eq!(report.test.mode, PassMode::Test);
    assert_eq!(report.test.reference, ReferenceSource::Snapshot);
    assert_eq!(report.test.rows, 2);
    assert_eq!(
        report.training.schema.fingerprint,
        report.test.schema.fingerprint
    );

    assert_eq!(
        fs::read(&cfg.train_output).unwrap(),
        fs::read(cfg.snapshot_path()).unwrap()
    );
    assert!(!cfg.train_output.with_file_name("flight_delays_train_features.csv.tmp").exists());

    let train = Output::read(&cfg.train_output);
    assert_eq!(train.cell(0, "Month"), "12");
    assert_eq!(train.cell(0, LABEL_COLUMN), "1");
    assert_eq!(train.cell(1, LABEL_COLUMN), "0");

    let test = Output::read(&cfg.test_output);
    assert!(!test.has_column(LABEL_COLUMN));
    assert_eq!(test.cell(0, "carrier_delay_rate"), "");
    assert_eq!(test.cell(0, "route_carrier_count"), "0");
    assert_eq!(test.cell(0, "origin_freq_rank"), "1");
    assert_eq!(test.cell(1, "origin_freq_rank"), "");
    assert_eq!(test.cell(1, "origin_num_connections"), "0");

    let json = serde_json::to_string(&report.test).unwrap();
    assert!(json.contains("\"mode\":\"test\""));
    assert!(json.contains("\"reference\":\"snapshot\""));
}

#[test]
fn repeated_runs_are_byte_identical() {
    let dir_a = tempdir().unwrap();
    let dir_b = tempdir().unwrap();
    let cfg_a = seed(dir_a.path(), TEST_CSV);
    let cfg_b = seed(dir_b.path(), TEST_CSV);

    run_pipeline(&cfg_a).unwrap();
    run_pipeline(&cfg_b).unwrap();
    let first_test = fs::read(&cfg_a.test_output).unwrap();
    run_pipeline(&cfg_a).unwrap();

    assert_eq!(
        fs::read(&cfg_a.train_output).unwrap(),
        fs::read(&cfg_b.train_output).unwrap()
    );
    assert_eq!(
        fs::read(&cfg_a.test_output).unwrap(),
        fs::read(&cfg_b.test_output).unwrap()
    );
    assert_eq!(fs::read(&cfg_a.test_output).unwrap(), first_test);
}

#[test]
fn test_labels_do_not_change_test_features() {
    let dir_plain = tempdir().unwrap();
    let dir_labeled = tempdir().unwrap();
    let plain_cfg = seed(dir_plain.path(), TEST_CSV);
    let labeled_cfg = seed(dir_labeled.path(), LABELED_TEST_CSV);

    run_pipeline(&plain_cfg).unwrap();
    run_pipeline(&labeled_cfg).unwrap();

    let plain = Output::read(&plain_cfg.test_output);
    let labeled = Output::read(&labeled_cfg.test_output);

    let labeled_without_label: Vec<&String> = labeled
        .headers
        .iter()
        .filter(|header| header.as_str() != LABEL_COLUMN)
        .collect();
    assert_eq!(labeled_without_label, plain.headers.iter().collect::<Vec<_>>());

    for name in &plain.headers {
        for row in 0..plain.rows.len() {
            assert_eq!(
                plain.cell(row, name),
                labeled.cell(row, name),
                "{name} differs at row {row}"
            );
        }
    }
}

#[test]
fn test_pass_without_snapshot_falls_back_to_its_own_rows() {
    let dir = tempdir().unwrap();
    let cfg = seed(dir.path(), TEST_CSV);

    let report = run_test_pass(&cfg).expect("fallback is not an error");

    assert_eq!(report.reference, ReferenceSource::SelfReferenceFallback);
    assert_eq!(report.snapshot_path, None);
    assert_eq!(report.rows, 2);

    let test = Output::read(&cfg.test_output);
    // Unlabeled test rows cannot produce rate features.
    assert!(!test.has_column("carrier_delay_rate"));
    assert!(!test.has_column("high_risk_combo"));
    assert!(test.has_column("delay_risk_score"));
    assert_eq!(test.cell(1, "origin_num_connections"), "1");
}

#[test]
fn missing_required_column_fails_before_writing() {
    let dir = tempdir().unwrap();
    let cfg = seed(dir.path(), TEST_CSV);
    fs::write(
        &cfg.train_input,
        "Month,DayofMonth,DayOfWeek,DepTime,UniqueCarrier,Origin,Distance\n1,1,1,900,AA,ORD,740\n",
    )
    .unwrap();

    let err = run_training_pass(&cfg).unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Table(TableError::MissingColumn { ref column }) if column == "Dest"
    ));
    assert!(!cfg.train_output.exists());
    assert!(!cfg.snapshot_path().exists());
}

#[test]
fn failed_snapshot_write_leaves_no_training_output() {
    let dir = tempdir().unwrap();
    let mut cfg = seed(dir.path(), TEST_CSV);
    // A regular file where the feature store directory should be.
    let blocked = dir.path().join("feature_store");
    fs::write(&blocked, "not a directory").unwrap();
    cfg.feature_store_dir = blocked;

    let err = run_training_pass(&cfg).unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Feature(FeatureError::Table(TableError::Io(_)))
    ));
    assert!(!cfg.train_output.exists());
}

#[test]
fn missing_input_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    let cfg = PipelineConfig::rooted_at(dir.path());

    let err = run_training_pass(&cfg).unwrap_err();
    assert!(matches!(err, PipelineError::Table(_)));
}
