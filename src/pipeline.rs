//! Two-pass batch job: a training pass that derives features from its own rows
//! and persists a reference snapshot, and a test pass scored against that snapshot.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::carrier::apply_carrier_features;
use crate::cyclical::apply_cyclical_features;
use crate::features::{FeatureError, FeatureSchema, FeatureTable};
use crate::interaction::apply_interaction_features;
use crate::network::apply_network_features;
use crate::normalize::{normalize, NormalizeConfig, NormalizedTable};
use crate::observability::log_reference_selected;
use crate::reference::{
    snapshot_path, ComputedStatistics, ReferenceSource, ReferenceStatistics, SnapshotStatistics,
    StatisticsConfig, StatisticsProvider,
};
use crate::spatial::apply_spatial_features;
use crate::table::{RawTable, TableError};
use crate::temporal::apply_temporal_features;

pub const TRAIN_INPUT: &str = "data/raw/flight_delays_train.csv";
pub const TEST_INPUT: &str = "data/raw/flight_delays_test.csv";
pub const TRAIN_OUTPUT: &str = "data/processed/flight_delays_train_features.csv";
pub const TEST_OUTPUT: &str = "data/processed/flight_delays_test_features.csv";
pub const FEATURE_STORE_DIR: &str = "models/feature_store";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub train_input: PathBuf,
    pub test_input: PathBuf,
    pub train_output: PathBuf,
    pub test_output: PathBuf,
    pub feature_store_dir: PathBuf,
    pub normalize: NormalizeConfig,
    pub statistics: StatisticsConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::rooted_at(Path::new(""))
    }
}

impl PipelineConfig {
    /// The fixed input/output layout under `root`.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            train_input: root.join(TRAIN_INPUT),
            test_input: root.join(TEST_INPUT),
            train_output: root.join(TRAIN_OUTPUT),
            test_output: root.join(TEST_OUTPUT),
            feature_store_dir: root.join(FEATURE_STORE_DIR),
            normalize: NormalizeConfig::default(),
            statistics: StatisticsConfig::default(),
        }
    }

    pub fn snapshot_path(&self) -> PathBuf {
        snapshot_path(&self.feature_store_dir)
    }
}

pub fn pipeline_config_from_env() -> PipelineConfig {
    let mut config = match env::var("DELAY_FEATURES_PROJECT_DIR") {
        Ok(root) if !root.trim().is_empty() => PipelineConfig::rooted_at(Path::new(root.trim())),
        _ => PipelineConfig::default(),
    };

    if let Ok(prefix) = env::var("DELAY_FEATURES_CATEGORY_PREFIX") {
        config.normalize.category_prefix = prefix.trim().to_string();
    }

    if let Ok(hub_count) = env::var("DELAY_FEATURES_HUB_COUNT") {
        if let Ok(parsed) = hub_count.trim().parse::<usize>() {
            config.statistics.hub_count = parsed;
        }
    }

    config
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Feature(#[from] FeatureError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassMode {
    Training,
    Test,
}

impl PassMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Training => "training",
            Self::Test => "test",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassReport {
    pub mode: PassMode,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Snapshot written by a training pass, or read by a test pass when one existed.
    pub snapshot_path: Option<PathBuf>,
    pub reference: ReferenceSource,
    pub rows: usize,
    pub schema: FeatureSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub training: PassReport,
    pub test: PassReport,
}

type Stage = fn(&mut FeatureTable, &ReferenceStatistics) -> Result<(), FeatureError>;

const STAGES: [(&str, Stage); 6] = [
    ("temporal", temporal_stage),
    ("cyclical", cyclical_stage),
    ("spatial", apply_spatial_features),
    ("carrier", apply_carrier_features),
    ("network", apply_network_features),
    ("interaction", apply_interaction_features),
];

// Calendar stages read only the rows themselves.
fn temporal_stage(table: &mut FeatureTable, _: &ReferenceStatistics) -> Result<(), FeatureError> {
    apply_temporal_features(table)
}

fn cyclical_stage(table: &mut FeatureTable, _: &ReferenceStatistics) -> Result<(), FeatureError> {
    apply_cyclical_features(table)
}

/// Runs every feature stage over `normalized` against frozen statistics.
pub fn build_feature_table<P>(
    normalized: NormalizedTable,
    provider: &P,
) -> Result<FeatureTable, FeatureError>
where
    P: StatisticsProvider + ?Sized,
{
    let stats = provider.statistics();
    let mut table = FeatureTable::new(normalized);

    for (stage, apply) in STAGES {
        let before = table.columns().len();
        apply(&mut table, stats)?;
        debug!(
            component = "features",
            event = "features.stage.applied",
            stage,
            reference = provider.source().as_str(),
            added_columns = table.columns().len() - before,
            rows = table.len()
        );
    }

    Ok(table)
}

/// Normalizes `raw` and derives its features from its own statistics.
pub fn transform_for_training(
    raw: &RawTable,
    cfg: &PipelineConfig,
) -> Result<FeatureTable, FeatureError> {
    let normalized = normalize(raw, &cfg.normalize)?;
    let provider = ComputedStatistics::compute(&normalized, &cfg.statistics);
    build_feature_table(normalized, &provider)
}

/// Normalizes `raw` and derives its features from `provider`.
pub fn transform_with_reference<P>(
    raw: &RawTable,
    provider: &P,
    cfg: &PipelineConfig,
) -> Result<FeatureTable, FeatureError>
where
    P: StatisticsProvider + ?Sized,
{
    let normalized = normalize(raw, &cfg.normalize)?;
    build_feature_table(normalized, provider)
}

pub fn run_training_pass(cfg: &PipelineConfig) -> Result<PassReport, PipelineError> {
    log_pass_start(PassMode::Training, &cfg.train_input);

    let raw = RawTable::read_csv(&cfg.train_input)?;
    let normalized = normalize(&raw, &cfg.normalize)?;
    let provider = ComputedStatistics::compute(&normalized, &cfg.statistics);
    log_reference_selected(
        PassMode::Training.as_str(),
        provider.source().as_str(),
        None,
        provider.statistics().reference_rows,
    );

    let table = build_feature_table(normalized, &provider)?;

    // The output is written last so a failed snapshot leaves no output behind.
    let snapshot = cfg.snapshot_path();
    table.write_csv(&snapshot)?;
    info!(
        component = "pipeline",
        event = "pipeline.snapshot.persisted",
        path = %snapshot.display(),
        rows = table.len()
    );
    table.write_csv(&cfg.train_output)?;

    let report = PassReport {
        mode: PassMode::Training,
        input_path: cfg.train_input.clone(),
        output_path: cfg.train_output.clone(),
        snapshot_path: Some(snapshot),
        reference: provider.source(),
        rows: table.len(),
        schema: table.schema(),
    };
    log_pass_finish(&report);
    Ok(report)
}

pub fn run_test_pass(cfg: &PipelineConfig) -> Result<PassReport, PipelineError> {
    log_pass_start(PassMode::Test, &cfg.test_input);

    let raw = RawTable::read_csv(&cfg.test_input)?;
    let normalized = normalize(&raw, &cfg.normalize)?;
    let snapshot = cfg.snapshot_path();

    let (table, reference, snapshot_used) =
        match SnapshotStatistics::load(&snapshot, &cfg.normalize, &cfg.statistics)? {
            Some(provider) => {
                log_reference_selected(
                    PassMode::Test.as_str(),
                    provider.source().as_str(),
                    None,
                    provider.statistics().reference_rows,
                );
                let table = build_feature_table(normalized, &provider)?;
                (table, provider.source(), Some(snapshot))
            }
            None => {
                warn!(
                    component = "pipeline",
                    event = "pipeline.reference.fallback",
                    snapshot_path = %snapshot.display(),
                    reason = "snapshot_missing"
                );
                let provider = ComputedStatistics::fallback(&normalized, &cfg.statistics);
                log_reference_selected(
                    PassMode::Test.as_str(),
                    provider.source().as_str(),
                    Some("snapshot_missing"),
                    provider.statistics().reference_rows,
                );
                let table = build_feature_table(normalized, &provider)?;
                (table, provider.source(), None)
            }
        };

    table.write_csv(&cfg.test_output)?;

    let report = PassReport {
        mode: PassMode::Test,
        input_path: cfg.test_input.clone(),
        output_path: cfg.test_output.clone(),
        snapshot_path: snapshot_used,
        reference,
        rows: table.len(),
        schema: table.schema(),
    };
    log_pass_finish(&report);
    Ok(report)
}

pub fn run_pipeline(cfg: &PipelineConfig) -> Result<PipelineReport, PipelineError> {
    let training = run_training_pass(cfg)?;
    let test = run_test_pass(cfg)?;
    Ok(PipelineReport { training, test })
}

fn log_pass_start(mode: PassMode, input: &Path) {
    info!(
        component = "pipeline",
        event = "pipeline.pass.start",
        mode = mode.as_str(),
        input_path = %input.display()
    );
}

fn log_pass_finish(report: &PassReport) {
    info!(
        component = "pipeline",
        event = "pipeline.pass.finish",
        mode = report.mode.as_str(),
        reference = report.reference.as_str(),
        output_path = %report.output_path.display(),
        rows = report.rows,
        feature_columns = report.schema.columns.len(),
        schema_fingerprint = %report.schema.fingerprint
    );
}
