//! Flight delay feature derivation.
//!
//! Turns raw flight records into a wide feature table in two passes:
//! - training: aggregates are computed from the training rows and the processed
//!   table is persisted as the reference snapshot
//! - test: aggregates come from that snapshot, never from the test rows

mod carrier;
mod cyclical;
mod features;
mod grouped;
mod interaction;
mod network;
mod normalize;
mod observability;
mod pipeline;
mod reference;
mod spatial;
mod table;
mod temporal;
#[cfg(test)]
mod test_env;

pub use carrier::apply_carrier_features;
pub use cyclical::{apply_cyclical_features, encode, time_of_day};
pub use features::{
    assert_schema_compatible, FeatureColumn, FeatureDType, FeatureError, FeatureSchema,
    FeatureTable, FeatureValue, FEATURE_SCHEMA_VERSION,
};
pub use grouped::{GroupedStatistic, MissPolicy};
pub use interaction::{apply_interaction_features, NORTHERN_HUBS, RISK_FLAGS, WINTER_MONTHS};
pub use network::apply_network_features;
pub use normalize::{normalize, NormalizeConfig, NormalizedTable, DEFAULT_CATEGORY_PREFIX};
pub use observability::{
    init_logging, log_app_start, log_reference_selected, logging_config_from_env, LogFormat,
    LoggingConfig, LoggingInitError,
};
pub use pipeline::{
    build_feature_table, pipeline_config_from_env, run_pipeline, run_test_pass,
    run_training_pass, transform_for_training, transform_with_reference, PassMode, PassReport,
    PipelineConfig, PipelineError, PipelineReport,
};
pub use reference::{
    snapshot_path, AirportHourKey, CarrierHourKey, CarrierRouteKey, ComputedStatistics,
    ReferenceSource, ReferenceStatistics, RouteHourKey, SnapshotStatistics, StatisticsConfig,
    StatisticsProvider, DEFAULT_HUB_COUNT, SNAPSHOT_FILE_NAME,
};
pub use spatial::{apply_spatial_features, distance_category, DistanceCategory};
pub use table::{route_key, FlightRecord, RawTable, TableError, LABEL_COLUMN, REQUIRED_COLUMNS};
pub use temporal::{
    apply_temporal_features, is_holiday, is_peak_travel_season, is_weekend, month_day, season,
    time_period, Season, TimePeriod, US_HOLIDAYS,
};
