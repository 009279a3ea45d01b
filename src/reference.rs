//! Reference statistics and the providers that hand them to the aggregators.
//!
//! A training pass computes statistics from its own rows. A test pass loads the
//! persisted training table and serves statistics computed from it, so the test
//! rows never feed back into the aggregates they are scored against.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::grouped::{GroupedStatistic, MissPolicy};
use crate::normalize::{normalize, NormalizeConfig, NormalizedTable};
use crate::table::{FlightRecord, RawTable, TableError};

pub const SNAPSHOT_FILE_NAME: &str = "train_reference.csv";
pub const DEFAULT_HUB_COUNT: usize = 10;

pub type AirportHourKey = (String, i64);
pub type CarrierHourKey = (String, i64);
pub type CarrierRouteKey = (String, String, String);
pub type RouteHourKey = (String, String, i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceSource {
    SelfReference,
    Snapshot,
    SelfReferenceFallback,
}

impl ReferenceSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SelfReference => "self_reference",
            Self::Snapshot => "snapshot",
            Self::SelfReferenceFallback => "self_reference_fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsConfig {
    pub hub_count: usize,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            hub_count: DEFAULT_HUB_COUNT,
        }
    }
}

/// Frozen aggregates of one reference table. Rate tables are `None` when the
/// reference had no label column.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceStatistics {
    pub reference_rows: usize,
    pub has_label: bool,

    pub origin_freq_rank: GroupedStatistic<String>,
    pub dest_freq_rank: GroupedStatistic<String>,
    pub origin_delay_rate: Option<GroupedStatistic<String>>,
    pub dest_delay_rate: Option<GroupedStatistic<String>>,
    pub origin_hubs: BTreeSet<String>,
    pub dest_hubs: BTreeSet<String>,
    pub route_freq_rank: GroupedStatistic<String>,
    pub route_delay_rate: Option<GroupedStatistic<String>>,

    pub carrier_size_rank: GroupedStatistic<String>,
    pub carrier_delay_rate: Option<GroupedStatistic<String>>,
    pub carrier_hour_delay_rate: Option<GroupedStatistic<CarrierHourKey>>,
    pub carrier_route_count: GroupedStatistic<CarrierRouteKey>,

    pub origin_hour_count: GroupedStatistic<AirportHourKey>,
    pub origin_congestion_rank: GroupedStatistic<AirportHourKey>,
    pub origin_connections: GroupedStatistic<String>,
    pub carrier_hour_count: GroupedStatistic<CarrierHourKey>,
    pub origin_hour_delay_rate: Option<GroupedStatistic<AirportHourKey>>,
    pub route_hour_count: GroupedStatistic<RouteHourKey>,
    pub route_congestion_rank: GroupedStatistic<RouteHourKey>,

    /// Row-weighted mean of `carrier_delay_rate` over the reference rows.
    pub carrier_delay_rate_mean: Option<f64>,
    /// Row-weighted mean of `route_delay_rate` over the reference rows.
    pub route_delay_rate_mean: Option<f64>,
}

impl ReferenceStatistics {
    pub fn compute(table: &NormalizedTable, cfg: &StatisticsConfig) -> Self {
        let records = table.records();
        let has_label = table.has_label();
        let routes: Vec<String> = records.iter().map(FlightRecord::route_key).collect();

        let origin_counts = GroupedStatistic::count(
            records.iter().map(|r| r.origin.clone()),
            MissPolicy::Zero,
        );
        let dest_counts =
            GroupedStatistic::count(records.iter().map(|r| r.dest.clone()), MissPolicy::Zero);
        let route_counts = GroupedStatistic::count(routes.iter().cloned(), MissPolicy::Zero);
        let carrier_counts = GroupedStatistic::count(
            records.iter().map(|r| r.carrier.clone()),
            MissPolicy::Zero,
        );

        let origin_delay_rate = has_label.then(|| {
            GroupedStatistic::mean(
                records.iter().map(|r| (r.origin.clone(), r.label())),
                MissPolicy::Missing,
            )
        });
        let dest_delay_rate = has_label.then(|| {
            GroupedStatistic::mean(
                records.iter().map(|r| (r.dest.clone(), r.label())),
                MissPolicy::Missing,
            )
        });
        let route_delay_rate = has_label.then(|| {
            GroupedStatistic::mean(
                routes.iter().cloned().zip(records.iter().map(FlightRecord::label)),
                MissPolicy::Missing,
            )
        });
        let carrier_delay_rate = has_label.then(|| {
            GroupedStatistic::mean(
                records.iter().map(|r| (r.carrier.clone(), r.label())),
                MissPolicy::Missing,
            )
        });
        let carrier_hour_delay_rate = has_label.then(|| {
            GroupedStatistic::mean(
                records
                    .iter()
                    .map(|r| ((r.carrier.clone(), r.dep_hour()), r.label())),
                MissPolicy::Missing,
            )
        });
        let origin_hour_delay_rate = has_label.then(|| {
            GroupedStatistic::mean(
                records
                    .iter()
                    .map(|r| ((r.origin.clone(), r.dep_hour()), r.label())),
                MissPolicy::Missing,
            )
        });

        let origin_hour_count = GroupedStatistic::count(
            records.iter().map(|r| (r.origin.clone(), r.dep_hour())),
            MissPolicy::Zero,
        );
        let origin_congestion_rank =
            origin_hour_count.percentile_rank_within(|(origin, _)| origin.clone(), None);
        let route_hour_count = GroupedStatistic::count(
            records
                .iter()
                .map(|r| (r.origin.clone(), r.dest.clone(), r.dep_hour())),
            MissPolicy::Zero,
        );
        let route_congestion_rank = route_hour_count
            .percentile_rank_within(|(origin, dest, _)| (origin.clone(), dest.clone()), Some(0.5));

        let carrier_delay_rate_mean = carrier_delay_rate
            .as_ref()
            .and_then(|rates| rates.mean_over_keys(records.iter().map(|r| &r.carrier)));
        let route_delay_rate_mean = route_delay_rate
            .as_ref()
            .and_then(|rates| rates.mean_over_keys(routes.iter()));

        let stats = Self {
            reference_rows: records.len(),
            has_label,
            origin_freq_rank: origin_counts.percentile_rank(),
            dest_freq_rank: dest_counts.percentile_rank(),
            origin_delay_rate,
            dest_delay_rate,
            origin_hubs: origin_counts.top_n(cfg.hub_count),
            dest_hubs: dest_counts.top_n(cfg.hub_count),
            route_freq_rank: route_counts.percentile_rank(),
            route_delay_rate,
            carrier_size_rank: carrier_counts.percentile_rank(),
            carrier_delay_rate,
            carrier_hour_delay_rate,
            carrier_route_count: GroupedStatistic::count(
                records
                    .iter()
                    .map(|r| (r.carrier.clone(), r.origin.clone(), r.dest.clone())),
                MissPolicy::Zero,
            ),
            origin_hour_count,
            origin_congestion_rank,
            origin_connections: GroupedStatistic::distinct(
                records.iter().map(|r| (r.origin.clone(), r.dest.as_str())),
                MissPolicy::Zero,
            ),
            carrier_hour_count: GroupedStatistic::count(
                records.iter().map(|r| (r.carrier.clone(), r.dep_hour())),
                MissPolicy::Zero,
            ),
            origin_hour_delay_rate,
            route_hour_count,
            route_congestion_rank,
            carrier_delay_rate_mean,
            route_delay_rate_mean,
        };

        debug!(
            component = "reference",
            event = "reference.statistics.computed",
            reference_rows = stats.reference_rows,
            has_label = stats.has_label,
            origins = stats.origin_freq_rank.len(),
            routes = stats.route_freq_rank.len(),
            carriers = stats.carrier_size_rank.len()
        );

        stats
    }
}

/// Read-only access to the statistics a pass derives its aggregate features from.
pub trait StatisticsProvider {
    fn source(&self) -> ReferenceSource;
    fn statistics(&self) -> &ReferenceStatistics;
}

/// Statistics computed from the rows being processed.
#[derive(Debug, Clone)]
pub struct ComputedStatistics {
    source: ReferenceSource,
    statistics: ReferenceStatistics,
}

impl ComputedStatistics {
    pub fn compute(table: &NormalizedTable, cfg: &StatisticsConfig) -> Self {
        Self {
            source: ReferenceSource::SelfReference,
            statistics: ReferenceStatistics::compute(table, cfg),
        }
    }

    /// Self-reference used by a test pass that found no training snapshot.
    pub fn fallback(table: &NormalizedTable, cfg: &StatisticsConfig) -> Self {
        Self {
            source: ReferenceSource::SelfReferenceFallback,
            statistics: ReferenceStatistics::compute(table, cfg),
        }
    }
}

impl StatisticsProvider for ComputedStatistics {
    fn source(&self) -> ReferenceSource {
        self.source
    }

    fn statistics(&self) -> &ReferenceStatistics {
        &self.statistics
    }
}

/// Statistics served from a persisted training table.
#[derive(Debug, Clone)]
pub struct SnapshotStatistics {
    path: PathBuf,
    statistics: ReferenceStatistics,
}

impl SnapshotStatistics {
    /// Returns `Ok(None)` when no snapshot exists at `path`.
    pub fn load(
        path: &Path,
        normalize_cfg: &NormalizeConfig,
        cfg: &StatisticsConfig,
    ) -> Result<Option<Self>, TableError> {
        if !path.is_file() {
            return Ok(None);
        }

        let raw = RawTable::read_csv(path)?;
        let table = normalize(&raw, normalize_cfg)?;
        Ok(Some(Self::from_table(path, &table, cfg)))
    }

    pub fn from_table(path: &Path, table: &NormalizedTable, cfg: &StatisticsConfig) -> Self {
        Self {
            path: path.to_path_buf(),
            statistics: ReferenceStatistics::compute(table, cfg),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatisticsProvider for SnapshotStatistics {
    fn source(&self) -> ReferenceSource {
        ReferenceSource::Snapshot
    }

    fn statistics(&self) -> &ReferenceStatistics {
        &self.statistics
    }
}

pub fn snapshot_path(feature_store_dir: &Path) -> PathBuf {
    feature_store_dir.join(SNAPSHOT_FILE_NAME)
}
