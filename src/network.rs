//! Congestion, connectivity and delay-propagation features keyed by airport/route and hour.

use crate::features::{FeatureError, FeatureTable, FeatureValue};
use crate::reference::{AirportHourKey, CarrierHourKey, ReferenceStatistics, RouteHourKey};

pub fn apply_network_features(
    table: &mut FeatureTable,
    stats: &ReferenceStatistics,
) -> Result<(), FeatureError> {
    let hours = table.require_int_column("dep_hour")?;
    let records = table.records();

    let origins: Vec<String> = records.iter().map(|r| r.origin.clone()).collect();
    let origin_hours: Vec<AirportHourKey> = origins
        .iter()
        .cloned()
        .zip(hours.iter().copied())
        .collect();
    let carrier_hours: Vec<CarrierHourKey> = records
        .iter()
        .zip(&hours)
        .map(|(r, hour)| (r.carrier.clone(), *hour))
        .collect();
    let route_hours: Vec<RouteHourKey> = records
        .iter()
        .zip(&hours)
        .map(|(r, hour)| (r.origin.clone(), r.dest.clone(), *hour))
        .collect();

    table.push_counts(
        "origin_hourly_flights",
        stats.origin_hour_count.apply_all(&origin_hours),
    )?;
    table.push_floats(
        "origin_congestion_rank",
        stats.origin_congestion_rank.apply_all(&origin_hours),
    )?;
    table.push_counts(
        "origin_num_connections",
        stats.origin_connections.apply_all(&origins),
    )?;
    table.push_counts(
        "carrier_hourly_flights",
        stats.carrier_hour_count.apply_all(&carrier_hours),
    )?;

    if let Some(rates) = &stats.origin_hour_delay_rate {
        let airport_rates: Vec<Option<f64>> = match table.column("origin_delay_rate") {
            Some(column) => column.iter().map(FeatureValue::as_f64).collect(),
            None => vec![None; table.len()],
        };
        let values = rates
            .apply_all(&origin_hours)
            .into_iter()
            .zip(airport_rates)
            .map(|(hourly, overall)| hourly.or(overall))
            .collect();
        table.push_floats("origin_hour_delay_rate", values)?;
    }

    table.push_counts(
        "route_hourly_flights",
        stats.route_hour_count.apply_all(&route_hours),
    )?;
    table.push_floats(
        "route_congestion_rank",
        stats.route_congestion_rank.apply_all(&route_hours),
    )?;
    Ok(())
}
