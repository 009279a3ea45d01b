//! Carrier size, punctuality and route volume features.

use crate::features::{FeatureError, FeatureTable};
use crate::reference::{CarrierHourKey, CarrierRouteKey, ReferenceStatistics};

pub fn apply_carrier_features(
    table: &mut FeatureTable,
    stats: &ReferenceStatistics,
) -> Result<(), FeatureError> {
    let records = table.records();
    let carriers: Vec<String> = records.iter().map(|r| r.carrier.clone()).collect();
    let carrier_routes: Vec<CarrierRouteKey> = records
        .iter()
        .map(|r| (r.carrier.clone(), r.origin.clone(), r.dest.clone()))
        .collect();

    table.push_floats("carrier_size_rank", stats.carrier_size_rank.apply_all(&carriers))?;

    if let Some(rates) = &stats.carrier_delay_rate {
        table.push_floats("carrier_delay_rate", rates.apply_all(&carriers))?;
    }

    // Needs the hour column from the temporal stage.
    if let (Some(rates), true) = (&stats.carrier_hour_delay_rate, table.has_column("dep_hour")) {
        let hours = table.require_int_column("dep_hour")?;
        let keys: Vec<CarrierHourKey> = carriers.iter().cloned().zip(hours).collect();
        table.push_floats("carrier_hour_performance", rates.apply_all(&keys))?;
    }

    table.push_counts(
        "route_carrier_count",
        stats.carrier_route_count.apply_all(&carrier_routes),
    )?;
    Ok(())
}
