//! Shared builders for integration tests.

use std::sync::Arc;

use chrono::NaiveDateTime;

use microgrid_sim::data::{ExogenousSample, TimeSeries};
use microgrid_sim::devices::StorageDevice;
use microgrid_sim::sim::grid::{Grid, UtilityConnection};
use microgrid_sim::sim::simulator::Simulator;

pub const START: &str = "2016-01-01 00:00:00";

pub fn t(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").expect("test timestamp")
}

/// A constant consumption/production series sampled every `period_minutes`.
pub fn flat_series(
    consumption_kw: f64,
    production_kw: f64,
    period_minutes: u32,
    n: usize,
) -> Arc<TimeSeries> {
    let samples = vec![
        ExogenousSample {
            consumption_kw,
            production_kw,
        };
        n
    ];
    Arc::new(TimeSeries::new(t(START), period_minutes, samples).expect("valid series"))
}

/// A 10 kWh lossless storage at half charge with 3 kW rate limits.
pub fn reference_storage() -> StorageDevice {
    StorageDevice::new("bess", 10.0, 0.0, 10.0, 5.0, 3.0, 3.0, 1.0, 1.0, 0.0)
}

/// Single-storage simulator over `steps` decision intervals of
/// `period_minutes`, with shedding priced at 1.0 and curtailment at 1.0
/// per kWh so energy quantities map one-to-one onto costs.
pub fn single_storage_sim(
    consumption_kw: f64,
    production_kw: f64,
    period_minutes: u32,
    steps: usize,
    connection: UtilityConnection,
) -> Simulator {
    let grid = Grid::new(vec![reference_storage()], connection, 1.0, 1.0);
    let end = t(START) + chrono::Duration::minutes(i64::from(period_minutes) * steps as i64);
    Simulator::new(
        t(START),
        end,
        period_minutes,
        grid,
        flat_series(consumption_kw, production_kw, period_minutes, steps + 1),
    )
    .expect("valid simulator")
}
