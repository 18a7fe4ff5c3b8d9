//! Core simulation types: state snapshots, cost decomposition, step records.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Immutable snapshot of the microgrid at one timestamp.
///
/// States are plain values: the simulator returns a fresh one per step and
/// accepts externally supplied ones, so look-ahead search can branch from
/// the same snapshot without cross-contamination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    /// Point in simulated time, within the configured horizon.
    pub timestamp: NaiveDateTime,
    /// State of charge per storage device, in kWh, in grid order.
    pub storage_socs: Vec<f64>,
    /// Exogenous load at `timestamp`, in kW.
    pub consumption_kw: f64,
    /// Exogenous renewable production at `timestamp`, in kW.
    pub production_kw: f64,
}

impl SimulationState {
    /// Load minus production: positive when the grid runs a deficit.
    pub fn net_load_kw(&self) -> f64 {
        self.consumption_kw - self.production_kw
    }
}

/// Per-step cost decomposition, produced fresh each step.
///
/// `total_cost` is always the sum of the four component costs. The `*_kwh`
/// fields record the physical quantities behind the costs so unserved load
/// and wasted production stay auditable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RewardInfo {
    /// Sum of all component costs.
    pub total_cost: f64,
    /// Cost of energy imported through the utility connection.
    pub fuel_cost: f64,
    /// Penalty for unserved load.
    pub load_shedding: f64,
    /// Penalty for wasted renewable production.
    pub curtailment: f64,
    /// Storage aging cost from throughput.
    pub storage_maintenance: f64,

    /// Energy imported over the interval.
    pub import_kwh: f64,
    /// Energy exported over the interval.
    pub export_kwh: f64,
    /// Unserved load over the interval.
    pub shed_kwh: f64,
    /// Wasted production over the interval.
    pub curtailed_kwh: f64,
}

/// Everything a `step` call returns.
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// State entering the next decision interval.
    pub state: SimulationState,
    /// Reward under the simulator's reward composition.
    pub reward: f64,
    /// `true` once the horizon end has been reached.
    pub done: bool,
    /// Cost decomposition for the interval just simulated.
    pub info: RewardInfo,
    /// Power achieved per storage after clipping, in grid order (kW).
    pub storage_kw: Vec<f64>,
}

/// Complete record of one simulated decision interval, for trajectory
/// inspection and CSV export.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    /// Step index within the episode.
    pub step: usize,
    /// Timestamp at which the decision was taken.
    pub timestamp: NaiveDateTime,
    /// Chosen action index.
    pub action: usize,
    /// Exogenous load during the interval (kW).
    pub consumption_kw: f64,
    /// Exogenous production during the interval (kW).
    pub production_kw: f64,
    /// Achieved storage power per device (kW, positive = charge).
    pub storage_kw: Vec<f64>,
    /// Post-step state of charge per device (kWh).
    pub storage_socs: Vec<f64>,
    /// Reward received for the interval.
    pub reward: f64,
    /// Cost decomposition for the interval.
    pub info: RewardInfo,
}

impl fmt::Display for StepRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let socs: Vec<String> = self.storage_socs.iter().map(|s| format!("{s:.2}")).collect();
        write!(
            f,
            "t={:>4} {} | a={:>3} | load={:>6.2} kW  gen={:>6.2} kW | \
             soc=[{}] kWh | cost={:>7.3} (fuel={:.3} shed={:.3} curt={:.3} maint={:.3}) | r={:>8.3}",
            self.step,
            self.timestamp,
            self.action,
            self.consumption_kw,
            self.production_kw,
            socs.join(", "),
            self.info.total_cost,
            self.info.fuel_cost,
            self.info.load_shedding,
            self.info.curtailment,
            self.info.storage_maintenance,
            self.reward,
        )
    }
}
