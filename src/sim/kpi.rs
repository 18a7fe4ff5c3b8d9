//! Post-hoc KPI computation from episode trajectories.

use std::fmt;

use super::state::StepRecord;

/// Aggregate indicators derived from a complete episode.
///
/// Computed post-hoc from `Vec<StepRecord>` so the report can never drift
/// from the recorded trajectory.
#[derive(Debug, Clone)]
pub struct EpisodeKpi {
    /// Sum of per-step total costs.
    pub total_cost: f64,
    /// Sum of import costs.
    pub fuel_cost: f64,
    /// Sum of load-shedding penalties.
    pub load_shedding_cost: f64,
    /// Sum of curtailment penalties.
    pub curtailment_cost: f64,
    /// Sum of storage degradation costs.
    pub storage_maintenance_cost: f64,
    /// Sum of per-step rewards.
    pub total_reward: f64,
    /// Unserved load over the episode (kWh).
    pub energy_shed_kwh: f64,
    /// Wasted production over the episode (kWh).
    pub energy_curtailed_kwh: f64,
    /// Imported energy over the episode (kWh).
    pub energy_imported_kwh: f64,
    /// Total storage throughput, sum of `|power| * dt` over devices (kWh).
    pub storage_throughput_kwh: f64,
    /// Equivalent full cycles: throughput over twice the fleet capacity.
    pub equivalent_full_cycles: f64,
    /// Peak import power (kW).
    pub peak_import_kw: f64,
    /// Number of steps in the episode.
    pub steps: usize,
}

impl EpisodeKpi {
    /// Computes all indicators from a trajectory.
    ///
    /// # Arguments
    ///
    /// * `records` - Complete episode trajectory
    /// * `dt_hours` - Decision interval length in hours
    /// * `fleet_capacity_kwh` - Total storage capacity for cycle counting
    pub fn from_records(records: &[StepRecord], dt_hours: f64, fleet_capacity_kwh: f64) -> Self {
        let mut kpi = Self {
            total_cost: 0.0,
            fuel_cost: 0.0,
            load_shedding_cost: 0.0,
            curtailment_cost: 0.0,
            storage_maintenance_cost: 0.0,
            total_reward: 0.0,
            energy_shed_kwh: 0.0,
            energy_curtailed_kwh: 0.0,
            energy_imported_kwh: 0.0,
            storage_throughput_kwh: 0.0,
            equivalent_full_cycles: 0.0,
            peak_import_kw: 0.0,
            steps: records.len(),
        };

        for r in records {
            kpi.total_cost += r.info.total_cost;
            kpi.fuel_cost += r.info.fuel_cost;
            kpi.load_shedding_cost += r.info.load_shedding;
            kpi.curtailment_cost += r.info.curtailment;
            kpi.storage_maintenance_cost += r.info.storage_maintenance;
            kpi.total_reward += r.reward;
            kpi.energy_shed_kwh += r.info.shed_kwh;
            kpi.energy_curtailed_kwh += r.info.curtailed_kwh;
            kpi.energy_imported_kwh += r.info.import_kwh;
            kpi.storage_throughput_kwh +=
                r.storage_kw.iter().map(|kw| kw.abs()).sum::<f64>() * dt_hours;
            if dt_hours > 0.0 {
                kpi.peak_import_kw = kpi.peak_import_kw.max(r.info.import_kwh / dt_hours);
            }
        }

        if fleet_capacity_kwh > 0.0 {
            kpi.equivalent_full_cycles = kpi.storage_throughput_kwh / (2.0 * fleet_capacity_kwh);
        }
        kpi
    }
}

impl fmt::Display for EpisodeKpi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Episode Report ({} steps) ---", self.steps)?;
        writeln!(f, "Total cost:            {:.3}", self.total_cost)?;
        writeln!(f, "  import (fuel):       {:.3}", self.fuel_cost)?;
        writeln!(f, "  load shedding:       {:.3}", self.load_shedding_cost)?;
        writeln!(f, "  curtailment:         {:.3}", self.curtailment_cost)?;
        writeln!(
            f,
            "  storage aging:       {:.3}",
            self.storage_maintenance_cost
        )?;
        writeln!(f, "Total reward:          {:.3}", self.total_reward)?;
        writeln!(f, "Energy shed:           {:.2} kWh", self.energy_shed_kwh)?;
        writeln!(
            f,
            "Energy curtailed:      {:.2} kWh",
            self.energy_curtailed_kwh
        )?;
        writeln!(
            f,
            "Energy imported:       {:.2} kWh",
            self.energy_imported_kwh
        )?;
        writeln!(f, "Peak import:           {:.2} kW", self.peak_import_kw)?;
        write!(
            f,
            "Storage throughput:    {:.2} kWh ({:.2} equiv. cycles)",
            self.storage_throughput_kwh, self.equivalent_full_cycles
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::RewardInfo;

    use chrono::NaiveDateTime;

    fn record(storage_kw: f64, import_kwh: f64, shed_kwh: f64) -> StepRecord {
        let timestamp =
            NaiveDateTime::parse_from_str("2016-01-01 00:00:00", "%Y-%m-%d %H:%M:%S").expect("ts");
        StepRecord {
            step: 0,
            timestamp,
            action: 0,
            consumption_kw: 0.0,
            production_kw: 0.0,
            storage_kw: vec![storage_kw],
            storage_socs: vec![5.0],
            reward: -1.0,
            info: RewardInfo {
                total_cost: 1.0,
                fuel_cost: 0.25,
                load_shedding: 0.5,
                curtailment: 0.0,
                storage_maintenance: 0.25,
                import_kwh,
                export_kwh: 0.0,
                shed_kwh,
                curtailed_kwh: 0.0,
            },
        }
    }

    #[test]
    fn throughput_and_cycles() {
        // |2| + |-3| + |1| + |-1| = 7 kWh at dt = 1 h
        let records: Vec<StepRecord> = [2.0, -3.0, 1.0, -1.0]
            .iter()
            .map(|&kw| record(kw, 0.0, 0.0))
            .collect();
        let kpi = EpisodeKpi::from_records(&records, 1.0, 10.0);
        assert!((kpi.storage_throughput_kwh - 7.0).abs() < 1e-9);
        assert!((kpi.equivalent_full_cycles - 0.35).abs() < 1e-9);
    }

    #[test]
    fn cost_components_accumulate() {
        let records: Vec<StepRecord> = (0..4).map(|_| record(0.0, 0.5, 1.0)).collect();
        let kpi = EpisodeKpi::from_records(&records, 1.0, 10.0);
        assert!((kpi.total_cost - 4.0).abs() < 1e-9);
        assert!((kpi.fuel_cost - 1.0).abs() < 1e-9);
        assert!((kpi.load_shedding_cost - 2.0).abs() < 1e-9);
        assert!((kpi.energy_shed_kwh - 4.0).abs() < 1e-9);
        assert!((kpi.energy_imported_kwh - 2.0).abs() < 1e-9);
        assert_eq!(kpi.steps, 4);
    }

    #[test]
    fn peak_import_converts_energy_to_power() {
        let records = vec![record(0.0, 0.5, 0.0), record(0.0, 2.0, 0.0)];
        let kpi = EpisodeKpi::from_records(&records, 0.5, 10.0);
        assert!((kpi.peak_import_kw - 4.0).abs() < 1e-9);
    }

    #[test]
    fn empty_trajectory_is_all_zero() {
        let kpi = EpisodeKpi::from_records(&[], 1.0, 10.0);
        assert_eq!(kpi.steps, 0);
        assert_eq!(kpi.total_cost, 0.0);
        assert_eq!(kpi.equivalent_full_cycles, 0.0);
    }

    #[test]
    fn display_does_not_panic() {
        let kpi = EpisodeKpi::from_records(&[record(1.0, 0.5, 0.0)], 1.0, 10.0);
        let s = format!("{kpi}");
        assert!(s.contains("Episode Report"));
    }
}
