//! Gym-style environment adapter.
//!
//! Wraps a [`Simulator`] behind numeric-vector observations so agent
//! training loops can stay ignorant of the structured state. The layout is
//! `[consumption_kw, soc_0 .. soc_{n-1}, production_kw, elapsed_minutes]`;
//! [`MicrogridEnv::unflatten`] inverts it so externally produced vectors
//! can be injected back into the transition.

use chrono::Duration;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::error::SimResult;
use crate::sim::simulator::Simulator;
use crate::sim::state::{RewardInfo, SimulationState};

/// Environment wrapper exposing a discrete action space and a bounded-box
/// observation space over a [`Simulator`].
#[derive(Debug)]
pub struct MicrogridEnv {
    sim: Simulator,
    rng: StdRng,
}

impl MicrogridEnv {
    /// Wraps a simulator. The sampling RNG starts from `seed`; reseed any
    /// time with [`MicrogridEnv::seed`].
    pub fn new(sim: Simulator, seed: u64) -> Self {
        Self {
            sim,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// The wrapped simulator.
    pub fn simulator(&self) -> &Simulator {
        &self.sim
    }

    /// Number of discrete actions.
    pub fn action_space(&self) -> usize {
        self.sim.num_actions()
    }

    /// Number of observation components: consumption, one SOC per storage,
    /// production, elapsed minutes.
    pub fn observation_len(&self) -> usize {
        self.sim.grid().num_storages() + 3
    }

    /// Lower bound of each observation component.
    pub fn observation_low(&self) -> Vec<f64> {
        let (consumption_min, _) = self.sim.data().consumption_bounds();
        let (production_min, _) = self.sim.data().production_bounds();
        let mut low = Vec::with_capacity(self.observation_len());
        low.push(consumption_min);
        low.extend(self.sim.grid().storages().iter().map(|s| s.min_soc_kwh));
        low.push(production_min);
        low.push(0.0);
        low
    }

    /// Upper bound of each observation component.
    pub fn observation_high(&self) -> Vec<f64> {
        let (_, consumption_max) = self.sim.data().consumption_bounds();
        let (_, production_max) = self.sim.data().production_bounds();
        let horizon_minutes = (self.sim.end() - self.sim.start()).num_minutes() as f64;
        let mut high = Vec::with_capacity(self.observation_len());
        high.push(consumption_max);
        high.extend(self.sim.grid().storages().iter().map(|s| s.max_soc_kwh));
        high.push(production_max);
        high.push(horizon_minutes);
        high
    }

    /// Reseeds the action-sampling RNG.
    pub fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Uniformly samples a valid action index.
    pub fn sample_action(&mut self) -> usize {
        self.rng.random_range(0..self.action_space())
    }

    /// Starts a fresh episode and returns the flattened initial state.
    pub fn reset(&mut self) -> Vec<f64> {
        let state = self.sim.reset();
        self.flatten(&state)
    }

    /// Restores a flattened snapshot as the tracked episode state.
    pub fn reset_from(&mut self, observation: &[f64]) -> Vec<f64> {
        let state = self.unflatten(observation);
        self.sim.reset_to(state);
        observation.to_vec()
    }

    /// Advances the tracked episode by one step.
    ///
    /// # Errors
    ///
    /// Propagates the simulator's per-call errors; see
    /// [`Simulator::step`].
    pub fn step(&mut self, action: usize) -> SimResult<(Vec<f64>, f64, bool, RewardInfo)> {
        let output = self.sim.step(action)?;
        Ok((
            self.flatten(&output.state),
            output.reward,
            output.done,
            output.info,
        ))
    }

    /// Applies an action to an externally supplied observation without
    /// touching the tracked episode (look-ahead over action branches).
    ///
    /// # Errors
    ///
    /// Propagates the simulator's per-call errors; see
    /// [`Simulator::step_from`].
    pub fn step_from(
        &self,
        observation: &[f64],
        action: usize,
    ) -> SimResult<(Vec<f64>, f64, bool, RewardInfo)> {
        let state = self.unflatten(observation);
        let output = self.sim.step_from(&state, action)?;
        Ok((
            self.flatten(&output.state),
            output.reward,
            output.done,
            output.info,
        ))
    }

    /// Flattens a structured state into the observation layout.
    pub fn flatten(&self, state: &SimulationState) -> Vec<f64> {
        let elapsed_minutes = (state.timestamp - self.sim.start()).num_minutes() as f64;
        let mut observation = Vec::with_capacity(self.observation_len());
        observation.push(state.consumption_kw);
        observation.extend_from_slice(&state.storage_socs);
        observation.push(state.production_kw);
        observation.push(elapsed_minutes);
        observation
    }

    /// Inverse of [`MicrogridEnv::flatten`].
    ///
    /// # Panics
    ///
    /// Panics if the observation length does not match
    /// [`MicrogridEnv::observation_len`].
    pub fn unflatten(&self, observation: &[f64]) -> SimulationState {
        assert_eq!(
            observation.len(),
            self.observation_len(),
            "observation length mismatch"
        );
        let n = self.sim.grid().num_storages();
        let elapsed_minutes = observation[observation.len() - 1].round() as i64;
        SimulationState {
            timestamp: self.sim.start() + Duration::minutes(elapsed_minutes),
            storage_socs: observation[1..1 + n].to_vec(),
            consumption_kw: observation[0],
            production_kw: observation[n + 1],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::NaiveDateTime;

    use crate::data::{ExogenousSample, TIMESTAMP_FORMAT, TimeSeries};
    use crate::devices::StorageDevice;
    use crate::sim::grid::{Grid, UtilityConnection};

    fn t(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).expect("test timestamp")
    }

    fn env() -> MicrogridEnv {
        let samples = vec![
            ExogenousSample {
                consumption_kw: 2.0,
                production_kw: 1.0,
            };
            25
        ];
        let data = Arc::new(TimeSeries::new(t("2016-01-01 00:00:00"), 60, samples).expect("valid"));
        let storages = vec![
            StorageDevice::new("a", 10.0, 0.0, 10.0, 5.0, 3.0, 3.0, 1.0, 1.0, 0.0),
            StorageDevice::new("b", 8.0, 1.0, 7.0, 4.0, 2.0, 2.0, 1.0, 1.0, 0.0),
        ];
        let grid = Grid::new(storages, UtilityConnection::new(5.0, 5.0, 0.3), 2.0, 1.0);
        let sim = Simulator::new(
            t("2016-01-01 00:00:00"),
            t("2016-01-01 06:00:00"),
            60,
            grid,
            data,
        )
        .expect("valid simulator");
        MicrogridEnv::new(sim, 42)
    }

    #[test]
    fn spaces_follow_the_grid() {
        let env = env();
        assert_eq!(env.action_space(), 9);
        assert_eq!(env.observation_len(), 5);

        let low = env.observation_low();
        let high = env.observation_high();
        assert_eq!(low.len(), 5);
        // SOC components bounded by device limits
        assert_eq!(low[1..3], [0.0, 1.0]);
        assert_eq!(high[1..3], [10.0, 7.0]);
        // time component bounded by the horizon
        assert_eq!(low[4], 0.0);
        assert_eq!(high[4], 360.0);
    }

    #[test]
    fn flatten_round_trips() {
        let mut env = env();
        env.reset();
        let mut observation = env.step(8).expect("step").0;
        observation = env.step_from(&observation, 8).expect("lookahead").0;

        let state = env.unflatten(&observation);
        assert_eq!(env.flatten(&state), observation);
        assert_eq!(state.timestamp, t("2016-01-01 02:00:00"));
    }

    #[test]
    fn reset_returns_initial_observation() {
        let mut env = env();
        let observation = env.reset();
        assert_eq!(observation, vec![2.0, 5.0, 4.0, 1.0, 0.0]);
    }

    #[test]
    fn step_from_leaves_tracked_episode_alone() {
        let mut env = env();
        let initial = env.reset();
        let (next, _, _, _) = env.step_from(&initial, 0).expect("lookahead");
        assert_ne!(next, initial);
        // The tracked episode is still at the start.
        let tracked = env.simulator().state().cloned().expect("tracked");
        assert_eq!(env.flatten(&tracked), initial);
    }

    #[test]
    fn reset_from_restores_a_snapshot() {
        let mut tracked = env();
        tracked.reset();
        let (mid, _, _, _) = tracked.step(8).expect("step");

        let mut restored = env();
        restored.reset_from(&mid);
        let a = restored.step(0).expect("restored");
        let b = tracked.step(0).expect("tracked");
        assert_eq!(a.0, b.0);
        assert!(a.1 == b.1);
    }

    #[test]
    fn sampled_actions_are_always_valid() {
        let mut env = env();
        env.seed(7);
        for _ in 0..100 {
            assert!(env.sample_action() < env.action_space());
        }
    }

    #[test]
    fn full_episode_through_the_adapter() {
        let mut env = env();
        env.reset();
        let mut steps = 0;
        loop {
            let action = env.sample_action();
            let (_, _, done, info) = env.step(action).expect("step");
            let component_sum =
                info.fuel_cost + info.load_shedding + info.curtailment + info.storage_maintenance;
            assert!((info.total_cost - component_sum).abs() < 1e-12);
            steps += 1;
            if done {
                break;
            }
        }
        assert_eq!(steps, 6);
    }
}
