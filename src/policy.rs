//! Dispatch policies and the episode driver.
//!
//! A policy is anything that maps a structured state to an action index.
//! The built-in strategies are evaluation baselines, not learners: the
//! simulator is the training substrate for external agents.

use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::info;

use crate::error::SimResult;
use crate::sim::action::{ActionDecoder, StorageDispatch};
use crate::sim::simulator::Simulator;
use crate::sim::state::{SimulationState, StepRecord};

/// A dispatch decision-maker.
pub trait Policy {
    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Chooses an action index for the given state.
    fn choose_action(&mut self, state: &SimulationState) -> usize;
}

/// Always picks the all-idle action (the last index).
#[derive(Debug, Clone, Copy)]
pub struct IdlePolicy {
    idle_action: usize,
}

impl IdlePolicy {
    /// Creates an idle policy for the simulator's action space.
    pub fn new(sim: &Simulator) -> Self {
        Self {
            idle_action: sim.idle_action(),
        }
    }
}

impl Policy for IdlePolicy {
    fn name(&self) -> &'static str {
        "idle"
    }

    fn choose_action(&mut self, _state: &SimulationState) -> usize {
        self.idle_action
    }
}

/// Uniformly random exploration with a seeded RNG.
#[derive(Debug)]
pub struct RandomPolicy {
    num_actions: usize,
    rng: StdRng,
}

impl RandomPolicy {
    /// Creates a random policy over the simulator's action space.
    pub fn new(sim: &Simulator, seed: u64) -> Self {
        Self {
            num_actions: sim.num_actions(),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Policy for RandomPolicy {
    fn name(&self) -> &'static str {
        "random"
    }

    fn choose_action(&mut self, _state: &SimulationState) -> usize {
        self.rng.random_range(0..self.num_actions)
    }
}

/// Rule-based baseline: charge the whole fleet on surplus, discharge it on
/// deficit, idle inside the dead band.
#[derive(Debug, Clone, Copy)]
pub struct GreedyPolicy {
    decoder: ActionDecoder,
    num_storages: usize,
    /// Net-load dead band around zero, in kW.
    pub threshold_kw: f64,
}

impl GreedyPolicy {
    /// Creates a greedy policy with the given dead band.
    pub fn new(sim: &Simulator, threshold_kw: f64) -> Self {
        Self {
            decoder: *sim.decoder(),
            num_storages: sim.grid().num_storages(),
            threshold_kw,
        }
    }
}

impl Policy for GreedyPolicy {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn choose_action(&mut self, state: &SimulationState) -> usize {
        let net_load_kw = state.net_load_kw();
        let dispatch = if net_load_kw < -self.threshold_kw {
            StorageDispatch::ChargeAtMax
        } else if net_load_kw > self.threshold_kw {
            StorageDispatch::DischargeAtMax
        } else {
            StorageDispatch::Idle
        };
        self.decoder.encode(&vec![dispatch; self.num_storages])
    }
}

/// Outcome of one full episode.
#[derive(Debug, Clone)]
pub struct EpisodeSummary {
    /// Name of the policy that produced the trajectory.
    pub policy: String,
    /// Number of steps taken.
    pub steps: usize,
    /// Sum of per-step rewards.
    pub total_reward: f64,
    /// Full trajectory, one record per step.
    pub records: Vec<StepRecord>,
}

/// Runs one complete episode: reset, then step until terminal.
///
/// A convenience loop over the core contract; callers with their own
/// training loop can drive `reset`/`step` directly instead.
///
/// # Errors
///
/// Propagates simulator errors, which with a well-formed policy do not
/// occur.
pub fn run_episode(sim: &mut Simulator, policy: &mut dyn Policy) -> SimResult<EpisodeSummary> {
    let mut state = sim.reset();
    let mut records = Vec::with_capacity(sim.horizon_steps());
    let mut total_reward = 0.0;

    loop {
        let action = policy.choose_action(&state);
        let output = sim.step(action)?;
        records.push(StepRecord {
            step: records.len(),
            timestamp: state.timestamp,
            action,
            consumption_kw: state.consumption_kw,
            production_kw: state.production_kw,
            storage_kw: output.storage_kw,
            storage_socs: output.state.storage_socs.clone(),
            reward: output.reward,
            info: output.info,
        });
        total_reward += output.reward;
        if output.done {
            break;
        }
        state = output.state;
    }

    info!(
        policy = policy.name(),
        steps = records.len(),
        total_reward,
        "episode finished"
    );
    Ok(EpisodeSummary {
        policy: policy.name().to_string(),
        steps: records.len(),
        total_reward,
        records,
    })
}
