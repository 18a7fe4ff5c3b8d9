//! Microgrid simulator entry point: CLI wiring and the episode loop.

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use microgrid_sim::config::ScenarioConfig;
use microgrid_sim::io::export::export_csv;
use microgrid_sim::policy::{
    EpisodeSummary, GreedyPolicy, IdlePolicy, Policy, RandomPolicy, run_episode,
};
use microgrid_sim::sim::kpi::EpisodeKpi;
use microgrid_sim::sim::simulator::Simulator;

/// Dead band for the greedy baseline policy, in kW.
const GREEDY_THRESHOLD_KW: f64 = 0.1;

/// Microgrid dispatch simulator.
#[derive(Debug, Parser)]
#[command(name = "microgrid-sim", version, about)]
struct Args {
    /// Load a scenario from a TOML config file.
    #[arg(long, conflicts_with = "preset")]
    scenario: Option<PathBuf>,

    /// Use a built-in preset (islanded, grid_tied).
    #[arg(long)]
    preset: Option<String>,

    /// Baseline policy driving the episodes.
    #[arg(long, default_value = "greedy")]
    policy: String,

    /// Number of episodes to run.
    #[arg(long, default_value_t = 1)]
    episodes: usize,

    /// Override the scenario's random seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Export the last episode's trajectory to CSV.
    #[arg(long)]
    telemetry_out: Option<PathBuf>,

    /// Suppress per-step output.
    #[arg(long)]
    quiet: bool,
}

fn build_policy(name: &str, sim: &Simulator, seed: u64) -> anyhow::Result<Box<dyn Policy>> {
    match name {
        "idle" => Ok(Box::new(IdlePolicy::new(sim))),
        "random" => Ok(Box::new(RandomPolicy::new(sim, seed))),
        "greedy" => Ok(Box::new(GreedyPolicy::new(sim, GREEDY_THRESHOLD_KW))),
        other => bail!("unknown policy \"{other}\", available: idle, random, greedy"),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut scenario = if let Some(ref path) = args.scenario {
        ScenarioConfig::from_toml_file(path)
            .with_context(|| format!("loading scenario {}", path.display()))?
    } else if let Some(ref name) = args.preset {
        ScenarioConfig::from_preset(name)?
    } else {
        ScenarioConfig::islanded()
    };

    if let Some(seed) = args.seed {
        scenario.simulation.seed = seed;
    }

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        bail!("scenario validation failed");
    }

    let mut sim = scenario.build().context("building simulator")?;
    let mut policy = build_policy(&args.policy, &sim, scenario.simulation.seed)?;
    info!(
        policy = policy.name(),
        episodes = args.episodes,
        steps_per_episode = sim.horizon_steps(),
        num_actions = sim.num_actions(),
        "starting simulation"
    );

    let dt_hours = sim.dt_hours();
    let fleet_capacity_kwh = sim.grid().total_storage_capacity_kwh();
    let mut last: Option<EpisodeSummary> = None;
    for episode in 0..args.episodes.max(1) {
        let summary = run_episode(&mut sim, policy.as_mut())
            .with_context(|| format!("running episode {episode}"))?;

        if !args.quiet {
            for record in &summary.records {
                println!("{record}");
            }
        }
        let kpi = EpisodeKpi::from_records(&summary.records, dt_hours, fleet_capacity_kwh);
        println!("\n{kpi}\n");
        last = Some(summary);
    }

    if let (Some(path), Some(summary)) = (args.telemetry_out.as_ref(), last.as_ref()) {
        let names: Vec<&str> = sim.grid().storages().iter().map(|s| s.name.as_str()).collect();
        export_csv(&summary.records, &names, path)
            .with_context(|| format!("writing telemetry to {}", path.display()))?;
        eprintln!("Telemetry written to {}", path.display());
    }

    Ok(())
}
