//! Colony Simulation
//!
//! Runs a seeded colony for a fixed number of ticks and writes every
//! notable event to a JSONL log.

use clap::Parser;
use colony_core::creatures::CreatureRegistry;
use colony_core::notify::EventLog;
use colony_core::pathfinding::PathWorkerMode;
use colony_core::structures::StructureRegistry;
use colony_core::tasks::FactionRegistry;
use colony_core::{build_schedule, build_world, default_config_toml, RunSummary, SimClock, SimConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Command line arguments for the simulation
#[derive(Parser, Debug)]
#[command(name = "colony_sim")]
#[command(about = "A grid colony simulation with tasks, pathfinding and combat")]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Random seed, overriding the configuration
    #[arg(long)]
    seed: Option<u64>,

    /// Number of ticks to simulate, overriding the configuration
    #[arg(long)]
    ticks: Option<u64>,

    /// JSONL event log path
    #[arg(long, default_value = "output/events.jsonl")]
    events: PathBuf,

    /// Run path searches on the calling thread
    #[arg(long)]
    inline_paths: bool,

    /// Log level used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print the default configuration and exit
    #[arg(long)]
    print_default_config: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.print_default_config {
        print!("{}", default_config_toml());
        return ExitCode::SUCCESS;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)))
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "simulation aborted");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => SimConfig::from_file(path)?,
        None => SimConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.simulation.seed = seed;
    }
    if let Some(ticks) = args.ticks {
        config.simulation.ticks = ticks;
    }
    if args.inline_paths {
        config.pathfinding.worker = PathWorkerMode::Inline;
    }

    if let Some(dir) = args.events.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let log = EventLog::new(&args.events)?;

    info!(
        seed = config.simulation.seed,
        ticks = config.simulation.ticks,
        worker = ?config.pathfinding.worker,
        "starting simulation"
    );

    let mut world = build_world(&config, log)?;
    let mut schedule = build_schedule();

    let report_every = (config.simulation.ticks / 10).max(1);
    for tick in 1..=config.simulation.ticks {
        schedule.run(&mut world);

        if tick % report_every == 0 {
            let clock = world.resource::<SimClock>();
            let creatures = world.resource::<CreatureRegistry>();
            let summary = world.resource::<RunSummary>();
            info!(
                tick,
                date = %clock.now().date,
                alive = creatures.len(),
                completed = summary.completed,
                failed = summary.failed,
                deaths = summary.deaths,
                "progress"
            );
        }
    }

    let summary = world.resource::<RunSummary>().clone();
    let built = world.resource::<StructureRegistry>().structures().count();
    let pending: usize = world.resource::<FactionRegistry>().iter().map(|f| f.available().len()).sum();
    let events = world.resource::<EventLog>().event_count();
    info!(
        ticks = summary.ticks,
        assigned = summary.assigned,
        completed = summary.completed,
        failed = summary.failed,
        recycled = summary.recycled,
        deaths = summary.deaths,
        built,
        pending,
        events,
        "simulation complete"
    );
    Ok(())
}
