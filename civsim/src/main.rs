use anyhow::Result;
use clap::Parser;
use civsim_core::profiling::{self, TraceLevel};
use civsim_core::{step_turn, EventLog, WorldState, YieldRanker};
use std::path::PathBuf;

mod loader;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a JSON scenario
    scenario: PathBuf,

    /// Number of turns to run (defaults to the scenario's own count)
    #[arg(short, long)]
    turns: Option<u32>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write game events as JSON lines to this file
    #[arg(long)]
    events_out: Option<PathBuf>,

    /// Tracy span level (only with the `tracy` feature)
    #[arg(long)]
    trace_level: Option<TraceLevel>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = std::str::FromStr::from_str(&args.log_level).unwrap_or(log::LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();
    if let Some(trace_level) = args.trace_level {
        profiling::init_tracy(trace_level);
    }

    log::info!("Starting civsim...");

    let scenario = loader::load_scenario(&args.scenario)?;
    let mut state = scenario.build_world()?;
    let mut event_log = args.events_out.as_deref().map(EventLog::file).transpose()?;
    let ranker = YieldRanker::default();
    let turns = args.turns.unwrap_or(scenario.turns);

    log::info!("Initial checksum {:016x}", state.checksum());

    // Game Loop
    for _ in 0..turns {
        let written = state.events.len();
        let inputs = scenario.inputs_for(state.turn);
        let result = step_turn(&state, inputs, &ranker, &scenario.config);
        state = result.state;

        if let Some(log) = event_log.as_mut() {
            log.write_jsonl(state.events.iter().skip(written))?;
        }
        log_turn(&state, result.checksum);
    }

    log::info!("Simulation finished at turn {}", state.turn);
    for civ in state.civilizations.values() {
        log::info!(
            "{}: {} cities, population {}, {} tiles, {} gold{}",
            civ.name,
            civ.cities.len(),
            state.civ_population(&civ.name),
            civ.owned_tiles.len(),
            civ.gold,
            if state.is_defeated(&civ.name) {
                " (defeated)"
            } else {
                ""
            }
        );
    }

    Ok(())
}

fn log_turn(state: &WorldState, checksum: Option<u64>) {
    let cities: Vec<String> = state
        .cities
        .values()
        .map(|c| {
            format!(
                "{}[{} pop {}{}]",
                c.name,
                c.civ,
                c.population.population,
                if c.is_puppet { " puppet" } else { "" }
            )
        })
        .collect();
    match checksum {
        Some(sum) => log::info!("Turn {} | {:016x} | {}", state.turn, sum, cities.join(" ")),
        None => log::info!("Turn {} | {}", state.turn, cities.join(" ")),
    }
}
