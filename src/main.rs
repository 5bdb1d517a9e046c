use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde_json::json;
use stepdist::{
    BackgroundStore, DistanceService, EngineConfig, EngineEvent, JsonFileStore, KeyValueStore,
    MemoryStore, SessionLog,
};

/// Replay a recorded walk through the step distance engine
#[derive(Parser, Debug)]
#[command(name = "stepdist", version)]
struct Args {
    /// Path to a recorded session (.json or .json.gz)
    #[arg(long)]
    log: PathBuf,

    /// Engine options as a JSON object (defaults when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Calibration store; learned values persist across runs
    #[arg(long)]
    store: Option<PathBuf>,

    /// Body height in meters for the heuristic estimate
    #[arg(long)]
    body_height: Option<f64>,

    /// Do not learn the step length from GNSS distance
    #[arg(long)]
    no_gnss_calibration: bool,

    /// Only print the final summary
    #[arg(long)]
    quiet: bool,
}

fn load_config(args: &Args) -> anyhow::Result<EngineConfig> {
    match args.config.as_ref() {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Ok(EngineConfig::from_json(&content)?)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn open_store(args: &Args) -> anyhow::Result<Box<dyn KeyValueStore>> {
    match args.store.as_ref() {
        Some(path) => {
            let store = JsonFileStore::open(path)
                .with_context(|| format!("opening store {}", path.display()))?;
            Ok(Box::new(BackgroundStore::spawn(store)?))
        }
        None => Ok(Box::new(MemoryStore::new())),
    }
}

fn print_event(event: &EngineEvent) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = load_config(&args)?;
    let log = SessionLog::load(&args.log)
        .with_context(|| format!("loading {}", args.log.display()))?;
    log::info!(
        "Replaying {} gravity samples and {} location fixes",
        log.sample_count(),
        log.fix_count()
    );

    let service = DistanceService::spawn(open_store(&args)?)?;
    if let Some(height) = args.body_height {
        service.set_body_height(height)?;
    }
    service.start_localization(config)?;
    service.start_measuring_distance(!args.no_gnss_calibration)?;

    log.replay(&service)?;

    let snapshot = service.snapshot()?;
    service.stop_measuring_distance()?;
    service.stop_localization()?;

    let events: Vec<EngineEvent> = service.events().try_iter().collect();
    if !args.quiet {
        for event in &events {
            print_event(event)?;
        }
    }
    service.shutdown()?;

    let duration = log.time_span().map_or(0.0, |(start, end)| end - start);
    let last_calibrated = snapshot
        .calibration
        .last_calibrated()
        .map(|at| at.to_rfc3339());

    let summary = json!({
        "log": args.log.display().to_string(),
        "durationSecs": duration,
        "events": events.len(),
        "distanceTraveled": snapshot.distance.distance_traveled,
        "stepsTaken": snapshot.distance.steps_taken,
        "stepsPerMinute": snapshot.steps_per_minute,
        "relativeAltitudeGain": snapshot.distance.relative_altitude_gain,
        "stepLength": snapshot.calibration.step_length,
        "lastCalibrated": last_calibrated,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
