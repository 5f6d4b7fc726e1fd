//! Crossview Simulator CLI
//!
//! Run deterministic engine scenarios, or drive the engine live against the
//! generated feed.

use clap::Parser;
use crossview_core::{EngineConfig, MapTopology};
use crossview_sim::{run_live, LiveOptions, ScenarioId, ScenarioResult, ScenarioRunner, SimError, WireStyle};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Crossview deterministic simulation CLI
#[derive(Parser, Debug)]
#[command(name = "crossview-sim")]
#[command(about = "Run deterministic simulations of the Crossview prediction engine", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (free_flow, red_light, platoon, turn_sweep, reset_fade,
    /// stale_feed, city_grid, lossy_feed, legacy_wire, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Maximum simulation duration in seconds
    #[arg(short, long, default_value = "10")]
    duration: f64,

    /// Engine frame rate in Hz
    #[arg(long, default_value = "60")]
    frame_rate: u32,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export sampled frames of a single scenario to a JSON file
    #[arg(long)]
    export: Option<String>,

    /// Run live on the wall clock instead of scenarios
    #[arg(long)]
    live: bool,

    /// Map for live mode
    #[arg(long, default_value = "intersection")]
    map: String,

    /// Engine configuration override (JSON file) for live mode
    #[arg(long)]
    config: Option<String>,

    /// Feed latency in live mode (ms)
    #[arg(long, default_value = "0")]
    latency_ms: u64,

    /// Feed loss rate in live mode (0.0 - 1.0)
    #[arg(long, default_value = "0.0")]
    loss: f64,

    /// Server field naming in live mode (current, legacy)
    #[arg(long, default_value = "current")]
    wire: String,
}

fn init_logging(args: &Args) {
    let default = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // Logs go to stderr so --json output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn base_seed(seed: u64) -> u64 {
    if seed != 0 {
        return seed;
    }
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(42)
}

fn live_options(args: &Args, seed: u64) -> Result<LiveOptions, SimError> {
    let topology: MapTopology = args.map.parse()?;
    let engine = match &args.config {
        Some(path) => EngineConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };
    let wire: WireStyle = args.wire.parse().map_err(SimError::InvalidArgument)?;

    let mut options = LiveOptions {
        seed,
        duration_secs: args.duration,
        frame_rate_hz: args.frame_rate,
        latency_ms: args.latency_ms,
        loss_rate: args.loss,
        engine,
        topology,
        ..LiveOptions::default()
    };
    options.generator.wire_style = wire;
    Ok(options)
}

fn run_live_mode(args: &Args, seed: u64) -> Result<bool, SimError> {
    let options = live_options(args, seed)?;
    let runtime = tokio::runtime::Runtime::new()?;
    let summary = runtime.block_on(run_live(options))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(summary.parse_errors == 0)
}

fn run_export(args: &Args, scenario: ScenarioId, seed: u64, path: &str) -> Result<bool, SimError> {
    info!("Running with export to: {}", path);

    let runner = ScenarioRunner::new(seed)
        .with_frame_rate(args.frame_rate)
        .with_duration(args.duration);
    // Ten samples per simulated second
    let every = (args.frame_rate / 10).max(1) as u64;
    let (result, export) = runner.run_recorded(scenario, every);
    export.write_to_file(path)?;

    if result.passed {
        info!("✓ {} (seed={}) PASSED - {} frames exported to {}", scenario.name(), seed, export.frames.len(), path);
    } else {
        error!(
            "✗ {} FAILED: {}",
            scenario.name(),
            result.failure_reason.as_deref().unwrap_or("unknown")
        );
    }
    Ok(result.passed)
}

fn print_summary(args: &Args, all_results: &[ScenarioResult]) -> Result<(), SimError> {
    let total = all_results.len();
    let failed_count = all_results.iter().filter(|r| !r.passed).count();
    let passed = total - failed_count;

    if args.json {
        // JSON output for CI parsing
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "ticks": r.total_ticks,
                    "time_secs": r.final_time_secs,
                    "vehicles": r.final_entity_count,
                    "metrics": r.metrics,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    info!("");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if failed_count == 0 {
        info!("✅ All {} scenario runs passed!", total);
    } else {
        error!("❌ {}/{} scenario runs failed!", failed_count, total);

        // List failed seeds
        for result in all_results.iter().filter(|r| !r.passed) {
            error!(
                "  - {} seed={}: {}",
                result.scenario.name(),
                result.seed,
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
        }
    }
    Ok(())
}

fn run(args: &Args) -> Result<bool, SimError> {
    let seed = base_seed(args.seed);

    if args.live {
        return run_live_mode(args, seed);
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().map_err(SimError::InvalidArgument)?]
    };

    if let Some(path) = &args.export {
        if scenarios.len() > 1 {
            return Err(SimError::InvalidArgument(
                "--export only supports a single scenario, not 'all'".to_string(),
            ));
        }
        return run_export(args, scenarios[0], seed, path);
    }

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    for seed_offset in 0..args.seeds {
        let seed = seed.wrapping_add(seed_offset as u64);
        let runner = ScenarioRunner::new(seed)
            .with_frame_rate(args.frame_rate)
            .with_duration(args.duration);

        for scenario in &scenarios {
            let result = runner.run(*scenario);

            if !args.json {
                if result.passed {
                    info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
            all_results.push(result);
        }
    }

    print_summary(args, &all_results)?;
    Ok(all_results.iter().all(|r| r.passed))
}

fn main() {
    let args = Args::parse();
    init_logging(&args);

    if !args.json {
        info!("Crossview Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    match run(&args) {
        Ok(true) => {}
        // Exit with proper code for CI
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}
