//! Ratekeeper Simulator
//!
//! Drives a converter session against a simulated rate source with fault
//! injection, for manual exploration and smoke testing.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod controller;
mod metrics;
mod scenario;
mod source;

use controller::{ControllerOptions, SimulationController};
use ratekeeper_common::CurrencyCode;
use scenario::Scenario;

/// Ratekeeper Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "Ratekeeper converter simulation environment")]
struct Args {
    /// Base currency to start with
    #[arg(short, long, default_value = "USD")]
    base: String,

    /// Scenario to run (built-in name or path to a JSON file)
    #[arg(short, long)]
    scenario: Option<String>,

    /// List built-in scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Probability that a single fetch fails
    #[arg(long, default_value = "0.0")]
    failure_rate: f64,

    /// Simulated fetch latency in milliseconds
    #[arg(long, default_value = "150")]
    latency_ms: u64,

    /// Persist the offline cache to this file
    #[arg(long)]
    cache_path: Option<PathBuf>,

    /// Simulation speed multiplier
    #[arg(long, default_value = "1.0")]
    speed: f64,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Run duration in seconds (0 = infinite)
    #[arg(long, default_value = "0")]
    duration: u64,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );
    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    if args.list_scenarios {
        for name in Scenario::builtin() {
            let scenario = Scenario::load(name)?;
            println!("{:<18} {}", scenario.name, scenario.description);
        }
        return Ok(());
    }

    info!("Starting Ratekeeper Simulator");
    info!("Base: {}", args.base);
    info!("Speed: {}x", args.speed);

    let options = ControllerOptions {
        base: CurrencyCode::parse(&args.base)?,
        seed: args.seed,
        failure_rate: args.failure_rate,
        speed: args.speed,
        latency: Duration::from_millis(args.latency_ms),
        cache_path: args.cache_path,
    };

    let mut controller = SimulationController::new(options)?;
    controller.initialize().await?;

    if let Some(scenario_name) = &args.scenario {
        let scenario = Scenario::load(scenario_name)?;
        controller.run_scenario(scenario).await?;
    } else {
        info!("Running in interactive mode");
        info!("Press Ctrl+C to stop");

        let duration = if args.duration > 0 {
            Some(Duration::from_secs(args.duration))
        } else {
            None
        };

        controller.run(duration).await?;
    }

    let metrics = controller.get_metrics();
    let session = controller.session().metrics();
    info!("Simulation complete");
    info!("Steps: {}", metrics.steps);
    for (state, count) in metrics.states() {
        info!("State {}: {}", state, count);
    }
    info!("Fetches: {}", controller.source_fetches());
    info!("Coalesced: {}", session.coalesced_requests);
    info!("Stale results: {}", session.stale_results);
    info!("Live rate: {:.1}%", metrics.live_rate() * 100.0);
    info!("Average fetch latency: {}ms", metrics.average_latency_ms());
    info!("p99 fetch latency: {}ms", metrics.p99_latency_ms());

    if metrics.assertions_failed > 0 {
        anyhow::bail!(
            "{} of {} assertions failed",
            metrics.assertions_failed,
            metrics.assertions_failed + metrics.assertions_passed
        );
    }

    Ok(())
}
