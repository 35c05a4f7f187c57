//! Orion Simulator CLI
//!
//! Runs the encrypted intent aggregation network until a deadline, Ctrl-C,
//! or the first fatal error, then reports the final state.

use clap::Parser;
use orion_core::{AggregatorConfig, SimResult, Topology, TopologyConfig};
use orion_env::{OrionContext, TokioContext};
use orion_sim::{ProjectionSnapshot, RunExport, SimConfig, SimContext, Simulation, StateProjection};
use std::fs::File;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "orion-sim")]
#[command(about = "Orion encrypted intent aggregation simulator")]
struct Args {
    /// Number of submitter/holder chains
    #[arg(short = 'n', long, default_value = "3")]
    holders: u32,

    /// Master seed for determinism (0 = OS entropy)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Run length in time units (0 = until Ctrl-C)
    #[arg(short, long, default_value = "30")]
    duration: f64,

    /// Wall-clock seconds per time unit
    #[arg(short = 't', long, default_value = "1.0")]
    time_scale: f64,

    /// Time units between aggregation cycles
    #[arg(long, default_value = "5.0")]
    cycle_period: f64,

    /// Fail the run if holders don't all reply within this many time units
    #[arg(long)]
    gather_timeout: Option<f64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Print the final state as JSON
    #[arg(long)]
    json: bool,

    /// Write the final state to a JSON file
    #[arg(long)]
    export: Option<String>,

    /// Also write the log (without colors) to this file
    #[arg(long)]
    log_file: Option<String>,
}

impl Args {
    fn to_config(&self) -> SimConfig {
        SimConfig {
            seed: self.seed,
            time_scale: self.time_scale,
            max_duration_units: self.duration,
            topology: TopologyConfig {
                num_holders: self.holders,
                ..Default::default()
            },
            aggregator: AggregatorConfig {
                cycle_period: self.cycle_period,
                gather_timeout: self.gather_timeout,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Console logging, plus a plain-text copy when `--log-file` is given.
fn init_logging(args: &Args) -> Result<(), String> {
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = match &args.log_file {
        Some(path) => {
            let file = File::create(path).map_err(|e| format!("cannot create log file {}: {}", path, e))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .map_err(|e| format!("failed to set tracing subscriber: {}", e))
}

/// Resolves after `units`, or never when `units` is 0.
async fn deadline<Ctx: OrionContext>(ctx: &Ctx, units: f64) {
    if units > 0.0 {
        ctx.sleep_units(units).await;
    } else {
        std::future::pending::<()>().await;
    }
}

/// Runs one simulation to completion and reports it.
///
/// # Returns
/// Process exit code: 0 on a clean stop, 1 on a fatal error.
async fn run<Ctx: OrionContext>(ctx: Arc<Ctx>, config: SimConfig, args: &Args) -> i32 {
    let topology = match Topology::build(&config.topology, ctx.as_ref()) {
        Ok(topology) => topology,
        Err(e) => {
            error!("Failed to build topology: {}", e);
            return 1;
        }
    };

    for chain in topology.chains() {
        info!("  {} -> {} | initial balance {:.2}", chain.submitter, chain.holder, chain.initial_balance);
    }

    let projection = Arc::new(StateProjection::with_initial(ProjectionSnapshot::from_topology(&topology)));
    let mut sim = Simulation::new(ctx.clone(), projection.clone(), config.submitter, config.aggregator);

    if let Err(e) = sim.start(&topology).await {
        error!("Failed to start simulation: {}", e);
        return 1;
    }

    let fatal: Option<SimResult<()>> = tokio::select! {
        result = sim.wait() => Some(result),
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, stopping");
            None
        }
        _ = deadline(ctx.as_ref(), config.max_duration_units) => None,
    };
    let result = match fatal {
        Some(result) => result,
        None => sim.stop().await,
    };

    let elapsed = ctx.now().as_secs_f64();
    let state = projection.fetch_latest();

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("Ran {:.1} time units, {} cycles", elapsed, state.aggregator.cycle);
    info!("Idle capital: {:.2}", state.idle_capital());
    for (asset, amount) in &state.sink.final_portfolio {
        info!("  {:<6} {:>10.4}", asset, amount);
    }

    let mut export = RunExport::new(config.seed, config.topology.num_holders);
    export.finalize(elapsed, state, result.as_ref().err().map(|e| e.to_string()));

    if args.json {
        match export.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to serialize state: {}", e),
        }
    }

    if let Some(path) = &args.export {
        match export.write_to_file(path) {
            Ok(()) => info!("Exported final state to {}", path),
            Err(e) => error!("Failed to write export: {:?}", e),
        }
    }

    match result {
        Ok(()) => 0,
        Err(e) => {
            error!("Simulation failed: {}", e);
            1
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = init_logging(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let config = args.to_config();
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    info!("Orion Simulator v{}", env!("CARGO_PKG_VERSION"));
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let code = if config.seed == 0 {
        if config.time_scale != 1.0 {
            warn!("Unseeded runs use wall-clock seconds, ignoring --time-scale {}", config.time_scale);
        }
        run(TokioContext::shared(), config, &args).await
    } else {
        match SimContext::shared(config.seed, config.time_scale) {
            Ok(ctx) => run(ctx, config, &args).await,
            Err(e) => {
                error!("Failed to create context: {}", e);
                1
            }
        }
    };

    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["orion-sim"]).unwrap();
        let config = args.to_config();

        assert_eq!(config.seed, 42);
        assert_eq!(config.topology.num_holders, 3);
        assert_eq!(config.aggregator.cycle_period, 5.0);
        assert_eq!(config.aggregator.gather_timeout, None);
        assert_eq!(config.max_duration_units, 30.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_flags_map_to_config() {
        let args = Args::try_parse_from([
            "orion-sim",
            "--holders",
            "5",
            "--seed",
            "7",
            "--duration",
            "0",
            "--time-scale",
            "0.01",
            "--cycle-period",
            "2.5",
            "--gather-timeout",
            "1.5",
            "--json",
        ])
        .unwrap();
        let config = args.to_config();

        assert_eq!(config.topology.num_holders, 5);
        assert_eq!(config.seed, 7);
        assert_eq!(config.max_duration_units, 0.0);
        assert_eq!(config.time_scale, 0.01);
        assert_eq!(config.aggregator.cycle_period, 2.5);
        assert_eq!(config.aggregator.gather_timeout, Some(1.5));
        assert!(args.json);
        assert!(args.export.is_none());
    }

    #[test]
    fn test_log_file_flag() {
        let args = Args::try_parse_from(["orion-sim", "--log-file", "orion.log"]).unwrap();
        assert_eq!(args.log_file.as_deref(), Some("orion.log"));
        assert!(Args::try_parse_from(["orion-sim"]).unwrap().log_file.is_none());
    }

    #[test]
    fn test_unrepresentable_times_rejected_before_run() {
        for flags in [
            ["orion-sim", "--duration", "1e300"],
            ["orion-sim", "--cycle-period", "inf"],
            ["orion-sim", "--gather-timeout", "inf"],
        ] {
            let args = Args::try_parse_from(flags).unwrap();
            assert!(args.to_config().validate().is_err(), "{:?} accepted", flags);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_seeded_run_exits_cleanly() {
        let args = Args::try_parse_from(["orion-sim", "--duration", "12", "--holders", "2"]).unwrap();
        let config = args.to_config();
        let ctx = SimContext::shared(config.seed, config.time_scale).unwrap();

        assert_eq!(run(ctx, config, &args).await, 0);
    }
}
