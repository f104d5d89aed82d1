// Allayr Runner - Command-line host for the Allayr control loop
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Allayr Runner
//!
//! Drives the control loop from a simulated wearer or a recorded dataset.
//!
//! ## Usage
//!
//! ```bash
//! # Continuous run, 10 ticks per second, with Prometheus endpoints
//! allayr-runner run --scenario pressure-spike --interval-ms 100 --port 9100
//!
//! # Replay a recorded dataset once
//! allayr-runner run --csv wearer.csv --log session.json
//!
//! # Interactive single-step mode
//! allayr-runner step --zones 9
//!
//! # Read back a log
//! allayr-runner log allayr_log.jsonl --tail 20
//! ```

mod error;
mod metrics;
mod replay;
mod server;

use allayr::{
    zone_label, AllayrError, ControlConfig, ControlLoop, ControlMode, Environment, EventLog,
    LogFormat, ManualCommand, SampleSource, Session, TickOutcome, ZoneLayout,
};
use allayr_sim::{Scenario, SimulatedSource};
use clap::{Args, Parser, Subcommand};
use error::RunnerError;
use replay::{CsvReplaySource, DatasetInfo};
use server::RunStatus;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::EnvFilter;

type DynSession = Session<Box<dyn EventLog + Send>>;

/// Allayr control loop runner
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the loop continuously
    Run(RunArgs),
    /// Advance the loop interactively
    Step(SessionArgs),
    /// Print a stored event log
    Log(LogArgs),
    /// Write a simulated scenario to CSV for replay
    Generate(GenerateArgs),
}

#[derive(Args, Debug, Clone)]
struct SessionArgs {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Zone count; 9 zones are ranked as three regions
    #[arg(long)]
    zones: Option<usize>,

    /// Simulated scenario
    #[arg(long, default_value = "nominal")]
    scenario: Scenario,

    /// Random seed for the simulation
    #[arg(long)]
    seed: Option<u64>,

    /// Body temperature of the simulated wearer
    #[arg(long)]
    temperature: Option<f64>,

    /// Starting battery level of the simulated device
    #[arg(long)]
    battery: Option<f64>,

    /// Manual command (increase, decrease, maintain); autonomous if absent
    #[arg(long)]
    manual: Option<ManualCommand>,

    /// Event log path
    #[arg(long, default_value = "allayr_log.jsonl")]
    log: PathBuf,

    /// Event log format (json, jsonl); guessed from the extension if absent
    #[arg(long)]
    log_format: Option<LogFormat>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    session: SessionArgs,

    /// Stop after this many ticks
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Delay between ticks in milliseconds (0 = as fast as possible)
    #[arg(short, long, default_value = "0")]
    interval_ms: u64,

    /// Replay a CSV dataset instead of simulating
    #[arg(short, long)]
    csv: Option<PathBuf>,

    /// Loop the replay when it reaches the end
    #[arg(long)]
    loop_replay: bool,

    /// Serve /metrics and /status on this port
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Args, Debug)]
struct LogArgs {
    /// Log file
    #[arg(default_value = "allayr_log.jsonl")]
    path: PathBuf,

    /// Log format (json, jsonl); guessed from the extension if absent
    #[arg(long)]
    format: Option<LogFormat>,

    /// Only show the last N records
    #[arg(long)]
    tail: Option<usize>,

    /// Print raw JSON records
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Output CSV file
    out: PathBuf,

    /// Scenario to record
    #[arg(long, default_value = "nominal")]
    scenario: Scenario,

    /// Zone count
    #[arg(long, default_value = "4")]
    zones: usize,

    /// Number of rows
    #[arg(long, default_value = "500")]
    ticks: usize,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    info!("Allayr Runner v{} (allayr {})", env!("CARGO_PKG_VERSION"), allayr::VERSION);

    let result = match cli.command {
        Command::Run(args) => run(args).await,
        Command::Step(args) => step(args).await,
        Command::Log(args) => show_log(args),
        Command::Generate(args) => generate(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_config(args: &SessionArgs) -> Result<ControlConfig, RunnerError> {
    let mut config = match &args.config {
        Some(path) => ControlConfig::from_json_file(path)?,
        None => ControlConfig::default(),
    };

    match args.zones {
        Some(9) => config.zones = ControlConfig::nine_zone().zones,
        Some(n) => {
            config.zones.count = n;
            config.zones.layout = ZoneLayout::Flat;
        }
        None => {}
    }

    config.validate()?;
    Ok(config)
}

fn sim_source(args: &SessionArgs, zone_count: usize) -> Result<SimulatedSource, RunnerError> {
    let mut sim = args.scenario.config(zone_count);
    if let Some(seed) = args.seed {
        sim = sim.with_seed(seed);
    }
    if let Some(temperature) = args.temperature {
        sim = sim.with_temperature(temperature);
    }
    if let Some(battery) = args.battery {
        sim = sim.with_battery(battery);
    }
    Ok(SimulatedSource::new(sim)?)
}

fn open_log(args: &SessionArgs) -> Box<dyn EventLog + Send> {
    let format = args
        .log_format
        .unwrap_or_else(|| LogFormat::from_path(&args.log));
    info!("Event log: {} ({:?})", args.log.display(), format);
    format.open(&args.log)
}

fn control_mode(args: &SessionArgs) -> ControlMode {
    args.manual.map(ControlMode::Manual).unwrap_or_default()
}

/// Run one tick, absorbing the errors a long-running host survives.
fn handle_step(
    session: &mut DynSession,
    input: allayr::TickInput,
) -> Result<Option<TickOutcome>, RunnerError> {
    match session.step(input) {
        Ok(outcome) => Ok(Some(outcome)),
        Err(AllayrError::LogWriteFailure { outcome, source }) => {
            warn!("Tick {} not persisted: {}", outcome.tick, source);
            metrics::record_log_failure();
            Ok(Some(*outcome))
        }
        Err(AllayrError::InvalidInput(e)) => {
            warn!("Input rejected: {}", e);
            metrics::record_rejection();
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn describe(outcome: &TickOutcome, control: &ControlLoop) -> String {
    let device = &outcome.device;
    let head = match &outcome.record {
        None => format!(
            "tick {:>5} | warming up ({}/{})",
            outcome.tick,
            control.window().len(),
            control.window().capacity()
        ),
        Some(record) => format!(
            "tick {:>5} | score {:.4} / {:.4} | {} | {}",
            outcome.tick,
            record.score,
            record.threshold,
            if record.is_anomaly { "ANOMALY" } else { "ok     " },
            record.action
        ),
    };
    format!(
        "{} | battery {:.1}% rate {} Hz temp {:.1} C{}{} | {}",
        head,
        device.battery_level,
        device.sampling_rate,
        device.temperature_c,
        if device.inference_enabled { "" } else { " no-inference" },
        if device.fallback_enabled { " fallback" } else { "" },
        outcome.safety
    )
}

fn publish(session: &DynSession, outcome: &TickOutcome) {
    let control = session.control();
    metrics::update_from_outcome(
        outcome,
        control.latest_ranking().as_ref(),
        control.window().fill_ratio(),
    );
}

async fn pace(interval: Option<&mut tokio::time::Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => tokio::task::yield_now().await,
    }
}

async fn run(args: RunArgs) -> Result<(), RunnerError> {
    let config = build_config(&args.session)?;
    let zone_count = config.zones.count;

    let (mut source, environment, label, dataset): (
        Box<dyn SampleSource + Send>,
        Environment,
        String,
        Option<DatasetInfo>,
    ) = match &args.csv {
        Some(path) => {
            let replay = CsvReplaySource::from_csv(path, args.loop_replay)?;
            if replay.info().zone_count != zone_count {
                return Err(RunnerError::Usage(format!(
                    "dataset has {} zones but the loop is configured for {}",
                    replay.info().zone_count,
                    zone_count
                )));
            }
            let environment = replay.initial_environment();
            let info = replay.info().clone();
            (
                Box::new(replay),
                environment,
                format!("replay:{}", path.display()),
                Some(info),
            )
        }
        None => {
            let sim = sim_source(&args.session, zone_count)?;
            let environment = sim.config().environment;
            (
                Box::new(sim),
                environment,
                format!("scenario:{}", args.session.scenario),
                None,
            )
        }
    };

    let mode = control_mode(&args.session);
    let control = ControlLoop::new(config, environment)?.with_mode(mode);
    let mut session = Session::new(control, open_log(&args.session));

    let status = Arc::new(RwLock::new(RunStatus::new(label.clone(), mode)));
    status.write().await.dataset = dataset;

    if let Some(port) = args.port {
        let status = Arc::clone(&status);
        tokio::spawn(async move {
            if let Err(e) = server::serve(port, status).await {
                error!("Server failed: {}", e);
            }
        });
    }

    info!(
        "Running {} with {} zones, mode {}, {} ms per tick",
        label, zone_count, mode, args.interval_ms
    );

    let mut interval = (args.interval_ms > 0)
        .then(|| tokio::time::interval(Duration::from_millis(args.interval_ms)));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut ran: u64 = 0;
    loop {
        if args.ticks.map_or(false, |limit| ran >= limit) {
            break;
        }

        tokio::select! {
            biased;
            _ = &mut ctrl_c => {
                info!("Interrupted after {} ticks", ran);
                break;
            }
            _ = pace(interval.as_mut()) => {}
        }

        let Some(input) = source.next_input() else {
            info!("Source exhausted after {} ticks", ran);
            break;
        };
        ran += 1;

        let outcome = handle_step(&mut session, input)?;
        if let Some(outcome) = &outcome {
            publish(&session, outcome);
            if outcome.record.is_some() {
                info!("{}", describe(outcome, session.control()));
            } else {
                debug!("{}", describe(outcome, session.control()));
            }
        }

        let mut status = status.write().await;
        status.stats = session.control().stats().clone();
        if outcome.is_some() {
            status.last_outcome = outcome;
        }
    }

    status.write().await.running = false;
    println!("{}", session.control().stats().report());
    Ok(())
}

const STEP_HELP: &str = "\
Commands:
  <Enter>                      advance one tick
  <N>                          advance N ticks
  increase | decrease | maintain   switch to manual mode with that command
  auto                         switch to autonomous mode
  zones                        show zone magnitudes of the latest reading
  stats                        show loop statistics
  help                         show this help
  quit                         exit";

async fn step(args: SessionArgs) -> Result<(), RunnerError> {
    let config = build_config(&args)?;
    let mut source = sim_source(&args, config.zones.count)?;
    let environment = source.config().environment;
    let control = ControlLoop::new(config, environment)?.with_mode(control_mode(&args));
    let mut session: DynSession = Session::new(control, open_log(&args));

    println!("Scenario {}: {}", args.scenario, args.scenario.description());
    println!("{}", STEP_HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("[{}] > ", session.control().mode());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "q" | "quit" | "exit" => break,
            "h" | "help" | "?" => println!("{}", STEP_HELP),
            "s" | "stats" => println!("{}", session.control().stats().report()),
            "a" | "auto" => session.control_mut().set_mode(ControlMode::Autonomous),
            "z" | "zones" => print_zones(session.control()),
            other => {
                if let Ok(command) = other.parse::<ManualCommand>() {
                    session
                        .control_mut()
                        .set_mode(ControlMode::Manual(command));
                    continue;
                }

                let count = if other.is_empty() {
                    1
                } else {
                    match other.parse::<u64>() {
                        Ok(n) => n,
                        Err(_) => {
                            println!("Unknown command: {} (type help)", other);
                            continue;
                        }
                    }
                };

                for _ in 0..count {
                    let Some(input) = source.next_input() else {
                        println!("Source exhausted");
                        break;
                    };
                    if let Some(outcome) = handle_step(&mut session, input)? {
                        println!("{}", describe(&outcome, session.control()));
                    }
                }
            }
        }
    }

    println!("{}", session.control().stats().report());
    Ok(())
}

fn print_zones(control: &ControlLoop) {
    let Some(ranking) = control.latest_ranking() else {
        println!("No reading yet");
        return;
    };
    let flat_four = control.config().zones.count == 4
        && control.config().zones.layout == ZoneLayout::Flat;

    for (zone, value) in ranking.entries() {
        match zone.sensor_index().and_then(zone_label).filter(|_| flat_four) {
            Some(label) => println!("  {:<8} {:<14} {}", zone.to_string(), label, value),
            None => println!("  {:<8} {}", zone.to_string(), value),
        }
    }
}

fn show_log(args: LogArgs) -> Result<(), RunnerError> {
    let format = args
        .format
        .unwrap_or_else(|| LogFormat::from_path(&args.path));
    let entries = format.open(&args.path).read_all()?;

    let shown = match args.tail {
        Some(n) => &entries[entries.len().saturating_sub(n)..],
        None => &entries[..],
    };

    for entry in shown {
        if args.json {
            let line = serde_json::to_string(entry).map_err(allayr::LogError::from)?;
            println!("{}", line);
            continue;
        }
        if let Err(e) = entry.action() {
            warn!("{}", e);
        }
        println!(
            "{}  {:?}  score {:.4}  {}  {}",
            entry.timestamp,
            entry.sensor_values,
            entry.anomaly_score,
            if entry.anomaly_detected { "ANOMALY" } else { "ok     " },
            entry.compression_action
        );
    }

    let anomalies = entries.iter().filter(|e| e.anomaly_detected).count();
    println!("{} records, {} anomalies", entries.len(), anomalies);
    Ok(())
}

fn generate(args: GenerateArgs) -> Result<(), RunnerError> {
    let mut sim = args.scenario.config(args.zones);
    if let Some(seed) = args.seed {
        sim = sim.with_seed(seed);
    }

    let dataset = SimulatedSource::new(sim)?.take_dataset(args.ticks);
    dataset.to_csv(&args.out)?;

    info!(
        "Wrote {} rows of scenario {} to {}",
        dataset.len(),
        args.scenario,
        args.out.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_args(extra: &[&str]) -> SessionArgs {
        let mut argv = vec!["allayr-runner", "step"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Command::Step(args) => args,
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_defaults() {
        let args = session_args(&[]);
        assert_eq!(args.scenario, Scenario::Nominal);
        assert!(args.manual.is_none());
        assert_eq!(args.log, PathBuf::from("allayr_log.jsonl"));
    }

    #[test]
    fn test_cli_parses_domain_values() {
        let args = session_args(&[
            "--scenario",
            "link-loss",
            "--manual",
            "decrease",
            "--log-format",
            "json",
            "--zones",
            "9",
        ]);
        assert_eq!(args.scenario, Scenario::LinkLoss);
        assert_eq!(args.manual, Some(ManualCommand::Decrease));
        assert_eq!(args.log_format, Some(LogFormat::JsonArray));
        assert_eq!(
            control_mode(&args),
            ControlMode::Manual(ManualCommand::Decrease)
        );
    }

    #[test]
    fn test_build_config_zone_override() {
        let config = build_config(&session_args(&["--zones", "9"])).unwrap();
        assert_eq!(config.zones.count, 9);
        assert!(matches!(config.zones.layout, ZoneLayout::Grouped(_)));

        let config = build_config(&session_args(&["--zones", "6"])).unwrap();
        assert_eq!(config.zones.layout, ZoneLayout::Flat);

        assert!(build_config(&session_args(&["--zones", "0"])).is_err());
    }

    #[test]
    fn test_handle_step_survives_bad_input() {
        let config = ControlConfig::default();
        let control = ControlLoop::new(config, Environment::default()).unwrap();
        let log: Box<dyn EventLog + Send> = Box::new(allayr::MemoryLog::new());
        let mut session = Session::new(control, log);

        let bad = allayr::TickInput::new(allayr::Reading::uniform(1200, 3), Environment::default());
        assert!(handle_step(&mut session, bad).unwrap().is_none());
        assert_eq!(session.control().stats().rejected_inputs, 1);
    }

    #[test]
    fn test_generate_then_replay() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("spike.csv");
        generate(GenerateArgs {
            out: out.clone(),
            scenario: Scenario::PressureSpike,
            zones: 4,
            ticks: 200,
            seed: Some(3),
        })
        .unwrap();

        let mut replay = CsvReplaySource::from_csv(&out, false).unwrap();
        assert_eq!(replay.info().sample_count, 200);
        assert_eq!(replay.next_input().unwrap().reading.len(), 4);
    }
}
