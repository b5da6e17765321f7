use anyhow::Context;
use clap::{Parser, Subcommand};
use pushlab_config::{BoardDescriptor, Scenario, ScenarioAssertion, StopReason};
use pushlab_core::bus::BoardBus;
use pushlab_core::metrics::{LoopMetrics, MetricsSnapshot};
use pushlab_core::sim::ScriptedStimulus;
use pushlab_core::{ButtonEvent, ControlLoop};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "PushLab push-button LED demo", long_about = None)]
struct Cli {
    /// Enable per-action debug tracing
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drive the LEDs of a real board through its physical register window
    Run {
        /// Path to the board descriptor (YAML); defaults to the DE1-SoC layout
        #[arg(short, long)]
        board: Option<PathBuf>,

        /// Stop after this many polls even if the exit switches are never set
        #[arg(long)]
        max_ticks: Option<u64>,
    },
    /// Play a scenario script against a simulated register window
    Test {
        /// Path to the scenario script (YAML)
        #[arg(short, long)]
        script: PathBuf,

        /// Directory to write result.json into
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    match cli.command {
        Command::Run { board, max_ticks } => run_hardware(board.as_deref(), max_ticks),
        Command::Test { script, output_dir } => run_test(&script, output_dir.as_deref()),
    }
}

fn load_board(path: Option<&Path>) -> anyhow::Result<BoardDescriptor> {
    match path {
        Some(path) => {
            info!("Loading board descriptor: {:?}", path);
            BoardDescriptor::from_file(path)
        }
        None => {
            info!("Using default DE1-SoC register layout");
            Ok(BoardDescriptor::de1_soc())
        }
    }
}

#[cfg(unix)]
fn run_hardware(board_path: Option<&Path>, max_ticks: Option<u64>) -> anyhow::Result<()> {
    let board = load_board(board_path)?;
    info!(
        "Mapping {} at {:#x} ({})",
        board.name, board.window.base, board.window.span
    );
    let bus = BoardBus::mapped(&board).context("Failed to map the board's register window")?;

    let metrics = Arc::new(LoopMetrics::new());
    let mut control = ControlLoop::from_config(bus, &board);
    control.observers.push(metrics.clone());

    info!("Press all buttons with every switch off to exit");
    let reason = control.run(max_ticks)?;

    info!(
        "Stopped ({:?}) after {} polls, {} actions, {:.0} polls/s",
        reason,
        metrics.get_ticks(),
        metrics.get_actions(),
        metrics.get_polls_per_second()
    );
    info!("Final LEDs: {:#x}", control.counter().value());
    Ok(())
}

#[cfg(not(unix))]
fn run_hardware(_board_path: Option<&Path>, _max_ticks: Option<u64>) -> anyhow::Result<()> {
    anyhow::bail!("Physical register access requires a unix /dev/mem")
}

#[derive(Debug, Serialize)]
struct AssertionResult {
    assertion: String,
    passed: bool,
}

#[derive(Debug, Serialize)]
struct ResultConfig {
    script: String,
    board: String,
}

#[derive(Debug, Serialize)]
struct TestResult {
    status: &'static str,
    stop_reason: StopReason,
    ticks: u64,
    final_leds: u32,
    counter: u64,
    last_event: ButtonEvent,
    assertions: Vec<AssertionResult>,
    metrics: MetricsSnapshot,
    config: ResultConfig,
}

fn run_test(script_path: &Path, output_dir: Option<&Path>) -> anyhow::Result<()> {
    info!("Loading scenario: {:?}", script_path);
    let scenario = Scenario::from_file(script_path)?;

    // Board paths are relative to the script.
    let board_path = scenario.board.as_ref().map(|b| {
        script_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(b)
    });
    let board = load_board(board_path.as_deref())?;

    let bus = BoardBus::simulated(&board)?;
    let metrics = Arc::new(LoopMetrics::new());
    let mut control = ControlLoop::from_config(bus, &board)
        .with_refresh_period(Duration::ZERO)
        .with_counter_value(scenario.initial.counter)
        .with_stimulus(Box::new(ScriptedStimulus::from_scenario(&scenario)));
    control.observers.push(metrics.clone());

    let stop_reason = control.run(Some(scenario.limits.max_ticks))?;
    let final_leds = control.bus.read_leds()?;

    let assertions: Vec<AssertionResult> = scenario
        .assertions
        .iter()
        .map(|assertion| match assertion {
            ScenarioAssertion::Leds(a) => AssertionResult {
                assertion: format!("expected_leds: {:#x}", a.expected_leds),
                passed: final_leds == a.expected_leds,
            },
            ScenarioAssertion::ExpectedStopReason(a) => AssertionResult {
                assertion: format!("expected_stop_reason: {:?}", a.expected_stop_reason),
                passed: stop_reason == a.expected_stop_reason,
            },
        })
        .collect();

    let failed = assertions.iter().filter(|a| !a.passed).count();
    for a in assertions.iter().filter(|a| !a.passed) {
        error!("Assertion failed: {}", a.assertion);
    }

    let result = TestResult {
        status: if failed == 0 { "pass" } else { "fail" },
        stop_reason,
        ticks: control.ticks(),
        final_leds,
        counter: control.counter().value(),
        last_event: control.previous_event(),
        assertions,
        metrics: metrics.snapshot(),
        config: ResultConfig {
            script: script_path.display().to_string(),
            board: board_path
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| board.name.clone()),
        },
    };

    info!(
        "Scenario finished: {} ({:?} after {} ticks, LEDs {:#x})",
        result.status, result.stop_reason, result.ticks, result.final_leds
    );

    if let Some(dir) = output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {:?}", dir))?;
        let path = dir.join("result.json");
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
        info!("Wrote {:?}", path);
    }

    if failed > 0 {
        anyhow::bail!("{} of {} assertions failed", failed, result.assertions.len());
    }
    Ok(())
}
