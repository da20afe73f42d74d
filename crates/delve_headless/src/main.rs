//! Headless delve scenario runner.
//!
//! # Usage
//!
//! ```bash
//! # Run a scenario, text summaries on stdout
//! cargo run -p delve_headless -- run --scenario scenarios/two_rooms.ron
//!
//! # JSON lines, one object per tick, including every dispatch entry
//! cargo run -p delve_headless -- run --scenario scenarios/two_rooms.ron --json --entries
//!
//! # Verify determinism
//! cargo run -p delve_headless -- verify --scenario scenarios/two_rooms.ron --runs 5
//!
//! # Check that a scenario parses and builds
//! cargo run -p delve_headless -- validate --scenario scenarios/two_rooms.ron
//! ```

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use delve_headless::{run_scenario, verify_determinism, RunOptions, Scenario};

#[derive(Parser)]
#[command(name = "delve_headless")]
#[command(about = "Headless runner for delve tick scenarios")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario and print one report per tick
    Run {
        /// Scenario file to load
        #[arg(short, long)]
        scenario: PathBuf,

        /// Ticks to run (defaults to the scenario's own count)
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Print JSON lines instead of text summaries
        #[arg(long)]
        json: bool,

        /// Include every dispatch entry
        #[arg(long)]
        entries: bool,

        /// Run without the built-in grid solver
        #[arg(long)]
        no_solver: bool,
    },

    /// Verify determinism by running the same scenario several times
    Verify {
        /// Scenario file to load
        #[arg(short, long)]
        scenario: PathBuf,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Ticks to run (defaults to the scenario's own count)
        #[arg(short, long)]
        ticks: Option<u64>,
    },

    /// Parse and build a scenario without running it
    Validate {
        /// Scenario file to load
        #[arg(short, long)]
        scenario: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries reports
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(
                    tracing_subscriber::filter::LevelFilter::from_level(log_level).into(),
                )
                .from_env_lossy(),
        )
        .init();

    match cli.command {
        Commands::Run {
            scenario,
            ticks,
            json,
            entries,
            no_solver,
        } => {
            let options = RunOptions {
                ticks,
                solver: !no_solver,
                entries,
            };
            cmd_run(&scenario, &options, json);
        }
        Commands::Verify {
            scenario,
            runs,
            ticks,
        } => {
            let options = RunOptions {
                ticks,
                ..RunOptions::default()
            };
            cmd_verify(&scenario, &options, runs);
        }
        Commands::Validate { scenario } => {
            cmd_validate(&scenario);
        }
    }
}

fn load_or_exit(path: &Path) -> Scenario {
    match Scenario::load(path) {
        Ok(scenario) => scenario,
        Err(e) => {
            eprintln!("Failed to load scenario: {e}");
            std::process::exit(1);
        }
    }
}

/// Run a scenario and print its reports
fn cmd_run(path: &Path, options: &RunOptions, json: bool) {
    let scenario = load_or_exit(path);
    tracing::info!("Running scenario: {}", scenario.name);

    let report = match run_scenario(&scenario, options) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Run failed: {e}");
            std::process::exit(1);
        }
    };

    if json {
        match report.json_lines() {
            Ok(lines) => lines.iter().for_each(|line| println!("{line}")),
            Err(e) => {
                eprintln!("Failed to serialize reports: {e}");
                std::process::exit(1);
            }
        }
    } else {
        for summary in &report.summaries {
            println!("{summary}");
        }
        println!("final hash {:016x}", report.final_hash);
    }
}

/// Run the same scenario several times and compare hashes
fn cmd_verify(path: &Path, options: &RunOptions, runs: u32) {
    let scenario = load_or_exit(path);
    tracing::info!("Verifying determinism: {} ({} runs)", scenario.name, runs);

    match verify_determinism(&scenario, options, runs) {
        Ok(report) if report.is_deterministic() => {
            eprintln!("PASS: All {runs} runs produced identical results");
        }
        Ok(report) => {
            eprintln!("FAIL: Non-determinism detected!");
            if let Some(tick) = report.first_divergence {
                eprintln!("  First divergence at tick {tick}");
            }
            eprintln!("  Final hashes: {:x?}", report.hashes);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Verification failed: {e}");
            std::process::exit(1);
        }
    }
}

/// Parse and build a scenario
fn cmd_validate(path: &Path) {
    let scenario = load_or_exit(path);
    match scenario.build() {
        Ok(built) => {
            for (index, reason) in &built.rejected_assignments {
                eprintln!("WARN: actor #{index}: {reason}");
            }
            eprintln!(
                "OK: {} ({} actors, {} cells)",
                scenario.name,
                built.actors.len(),
                built.coordinator.configurator().map().len()
            );
        }
        Err(e) => {
            tracing::error!("Validation failed: {e}");
            std::process::exit(1);
        }
    }
}
