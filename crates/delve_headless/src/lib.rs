//! Headless scenario runner for CI verification.
//!
//! Loads a RON scenario (ASCII level layouts, actors, AIU assignments and
//! director overrides), runs it through a [`delve_core::coordinator::Coordinator`]
//! and reports each tick as text or JSON lines.
//!
//! - **stdout**: tick reports
//! - **stderr**: logs
//!
//! # Example
//!
//! ```bash
//! # Run a scenario for 50 ticks, one JSON object per tick
//! cargo run -p delve_headless -- run --scenario scenarios/two_rooms.ron --ticks 50 --json
//!
//! # Verify determinism
//! cargo run -p delve_headless -- verify --scenario scenarios/two_rooms.ron --runs 5
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod runner;
pub mod scenario;

pub use runner::{run_scenario, verify_determinism, RunOptions, RunReport, TickReport, VerifyReport};
pub use scenario::{BuiltScenario, Heading, Scenario, ScenarioError};
