//! Scenario files on disk, loaded and run end to end.

use std::io::Write;

use delve_headless::{run_scenario, verify_determinism, RunOptions, Scenario, ScenarioError};
use delve_test_utils::determinism::verify_coordinator_determinism;

const TWO_ROOMS: &str = include_str!("../scenarios/two_rooms.ron");

fn write_scenario(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_bundled_scenario_loads_from_disk() {
    let file = write_scenario(TWO_ROOMS);
    let scenario = Scenario::load(file.path()).unwrap();
    assert_eq!(scenario.name, "two_rooms");
    assert_eq!(scenario.ticks, 60);

    let built = scenario.build().unwrap();
    assert_eq!(built.actors.len(), 7);
    assert!(built.rejected_assignments.is_empty());
}

#[test]
fn test_bundled_scenario_runs_collision_free() {
    let scenario = Scenario::from_ron_str(TWO_ROOMS).unwrap();
    let options = RunOptions {
        entries: true,
        ..RunOptions::default()
    };
    let report = run_scenario(&scenario, &options).unwrap();
    assert_eq!(report.ticks, 60);

    for tick in &report.reports {
        // Barriers are never dispatched.
        assert_eq!(tick.actors, 6);
        let mut destinations: Vec<_> = tick
            .entries
            .iter()
            .filter(|e| e.outcome == delve_core::dispatch::Outcome::Accepted)
            .map(|e| e.destination())
            .collect();
        let accepted = destinations.len();
        destinations.sort();
        destinations.dedup();
        assert_eq!(destinations.len(), accepted);
    }
}

#[test]
fn test_drained_actor_cultivates_first() {
    let scenario = Scenario::from_ron_str(TWO_ROOMS).unwrap();
    let options = RunOptions {
        ticks: Some(1),
        entries: true,
        ..RunOptions::default()
    };
    let report = run_scenario(&scenario, &options).unwrap();
    let drained = report.reports[0]
        .entries
        .iter()
        .find(|e| e.actor == 4)
        .unwrap();
    assert_eq!(drained.mode, delve_core::aiu::AiuMode::Cultivate);
    assert_eq!(drained.stamina, 3);
}

#[test]
fn test_repeated_runs_match() {
    let scenario = Scenario::from_ron_str(TWO_ROOMS).unwrap();
    let verify = verify_determinism(&scenario, &RunOptions::default(), 3).unwrap();
    assert!(verify.is_deterministic());
    assert_eq!(verify.first_divergence, None);

    verify_coordinator_determinism(|| scenario.build().unwrap().coordinator, 3, 30)
        .assert_deterministic();
}

#[test]
fn test_malformed_file_is_a_parse_error() {
    let file = write_scenario("Scenario(name: \"broken\", levels: [");
    let err = Scenario::load(file.path()).unwrap_err();
    assert!(matches!(err, ScenarioError::ParseError(_)));
}
