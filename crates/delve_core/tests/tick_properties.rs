//! End-to-end tick properties: determinism, collision freedom, cultivation
//! and the permit rules, driven through the public API.

use std::collections::BTreeSet;

use delve_core::prelude::*;
use delve_test_utils::determinism::strategies::{arb_actor_setups, arb_planar_step, arb_seed, build_room};
use delve_test_utils::determinism::{queue_fingerprint, verify_dispatch_determinism};
use delve_test_utils::fixtures::{self, cell, ScriptedSolver};
use proptest::prelude::*;

const RANDOM_WALK: AiuId = 1;
const CULTIVATION: AiuId = 8;

fn run_tick(configurator: &mut Configurator, tick: u64) -> ResolvedTick {
    let queue = configurator.build_dispatch_queue(tick);
    configurator.resolve(queue)
}

fn assert_board_consistent(configurator: &Configurator) {
    let positions: Vec<CellPos> = configurator
        .actor_handles()
        .into_iter()
        .filter_map(|actor| configurator.position_of(actor))
        .collect();
    let distinct: BTreeSet<CellPos> = positions.iter().copied().collect();
    assert_eq!(distinct.len(), positions.len(), "two actors share a cell");
    assert_eq!(configurator.map().occupant_count(), positions.len());
}

// =============================================================================
// Determinism
// =============================================================================

#[test]
fn test_same_inputs_same_queue() {
    let setup = || {
        let mut configurator = fixtures::room(6, 6);
        fixtures::crowd(&mut configurator, 6, 6, 4);
        configurator
    };
    for tick in [0, 1, 17, u64::from(u32::MAX) + 3] {
        assert!(verify_dispatch_determinism(setup, tick));
    }
}

#[test]
fn test_seed_changes_order() {
    let order = |seed: u32| {
        let config = SimConfig {
            seed,
            ..SimConfig::default()
        };
        let mut configurator = fixtures::room_with(config, 6, 6);
        fixtures::crowd(&mut configurator, 6, 6, 2);
        let queue = configurator.build_dispatch_queue(0);
        queue_fingerprint(&queue)
            .into_iter()
            .map(|(actor, ..)| actor)
            .collect::<Vec<_>>()
    };
    assert_eq!(order(11), order(11));
    assert_ne!(order(11), order(12));
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_local_evaluation_scenario() {
    let mut configurator = fixtures::room(3, 3);
    configurator.set_feature(cell(2, 1), 1, true);
    configurator.set_feature(cell(1, 0), 2, true);
    let actor = fixtures::place(&mut configurator, 1, 1);

    let queue = configurator.build_dispatch_queue(0);
    let entry = queue.find(actor).unwrap();
    assert_eq!(entry.tier, DecisionTier::Logic);
    assert_eq!(entry.step, Step::NORTH);
    assert_eq!(entry.destination(), cell(1, 2));
}

#[test]
fn test_collision_scenario() {
    let mut configurator = Configurator::new(SimConfig::default());
    for x in 0..3 {
        configurator.set_surface(cell(x, 1), fixtures::FLOOR);
    }
    let left = fixtures::place(&mut configurator, 0, 1);
    let right = fixtures::place(&mut configurator, 2, 1);
    configurator.set_directive(left, 0, Step::EAST).unwrap();
    configurator.set_directive(right, 0, Step::WEST).unwrap();

    let resolved = run_tick(&mut configurator, 0);
    assert_eq!(resolved.accepted(), 1);
    assert_eq!(resolved.rejected_for(RejectReason::Blocked), 1);

    let winner = resolved.entries()[0].actor;
    let loser = resolved.entries()[1].actor;
    assert_eq!(configurator.position_of(winner), Some(cell(1, 1)));
    assert_eq!(resolved.find(loser).unwrap().outcome, Outcome::Rejected);
    assert_ne!(configurator.position_of(left), configurator.position_of(right));
    assert_board_consistent(&configurator);
}

#[test]
fn test_cultivation_cycle_scenario() {
    let mut configurator = fixtures::room(5, 5);
    let actor = fixtures::place(&mut configurator, 2, 2);
    fixtures::drain_stamina(&mut configurator, actor, 50);
    configurator.assign_aiu(actor, CULTIVATION).unwrap();

    for (tick, expected) in (0..4).zip(1..=4) {
        let resolved = run_tick(&mut configurator, tick);
        let entry = resolved.find(actor).unwrap();
        assert_eq!(entry.mode, AiuMode::Cultivate);
        assert_eq!(entry.step, Step::HOLD);
        assert_eq!(entry.cultivation_ticks, expected);
        assert_eq!(entry.vulnerability_ticks, 0);
    }
    assert_eq!(configurator.position_of(actor), Some(cell(2, 2)));

    configurator.assign_aiu(actor, RANDOM_WALK).unwrap();
    let entry = *run_tick(&mut configurator, 4).find(actor).unwrap();
    assert_eq!(entry.mode, AiuMode::None);
    assert_eq!(entry.cultivation_ticks, 0);
    assert_eq!(entry.vulnerability_ticks, 2);

    let entry = *run_tick(&mut configurator, 5).find(actor).unwrap();
    assert_eq!(entry.vulnerability_ticks, 1);
    let entry = *run_tick(&mut configurator, 6).find(actor).unwrap();
    assert_eq!(entry.vulnerability_ticks, 0);
    let entry = *run_tick(&mut configurator, 7).find(actor).unwrap();
    assert_eq!(entry.vulnerability_ticks, 0);
}

#[test]
fn test_forced_cultivation_until_threshold() {
    let mut configurator = fixtures::room(5, 5);
    let actor = fixtures::place(&mut configurator, 2, 2);
    configurator.assign_aiu(actor, RANDOM_WALK).unwrap();
    configurator.set_stamina(actor, 0).unwrap();

    // Threshold for max 100 is max(ceil(4), 6) = 6; each tick restores 3.
    for (tick, stamina_before) in [(0, 0), (1, 3)] {
        let resolved = run_tick(&mut configurator, tick);
        let entry = resolved.find(actor).unwrap();
        assert_eq!(entry.stamina, stamina_before);
        assert_eq!(entry.mode, AiuMode::Cultivate);
        assert_eq!(entry.tier, DecisionTier::Aiu);
        assert_eq!(entry.aiu, CULTIVATION);
        assert_eq!(entry.outcome, Outcome::Accepted);
    }
    assert_eq!(configurator.record(actor).unwrap().aiu, RANDOM_WALK);

    let resolved = run_tick(&mut configurator, 2);
    let entry = resolved.find(actor).unwrap();
    assert_eq!(entry.stamina, 6);
    assert_eq!(entry.mode, AiuMode::None);
    assert_eq!(entry.aiu, RANDOM_WALK);
    assert_eq!(entry.vulnerability_ticks, 2);
}

#[test]
fn test_permit_rules_leave_state_untouched() {
    let mut configurator = fixtures::corridor(3);
    let actor = fixtures::place(&mut configurator, 0, 0);
    let permit = MovementPermit {
        actor,
        tick: 4,
        step: Step::EAST,
        tier: DecisionTier::Logic,
    };
    assert!(configurator.apply_permit(&permit).is_accepted());
    let hash = configurator.state_hash();

    let again = MovementPermit {
        step: Step::WEST,
        ..permit
    };
    let verdict = configurator.apply_permit(&again);
    assert_eq!(verdict.reason(), RejectReason::Duplicate);
    assert_eq!(configurator.state_hash(), hash);

    configurator.set_stamina(actor, 0).unwrap();
    let hash = configurator.state_hash();
    let drained = MovementPermit { tick: 5, ..permit };
    assert_eq!(configurator.apply_permit(&drained).reason(), RejectReason::Stamina);
    assert_eq!(configurator.state_hash(), hash);
    assert_eq!(configurator.position_of(actor), Some(cell(1, 0)));
}

#[test]
fn test_perpetual_unsat_solver_is_tolerated() {
    let mut configurator = fixtures::room(6, 6);
    let actors = fixtures::crowd(&mut configurator, 6, 6, 5);
    for (index, actor) in actors.iter().enumerate() {
        configurator.set_enhanced_observation(*actor, true).unwrap();
        let aiu = [2, 3, 4, 5, 6, 7, 9002, 9005][index % 8];
        configurator.assign_aiu(*actor, aiu).unwrap();
    }
    let log = ScriptedSolver::always(SolverResult::unsat()).bind(&mut configurator);

    for tick in 0..20 {
        let resolved = run_tick(&mut configurator, tick);
        assert_eq!(resolved.entries().len(), actors.len());
        assert_board_consistent(&configurator);
    }
    assert!(!log.is_empty());
}

#[test]
fn test_coordinator_matches_manual_ticks() {
    let build = || {
        let mut configurator = fixtures::room(5, 5);
        fixtures::crowd(&mut configurator, 5, 5, 3);
        configurator.bind_solver(Box::new(GridSolver::default()));
        configurator
    };

    let mut manual = build();
    for tick in 0..10 {
        run_tick(&mut manual, tick);
    }
    let mut coordinator = Coordinator::with_configurator(build());
    assert_eq!(coordinator.run(10), 10);
    assert_eq!(coordinator.configurator().state_hash(), manual.state_hash());
    assert_eq!(coordinator.moderator().summaries().len(), 10);
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_queue_is_total_and_stable(seed in arb_seed(), setups in arb_actor_setups(6, 6, 12), tick in any::<u64>()) {
        prop_assert!(verify_dispatch_determinism(|| build_room(seed, 6, 6, &setups), tick));

        let mut configurator = build_room(seed, 6, 6, &setups);
        let queue = configurator.build_dispatch_queue(tick);
        prop_assert_eq!(queue.len(), setups.len());
        let keys: Vec<(u32, ActorHandle)> = queue.entries().iter().map(|e| (e.token, e.actor)).collect();
        prop_assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn prop_no_two_actors_share_a_cell(
        seed in arb_seed(),
        setups in arb_actor_setups(5, 5, 14),
        broadcasts in proptest::collection::vec(proptest::option::of(arb_planar_step()), 8),
    ) {
        let mut configurator = build_room(seed, 5, 5, &setups);
        configurator.bind_solver(Box::new(GridSolver::default()));

        for (tick, broadcast) in (0u64..).zip(broadcasts) {
            if let Some(step) = broadcast {
                configurator.set_broadcast(tick, step);
            }
            let before: Vec<(ActorHandle, u32)> = configurator
                .actor_handles()
                .into_iter()
                .map(|actor| (actor, configurator.record(actor).map_or(0, |r| r.pools.stamina.current)))
                .collect();
            let resolved = run_tick(&mut configurator, tick);

            let positions: BTreeSet<CellPos> = configurator
                .actor_handles()
                .into_iter()
                .filter_map(|actor| configurator.position_of(actor))
                .collect();
            prop_assert_eq!(positions.len(), setups.len());

            let accepted: Vec<CellPos> = resolved
                .entries()
                .iter()
                .filter(|e| e.outcome == Outcome::Accepted)
                .map(|e| e.destination())
                .collect();
            let distinct: BTreeSet<CellPos> = accepted.iter().copied().collect();
            prop_assert_eq!(distinct.len(), accepted.len());

            for entry in resolved.entries().iter().filter(|e| e.outcome == Outcome::Rejected) {
                prop_assert_eq!(configurator.position_of(entry.actor), Some(entry.origin));
                let stamina = configurator.record(entry.actor).map(|r| r.pools.stamina.current);
                let previous = before.iter().find(|(actor, _)| *actor == entry.actor).map(|(_, s)| *s);
                prop_assert_eq!(stamina, previous);
            }
        }
    }
}
