//! Determinism test harness.
//!
//! Every tick must be bit-for-bit reproducible: the same seed, map and
//! actor set must produce the same priority tokens, the same intents and
//! the same final board on every run.
//!
//! # Testing Strategy
//!
//! 1. **Rerun tests**: build the same scenario N times, run it, compare
//!    [`Configurator::state_hash`]
//! 2. **Queue fingerprints**: compare the dispatch queue itself, not just
//!    its effects
//! 3. **Property tests**: random layouts and seeds must still reproduce
//! 4. **Parallel tests**: independent instances on separate threads match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use delve_core::configurator::Configurator;
use delve_core::coordinator::Coordinator;
use delve_core::dispatch::{DecisionTier, DispatchQueue};
use delve_core::geometry::Step;
use delve_core::ledger::ActorHandle;
use tracing::debug;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Distinct hashes seen (one for a deterministic run).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that every run matched, with a detailed message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                self.unique_hashes().len(),
                self.hashes
            );
        }
    }
}

/// Run a state machine several times and compare final hashes.
///
/// # Example
///
/// ```
/// use delve_test_utils::determinism::verify_determinism;
///
/// let result = verify_determinism(3, 10, || 0u64, |n| *n += 1, |n| *n);
/// assert!(result.is_deterministic);
/// assert_eq!(result.hashes, vec![10, 10, 10]);
/// ```
pub fn verify_determinism<S, Setup, StepFn, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: StepFn,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    StepFn: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);
    for _ in 0..runs {
        let mut state = setup();
        for _ in 0..ticks {
            step(&mut state);
        }
        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run a coordinator scenario `runs` times for `ticks` ticks each.
pub fn verify_coordinator_determinism<F>(setup: F, runs: usize, ticks: u64) -> DeterminismResult
where
    F: Fn() -> Coordinator,
{
    verify_determinism(
        runs,
        ticks,
        setup,
        |coordinator| {
            coordinator.step();
        },
        |coordinator| coordinator.configurator().state_hash(),
    )
}

/// Run `instances` copies of a scenario on separate threads and collect
/// their final hashes.
pub fn run_parallel_coordinators<F>(setup: F, instances: usize, ticks: u64) -> DeterminismResult
where
    F: Fn() -> Coordinator + Sync,
{
    let hashes: Vec<u64> = thread::scope(|scope| {
        let workers: Vec<_> = (0..instances)
            .map(|_| {
                scope.spawn(|| {
                    let mut coordinator = setup();
                    coordinator.run(ticks);
                    coordinator.configurator().state_hash()
                })
            })
            .collect();
        workers
            .into_iter()
            .map(|worker| {
                worker
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect()
    });

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Step two copies of a scenario side by side and report the first tick
/// after which their state hashes differ (`0` for the initial state).
pub fn find_first_divergence<F>(setup: F, ticks: u64) -> Option<u64>
where
    F: Fn() -> Coordinator,
{
    let mut left = setup();
    let mut right = setup();

    if left.configurator().state_hash() != right.configurator().state_hash() {
        return Some(0);
    }

    for tick in 1..=ticks {
        left.step();
        right.step();
        if left.configurator().state_hash() != right.configurator().state_hash() {
            debug!(tick, "runs diverged");
            return Some(tick);
        }
    }
    None
}

/// The order-relevant part of one queue entry.
pub type EntryFingerprint = (ActorHandle, u32, Step, DecisionTier);

/// Handle, token, intent and tier of every entry, in queue order.
#[must_use]
pub fn queue_fingerprint(queue: &DispatchQueue) -> Vec<EntryFingerprint> {
    queue
        .entries()
        .iter()
        .map(|entry| (entry.actor, entry.token, entry.step, entry.tier))
        .collect()
}

/// Build the queue for `tick` on two fresh copies of a scenario and compare.
pub fn verify_dispatch_determinism<F>(setup: F, tick: u64) -> bool
where
    F: Fn() -> Configurator,
{
    let mut first = setup();
    let mut second = setup();
    let a = queue_fingerprint(&first.build_dispatch_queue(tick));
    let b = queue_fingerprint(&second.build_dispatch_queue(tick));
    a == b
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for determinism testing.
///
/// These generate random but reproducible rooms and actor sets.
pub mod strategies {
    use delve_core::actor::ActorSpawn;
    use delve_core::aiu::{AiuCatalog, AiuId, NO_AIU};
    use delve_core::config::SimConfig;
    use delve_core::configurator::Configurator;
    use delve_core::geometry::{CellPos, Step};
    use proptest::prelude::*;

    use crate::fixtures;

    /// Any configuration seed.
    pub fn arb_seed() -> impl Strategy<Value = u32> {
        any::<u32>()
    }

    /// A cell inside a `width` x `height` room on level 0.
    pub fn arb_cell(width: i32, height: i32) -> impl Strategy<Value = CellPos> {
        (0..width, 0..height).prop_map(|(x, y)| CellPos::new(x, y, 0))
    }

    /// Between 1 and `max` distinct cells of a `width` x `height` room.
    pub fn arb_distinct_cells(width: i32, height: i32, max: usize) -> impl Strategy<Value = Vec<CellPos>> {
        let cells: Vec<CellPos> = (0..height)
            .flat_map(|y| (0..width).map(move |x| CellPos::new(x, y, 0)))
            .collect();
        let max = max.clamp(1, cells.len().max(1));
        proptest::sample::subsequence(cells, 1..=max)
    }

    /// Stamina as a percentage of max.
    pub fn arb_stamina_percent() -> impl Strategy<Value = u32> {
        0u32..=100
    }

    /// A planar director step (cardinal or hold).
    pub fn arb_planar_step() -> impl Strategy<Value = Step> {
        prop_oneof![
            Just(Step::HOLD),
            Just(Step::NORTH),
            Just(Step::EAST),
            Just(Step::SOUTH),
            Just(Step::WEST),
        ]
    }

    /// No AIU or any id from the standard catalog.
    pub fn arb_aiu_id() -> impl Strategy<Value = AiuId> {
        prop_oneof![
            Just(NO_AIU),
            proptest::sample::select(vec![1, 2, 3, 4, 5, 6, 7, 8, 9002, 9005]),
        ]
    }

    /// One actor to place in a room.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ActorSetup {
        /// Starting cell.
        pub position: CellPos,
        /// Stamina as a percentage of max.
        pub stamina_percent: u32,
        /// AIU to request; unmet prerequisites leave the actor on instinct.
        pub aiu: AiuId,
        /// Enhanced observation capability.
        pub enhanced_observation: bool,
    }

    /// Up to `max` actors on distinct cells of a `width` x `height` room.
    pub fn arb_actor_setups(width: i32, height: i32, max: usize) -> impl Strategy<Value = Vec<ActorSetup>> {
        arb_distinct_cells(width, height, max).prop_flat_map(|cells| {
            let count = cells.len();
            (
                Just(cells),
                proptest::collection::vec(
                    (arb_stamina_percent(), arb_aiu_id(), any::<bool>()),
                    count,
                ),
            )
                .prop_map(|(cells, traits)| {
                    cells
                        .into_iter()
                        .zip(traits)
                        .map(|(position, (stamina_percent, aiu, enhanced_observation))| ActorSetup {
                            position,
                            stamina_percent,
                            aiu,
                            enhanced_observation,
                        })
                        .collect()
                })
        })
    }

    /// Build a room configurator holding `setups`.
    #[must_use]
    pub fn build_room(seed: u32, width: i32, height: i32, setups: &[ActorSetup]) -> Configurator {
        let config = SimConfig {
            seed,
            ..SimConfig::default()
        };
        let mut configurator = fixtures::room_with(config, width, height);
        let catalog = AiuCatalog::standard();
        for setup in setups {
            let spawn = ActorSpawn {
                enhanced_observation: setup.enhanced_observation,
                ..ActorSpawn::default()
            };
            let actor = fixtures::place_with(&mut configurator, setup.position, spawn);
            fixtures::drain_stamina(&mut configurator, actor, setup.stamina_percent);
            if catalog.get(setup.aiu).is_some() {
                let _ = configurator.assign_aiu(actor, setup.aiu);
            }
        }
        configurator
    }
}
