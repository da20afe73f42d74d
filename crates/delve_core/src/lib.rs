//! # Delve Core
//!
//! Deterministic tick core for grid-bound dungeon actors.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO beyond optional RON parsing of tunables
//! - No system randomness
//! - No floating-point math (uses fixed-point)
//!
//! Each tick, every mobile actor gets one movement intent from a tiered
//! fallback of decision strategies, intents are ordered by a per-tick
//! priority token, and resolve/commit applies them one at a time against
//! live occupancy so no two actors ever share a cell.
//!
//! ## Crate Structure
//!
//! - [`level_map`] - Sparse layered grid
//! - [`aiu`] - Decision modules and their catalog
//! - [`solver`] - Path-solver contract and the built-in grid solver
//! - [`dispatch`] - Dispatch queue builder
//! - [`resolve`] / [`permit`] - Resolve/commit
//! - [`cultivation`] - Cultivation and vulnerability counters
//! - [`configurator`] - One simulation instance
//! - [`coordinator`] - Tick stage machine, director and moderator
//! - [`handles`] - Opaque-integer host API

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod actor;
pub mod aiu;
pub mod config;
pub mod configurator;
pub mod coordinator;
pub mod cultivation;
pub mod dispatch;
pub mod error;
pub mod geometry;
pub mod handles;
pub mod history;
pub mod ledger;
pub mod level_map;
pub mod local;
pub mod math;
pub mod permit;
pub mod resolve;
pub mod resource_codec;
pub mod solver;
pub mod telemetry;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::actor::{ActorRecord, ActorSpawn, Pool, ResourcePools};
    pub use crate::aiu::{AiuCatalog, AiuId, AiuIntent, AiuKind, AiuMode, AiuSpec, NO_AIU};
    pub use crate::config::SimConfig;
    pub use crate::configurator::Configurator;
    pub use crate::coordinator::{Coordinator, Director, Moderator, TickStage};
    pub use crate::cultivation::{CultivationPhase, CultivationTracker};
    pub use crate::dispatch::{
        DecisionTier, DispatchEntry, DispatchQueue, Outcome, RejectReason,
    };
    pub use crate::error::{CoreError, Result};
    pub use crate::geometry::{CellPos, Step};
    pub use crate::handles::SimulationHost;
    pub use crate::ledger::{ActorHandle, ActorRole};
    pub use crate::level_map::{LevelMap, PortalKind, StairKind};
    pub use crate::math::Fixed;
    pub use crate::permit::{MovementPermit, PermitVerdict};
    pub use crate::resolve::ResolvedTick;
    pub use crate::solver::{GridSolver, PathSolver, SolverRequest, SolverResult, SolverVerdict};
}
