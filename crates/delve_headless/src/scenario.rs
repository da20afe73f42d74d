//! Scenario loading and construction.
//!
//! A scenario describes the starting board for a headless run: one ASCII
//! layout per level, the actors standing on it, their AIU assignments and
//! any director overrides to stage ahead of time.
//!
//! Layout legend (the first row is the northernmost):
//!
//! | glyph | cell |
//! |-------|------|
//! | `.` | floor |
//! | `#` or space | no floor |
//! | `X` | floor with a blocking feature |
//! | `N` | floor with an entrance portal |
//! | `E` | floor with an exit portal |
//! | `>` | floor with a down stair (to `level + 1`) |
//! | `<` | floor with an up stair (to `level - 1`) |

use std::path::Path;

use delve_core::actor::{ActorSpawn, ResourcePools};
use delve_core::aiu::{AiuId, NO_AIU};
use delve_core::config::SimConfig;
use delve_core::configurator::Configurator;
use delve_core::coordinator::Coordinator;
use delve_core::error::CoreError;
use delve_core::geometry::{CellPos, Step};
use delve_core::ledger::{ActorHandle, ActorRole};
use delve_core::level_map::{PortalKind, StairKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// A layout contains a glyph outside the legend.
    #[error("Unknown glyph {glyph:?} at level {level}, row {row}, column {column}")]
    UnknownGlyph {
        /// Layout level.
        level: i32,
        /// Row index, from the top.
        row: usize,
        /// Column index.
        column: usize,
        /// Offending glyph.
        glyph: char,
    },
    /// A directive names an actor index the scenario does not define.
    #[error("Directive for tick {tick} names actor #{index}, but only {count} actors exist")]
    UnknownActorIndex {
        /// Directive tick.
        tick: u64,
        /// Actor index in the scenario.
        index: usize,
        /// Number of actors in the scenario.
        count: usize,
    },
    /// Core rejected part of the setup.
    #[error("Scenario setup rejected: {0}")]
    Core(#[from] CoreError),
}

fn default_ticks() -> u64 {
    100
}

fn default_pool() -> u32 {
    100
}

/// A complete scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Seed mixed into every tick seed.
    #[serde(default)]
    pub seed: u32,
    /// Ticks to run when the caller does not override it.
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    /// Tunables; defaults when absent. The scenario seed always wins.
    #[serde(default)]
    pub config: Option<SimConfig>,
    /// One layout per level.
    pub levels: Vec<LevelLayout>,
    /// Actors, placed in order.
    #[serde(default)]
    pub actors: Vec<ActorSetup>,
    /// Director overrides.
    #[serde(default)]
    pub directives: Vec<DirectiveSetup>,
}

/// ASCII layout of one level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelLayout {
    /// Level index.
    #[serde(default)]
    pub level: i32,
    /// Rows, northernmost first.
    pub rows: Vec<String>,
}

/// One actor to place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorSetup {
    /// Starting cell as `(x, y, level)`.
    pub position: (i32, i32, i32),
    /// Scheduling role.
    #[serde(default)]
    pub role: ActorRole,
    /// AIU to assign, `0` for none.
    #[serde(default)]
    pub aiu: AiuId,
    /// Max of every pool.
    #[serde(default = "default_pool")]
    pub max: u32,
    /// Starting stamina; full when absent.
    #[serde(default)]
    pub stamina: Option<u32>,
    /// Enhanced observation capability.
    #[serde(default)]
    pub enhanced_observation: bool,
}

/// Named step for director overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Heading {
    /// Stay put.
    Hold,
    /// `+y`.
    North,
    /// `+x`.
    East,
    /// `-y`.
    South,
    /// `-x`.
    West,
    /// Take a down stair.
    Descend,
    /// Take an up stair.
    Ascend,
}

impl Heading {
    /// The step this heading stands for.
    #[must_use]
    pub const fn step(self) -> Step {
        match self {
            Self::Hold => Step::HOLD,
            Self::North => Step::NORTH,
            Self::East => Step::EAST,
            Self::South => Step::SOUTH,
            Self::West => Step::WEST,
            Self::Descend => Step::DESCEND,
            Self::Ascend => Step::ASCEND,
        }
    }
}

/// A director override staged before the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectiveSetup {
    /// Tick the override applies to.
    pub tick: u64,
    /// Index into [`Scenario::actors`]; `None` broadcasts to everyone.
    #[serde(default)]
    pub actor: Option<usize>,
    /// Requested step.
    pub heading: Heading,
}

/// A scenario turned into a ready-to-run coordinator.
#[derive(Debug)]
pub struct BuiltScenario {
    /// The coordinator, with directives staged.
    pub coordinator: Coordinator,
    /// Actor handles in scenario order.
    pub actors: Vec<ActorHandle>,
    /// AIU assignments the core refused, as (actor index, reason).
    pub rejected_assignments: Vec<(usize, String)>,
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Tunables with the scenario seed applied.
    #[must_use]
    pub fn sim_config(&self) -> SimConfig {
        SimConfig {
            seed: self.seed,
            ..self.config.unwrap_or_default()
        }
    }

    /// Build a coordinator holding this scenario.
    ///
    /// Layout glyphs, placements and directive targets must all be valid.
    /// AIU prerequisite failures are not fatal: the actor runs without a
    /// module and the refusal is listed in the result.
    pub fn build(&self) -> Result<BuiltScenario, ScenarioError> {
        let mut configurator = Configurator::new(self.sim_config());
        for layout in &self.levels {
            paint_layout(&mut configurator, layout)?;
        }

        let mut actors = Vec::with_capacity(self.actors.len());
        let mut rejected_assignments = Vec::new();
        for (index, setup) in self.actors.iter().enumerate() {
            let (x, y, level) = setup.position;
            let spawn = ActorSpawn {
                role: setup.role,
                pools: ResourcePools::uniform(setup.max),
                enhanced_observation: setup.enhanced_observation,
            };
            let actor = configurator.place_actor(CellPos::new(x, y, level), spawn)?;
            if let Some(stamina) = setup.stamina {
                configurator.set_stamina(actor, stamina)?;
            }
            if setup.aiu != NO_AIU {
                if let Err(err) = configurator.assign_aiu(actor, setup.aiu) {
                    warn!(index, aiu = setup.aiu, error = %err, "assignment refused");
                    rejected_assignments.push((index, err.to_string()));
                }
            }
            actors.push(actor);
        }

        let mut coordinator = Coordinator::with_configurator(configurator);
        for directive in &self.directives {
            let step = directive.heading.step();
            match directive.actor {
                Some(index) => {
                    let actor = *actors.get(index).ok_or(ScenarioError::UnknownActorIndex {
                        tick: directive.tick,
                        index,
                        count: actors.len(),
                    })?;
                    coordinator.director_mut().stage(directive.tick, actor, step);
                }
                None => coordinator.director_mut().broadcast(directive.tick, step),
            }
        }

        debug!(
            scenario = %self.name,
            actors = actors.len(),
            directives = self.directives.len(),
            "scenario built"
        );
        Ok(BuiltScenario {
            coordinator,
            actors,
            rejected_assignments,
        })
    }
}

fn paint_layout(configurator: &mut Configurator, layout: &LevelLayout) -> Result<(), ScenarioError> {
    let height = layout.rows.len();
    let mut feature_handle = 0u32;
    for (row, line) in layout.rows.iter().enumerate() {
        let y = (height - 1 - row) as i32;
        for (column, glyph) in line.chars().enumerate() {
            let pos = CellPos::new(column as i32, y, layout.level);
            if matches!(glyph, '#' | ' ') {
                continue;
            }
            if !matches!(glyph, '.' | 'X' | 'N' | 'E' | '>' | '<') {
                return Err(ScenarioError::UnknownGlyph {
                    level: layout.level,
                    row,
                    column,
                    glyph,
                });
            }
            configurator.set_surface(pos, 1);
            match glyph {
                'X' => {
                    feature_handle += 1;
                    configurator.set_feature(pos, feature_handle, true);
                }
                'N' => {
                    configurator.set_portal(pos, PortalKind::Entrance);
                }
                'E' => {
                    configurator.set_portal(pos, PortalKind::Exit);
                }
                '>' => {
                    configurator.set_stair(pos, StairKind::Down);
                }
                '<' => {
                    configurator.set_stair(pos, StairKind::Up);
                }
                _ => {}
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORRIDOR: &str = r######"
        Scenario(
            name: "corridor",
            seed: 7,
            ticks: 5,
            levels: [
                (level: 0, rows: [
                    "#####",
                    "N..XE",
                    "..>##",
                ]),
                (level: 1, rows: ["..<"]),
            ],
            actors: [
                (position: (0, 1, 0), aiu: 5),
                (position: (1, 0, 0), role: Barrier),
                (position: (1, 1, 0), aiu: 3),
            ],
            directives: [
                (tick: 0, actor: Some(0), heading: East),
                (tick: 2, heading: Hold),
            ],
        )
    "######;

    #[test]
    fn test_parse_and_build() {
        let scenario = Scenario::from_ron_str(CORRIDOR).unwrap();
        assert_eq!(scenario.seed, 7);
        assert_eq!(scenario.sim_config().seed, 7);
        assert_eq!(scenario.actors[0].max, 100);

        let built = scenario.build().unwrap();
        let configurator = built.coordinator.configurator();
        let map = configurator.map();
        assert_eq!(built.actors, vec![1, 2, 3]);
        assert_eq!(map.portal_at(CellPos::new(0, 1, 0)), PortalKind::Entrance);
        assert_eq!(map.portal_at(CellPos::new(4, 1, 0)), PortalKind::Exit);
        assert_eq!(map.stair_at(CellPos::new(2, 0, 0)), StairKind::Down);
        assert_eq!(map.stair_at(CellPos::new(2, 0, 1)), StairKind::Up);
        assert!(!map.has_substrate(CellPos::new(0, 2, 0)));
        assert!(!map.is_enterable(CellPos::new(3, 1, 0)));
        assert_eq!(configurator.record(built.actors[0]).unwrap().aiu, 5);
    }

    #[test]
    fn test_refused_assignment_is_reported() {
        let built = Scenario::from_ron_str(CORRIDOR).unwrap().build().unwrap();
        assert_eq!(built.rejected_assignments.len(), 1);
        assert_eq!(built.rejected_assignments[0].0, 2);
        let configurator = built.coordinator.configurator();
        assert_eq!(configurator.record(built.actors[2]).unwrap().aiu, NO_AIU);
    }

    #[test]
    fn test_unknown_glyph() {
        let ron = r#"Scenario(name: "bad", levels: [(rows: ["..?"])])"#;
        let err = Scenario::from_ron_str(ron).unwrap().build().unwrap_err();
        assert!(matches!(
            err,
            ScenarioError::UnknownGlyph { row: 0, column: 2, glyph: '?', .. }
        ));
    }

    #[test]
    fn test_placement_off_floor_is_an_error() {
        let ron = r#"Scenario(name: "bad", levels: [(rows: ["."])], actors: [(position: (3, 3, 0))])"#;
        let err = Scenario::from_ron_str(ron).unwrap().build().unwrap_err();
        assert!(matches!(err, ScenarioError::Core(_)));
    }

    #[test]
    fn test_directive_for_missing_actor() {
        let ron = r#"Scenario(
            name: "bad",
            levels: [(rows: ["."])],
            directives: [(tick: 1, actor: Some(4), heading: North)],
        )"#;
        let err = Scenario::from_ron_str(ron).unwrap().build().unwrap_err();
        assert!(matches!(
            err,
            ScenarioError::UnknownActorIndex { index: 4, count: 0, .. }
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = Scenario::load("/definitely/not/here.ron").unwrap_err();
        assert!(matches!(err, ScenarioError::FileNotFound(_)));
    }
}
