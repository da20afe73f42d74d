//! Error types for the tick core.
//!
//! Most of the simulation path degrades silently (boolean setters, safe
//! defaults for stale handles). These errors cover the cases where a caller
//! needs to know *why* something was refused.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Top-level error type for the tick core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Actor handle is not known to this configurator.
    #[error("Unknown actor handle: {0}")]
    UnknownActor(u32),

    /// AIU id is not present in the catalog.
    #[error("Unknown AIU id: {0}")]
    UnknownAiu(u32),

    /// Actor does not satisfy an AIU module's prerequisites.
    #[error("AIU {aiu} prerequisites not met: {reason}")]
    PrerequisiteNotMet {
        /// AIU id that was requested.
        aiu: u32,
        /// Which prerequisite failed.
        reason: String,
    },

    /// A map placement was refused (no floor, blocked, or occupied).
    #[error("Placement rejected at ({x}, {y}, level {level})")]
    PlacementRejected {
        /// Cell x coordinate.
        x: i32,
        /// Cell y coordinate.
        y: i32,
        /// Cell level.
        level: i32,
    },

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path (or label) of the data that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}
