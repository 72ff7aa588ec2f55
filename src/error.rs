//! Error types for contact frequency analysis.

use thiserror::Error;

/// Errors raised during setup, frame processing, or finalization.
///
/// Configuration problems are caught once at setup; data problems surface
/// from the frame that triggered them; [`AnalysisError::NoFrames`] is the
/// only finalization error.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// A selection resolved to zero atoms.
    #[error("the {0} selection matched no atoms")]
    EmptySelection(&'static str),

    /// The distance cutoff must be strictly positive.
    #[error("distance cutoff must be positive, got {0}")]
    InvalidCutoff(f64),

    /// The unit cell descriptor cannot describe a valid simulation box.
    #[error("malformed box dimensions: {0}")]
    MalformedBox(String),

    /// A frame's coordinate count does not match the topology it is
    /// analyzed against.
    #[error("frame has {got} positions but the topology expects {expected}")]
    FrameMismatch {
        /// Number of positions the topology requires.
        expected: usize,
        /// Number of positions the frame carried.
        got: usize,
    },

    /// Finalization was requested before any frame was processed.
    #[error("no frames were processed; cannot normalize contact counts")]
    NoFrames,

    /// The topology itself is inconsistent.
    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    /// The structure file could not be parsed.
    #[error("failed to read structure: {0}")]
    Structure(String),
}
