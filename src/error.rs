//! Error types for configuration, phase control and score submission

use thiserror::Error;

use crate::sim::{DrillKind, Phase};

/// Host configuration problems. Raised before `start()`, never defaulted silently.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("unknown difficulty tier `{0}` (expected easy, medium, hard or expert)")]
    UnknownTier(String),
    #[error("unknown drill `{0}`")]
    UnknownDrill(String),
    #[error("session budget must be positive, got {0} ms")]
    NonPositiveBudget(i64),
    #[error("malformed session config: {0}")]
    Malformed(String),
    #[error("difficulty table for {drill:?} is not monotonic: {reason}")]
    NonMonotonic { drill: DrillKind, reason: String },
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Malformed(err.to_string())
    }
}

/// Rejected phase transitions
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PhaseError {
    #[error("illegal phase transition {from:?} -> {to:?}")]
    Illegal { from: Phase, to: Phase },
    #[error("cannot enter Active before Preparing has completed")]
    NotPrepared,
    #[error("session already completed; reset() required")]
    AlreadyComplete,
}

/// Failures reported by the external score boundary
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SubmitError {
    #[error("score submission rejected: {0}")]
    Rejected(String),
    #[error("score service unreachable: {0}")]
    Unreachable(String),
}

/// Session lifecycle errors surfaced to the host
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Phase(#[from] PhaseError),
}
