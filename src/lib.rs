//! Drill Sim - deterministic engine for short cognitive-training drills
//!
//! Core modules:
//! - `sim`: Deterministic simulation (phases, scheduler, spawning, kinematics, scoring)
//! - `session`: Single-writer session driver that owns state, drivers and RNG
//! - `report`: Score records and the outbound event boundary
//! - `tuning`: Data-driven difficulty tables
//! - `config`: Inbound host configuration
//! - `platform`: Browser/native platform abstraction

pub mod autoplay;
pub mod config;
pub mod error;
pub mod highscores;
pub mod platform;
pub mod report;
pub mod session;
pub mod sim;
pub mod tuning;

pub use config::{ResolvedConfig, SessionConfig};
pub use error::{ConfigError, PhaseError, SessionError, SubmitError};
pub use highscores::HighScores;
pub use report::{Progress, ScoreRecord, ScoreSubmitter, SessionObserver};
pub use session::Session;
pub use sim::{Action, DrillKind, Phase};
pub use tuning::{DifficultyProfile, DifficultyTier};

/// Engine configuration constants
pub mod consts {
    /// Nominal tick driver period (~60 Hz)
    pub const TICK_PERIOD_MS: u64 = 16;
    /// Session countdown driver period (1 Hz)
    pub const COUNTDOWN_PERIOD_MS: u64 = 1000;
    /// Largest tick delta fed to kinematics (tab switches, debugger pauses)
    pub const MAX_FRAME_DT_MS: u64 = 100;

    /// Play field dimensions (presentation scales to fit)
    pub const FIELD_WIDTH: f32 = 800.0;
    pub const FIELD_HEIGHT: f32 = 600.0;

    /// Base points for one successful event before the tier multiplier
    pub const BASE_POINTS: f64 = 100.0;

    /// Get-ready countdown for continuous drills
    pub const PREP_COUNTDOWN_MS: u64 = 3000;
    /// Velocity perturbations never push speed past this multiple of tier speed
    pub const MAX_SPEED_FACTOR: f32 = 1.5;
}

/// Milliseconds to seconds for kinematics
#[inline]
pub fn ms_to_secs(ms: u64) -> f32 {
    ms as f32 / 1000.0
}

/// Ratio that treats an empty denominator as zero
#[inline]
pub fn ratio(numerator: u32, denominator: u32) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
