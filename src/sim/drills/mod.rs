//! Drill variants
//!
//! Each drill is a set of rules plugged into the shared reducer. Drills own
//! their private bookkeeping (lives, sequences, attempts) and mutate the
//! session only through [`SessionState`].

mod cards;
mod dodge;
mod last_hit;
mod multitask;
mod peripheral;
mod reaction;
mod recall;
mod skillshot;
mod tracking;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use cards::Cards;
pub use dodge::{CURSOR_RADIUS, Dodge};
pub use last_hit::{LastHit, kill_threshold};
pub use multitask::{Multitask, PROMPT_KEYS};
pub use peripheral::{Peripheral, peripheral_point};
pub use reaction::{Reaction, ReactionTuning, TooEarlyPolicy};
pub use recall::Recall;
pub use skillshot::{PROJECTILE_SPEED, Skillshot, launch_point};
pub use tracking::{Tracking, TrackingCore};

use super::phase::{self, Phase, TransitionTable};
use super::scheduler::TimerPurpose;
use super::state::SessionState;
use super::tick::Action;
use crate::consts::PREP_COUNTDOWN_MS;
use crate::error::{ConfigError, PhaseError};
use crate::tuning::DifficultyProfile;

/// Which drill a session runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrillKind {
    Dodge,
    Tracking,
    Skillshot,
    Recall,
    Cards,
    Reaction,
    Multitask,
    Peripheral,
    LastHit,
}

impl DrillKind {
    pub const ALL: [DrillKind; 9] = [
        DrillKind::Dodge,
        DrillKind::Tracking,
        DrillKind::Skillshot,
        DrillKind::Recall,
        DrillKind::Cards,
        DrillKind::Reaction,
        DrillKind::Multitask,
        DrillKind::Peripheral,
        DrillKind::LastHit,
    ];

    /// Identifier reported in score records
    pub fn widget_id(&self) -> &'static str {
        match self {
            DrillKind::Dodge => "dodge",
            DrillKind::Tracking => "target-tracking",
            DrillKind::Skillshot => "skillshot",
            DrillKind::Recall => "pattern-recall",
            DrillKind::Cards => "card-match",
            DrillKind::Reaction => "reaction-time",
            DrillKind::Multitask => "multitask",
            DrillKind::Peripheral => "peripheral-vision",
            DrillKind::LastHit => "last-hit",
        }
    }

    /// Continuous drills run the 16 ms tick driver; the rest chain timers
    pub fn is_continuous(&self) -> bool {
        !matches!(self, DrillKind::Recall | DrillKind::Cards | DrillKind::Reaction)
    }

    pub fn transitions(&self) -> TransitionTable {
        match self {
            DrillKind::Recall => phase::LEVELED,
            DrillKind::Reaction => phase::ATTEMPTS,
            _ => phase::CONTINUOUS,
        }
    }
}

impl fmt::Display for DrillKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.widget_id())
    }
}

impl FromStr for DrillKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase().replace('_', "-");
        DrillKind::ALL
            .into_iter()
            .find(|k| {
                k.widget_id() == needle
                    || format!("{k:?}").to_lowercase() == needle.replace('-', "")
            })
            .ok_or_else(|| ConfigError::UnknownDrill(s.to_string()))
    }
}

/// Per-variant rules.
///
/// Hooks run only while the session is live (Preparing, Active or Resolving);
/// timer hooks run only for timers scheduled in the current phase epoch.
pub trait Drill {
    fn kind(&self) -> DrillKind;

    /// Session entered Preparing for the first time
    fn on_start(&mut self, state: &mut SessionState) -> Result<(), PhaseError>;

    /// `PrepareDone` fired
    fn on_prepared(&mut self, _state: &mut SessionState) -> Result<(), PhaseError> {
        Ok(())
    }

    /// `ResolveDone` fired
    fn on_resolved(&mut self, state: &mut SessionState) -> Result<(), PhaseError> {
        state.enter(Phase::Active)
    }

    /// `SequenceStep` fired
    fn on_step(&mut self, _state: &mut SessionState) -> Result<(), PhaseError> {
        Ok(())
    }

    /// `WindowClosed` fired
    fn on_window(&mut self, _state: &mut SessionState) -> Result<(), PhaseError> {
        Ok(())
    }

    /// Simulation tick while Active, `dt_ms` already clamped
    fn on_tick(&mut self, _state: &mut SessionState, _dt_ms: u64) -> Result<(), PhaseError> {
        Ok(())
    }

    fn on_action(&mut self, state: &mut SessionState, action: Action) -> Result<(), PhaseError>;

    /// Accuracy in [0, 1] for the final adjustment
    fn efficiency(&self, state: &SessionState) -> f64;

    /// Drill-specific entries for the score record
    fn metrics(&self, _state: &SessionState, _out: &mut BTreeMap<String, f64>) {}

    /// `(current_step, total_steps)`; timed drills count budget seconds
    fn progress(&self, state: &SessionState) -> (u32, u32) {
        let total = state.difficulty.session_budget_ms;
        let used = total.saturating_sub(state.remaining_ms);
        ((used / 1000) as u32, total.div_ceil(1000) as u32)
    }
}

/// Build the stock rules for a drill
pub fn create(kind: DrillKind, profile: &DifficultyProfile) -> Box<dyn Drill> {
    match kind {
        DrillKind::Dodge => Box::new(Dodge::new()),
        DrillKind::Tracking => Box::new(Tracking::new()),
        DrillKind::Skillshot => Box::new(Skillshot::new(profile)),
        DrillKind::Recall => Box::new(Recall::new(profile)),
        DrillKind::Cards => Box::new(Cards::new()),
        DrillKind::Reaction => Box::new(Reaction::new(profile)),
        DrillKind::Multitask => Box::new(Multitask::new(profile)),
        DrillKind::Peripheral => Box::new(Peripheral::new(profile)),
        DrillKind::LastHit => Box::new(LastHit::new(profile)),
    }
}

/// Get-ready countdown shared by the continuous drills
fn get_ready(state: &mut SessionState) -> Result<(), PhaseError> {
    state.schedule(TimerPurpose::PrepareDone, PREP_COUNTDOWN_MS);
    Ok(())
}

/// Preparing → Active, starting the spawn clock
fn go_live(state: &mut SessionState) -> Result<(), PhaseError> {
    state.enter(Phase::Active)?;
    state.spawner.arm(state.clock_ms);
    Ok(())
}
