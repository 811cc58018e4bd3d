//! Session state and the read-only snapshot handed to presentation
//!
//! `SessionState` is the single mutable aggregate of a running drill. Only
//! the session writes it. Side effects that need the scheduler or the outbound
//! boundary are queued in `effects` and drained by the session after each event.

use std::collections::BTreeMap;

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::Serialize;

use super::drills::DrillKind;
use super::entity::Entity;
use super::kinematics::Bounds;
use super::phase::{Phase, PhaseMachine};
use super::scheduler::{TimerPurpose, TimerRequest};
use super::scoring::Tally;
use super::spawner::Spawner;
use crate::config::ResolvedConfig;
use crate::error::PhaseError;
use crate::tuning::DifficultyProfile;

/// Work queued for the session to carry out after the current event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Start a one-shot phase timer
    Timer(TimerRequest),
    /// First entry into Active: start the 1 Hz countdown
    StartCountdown,
    /// A scored event happened (progress notification)
    Scored { success: bool, points: u64 },
    /// Terminal transition reached; emit the score record
    Completed,
}

/// All mutable state of one session
#[derive(Debug, Clone)]
pub struct SessionState {
    pub kind: DrillKind,
    pub seed: u64,
    pub rng: Pcg32,
    pub difficulty: DifficultyProfile,
    pub bounds: Bounds,
    pub machine: PhaseMachine,

    /// Simulation clock at the event being handled
    pub clock_ms: u64,
    pub started_at_ms: u64,
    /// When play last resumed into Active from another phase
    pub active_since_ms: u64,
    /// Budget left on the countdown
    pub remaining_ms: u64,
    pub countdown_started: bool,

    pub tally: Tally,
    pub entities: Vec<Entity>,
    pub spawner: Spawner,
    /// Level, attempt or wave number, depending on the drill
    pub round: u32,
    /// Last known cursor position
    pub pointer: Option<Vec2>,

    pub effects: Vec<Effect>,
    /// A terminal outcome was recorded; complete after the current event
    pub finish_pending: bool,
    pub final_score: Option<u64>,
    /// Filled on completion
    pub metrics: BTreeMap<String, f64>,
}

impl SessionState {
    pub fn new(config: &ResolvedConfig, now_ms: u64) -> Self {
        let profile = config.profile;
        Self {
            kind: config.kind,
            seed: config.seed,
            rng: Pcg32::seed_from_u64(config.seed),
            difficulty: profile,
            bounds: Bounds::default(),
            machine: PhaseMachine::new(config.kind.transitions()),
            clock_ms: now_ms,
            started_at_ms: now_ms,
            active_since_ms: now_ms,
            remaining_ms: profile.session_budget_ms,
            countdown_started: false,
            tally: Tally::default(),
            entities: Vec::new(),
            spawner: Spawner::new(profile.spawn_interval_ms, profile.capacity),
            round: 0,
            pointer: None,
            effects: Vec::new(),
            finish_pending: false,
            final_score: None,
            metrics: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.machine.phase()
    }

    #[inline]
    pub fn now(&self) -> u64 {
        self.clock_ms
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.clock_ms.saturating_sub(self.started_at_ms)
    }

    /// Transition the phase machine.
    ///
    /// The first entry into Active queues the countdown start.
    pub fn enter(&mut self, to: Phase) -> Result<(), PhaseError> {
        if let Err(err) = self.machine.transition(to, self.clock_ms) {
            log::warn!("{:?}: rejected transition: {err}", self.kind);
            return Err(err);
        }
        if to == Phase::Active && !self.countdown_started {
            self.countdown_started = true;
            self.effects.push(Effect::StartCountdown);
        }
        Ok(())
    }

    /// Queue a one-shot timer bound to the current phase epoch
    pub fn schedule(&mut self, purpose: TimerPurpose, delay_ms: u64) {
        self.effects.push(Effect::Timer(TimerRequest {
            purpose,
            delay_ms,
            epoch: self.machine.epoch(),
        }));
    }

    /// Move into Resolving after an outcome.
    ///
    /// With a hold, play resumes when `ResolveDone` fires; without one the
    /// session completes once the current event has been handled.
    pub fn conclude(&mut self, hold_ms: Option<u64>) -> Result<(), PhaseError> {
        self.enter(Phase::Resolving)?;
        match hold_ms {
            Some(ms) => self.schedule(TimerPurpose::ResolveDone, ms),
            None => self.finish_pending = true,
        }
        Ok(())
    }

    /// Resolve outcomes scored mid-play and resume Active at once
    pub fn settle(&mut self) -> Result<(), PhaseError> {
        self.enter(Phase::Resolving)?;
        log::trace!("{:?}: outcome resolved in play", self.kind);
        self.enter(Phase::Active)
    }

    /// Record a success at the tier multiplier
    pub fn success(&mut self) -> u64 {
        let points = self.tally.success(self.difficulty.scoring_multiplier);
        log::debug!(
            "{:?}: +{points} (score {}, {} hits)",
            self.kind,
            self.tally.score,
            self.tally.success_count
        );
        self.effects.push(Effect::Scored {
            success: true,
            points,
        });
        points
    }

    pub fn failure(&mut self) {
        self.tally.failure();
        log::debug!("{:?}: miss ({} total)", self.kind, self.tally.failure_count);
        self.effects.push(Effect::Scored {
            success: false,
            points: 0,
        });
    }

    pub fn entity(&self, id: u32) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn entity_mut(&mut self, id: u32) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.id == id)
    }

    /// Read-only view for the presentation layer
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            widget_id: self.kind.widget_id(),
            phase: self.phase(),
            elapsed_ms: self.elapsed_ms(),
            remaining_ms: self.remaining_ms,
            score: self.tally.score,
            success_count: self.tally.success_count,
            failure_count: self.tally.failure_count,
            round: self.round,
            entities: self.entities.clone(),
            pointer: self.pointer,
            final_score: self.final_score,
        }
    }
}

/// Serializable view of a session, painted by the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub widget_id: &'static str,
    pub phase: Phase,
    pub elapsed_ms: u64,
    pub remaining_ms: u64,
    pub score: u64,
    pub success_count: u32,
    pub failure_count: u32,
    pub round: u32,
    pub entities: Vec<Entity>,
    pub pointer: Option<Vec2>,
    pub final_score: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::DifficultyTier;

    fn state(kind: DrillKind) -> SessionState {
        SessionState::new(&ResolvedConfig::new(kind, DifficultyTier::Medium, 5), 0)
    }

    #[test]
    fn test_first_active_starts_countdown_once() {
        let mut s = state(DrillKind::Cards);
        s.enter(Phase::Preparing).unwrap();
        s.enter(Phase::Active).unwrap();
        s.conclude(Some(300)).unwrap();
        s.enter(Phase::Active).unwrap();
        let starts = s
            .effects
            .iter()
            .filter(|e| matches!(e, Effect::StartCountdown))
            .count();
        assert_eq!(starts, 1);
    }

    #[test]
    fn test_timers_carry_current_epoch() {
        let mut s = state(DrillKind::Reaction);
        s.enter(Phase::Preparing).unwrap();
        s.schedule(TimerPurpose::PrepareDone, 2000);
        let epoch = s.machine.epoch();
        assert_eq!(
            s.effects.last(),
            Some(&Effect::Timer(TimerRequest {
                purpose: TimerPurpose::PrepareDone,
                delay_ms: 2000,
                epoch,
            }))
        );
    }

    #[test]
    fn test_conclude_without_hold_marks_finish() {
        let mut s = state(DrillKind::Recall);
        s.enter(Phase::Preparing).unwrap();
        s.enter(Phase::Active).unwrap();
        s.conclude(None).unwrap();
        assert!(s.finish_pending);
        assert_eq!(s.phase(), Phase::Resolving);
    }

    #[test]
    fn test_settle_returns_to_active() {
        let mut s = state(DrillKind::Recall);
        s.enter(Phase::Preparing).unwrap();
        s.enter(Phase::Active).unwrap();
        let epoch = s.machine.epoch();
        s.settle().unwrap();
        assert_eq!(s.phase(), Phase::Active);
        assert_eq!(s.machine.epoch(), epoch.wrapping_add(2));
        assert!(!s.finish_pending);
    }

    #[test]
    fn test_rejected_transition_leaves_state() {
        let mut s = state(DrillKind::Dodge);
        assert!(s.enter(Phase::Active).is_err());
        assert_eq!(s.phase(), Phase::Idle);
        assert!(s.effects.is_empty());
    }

    #[test]
    fn test_success_uses_tier_multiplier() {
        let mut s = state(DrillKind::Peripheral);
        assert_eq!(s.success(), 125);
        s.failure();
        let snap = s.snapshot();
        assert_eq!(snap.score, 125);
        assert_eq!(snap.failure_count, 1);
        assert_eq!(snap.widget_id, DrillKind::Peripheral.widget_id());
    }
}
