//! Reaction time: wait for the signal, then respond as fast as possible.
//!
//! Every attempt starts with a random wait in Preparing. Acting during the
//! wait is a "too early" outcome and goes straight to Resolving.

use std::collections::BTreeMap;

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{Drill, DrillKind};
use crate::error::PhaseError;
use crate::sim::entity::{Entity, EntityId, EntityKind};
use crate::sim::phase::Phase;
use crate::sim::scheduler::TimerPurpose;
use crate::sim::scoring::efficiency_from_hits;
use crate::sim::spawner;
use crate::sim::state::SessionState;
use crate::sim::tick::Action;
use crate::tuning::DifficultyProfile;

/// Response window after the signal appears
const WINDOW_MS: [u64; 4] = [1500, 1200, 1000, 800];

/// What a premature response does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TooEarlyPolicy {
    /// Record a failure and end the session
    EndSession,
    /// Record a failure and restart the wait of the same attempt
    RestartWait,
}

/// Timing knobs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReactionTuning {
    pub attempts: u32,
    pub min_wait_ms: u64,
    pub max_wait_ms: u64,
    pub window_ms: u64,
    /// Result display between attempts
    pub hold_ms: u64,
    pub too_early: TooEarlyPolicy,
}

impl ReactionTuning {
    pub fn for_profile(profile: &DifficultyProfile) -> Self {
        Self {
            attempts: 5,
            min_wait_ms: 1500,
            max_wait_ms: profile.spawn_interval_ms.max(1500),
            window_ms: profile.tier.pick(WINDOW_MS),
            hold_ms: 1000,
            too_early: TooEarlyPolicy::RestartWait,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reaction {
    tuning: ReactionTuning,
    attempt: u32,
    signal: Option<(EntityId, u64)>,
    times_ms: Vec<u64>,
    too_early: u32,
    no_response: u32,
}

impl Reaction {
    pub fn new(profile: &DifficultyProfile) -> Self {
        Self::with_tuning(ReactionTuning::for_profile(profile))
    }

    pub fn with_tuning(tuning: ReactionTuning) -> Self {
        Self {
            tuning,
            attempt: 0,
            signal: None,
            times_ms: Vec::new(),
            too_early: 0,
            no_response: 0,
        }
    }

    pub fn tuning(&self) -> &ReactionTuning {
        &self.tuning
    }

    /// Reaction times of every answered attempt
    pub fn times_ms(&self) -> &[u64] {
        &self.times_ms
    }

    fn start_wait(&self, state: &mut SessionState) {
        let (lo, hi) = (self.tuning.min_wait_ms, self.tuning.max_wait_ms.max(self.tuning.min_wait_ms));
        let wait = state.rng.random_range(lo..=hi);
        log::trace!("Reaction: attempt {} waits {wait} ms", self.attempt + 1);
        state.schedule(TimerPurpose::PrepareDone, wait);
    }

    fn clear_signal(&mut self, state: &mut SessionState) {
        if let Some((id, _)) = self.signal.take()
            && let Some(e) = state.entity_mut(id)
        {
            e.expire();
        }
        spawner::sweep(&mut state.entities);
    }

    /// Close the current attempt; the last one completes the session
    fn end_attempt(&mut self, state: &mut SessionState) -> Result<(), PhaseError> {
        self.attempt += 1;
        state.round = self.attempt;
        let hold = (self.attempt < self.tuning.attempts).then_some(self.tuning.hold_ms);
        state.conclude(hold)
    }

    fn is_response(action: Action) -> bool {
        !matches!(action, Action::PointerMove { .. })
    }
}

impl Drill for Reaction {
    fn kind(&self) -> DrillKind {
        DrillKind::Reaction
    }

    fn on_start(&mut self, state: &mut SessionState) -> Result<(), PhaseError> {
        state.round = 0;
        self.start_wait(state);
        Ok(())
    }

    fn on_prepared(&mut self, state: &mut SessionState) -> Result<(), PhaseError> {
        state.enter(Phase::Active)?;
        let id = state.spawner.allocate_id();
        let signal = Entity::new(
            id,
            EntityKind::Target,
            state.bounds.center(),
            state.difficulty.size,
            state.clock_ms,
        );
        spawner::insert(&mut state.entities, signal);
        self.signal = Some((id, state.clock_ms));
        state.schedule(TimerPurpose::WindowClosed, self.tuning.window_ms);
        Ok(())
    }

    fn on_action(&mut self, state: &mut SessionState, action: Action) -> Result<(), PhaseError> {
        if !Self::is_response(action) {
            return Ok(());
        }
        match state.phase() {
            Phase::Preparing => {
                self.too_early += 1;
                log::debug!("Reaction: too early on attempt {}", self.attempt + 1);
                state.failure();
                match self.tuning.too_early {
                    TooEarlyPolicy::EndSession => state.conclude(None),
                    TooEarlyPolicy::RestartWait => state.conclude(Some(self.tuning.hold_ms)),
                }
            }
            Phase::Active => {
                let Some((id, shown_at)) = self.signal else {
                    return Ok(());
                };
                let elapsed = state.clock_ms.saturating_sub(shown_at);
                self.times_ms.push(elapsed);
                if let Some(e) = state.entity_mut(id) {
                    e.resolve();
                }
                self.clear_signal(state);
                log::debug!("Reaction: {elapsed} ms");
                state.success();
                self.end_attempt(state)
            }
            _ => Ok(()),
        }
    }

    fn on_window(&mut self, state: &mut SessionState) -> Result<(), PhaseError> {
        if state.phase() != Phase::Active {
            return Ok(());
        }
        self.no_response += 1;
        self.clear_signal(state);
        state.failure();
        self.end_attempt(state)
    }

    fn on_resolved(&mut self, state: &mut SessionState) -> Result<(), PhaseError> {
        state.enter(Phase::Preparing)?;
        self.start_wait(state);
        Ok(())
    }

    fn efficiency(&self, state: &SessionState) -> f64 {
        efficiency_from_hits(state.tally.success_count, state.tally.attempts())
    }

    fn metrics(&self, _state: &SessionState, out: &mut BTreeMap<String, f64>) {
        if let Some(best) = self.times_ms.iter().min() {
            out.insert("best_reaction_ms".into(), *best as f64);
        }
        if !self.times_ms.is_empty() {
            let mean = self.times_ms.iter().sum::<u64>() as f64 / self.times_ms.len() as f64;
            out.insert("mean_reaction_ms".into(), mean);
        }
        out.insert("too_early".into(), self.too_early as f64);
        out.insert("no_response".into(), self.no_response as f64);
        out.insert("attempts".into(), self.attempt as f64);
    }

    fn progress(&self, _state: &SessionState) -> (u32, u32) {
        (self.attempt, self.tuning.attempts)
    }
}
