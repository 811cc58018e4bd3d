//! Event reducer
//!
//! Every change to a session goes through [`step`]: driver firings from the
//! scheduler and user actions alike. Drills only see the events their phase
//! accepts, and the terminal transition is finalized here exactly once.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::drills::Drill;
use super::entity::EntityId;
use super::phase::Phase;
use super::scheduler::TimerPurpose;
use super::scoring;
use super::state::{Effect, SessionState};
use crate::consts::MAX_FRAME_DT_MS;
use crate::error::PhaseError;

/// User input forwarded by the host
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    /// Cursor moved (field coordinates)
    PointerMove { x: f32, y: f32 },
    /// Click or tap (field coordinates)
    Click { x: f32, y: f32 },
    /// Direct selection of an entity (keyboard or assistive input)
    Select { id: EntityId },
    /// Key press
    Key { key: char },
}

impl Action {
    pub fn pointer_move(p: Vec2) -> Self {
        Action::PointerMove { x: p.x, y: p.y }
    }

    pub fn click(p: Vec2) -> Self {
        Action::Click { x: p.x, y: p.y }
    }

    /// Field position carried by the action, if any
    pub fn point(&self) -> Option<Vec2> {
        match *self {
            Action::PointerMove { x, y } | Action::Click { x, y } => Some(Vec2::new(x, y)),
            Action::Select { .. } | Action::Key { .. } => None,
        }
    }
}

/// One input to the reducer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimEvent {
    Tick { dt_ms: u64 },
    /// Countdown step; usually a full second, shorter at the end of the budget
    Countdown { elapsed_ms: u64 },
    Timer { purpose: TimerPurpose, epoch: u32 },
    Action(Action),
}

/// Enter Preparing and let the drill set up its first round
pub fn begin(state: &mut SessionState, drill: &mut dyn Drill) -> Result<(), PhaseError> {
    state.enter(Phase::Preparing)?;
    log::info!(
        "{:?} session started ({:?}, seed {})",
        state.kind,
        state.difficulty.tier,
        state.seed
    );
    drill.on_start(state)
}

/// Apply one event.
///
/// Outcomes a drill scores while staying in Active (continuous play, partial
/// recall input) are passed through Resolving and straight back before the
/// event returns.
pub fn step(state: &mut SessionState, drill: &mut dyn Drill, event: SimEvent) {
    let phase = state.phase();
    if matches!(phase, Phase::Idle | Phase::Complete) {
        log::trace!("{:?}: dropping {:?} in {:?}", state.kind, event, phase);
        return;
    }
    let scored_before = state.tally.attempts();

    let result = match event {
        SimEvent::Tick { dt_ms } => {
            if phase == Phase::Active {
                // Time frozen in Preparing/Resolving never reaches the entities
                let live_ms = state.clock_ms.saturating_sub(state.active_since_ms);
                drill.on_tick(state, dt_ms.min(MAX_FRAME_DT_MS).min(live_ms))
            } else {
                Ok(())
            }
        }
        SimEvent::Countdown { elapsed_ms } => {
            countdown(state, elapsed_ms);
            Ok(())
        }
        SimEvent::Timer { purpose, epoch } => {
            if epoch != state.machine.epoch() {
                log::debug!("{:?}: stale {:?} timer discarded", state.kind, purpose);
                return;
            }
            match purpose {
                TimerPurpose::PrepareDone => drill.on_prepared(state),
                TimerPurpose::ResolveDone => drill.on_resolved(state),
                TimerPurpose::SequenceStep => drill.on_step(state),
                TimerPurpose::WindowClosed => drill.on_window(state),
            }
        }
        SimEvent::Action(action) => {
            if let Some(p) = action.point() {
                state.pointer = Some(state.bounds.clamp(p));
            }
            drill.on_action(state, action)
        }
    };

    if let Err(err) = result {
        log::warn!("{:?}: {err}", state.kind);
    }
    if phase != Phase::Active && state.phase() == Phase::Active {
        state.active_since_ms = state.clock_ms;
    }
    if state.phase() == Phase::Active
        && !state.finish_pending
        && state.tally.attempts() != scored_before
        && let Err(err) = state.settle()
    {
        log::warn!("{:?}: {err}", state.kind);
    }
    if state.finish_pending {
        finish(state, drill);
    }
}

/// One countdown step. At zero the session ends whatever is in flight.
fn countdown(state: &mut SessionState, elapsed_ms: u64) {
    state.remaining_ms = state.remaining_ms.saturating_sub(elapsed_ms);
    if state.remaining_ms > 0 {
        return;
    }
    log::info!(
        "{:?}: time up with {} entities alive",
        state.kind,
        state.entities.iter().filter(|e| e.is_alive()).count()
    );
    state.machine.force_resolving(state.clock_ms);
    state.finish_pending = true;
}

/// Resolving → Complete: compute the final score and queue the record
pub fn finish(state: &mut SessionState, drill: &mut dyn Drill) {
    state.finish_pending = false;
    if state.machine.is_complete() {
        return;
    }
    if state.phase() != Phase::Resolving {
        state.machine.force_resolving(state.clock_ms);
    }

    let efficiency = drill.efficiency(state);
    let final_score = scoring::final_score(state.tally.score, efficiency);

    let mut metrics = std::mem::take(&mut state.metrics);
    metrics.insert("successes".into(), state.tally.success_count as f64);
    metrics.insert("failures".into(), state.tally.failure_count as f64);
    metrics.insert("efficiency".into(), efficiency);
    metrics.insert("raw_score".into(), state.tally.score as f64);
    drill.metrics(state, &mut metrics);
    state.metrics = metrics;

    if state.enter(Phase::Complete).is_err() {
        return;
    }
    state.final_score = Some(final_score);
    log::info!(
        "{:?} complete: score {} -> {} (efficiency {:.2})",
        state.kind,
        state.tally.score,
        final_score,
        efficiency
    );
    state.effects.push(Effect::Completed);
}
