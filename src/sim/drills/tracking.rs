//! Target tracking: keep the cursor on a wandering target

use std::collections::BTreeMap;

use super::{Drill, DrillKind, get_ready, go_live};
use crate::consts::MAX_SPEED_FACTOR;
use crate::error::PhaseError;
use crate::ms_to_secs;
use crate::sim::collision::point_in_circle;
use crate::sim::entity::{Entity, EntityId, EntityKind};
use crate::sim::kinematics;
use crate::sim::spawner;
use crate::sim::state::SessionState;
use crate::sim::tick::Action;

/// Scoring bucket: each full second is one success or one failure
const BUCKET_MS: u64 = 1000;
/// Per-tick chance of a heading change
const PERTURB_PROBABILITY: f64 = 0.02;
/// Extra reach around the target so the cursor tip counts
const CURSOR_TOLERANCE: f32 = 4.0;

/// Moving target plus on-target bookkeeping, shared with the multitask drill
#[derive(Debug, Clone, Default)]
pub struct TrackingCore {
    target: Option<EntityId>,
    active_ms: u64,
    on_target_ms: u64,
    bucket_ms: u64,
    bucket_on_ms: u64,
}

impl TrackingCore {
    pub fn target(&self) -> Option<EntityId> {
        self.target
    }

    pub fn on_target_ms(&self) -> u64 {
        self.on_target_ms
    }

    pub fn active_ms(&self) -> u64 {
        self.active_ms
    }

    /// On-target time over tracked time
    pub fn accuracy(&self) -> f64 {
        if self.active_ms == 0 {
            0.0
        } else {
            self.on_target_ms as f64 / self.active_ms as f64
        }
    }

    /// Place the target at the field center with a random heading
    pub fn spawn_target(&mut self, state: &mut SessionState) {
        let id = state.spawner.allocate_id();
        let vel = kinematics::random_velocity(&mut state.rng, state.difficulty.speed, 0.7);
        let target = Entity::new(
            id,
            EntityKind::Target,
            state.bounds.center(),
            state.difficulty.size,
            state.clock_ms,
        )
        .with_velocity(vel);
        if spawner::insert(&mut state.entities, target) {
            self.target = Some(id);
        }
    }

    /// Move the target and sample the cursor.
    ///
    /// Returns the verdict of a scoring bucket closed during this tick:
    /// `Some(true)` when the cursor was on target for at least half of it.
    pub fn advance(&mut self, state: &mut SessionState, dt_ms: u64) -> Option<bool> {
        let id = self.target?;
        let speed = state.difficulty.speed;
        let SessionState {
            entities,
            rng,
            bounds,
            pointer,
            ..
        } = state;
        let target = entities.iter_mut().find(|e| e.id == id)?;

        kinematics::perturb(target, rng, PERTURB_PROBABILITY, speed * 0.5, speed * MAX_SPEED_FACTOR);
        kinematics::step_bouncing(target, bounds, ms_to_secs(dt_ms), 1.0);

        let on = pointer.is_some_and(|p| point_in_circle(p, target.pos, target.size + CURSOR_TOLERANCE));
        self.active_ms += dt_ms;
        self.bucket_ms += dt_ms;
        if on {
            self.on_target_ms += dt_ms;
            self.bucket_on_ms += dt_ms;
        }

        if self.bucket_ms < BUCKET_MS {
            return None;
        }
        let verdict = self.bucket_on_ms * 2 >= self.bucket_ms;
        self.bucket_ms = 0;
        self.bucket_on_ms = 0;
        Some(verdict)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Tracking {
    core: TrackingCore,
}

impl Tracking {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Drill for Tracking {
    fn kind(&self) -> DrillKind {
        DrillKind::Tracking
    }

    fn on_start(&mut self, state: &mut SessionState) -> Result<(), PhaseError> {
        get_ready(state)
    }

    fn on_prepared(&mut self, state: &mut SessionState) -> Result<(), PhaseError> {
        go_live(state)?;
        self.core.spawn_target(state);
        Ok(())
    }

    fn on_tick(&mut self, state: &mut SessionState, dt_ms: u64) -> Result<(), PhaseError> {
        match self.core.advance(state, dt_ms) {
            Some(true) => {
                state.success();
            }
            Some(false) => state.failure(),
            None => {}
        }
        Ok(())
    }

    fn on_action(&mut self, _state: &mut SessionState, _action: Action) -> Result<(), PhaseError> {
        Ok(())
    }

    fn efficiency(&self, _state: &SessionState) -> f64 {
        self.core.accuracy()
    }

    fn metrics(&self, _state: &SessionState, out: &mut BTreeMap<String, f64>) {
        out.insert("on_target_ms".into(), self.core.on_target_ms() as f64);
        out.insert("tracked_ms".into(), self.core.active_ms() as f64);
        out.insert("accuracy".into(), self.core.accuracy());
    }
}
