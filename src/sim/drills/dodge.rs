//! Dodge: obstacles cross the field from the edges; keep the cursor clear

use std::collections::BTreeMap;

use rand::Rng;

use super::{Drill, DrillKind, get_ready, go_live};
use crate::error::PhaseError;
use crate::ms_to_secs;
use crate::sim::collision::circles_overlap;
use crate::sim::entity::{Entity, EntityKind};
use crate::sim::kinematics;
use crate::sim::phase::Phase;
use crate::sim::scoring::efficiency_from_hits;
use crate::sim::spawner;
use crate::sim::state::SessionState;
use crate::sim::tick::Action;

const LIVES: u32 = 3;
/// Freeze after a hit before play resumes
const HIT_STUN_MS: u64 = 600;
pub const CURSOR_RADIUS: f32 = 8.0;
/// Extra reach added to obstacle hits on the cursor
const CURSOR_TOLERANCE: f32 = 0.0;
/// Obstacles this close to the cursor are cleared when play resumes
const SAFE_RADIUS: f32 = 120.0;
/// Obstacles clipping a corner right after spawning do not count as dodged
const MIN_TRANSIT_MS: u64 = 400;

#[derive(Debug, Clone)]
pub struct Dodge {
    lives: u32,
    dodged: u32,
    hits: u32,
}

impl Dodge {
    pub fn new() -> Self {
        Self {
            lives: LIVES,
            dodged: 0,
            hits: 0,
        }
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    fn spawn(state: &mut SessionState) {
        let SessionState {
            spawner,
            entities,
            rng,
            bounds,
            difficulty,
            clock_ms,
            ..
        } = state;
        let now = *clock_ms;
        let (speed, size) = (difficulty.speed, difficulty.size);
        spawner.spawn_due(now, entities, |id| {
            let (pos, inward) = bounds.random_edge(rng);
            let heading = inward + inward.perp() * rng.random_range(-0.6f32..0.6);
            let vel = heading.normalize_or(inward) * speed * rng.random_range(0.8f32..=1.0);
            Entity::new(id, EntityKind::Obstacle, pos, size, now).with_velocity(vel)
        });
    }
}

impl Default for Dodge {
    fn default() -> Self {
        Self::new()
    }
}

impl Drill for Dodge {
    fn kind(&self) -> DrillKind {
        DrillKind::Dodge
    }

    fn on_start(&mut self, state: &mut SessionState) -> Result<(), PhaseError> {
        get_ready(state)
    }

    fn on_prepared(&mut self, state: &mut SessionState) -> Result<(), PhaseError> {
        go_live(state)
    }

    fn on_tick(&mut self, state: &mut SessionState, dt_ms: u64) -> Result<(), PhaseError> {
        let now = state.clock_ms;
        Self::spawn(state);

        let dt = ms_to_secs(dt_ms);
        let mut dodged = 0;
        for e in state.entities.iter_mut().filter(|e| e.is_alive()) {
            kinematics::integrate(e, dt);
            if !state.bounds.contains(e.pos) {
                e.expire();
                if e.age_ms(now) >= MIN_TRANSIT_MS {
                    dodged += 1;
                }
            }
        }

        let hit = state.pointer.and_then(|p| {
            state
                .entities
                .iter_mut()
                .find(|e| e.is_alive() && circles_overlap(p, CURSOR_RADIUS, e.pos, e.size, CURSOR_TOLERANCE))
                .map(|e| {
                    e.resolve();
                    e.id
                })
        });
        spawner::sweep(&mut state.entities);

        for _ in 0..dodged {
            self.dodged += 1;
            state.success();
        }

        if let Some(id) = hit {
            self.hits += 1;
            self.lives = self.lives.saturating_sub(1);
            log::debug!("Obstacle {id} hit the cursor, {} lives left", self.lives);
            state.failure();
            let hold = (self.lives > 0).then_some(HIT_STUN_MS);
            state.conclude(hold)?;
        }
        Ok(())
    }

    fn on_resolved(&mut self, state: &mut SessionState) -> Result<(), PhaseError> {
        if let Some(p) = state.pointer {
            for e in state.entities.iter_mut() {
                if e.pos.distance(p) < SAFE_RADIUS {
                    e.expire();
                }
            }
            spawner::sweep(&mut state.entities);
        }
        state.enter(Phase::Active)?;
        state.spawner.arm(state.clock_ms);
        Ok(())
    }

    fn on_action(&mut self, _state: &mut SessionState, _action: Action) -> Result<(), PhaseError> {
        // Only the pointer position matters, and the reducer tracks it
        Ok(())
    }

    fn efficiency(&self, _state: &SessionState) -> f64 {
        efficiency_from_hits(self.dodged, self.dodged + self.hits)
    }

    fn metrics(&self, _state: &SessionState, out: &mut BTreeMap<String, f64>) {
        out.insert("dodged".into(), self.dodged as f64);
        out.insert("hits_taken".into(), self.hits as f64);
        out.insert("lives_left".into(), self.lives as f64);
    }
}
