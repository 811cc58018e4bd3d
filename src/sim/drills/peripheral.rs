//! Peripheral vision: brief flashes away from the center; click them in time

use std::collections::BTreeMap;

use glam::Vec2;
use rand::Rng;

use super::{Drill, DrillKind, get_ready, go_live};
use crate::error::PhaseError;
use crate::sim::collision::flash_hit;
use crate::sim::entity::{Entity, EntityKind};
use crate::sim::kinematics::Bounds;
use crate::sim::phase::Phase;
use crate::sim::scoring::efficiency_from_hits;
use crate::sim::spawner;
use crate::sim::state::SessionState;
use crate::sim::tick::Action;
use crate::tuning::DifficultyProfile;

const FLASH_TTL_MS: [u64; 4] = [1000, 800, 650, 500];
/// Flashes land between these fractions of the half-field away from center
const MIN_ECCENTRICITY: f32 = 0.35;
const MAX_ECCENTRICITY: f32 = 0.95;

/// Random point in the outer ring of the field
pub fn peripheral_point<R: Rng + ?Sized>(bounds: &Bounds, rng: &mut R, size: f32) -> Vec2 {
    let half = (bounds.max - bounds.min) * 0.5 - Vec2::splat(size);
    let half = half.max(Vec2::ZERO);
    let angle = rng.random::<f32>() * std::f32::consts::TAU;
    let reach = rng.random_range(MIN_ECCENTRICITY..=MAX_ECCENTRICITY);
    bounds.center() + Vec2::from_angle(angle) * half * reach
}

#[derive(Debug, Clone)]
pub struct Peripheral {
    ttl_ms: u64,
    hits: u32,
    stray_clicks: u32,
    missed: u32,
    response_ms: Vec<u64>,
}

impl Peripheral {
    pub fn new(profile: &DifficultyProfile) -> Self {
        Self {
            ttl_ms: profile.tier.pick(FLASH_TTL_MS),
            hits: 0,
            stray_clicks: 0,
            missed: 0,
            response_ms: Vec::new(),
        }
    }
}

impl Drill for Peripheral {
    fn kind(&self) -> DrillKind {
        DrillKind::Peripheral
    }

    fn on_start(&mut self, state: &mut SessionState) -> Result<(), PhaseError> {
        get_ready(state)
    }

    fn on_prepared(&mut self, state: &mut SessionState) -> Result<(), PhaseError> {
        go_live(state)
    }

    fn on_tick(&mut self, state: &mut SessionState, _dt_ms: u64) -> Result<(), PhaseError> {
        let ttl_ms = self.ttl_ms;
        let SessionState {
            spawner,
            entities,
            rng,
            bounds,
            difficulty,
            clock_ms,
            ..
        } = &mut *state;
        let now = *clock_ms;
        let size = difficulty.size;
        spawner.spawn_due(now, entities, |id| {
            let pos = peripheral_point(bounds, rng, size);
            Entity::new(id, EntityKind::Flash { ttl_ms }, pos, size, now)
        });

        let mut missed = 0;
        for e in entities.iter_mut().filter(|e| e.is_alive()) {
            if e.timed_out(now) {
                e.expire();
                missed += 1;
            }
        }
        spawner::sweep(entities);

        self.missed += missed;
        for _ in 0..missed {
            state.failure();
        }
        Ok(())
    }

    fn on_action(&mut self, state: &mut SessionState, action: Action) -> Result<(), PhaseError> {
        if state.phase() != Phase::Active {
            return Ok(());
        }
        let Action::Click { x, y } = action else {
            return Ok(());
        };
        let point = Vec2::new(x, y);
        let now = state.clock_ms;
        let hit = state
            .entities
            .iter_mut()
            .rev()
            .find(|e| flash_hit(point, e, now))
            .map(|e| {
                e.resolve();
                e.age_ms(now)
            });
        spawner::sweep(&mut state.entities);

        match hit {
            Some(age) => {
                self.hits += 1;
                self.response_ms.push(age);
                state.success();
            }
            None => {
                self.stray_clicks += 1;
                state.failure();
            }
        }
        Ok(())
    }

    fn efficiency(&self, _state: &SessionState) -> f64 {
        efficiency_from_hits(self.hits, self.hits + self.missed + self.stray_clicks)
    }

    fn metrics(&self, _state: &SessionState, out: &mut BTreeMap<String, f64>) {
        out.insert("flashes_hit".into(), self.hits as f64);
        out.insert("flashes_missed".into(), self.missed as f64);
        out.insert("stray_clicks".into(), self.stray_clicks as f64);
        if !self.response_ms.is_empty() {
            let mean = self.response_ms.iter().sum::<u64>() as f64 / self.response_ms.len() as f64;
            out.insert("mean_response_ms".into(), mean);
        }
    }
}
