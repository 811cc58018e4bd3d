//! Skillshot: fire projectiles from the bottom of the field at drifting targets

use std::collections::BTreeMap;

use glam::Vec2;

use super::{Drill, DrillKind, get_ready, go_live};
use crate::error::PhaseError;
use crate::ms_to_secs;
use crate::sim::collision::circles_overlap;
use crate::sim::entity::{Entity, EntityId, EntityKind};
use crate::sim::kinematics::{self, Bounds};
use crate::sim::phase::Phase;
use crate::sim::scoring::efficiency_from_hits;
use crate::sim::spawner;
use crate::sim::state::SessionState;
use crate::sim::tick::Action;
use crate::tuning::DifficultyProfile;

pub const PROJECTILE_SPEED: f32 = 900.0;
const PROJECTILE_RADIUS: f32 = 5.0;
const MAX_IN_FLIGHT: usize = 3;
/// How long a target stays up before it counts as missed
const TARGET_LIFETIME_MS: [u64; 4] = [4000, 3500, 3000, 2500];
/// Targets spawn in the upper part of the field
const TARGET_ZONE: f32 = 0.66;

/// Where shots leave from
pub fn launch_point(bounds: &Bounds) -> Vec2 {
    Vec2::new(bounds.center().x, bounds.max.y - 20.0)
}

fn is_target(e: &Entity) -> bool {
    e.kind == EntityKind::Target
}

#[derive(Debug, Clone)]
pub struct Skillshot {
    target_lifetime_ms: u64,
    shots: u32,
    hits: u32,
    missed_shots: u32,
    expired_targets: u32,
}

impl Skillshot {
    pub fn new(profile: &DifficultyProfile) -> Self {
        Self {
            target_lifetime_ms: profile.tier.pick(TARGET_LIFETIME_MS),
            shots: 0,
            hits: 0,
            missed_shots: 0,
            expired_targets: 0,
        }
    }

    fn spawn_target(state: &mut SessionState) {
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
        let zone = Bounds {
            min: bounds.min,
            max: Vec2::new(bounds.max.x, bounds.min.y + bounds.height() * TARGET_ZONE),
        };
        spawner.spawn_due_where(now, entities, is_target, |id| {
            let pos = zone.random_interior(rng, difficulty.size);
            let vel = kinematics::random_velocity(rng, difficulty.speed, 0.5);
            Entity::new(id, EntityKind::Target, pos, difficulty.size, now).with_velocity(vel)
        });
    }

    fn fire(&mut self, state: &mut SessionState, aim: Vec2) {
        let in_flight = state
            .entities
            .iter()
            .filter(|e| e.is_alive() && e.kind == EntityKind::Projectile)
            .count();
        if in_flight >= MAX_IN_FLIGHT {
            log::trace!("Shot ignored: {in_flight} projectiles in flight");
            return;
        }
        let origin = launch_point(&state.bounds);
        let Some(dir) = (aim - origin).try_normalize() else {
            return;
        };
        let id = state.spawner.allocate_id();
        let shot = Entity::new(id, EntityKind::Projectile, origin, PROJECTILE_RADIUS, state.clock_ms)
            .with_velocity(dir * PROJECTILE_SPEED);
        if spawner::insert(&mut state.entities, shot) {
            self.shots += 1;
        }
    }
}

impl Drill for Skillshot {
    fn kind(&self) -> DrillKind {
        DrillKind::Skillshot
    }

    fn on_start(&mut self, state: &mut SessionState) -> Result<(), PhaseError> {
        get_ready(state)
    }

    fn on_prepared(&mut self, state: &mut SessionState) -> Result<(), PhaseError> {
        go_live(state)
    }

    fn on_tick(&mut self, state: &mut SessionState, dt_ms: u64) -> Result<(), PhaseError> {
        let now = state.clock_ms;
        Self::spawn_target(state);

        let dt = ms_to_secs(dt_ms);
        let (mut missed, mut expired) = (0, 0);
        for e in state.entities.iter_mut().filter(|e| e.is_alive()) {
            match e.kind {
                EntityKind::Target => {
                    kinematics::step_bouncing(e, &state.bounds, dt, 1.0);
                    if e.age_ms(now) >= self.target_lifetime_ms {
                        e.expire();
                        expired += 1;
                    }
                }
                EntityKind::Projectile => {
                    kinematics::integrate(e, dt);
                    if !state.bounds.contains(e.pos) {
                        e.expire();
                        missed += 1;
                    }
                }
                _ => {}
            }
        }

        let shots: Vec<(EntityId, Vec2, f32)> = state
            .entities
            .iter()
            .filter(|e| e.is_alive() && e.kind == EntityKind::Projectile)
            .map(|e| (e.id, e.pos, e.size))
            .collect();
        let mut hits = 0;
        for (shot_id, pos, radius) in shots {
            let struck = state
                .entities
                .iter_mut()
                .find(|e| e.is_alive() && is_target(e) && circles_overlap(pos, radius, e.pos, e.size, 0.0));
            if let Some(target) = struck {
                target.resolve();
                hits += 1;
                if let Some(shot) = state.entity_mut(shot_id) {
                    shot.resolve();
                }
            }
        }
        spawner::sweep(&mut state.entities);

        self.hits += hits;
        self.missed_shots += missed;
        self.expired_targets += expired;
        for _ in 0..hits {
            state.success();
        }
        for _ in 0..(missed + expired) {
            state.failure();
        }
        Ok(())
    }

    fn on_action(&mut self, state: &mut SessionState, action: Action) -> Result<(), PhaseError> {
        if state.phase() != Phase::Active {
            return Ok(());
        }
        if let Action::Click { x, y } = action {
            self.fire(state, Vec2::new(x, y));
        }
        Ok(())
    }

    fn efficiency(&self, _state: &SessionState) -> f64 {
        efficiency_from_hits(self.hits, self.shots)
    }

    fn metrics(&self, _state: &SessionState, out: &mut BTreeMap<String, f64>) {
        out.insert("shots".into(), self.shots as f64);
        out.insert("hits".into(), self.hits as f64);
        out.insert("missed_shots".into(), self.missed_shots as f64);
        out.insert("expired_targets".into(), self.expired_targets as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolvedConfig;
    use crate::session::Session;
    use crate::tuning::DifficultyTier;

    fn live_session() -> Session {
        let mut s = Session::new(ResolvedConfig::new(DrillKind::Skillshot, DifficultyTier::Easy, 8));
        s.start();
        s.run_for(3000);
        s
    }

    #[test]
    fn test_shot_at_still_target_hits() {
        let mut s = live_session();
        while !s.state().entities.iter().any(is_target) {
            s.run_for(16);
        }
        let aim = {
            let state = s.state_mut();
            let target = state.entities.iter_mut().find(|e| is_target(e)).unwrap();
            target.vel = Vec2::ZERO;
            target.pos
        };
        s.act(Action::click(aim));
        s.run_for(1000);
        let state = s.state();
        assert_eq!(state.tally.success_count, 1);
        assert!(!state.entities.iter().any(|e| e.kind == EntityKind::Projectile));
    }

    #[test]
    fn test_wild_shot_is_a_miss() {
        let mut s = live_session();
        // Straight down-left into the wall, nowhere near the target zone
        s.act(Action::click(Vec2::new(0.0, 599.0)));
        s.run_for(1000);
        assert_eq!(s.state().tally.failure_count, 1);
        s.run_for(30_000);
        assert_eq!(s.record().unwrap().metrics["shots"], 1.0);
    }

    #[test]
    fn test_in_flight_limit() {
        let mut s = live_session();
        for _ in 0..10 {
            s.act(Action::click(Vec2::new(400.0, 0.0)));
        }
        let in_flight = s
            .state()
            .entities
            .iter()
            .filter(|e| e.kind == EntityKind::Projectile)
            .count();
        assert_eq!(in_flight, MAX_IN_FLIGHT);
    }

    #[test]
    fn test_unanswered_targets_expire() {
        let mut s = live_session();
        s.run_for(6000);
        assert!(s.state().tally.failure_count > 0);
        assert_eq!(s.state().tally.success_count, 0);
    }
}
