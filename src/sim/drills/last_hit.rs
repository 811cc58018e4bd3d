//! Last hit: minions lose health over time; finish them inside the kill window.
//!
//! Clicking a minion above the window is a wasted swing and the minion keeps
//! decaying. A minion that reaches zero on its own is a missed kill.

use std::collections::BTreeMap;

use glam::Vec2;
use rand::Rng;

use super::{Drill, DrillKind, get_ready, go_live};
use crate::error::PhaseError;
use crate::ms_to_secs;
use crate::sim::collision::{HitShape, in_valid_window, pick};
use crate::sim::entity::{Entity, EntityKind};
use crate::sim::kinematics::{self, Bounds};
use crate::sim::phase::Phase;
use crate::sim::scoring::efficiency_from_hits;
use crate::sim::spawner;
use crate::sim::state::SessionState;
use crate::sim::tick::Action;
use crate::tuning::{DifficultyProfile, DifficultyTier};

/// Kill window as a fraction of max health
const THRESHOLD: [f32; 4] = [0.2, 0.15, 0.12, 0.1];
pub const MAX_HEALTH: f32 = 100.0;
const DRIFT_SPEED: f32 = 20.0;
/// Extra click radius around a minion
const CLICK_TOLERANCE: f32 = 4.0;

/// Health fraction at or under which a click counts as a last hit
pub fn kill_threshold(tier: DifficultyTier) -> f32 {
    tier.pick(THRESHOLD)
}

fn is_minion(e: &Entity) -> bool {
    matches!(e.kind, EntityKind::Minion { .. })
}

#[derive(Debug, Clone)]
pub struct LastHit {
    threshold: f32,
    last_hits: u32,
    early_swings: u32,
    died: u32,
}

impl LastHit {
    pub fn new(profile: &DifficultyProfile) -> Self {
        Self {
            threshold: kill_threshold(profile.tier),
            last_hits: 0,
            early_swings: 0,
            died: 0,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Top the wave back up to capacity
    fn replenish(state: &mut SessionState) {
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
        let (decay, size) = (difficulty.speed, difficulty.size);
        let spawned = spawner.replenish(now, entities, |id| minion(id, bounds, rng, decay, size, now));
        if spawned > 0 {
            log::trace!("LastHit: {spawned} minions joined the wave");
        }
    }
}

fn minion<R: Rng + ?Sized>(id: u32, bounds: &Bounds, rng: &mut R, decay: f32, size: f32, now: u64) -> Entity {
    let kind = EntityKind::Minion {
        health: rng.random_range(0.7f32..=1.0) * MAX_HEALTH,
        max_health: MAX_HEALTH,
        decay_per_sec: decay * rng.random_range(0.8f32..=1.2),
    };
    let pos = bounds.random_interior(rng, size * 2.0);
    let vel = kinematics::random_velocity(rng, DRIFT_SPEED, 0.5);
    Entity::new(id, kind, pos, size, now).with_velocity(vel)
}

impl Drill for LastHit {
    fn kind(&self) -> DrillKind {
        DrillKind::LastHit
    }

    fn on_start(&mut self, state: &mut SessionState) -> Result<(), PhaseError> {
        get_ready(state)
    }

    fn on_prepared(&mut self, state: &mut SessionState) -> Result<(), PhaseError> {
        go_live(state)?;
        Self::replenish(state);
        Ok(())
    }

    fn on_tick(&mut self, state: &mut SessionState, dt_ms: u64) -> Result<(), PhaseError> {
        let dt = ms_to_secs(dt_ms);
        let mut died = 0;
        for e in state.entities.iter_mut().filter(|e| e.is_alive()) {
            kinematics::step_bouncing(e, &state.bounds, dt, 1.0);
            if let EntityKind::Minion {
                health,
                decay_per_sec,
                ..
            } = &mut e.kind
            {
                *health -= *decay_per_sec * dt;
                if *health <= 0.0 {
                    *health = 0.0;
                    e.expire();
                    died += 1;
                }
            }
        }
        spawner::sweep(&mut state.entities);

        if died > 0 {
            self.died += died;
            for _ in 0..died {
                state.failure();
            }
            Self::replenish(state);
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
        let Some(id) = pick(
            &state.entities,
            Vec2::new(x, y),
            HitShape::Circle,
            CLICK_TOLERANCE,
            is_minion,
        ) else {
            return Ok(());
        };
        let threshold = self.threshold;
        let Some(target) = state.entity_mut(id) else {
            return Ok(());
        };

        if in_valid_window(target, threshold) {
            target.resolve();
            spawner::sweep(&mut state.entities);
            self.last_hits += 1;
            state.success();
            Self::replenish(state);
        } else {
            log::trace!(
                "LastHit: minion {id} at {:.0}% is outside the window",
                target.health_fraction().unwrap_or(0.0) * 100.0
            );
            self.early_swings += 1;
            state.failure();
        }
        Ok(())
    }

    fn efficiency(&self, state: &SessionState) -> f64 {
        efficiency_from_hits(state.tally.success_count, state.tally.attempts())
    }

    fn metrics(&self, _state: &SessionState, out: &mut BTreeMap<String, f64>) {
        out.insert("last_hits".into(), self.last_hits as f64);
        out.insert("misses".into(), self.early_swings as f64);
        out.insert("died".into(), self.died as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolvedConfig;
    use crate::session::Session;
    use crate::tuning::DifficultyTier;

    fn live(tier: DifficultyTier) -> Session {
        let mut s = Session::new(ResolvedConfig::new(DrillKind::LastHit, tier, 21));
        s.start();
        s.run_for(3000);
        assert_eq!(s.phase(), Phase::Active);
        s
    }

    fn minions(s: &Session) -> Vec<&Entity> {
        s.state().entities.iter().filter(|e| is_minion(e)).collect()
    }

    #[test]
    fn test_wave_fills_to_capacity() {
        let s = live(DifficultyTier::Medium);
        assert_eq!(minions(&s).len(), s.state().difficulty.capacity);
        for m in minions(&s) {
            let f = m.health_fraction().unwrap();
            assert!((0.7..=1.0).contains(&f));
        }
    }

    #[test]
    fn test_early_swing_keeps_minion() {
        let mut s = live(DifficultyTier::Easy);
        let (id, pos) = {
            let m = minions(&s)[0];
            (m.id, m.pos)
        };
        s.act(Action::click(pos));
        assert_eq!(s.state().tally.failure_count, 1);
        assert!(s.state().entity(id).is_some());
    }

    #[test]
    fn test_last_hit_in_window() {
        let mut s = live(DifficultyTier::Easy);
        let threshold = THRESHOLD[0];
        let pos = loop {
            s.run_for(16);
            if let Some(m) = minions(&s)
                .into_iter()
                .find(|m| in_valid_window(m, threshold * 0.9))
            {
                break m.pos;
            }
        };
        s.act(Action::click(pos));
        assert_eq!(s.state().tally.success_count, 1);
        // Refilled right away
        assert_eq!(minions(&s).len(), s.state().difficulty.capacity);
    }

    #[test]
    fn test_ignored_minions_die() {
        let mut s = live(DifficultyTier::Expert);
        s.run_for(10_000);
        assert!(s.state().tally.failure_count > 0);
        assert_eq!(s.state().tally.success_count, 0);
        assert_eq!(minions(&s).len(), s.state().difficulty.capacity);
        // Clicking empty ground is not a swing
        let before = s.state().tally.attempts();
        s.act(Action::click(Vec2::new(-50.0, -50.0)));
        assert_eq!(s.state().tally.attempts(), before);
    }
}
