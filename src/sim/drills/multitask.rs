//! Multitask: track a target with the cursor while answering key prompts

use std::collections::BTreeMap;

use glam::Vec2;
use rand::Rng;

use super::{Drill, DrillKind, TrackingCore, get_ready, go_live};
use crate::error::PhaseError;
use crate::sim::entity::{Entity, EntityKind};
use crate::sim::phase::Phase;
use crate::sim::scoring::efficiency_from_hits;
use crate::sim::spawner;
use crate::sim::state::SessionState;
use crate::sim::tick::Action;
use crate::tuning::DifficultyProfile;

pub const PROMPT_KEYS: [char; 4] = ['a', 's', 'd', 'f'];
const PROMPT_TTL_MS: [u64; 4] = [2500, 2200, 1900, 1600];
const PROMPT_SIZE: f32 = 18.0;
/// Prompts line up along the bottom edge, clear of the tracking area
const PROMPT_LANE_OFFSET: f32 = 40.0;

fn is_prompt(e: &Entity) -> bool {
    matches!(e.kind, EntityKind::Prompt { .. })
}

#[derive(Debug, Clone)]
pub struct Multitask {
    core: TrackingCore,
    prompt_ttl_ms: u64,
    answered: u32,
    wrong_keys: u32,
    expired: u32,
}

impl Multitask {
    pub fn new(profile: &DifficultyProfile) -> Self {
        Self {
            core: TrackingCore::default(),
            prompt_ttl_ms: profile.tier.pick(PROMPT_TTL_MS),
            answered: 0,
            wrong_keys: 0,
            expired: 0,
        }
    }

    fn spawn_prompt(&self, state: &mut SessionState) {
        let ttl_ms = self.prompt_ttl_ms;
        let SessionState {
            spawner,
            entities,
            rng,
            bounds,
            clock_ms,
            ..
        } = state;
        let now = *clock_ms;
        spawner.spawn_due_where(now, entities, is_prompt, |id| {
            let margin = PROMPT_LANE_OFFSET + PROMPT_SIZE;
            let x = rng.random_range(bounds.min.x + margin..=bounds.max.x - margin);
            let key = PROMPT_KEYS[rng.random_range(0..PROMPT_KEYS.len())];
            let pos = Vec2::new(x, bounds.max.y - PROMPT_LANE_OFFSET);
            Entity::new(id, EntityKind::Prompt { key, ttl_ms }, pos, PROMPT_SIZE, now)
        });
    }
}

impl Drill for Multitask {
    fn kind(&self) -> DrillKind {
        DrillKind::Multitask
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

        self.spawn_prompt(state);
        let now = state.clock_ms;
        let mut expired = 0;
        for e in state.entities.iter_mut().filter(|e| e.is_alive() && is_prompt(e)) {
            if e.timed_out(now) {
                e.expire();
                expired += 1;
            }
        }
        spawner::sweep(&mut state.entities);
        self.expired += expired;
        for _ in 0..expired {
            state.failure();
        }
        Ok(())
    }

    fn on_action(&mut self, state: &mut SessionState, action: Action) -> Result<(), PhaseError> {
        if state.phase() != Phase::Active {
            return Ok(());
        }
        let Action::Key { key } = action else {
            return Ok(());
        };
        let key = key.to_ascii_lowercase();
        if !PROMPT_KEYS.contains(&key) {
            return Ok(());
        }

        let answered = state
            .entities
            .iter_mut()
            .find(|e| e.is_alive() && matches!(e.kind, EntityKind::Prompt { key: k, .. } if k == key));
        match answered {
            Some(prompt) => {
                prompt.resolve();
                spawner::sweep(&mut state.entities);
                self.answered += 1;
                state.success();
            }
            None => {
                self.wrong_keys += 1;
                state.failure();
            }
        }
        Ok(())
    }

    fn efficiency(&self, state: &SessionState) -> f64 {
        efficiency_from_hits(state.tally.success_count, state.tally.attempts())
    }

    fn metrics(&self, _state: &SessionState, out: &mut BTreeMap<String, f64>) {
        out.insert("tracking_accuracy".into(), self.core.accuracy());
        out.insert("prompts_answered".into(), self.answered as f64);
        out.insert("prompts_expired".into(), self.expired as f64);
        out.insert("wrong_keys".into(), self.wrong_keys as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolvedConfig;
    use crate::session::Session;
    use crate::tuning::DifficultyTier;

    fn live(tier: DifficultyTier) -> Session {
        let mut s = Session::new(ResolvedConfig::new(DrillKind::Multitask, tier, 5));
        s.start();
        s.run_for(3000);
        s
    }

    fn pending_key(s: &Session) -> Option<char> {
        s.state().entities.iter().find_map(|e| match e.kind {
            EntityKind::Prompt { key, .. } => Some(key),
            _ => None,
        })
    }

    #[test]
    fn test_answering_prompts() {
        let mut s = live(DifficultyTier::Easy);
        let mut answered = 0;
        while answered < 3 {
            s.run_for(16);
            if let Some(key) = pending_key(&s) {
                s.act(Action::Key {
                    key: key.to_ascii_uppercase(),
                });
                answered += 1;
            }
        }
        let state = s.state();
        assert!(!state.entities.iter().any(is_prompt));
        assert!(state.tally.success_count >= 3);
    }

    #[test]
    fn test_wrong_key_is_a_failure() {
        let mut s = live(DifficultyTier::Easy);
        while pending_key(&s).is_none() {
            s.run_for(16);
        }
        let key = pending_key(&s).unwrap();
        let wrong = PROMPT_KEYS.iter().copied().find(|k| *k != key).unwrap();
        let before = s.state().tally.failure_count;
        s.act(Action::Key { key: wrong });
        assert_eq!(s.state().tally.failure_count, before + 1);
        // Unrelated keys are ignored
        s.act(Action::Key { key: 'z' });
        assert_eq!(s.state().tally.failure_count, before + 1);
    }

    #[test]
    fn test_prompts_expire() {
        let mut s = live(DifficultyTier::Expert);
        s.run_for(50_000);
        let metrics = &s.record().unwrap().metrics;
        assert!(metrics["prompts_expired"] > 0.0);
        assert_eq!(metrics["prompts_answered"], 0.0);
    }
}
