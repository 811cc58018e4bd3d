//! Pattern recall: watch a sequence of lit tiles, then replay it.
//!
//! Each level shows the whole sequence again with one more tile. One wrong
//! tile ends the session.

use std::collections::BTreeMap;

use glam::Vec2;
use rand::Rng;

use super::{Drill, DrillKind};
use crate::error::PhaseError;
use crate::sim::collision::{HitShape, pick};
use crate::sim::entity::{Entity, EntityKind};
use crate::sim::phase::Phase;
use crate::sim::scheduler::TimerPurpose;
use crate::sim::scoring::efficiency_from_hits;
use crate::sim::spawner;
use crate::sim::state::SessionState;
use crate::sim::tick::Action;
use crate::tuning::DifficultyProfile;

const START_LENGTH: [usize; 4] = [3, 4, 5, 6];
/// Dark gap between two shown tiles
const PAUSE_MS: [u64; 4] = [250, 200, 150, 120];
/// Quiet time before the first tile of a level
const LEAD_IN_MS: u64 = 500;
/// Celebration hold after a completed level
const LEVEL_HOLD_MS: u64 = 600;
const TILE_GAP: f32 = 12.0;

#[derive(Debug, Clone)]
pub struct Recall {
    show_ms: u64,
    pause_ms: u64,
    start_length: usize,
    sequence: Vec<u8>,
    /// Tiles fully shown so far in this level
    shown: usize,
    lit: Option<u8>,
    input_pos: usize,
    level: u32,
    correct_inputs: u32,
    inputs: u32,
}

impl Recall {
    pub fn new(profile: &DifficultyProfile) -> Self {
        Self {
            show_ms: profile.spawn_interval_ms,
            pause_ms: profile.tier.pick(PAUSE_MS),
            start_length: profile.tier.pick(START_LENGTH),
            sequence: Vec::new(),
            shown: 0,
            lit: None,
            input_pos: 0,
            level: 0,
            correct_inputs: 0,
            inputs: 0,
        }
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn pattern_length(&self) -> usize {
        self.sequence.len()
    }

    fn tile_count(state: &SessionState) -> usize {
        state
            .entities
            .iter()
            .filter(|e| matches!(e.kind, EntityKind::Tile { .. }))
            .count()
    }

    /// Square grid of tiles centered in the field
    fn lay_out(state: &mut SessionState) {
        let side = ((state.difficulty.capacity as f64).sqrt().round() as usize).clamp(2, 15);
        let size = state.difficulty.size;
        let cell = size * 2.0 + TILE_GAP;
        let span = side as f32 * cell - TILE_GAP;
        let origin = state.bounds.center() - Vec2::splat(span * 0.5 - size);
        for i in 0..side * side {
            let (row, col) = (i / side, i % side);
            let pos = origin + Vec2::new(col as f32, row as f32) * cell;
            let id = state.spawner.allocate_id();
            let tile = Entity::new(
                id,
                EntityKind::Tile {
                    index: i as u8,
                    lit: false,
                },
                pos,
                size,
                state.clock_ms,
            );
            spawner::insert(&mut state.entities, tile);
        }
    }

    fn set_lit(state: &mut SessionState, index: u8, on: bool) {
        for e in state.entities.iter_mut() {
            if let EntityKind::Tile { index: i, lit } = &mut e.kind
                && *i == index
            {
                *lit = on;
            }
        }
    }

    fn extend(&mut self, state: &mut SessionState) {
        let tiles = Self::tile_count(state).max(1);
        let next = state.rng.random_range(0..tiles) as u8;
        self.sequence.push(next);
    }

    /// Replay the whole sequence from the first tile
    fn begin_show(&mut self, state: &mut SessionState) {
        self.shown = 0;
        self.lit = None;
        self.input_pos = 0;
        state.schedule(TimerPurpose::SequenceStep, LEAD_IN_MS);
    }

    fn tile_at(state: &SessionState, action: Action) -> Option<u8> {
        let id = match action {
            Action::Select { id } => id,
            Action::Click { x, y } => pick(
                &state.entities,
                Vec2::new(x, y),
                HitShape::Square,
                0.0,
                |e| matches!(e.kind, EntityKind::Tile { .. }),
            )?,
            Action::PointerMove { .. } | Action::Key { .. } => return None,
        };
        match state.entity(id)?.kind {
            EntityKind::Tile { index, .. } => Some(index),
            _ => None,
        }
    }
}

impl Drill for Recall {
    fn kind(&self) -> DrillKind {
        DrillKind::Recall
    }

    fn on_start(&mut self, state: &mut SessionState) -> Result<(), PhaseError> {
        Self::lay_out(state);
        self.level = 1;
        state.round = 1;
        for _ in 0..self.start_length {
            self.extend(state);
        }
        self.begin_show(state);
        Ok(())
    }

    fn on_step(&mut self, state: &mut SessionState) -> Result<(), PhaseError> {
        if state.phase() != Phase::Preparing {
            return Ok(());
        }
        match self.lit.take() {
            Some(index) => {
                Self::set_lit(state, index, false);
                self.shown += 1;
                if self.shown >= self.sequence.len() {
                    return state.enter(Phase::Active);
                }
                state.schedule(TimerPurpose::SequenceStep, self.pause_ms);
            }
            None => {
                let Some(&index) = self.sequence.get(self.shown) else {
                    return state.enter(Phase::Active);
                };
                Self::set_lit(state, index, true);
                self.lit = Some(index);
                state.schedule(TimerPurpose::SequenceStep, self.show_ms);
            }
        }
        Ok(())
    }

    fn on_action(&mut self, state: &mut SessionState, action: Action) -> Result<(), PhaseError> {
        if state.phase() != Phase::Active {
            return Ok(());
        }
        let Some(index) = Self::tile_at(state, action) else {
            return Ok(());
        };
        let Some(&expected) = self.sequence.get(self.input_pos) else {
            return Ok(());
        };

        self.inputs += 1;
        if index != expected {
            log::debug!(
                "Recall: tile {index} at position {}, expected {expected}",
                self.input_pos + 1
            );
            state.failure();
            return state.conclude(None);
        }

        self.correct_inputs += 1;
        self.input_pos += 1;
        state.success();
        if self.input_pos == self.sequence.len() {
            self.level += 1;
            state.round = self.level;
            self.extend(state);
            log::debug!("Recall: level {} with {} tiles", self.level, self.sequence.len());
            state.conclude(Some(LEVEL_HOLD_MS))?;
        }
        Ok(())
    }

    fn on_resolved(&mut self, state: &mut SessionState) -> Result<(), PhaseError> {
        state.enter(Phase::Preparing)?;
        self.begin_show(state);
        Ok(())
    }

    fn efficiency(&self, _state: &SessionState) -> f64 {
        efficiency_from_hits(self.correct_inputs, self.inputs)
    }

    fn metrics(&self, _state: &SessionState, out: &mut BTreeMap<String, f64>) {
        out.insert("max_level".into(), self.level as f64);
        out.insert("pattern_length".into(), self.sequence.len() as f64);
        out.insert("correct_inputs".into(), self.correct_inputs as f64);
    }

    fn progress(&self, _state: &SessionState) -> (u32, u32) {
        (self.input_pos as u32, self.sequence.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolvedConfig;
    use crate::session::Session;
    use crate::tuning::DifficultyTier;

    fn lit_tile(s: &Session) -> Option<(u32, u8)> {
        s.state().entities.iter().find_map(|e| match e.kind {
            EntityKind::Tile { index, lit: true } => Some((e.id, index)),
            _ => None,
        })
    }

    fn tile_id(s: &Session, index: u8) -> u32 {
        s.state()
            .entities
            .iter()
            .find(|e| matches!(e.kind, EntityKind::Tile { index: i, .. } if i == index))
            .map(|e| e.id)
            .unwrap()
    }

    /// Watch the show phase and write down every tile that lights up
    fn watch(s: &mut Session) -> Vec<u8> {
        let mut seen = Vec::new();
        let mut was_lit = false;
        while s.phase() == Phase::Preparing {
            match lit_tile(s) {
                Some((_, index)) if !was_lit => {
                    seen.push(index);
                    was_lit = true;
                }
                Some(_) => {}
                None => was_lit = false,
            }
            s.run_for(16);
        }
        seen
    }

    #[test]
    fn test_grid_matches_tier() {
        for (tier, tiles) in [(DifficultyTier::Easy, 9), (DifficultyTier::Expert, 16)] {
            let mut s = Session::new(ResolvedConfig::new(DrillKind::Recall, tier, 1));
            s.start();
            assert_eq!(s.state().entities.len(), tiles);
            assert!(
                s.state()
                    .entities
                    .iter()
                    .all(|e| s.state().bounds.contains(e.pos))
            );
        }
    }

    #[test]
    fn test_level_up_then_wrong_tile() {
        let mut s = Session::new(ResolvedConfig::new(DrillKind::Recall, DifficultyTier::Easy, 4));
        s.start();
        let first = watch(&mut s);
        assert_eq!(first.len(), 3);
        assert_eq!(s.phase(), Phase::Active);

        for index in first.iter().copied() {
            let id = tile_id(&s, index);
            s.act(Action::Select { id });
        }
        assert_eq!(s.phase(), Phase::Resolving);
        assert_eq!(s.state().round, 2);

        s.run_for(LEVEL_HOLD_MS);
        assert_eq!(s.phase(), Phase::Preparing);
        let second = watch(&mut s);
        assert_eq!(second.len(), 4);
        assert_eq!(&second[..3], &first[..]);

        let id = tile_id(&s, second[0]);
        s.act(Action::Select { id });
        let wrong = (second[1] + 1) % 9;
        let id = tile_id(&s, wrong);
        s.act(Action::Select { id });

        assert_eq!(s.phase(), Phase::Complete);
        let record = s.record().unwrap();
        assert_eq!(record.metrics["max_level"], 2.0);
        assert_eq!(record.metrics["correct_inputs"], 4.0);
    }

    #[test]
    fn test_clicks_during_show_are_ignored() {
        let mut s = Session::new(ResolvedConfig::new(DrillKind::Recall, DifficultyTier::Easy, 9));
        s.start();
        s.run_for(LEAD_IN_MS + 16);
        let (id, _) = lit_tile(&s).unwrap();
        s.act(Action::Select { id });
        assert_eq!(s.phase(), Phase::Preparing);
        assert_eq!(s.state().tally.attempts(), 0);
    }

    #[test]
    fn test_click_resolves_tile_under_cursor() {
        let mut s = Session::new(ResolvedConfig::new(DrillKind::Recall, DifficultyTier::Medium, 12));
        s.start();
        let shown = watch(&mut s);
        let pos = s
            .state()
            .entities
            .iter()
            .find(|e| matches!(e.kind, EntityKind::Tile { index, .. } if index == shown[0]))
            .map(|e| e.pos)
            .unwrap();
        s.act(Action::click(pos + Vec2::new(10.0, -10.0)));
        assert_eq!(s.state().tally.success_count, 1);
    }
}
