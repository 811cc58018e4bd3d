//! Card matching: memorize the preview, then turn cards over two at a time

use std::collections::BTreeMap;

use glam::Vec2;
use rand::seq::SliceRandom;

use super::{Drill, DrillKind};
use crate::error::PhaseError;
use crate::sim::collision::{HitShape, MatchOutcome, pair_match, pick};
use crate::sim::entity::{Entity, EntityId, EntityKind};
use crate::sim::phase::Phase;
use crate::sim::scheduler::TimerPurpose;
use crate::sim::scoring::efficiency_from_moves;
use crate::sim::spawner;
use crate::sim::state::SessionState;
use crate::sim::tick::Action;

/// How long a mismatched pair stays face up
const MISMATCH_REVEAL_MS: u64 = 800;
/// Short hold after a match
const MATCH_HOLD_MS: u64 = 300;
const ROWS: usize = 4;
const CARD_GAP: f32 = 10.0;

#[derive(Debug, Clone, Default)]
pub struct Cards {
    pairs: u32,
    matched: u32,
    moves: u32,
    first: Option<EntityId>,
    /// Mismatched pair waiting to be turned back
    reveal: Option<(EntityId, EntityId)>,
}

impl Cards {
    pub fn new() -> Self {
        Self::default()
    }

    fn deal(&mut self, state: &mut SessionState) {
        self.pairs = state.difficulty.capacity as u32;
        let mut faces: Vec<u32> = (0..self.pairs).flat_map(|p| [p, p]).collect();
        faces.shuffle(&mut state.rng);

        let count = faces.len();
        let cols = count.div_ceil(ROWS).max(1);
        let rows = count.div_ceil(cols);
        let size = state.difficulty.size;
        let cell = size * 2.0 + CARD_GAP;
        let span = Vec2::new(cols as f32, rows as f32) * cell - Vec2::splat(CARD_GAP);
        let origin = state.bounds.center() - span * 0.5 + Vec2::splat(size);

        for (i, pair_id) in faces.into_iter().enumerate() {
            let pos = origin + Vec2::new((i % cols) as f32, (i / cols) as f32) * cell;
            let id = state.spawner.allocate_id();
            let card = Entity::new(
                id,
                EntityKind::Card {
                    pair_id,
                    face_up: true,
                    matched: false,
                },
                pos,
                size,
                state.clock_ms,
            );
            spawner::insert(&mut state.entities, card);
        }
    }

    fn set_face(state: &mut SessionState, id: EntityId, up: bool) {
        if let Some(EntityKind::Card { face_up, .. }) = state.entity_mut(id).map(|e| &mut e.kind) {
            *face_up = up;
        }
    }

    /// A card that may be turned over right now
    fn selectable(state: &SessionState, action: Action) -> Option<EntityId> {
        let id = match action {
            Action::Select { id } => id,
            Action::Click { x, y } => pick(
                &state.entities,
                Vec2::new(x, y),
                HitShape::Square,
                0.0,
                |e| matches!(e.kind, EntityKind::Card { .. }),
            )?,
            Action::PointerMove { .. } | Action::Key { .. } => return None,
        };
        match state.entity(id)?.kind {
            EntityKind::Card { matched: false, .. } => Some(id),
            _ => None,
        }
    }
}

impl Drill for Cards {
    fn kind(&self) -> DrillKind {
        DrillKind::Cards
    }

    fn on_start(&mut self, state: &mut SessionState) -> Result<(), PhaseError> {
        self.deal(state);
        state.schedule(TimerPurpose::PrepareDone, state.difficulty.spawn_interval_ms);
        Ok(())
    }

    fn on_prepared(&mut self, state: &mut SessionState) -> Result<(), PhaseError> {
        for e in state.entities.iter_mut() {
            if let EntityKind::Card { face_up, .. } = &mut e.kind {
                *face_up = false;
            }
        }
        state.enter(Phase::Active)
    }

    fn on_action(&mut self, state: &mut SessionState, action: Action) -> Result<(), PhaseError> {
        if state.phase() != Phase::Active {
            return Ok(());
        }
        let Some(id) = Self::selectable(state, action) else {
            return Ok(());
        };

        let Some(first) = self.first else {
            if matches!(state.entity(id).map(|e| e.kind), Some(EntityKind::Card { face_up: true, .. })) {
                return Ok(());
            }
            Self::set_face(state, id, true);
            self.first = Some(id);
            return Ok(());
        };

        let (Some(a), Some(b)) = (state.entity(first), state.entity(id)) else {
            self.first = None;
            return Ok(());
        };
        match pair_match(a, b) {
            MatchOutcome::SameEntity => {
                log::trace!("Card {id} selected twice");
                Ok(())
            }
            MatchOutcome::Match => {
                self.first = None;
                self.moves += 1;
                self.matched += 1;
                for card in [first, id] {
                    if let Some(EntityKind::Card {
                        face_up, matched, ..
                    }) = state.entity_mut(card).map(|e| &mut e.kind)
                    {
                        *face_up = true;
                        *matched = true;
                    }
                }
                state.success();
                state.round = self.matched;
                let hold = (self.matched < self.pairs).then_some(MATCH_HOLD_MS);
                state.conclude(hold)
            }
            MatchOutcome::Mismatch => {
                self.first = None;
                self.moves += 1;
                Self::set_face(state, id, true);
                self.reveal = Some((first, id));
                state.failure();
                state.conclude(Some(MISMATCH_REVEAL_MS))
            }
        }
    }

    fn on_resolved(&mut self, state: &mut SessionState) -> Result<(), PhaseError> {
        if let Some((a, b)) = self.reveal.take() {
            Self::set_face(state, a, false);
            Self::set_face(state, b, false);
        }
        state.enter(Phase::Active)
    }

    /// Only mismatches count as excess; pairs left unplayed at time-out do not
    /// earn anything back.
    fn efficiency(&self, _state: &SessionState) -> f64 {
        let mismatches = self.moves.saturating_sub(self.matched);
        efficiency_from_moves(self.pairs + mismatches, self.pairs)
    }

    fn metrics(&self, _state: &SessionState, out: &mut BTreeMap<String, f64>) {
        out.insert("moves".into(), self.moves as f64);
        out.insert("pairs".into(), self.pairs as f64);
        out.insert("pairs_matched".into(), self.matched as f64);
    }

    fn progress(&self, _state: &SessionState) -> (u32, u32) {
        (self.matched, self.pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolvedConfig;
    use crate::session::Session;
    use crate::tuning::DifficultyTier;

    fn dealt(tier: DifficultyTier) -> (Session, Vec<(EntityId, u32)>) {
        let mut s = Session::new(ResolvedConfig::new(DrillKind::Cards, tier, 33));
        s.start();
        let layout = s
            .state()
            .entities
            .iter()
            .filter_map(|e| match e.kind {
                EntityKind::Card { pair_id, .. } => Some((e.id, pair_id)),
                _ => None,
            })
            .collect();
        let preview = s.state().difficulty.spawn_interval_ms;
        s.run_for(preview);
        assert_eq!(s.phase(), Phase::Active);
        (s, layout)
    }

    fn partner(layout: &[(EntityId, u32)], id: EntityId) -> EntityId {
        let pair = layout.iter().find(|(i, _)| *i == id).unwrap().1;
        layout.iter().find(|(i, p)| *p == pair && *i != id).unwrap().0
    }

    #[test]
    fn test_deal_fits_field() {
        for tier in DifficultyTier::ALL {
            let mut s = Session::new(ResolvedConfig::new(DrillKind::Cards, tier, 1));
            s.start();
            let state = s.state();
            assert_eq!(state.entities.len(), state.difficulty.capacity * 2);
            for e in &state.entities {
                assert!(state.bounds.contains(e.pos - Vec2::splat(e.size)));
                assert!(state.bounds.contains(e.pos + Vec2::splat(e.size)));
            }
        }
    }

    #[test]
    fn test_perfect_memory() {
        let (mut s, layout) = dealt(DifficultyTier::Easy);
        let mut done = Vec::new();
        for &(id, _) in &layout {
            if done.contains(&id) {
                continue;
            }
            let other = partner(&layout, id);
            while s.phase() != Phase::Active {
                s.run_for(16);
            }
            s.act(Action::Select { id });
            s.act(Action::Select { id: other });
            done.extend([id, other]);
        }
        assert_eq!(s.phase(), Phase::Complete);
        let record = s.record().unwrap();
        assert_eq!(record.metrics["moves"], 6.0);
        assert_eq!(record.metrics["efficiency"], 1.0);
        assert_eq!(record.score, 1200);
    }

    #[test]
    fn test_self_pair_never_counts() {
        let (mut s, layout) = dealt(DifficultyTier::Easy);
        let id = layout[0].0;
        s.act(Action::Select { id });
        s.act(Action::Select { id });
        assert_eq!(s.phase(), Phase::Active);
        assert_eq!(s.state().tally.attempts(), 0);
    }

    #[test]
    fn test_timeout_keeps_mismatches_in_efficiency() {
        let (mut s, layout) = dealt(DifficultyTier::Easy);
        let first = layout[0].0;
        s.act(Action::Select { id: first });
        s.act(Action::Select { id: partner(&layout, first) });
        s.run_for(MATCH_HOLD_MS);
        assert_eq!(s.phase(), Phase::Active);

        let (c, pair_c) = layout
            .iter()
            .copied()
            .find(|(_, p)| *p != layout[0].1)
            .unwrap();
        let d = layout
            .iter()
            .find(|(_, p)| *p != layout[0].1 && *p != pair_c)
            .unwrap()
            .0;
        for _ in 0..5 {
            s.act(Action::Select { id: c });
            s.act(Action::Select { id: d });
            s.run_for(MISMATCH_REVEAL_MS);
            assert_eq!(s.phase(), Phase::Active);
        }

        let budget = s.state().difficulty.session_budget_ms;
        s.run_for(budget);
        assert_eq!(s.phase(), Phase::Complete);
        let record = s.record().unwrap();
        assert_eq!(record.metrics["moves"], 6.0);
        assert_eq!(record.metrics["pairs_matched"], 1.0);
        assert!(record.metrics["efficiency"] < 0.5);
        // 100 raw at 1 - 5/6
        assert_eq!(record.score, 117);
    }

    #[test]
    fn test_mismatch_turns_back() {
        let (mut s, layout) = dealt(DifficultyTier::Easy);
        let a = layout[0].0;
        let b = layout
            .iter()
            .find(|(i, p)| *p != layout[0].1 && *i != a)
            .unwrap()
            .0;
        s.act(Action::Select { id: a });
        s.act(Action::Select { id: b });
        assert_eq!(s.phase(), Phase::Resolving);
        assert_eq!(s.state().tally.failure_count, 1);
        // Input is ignored while the pair is on show
        s.act(Action::Select { id: partner(&layout, a) });
        s.run_for(MISMATCH_REVEAL_MS);
        assert_eq!(s.phase(), Phase::Active);
        let face_up = s
            .state()
            .entities
            .iter()
            .filter(|e| matches!(e.kind, EntityKind::Card { face_up: true, .. }))
            .count();
        assert_eq!(face_up, 0);
    }
}
