//! Scripted player
//!
//! Reads snapshots the way a person reads the screen and answers with
//! actions. Drives the native demo and the end-to-end tests. `skill` is the
//! chance that a decision is made correctly; the rest are deliberate slips.

use std::collections::BTreeMap;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::report::ScoreRecord;
use crate::session::Session;
use crate::sim::drills::{self, PROJECTILE_SPEED, launch_point};
use crate::sim::entity::{Entity, EntityId, EntityKind};
use crate::sim::kinematics::Bounds;
use crate::sim::state::Snapshot;
use crate::sim::{Action, DrillKind, Phase};
use crate::tuning::DifficultyTier;

/// Human-ish delay before reacting to something new
const REFLEX_MS: std::ops::RangeInclusive<u64> = 180..=320;
/// Pointer travel per decision while dodging
const DODGE_STEP: f32 = 14.0;
/// Obstacles farther than this are ignored
const DODGE_LOOKAHEAD: f32 = 160.0;
const SHOT_COOLDOWN_MS: u64 = 250;
/// Pause between two replayed tiles
const RECALL_INPUT_GAP_MS: u64 = 150;

pub struct Bot {
    kind: DrillKind,
    kill_threshold: f32,
    skill: f64,
    rng: Pcg32,
    bounds: Bounds,
    reflex_ms: u64,
    last_phase: Phase,
    last_input_ms: u64,
    /// Cards seen face up: id -> pair id
    cards: BTreeMap<EntityId, u32>,
    /// Recall: tiles watched this level and how many were replayed
    watched: Vec<u8>,
    lit: Option<u8>,
    replayed: usize,
}

impl Bot {
    pub fn new(kind: DrillKind, tier: DifficultyTier, seed: u64) -> Self {
        let mut rng = Pcg32::seed_from_u64(seed);
        let reflex_ms = rng.random_range(REFLEX_MS);
        Self {
            kind,
            kill_threshold: drills::kill_threshold(tier),
            skill: 1.0,
            rng,
            bounds: Bounds::default(),
            reflex_ms,
            last_phase: Phase::Idle,
            last_input_ms: 0,
            cards: BTreeMap::new(),
            watched: Vec::new(),
            lit: None,
            replayed: 0,
        }
    }

    pub fn with_skill(mut self, skill: f64) -> Self {
        self.skill = skill.clamp(0.0, 1.0);
        self
    }

    /// Bot for a session's drill and tier
    pub fn for_session(session: &Session, seed: u64) -> Self {
        Self::new(session.kind(), session.config().tier, seed)
    }

    fn steady(&mut self) -> bool {
        self.rng.random_bool(self.skill)
    }

    /// Next actions for what is on screen at `now_ms`
    pub fn act(&mut self, snapshot: &Snapshot, now_ms: u64) -> Vec<Action> {
        let entered = snapshot.phase != self.last_phase;
        self.last_phase = snapshot.phase;
        if matches!(snapshot.phase, Phase::Idle | Phase::Complete) {
            return Vec::new();
        }

        match self.kind {
            DrillKind::Dodge => self.dodge(snapshot),
            DrillKind::Tracking => self.track(snapshot).into_iter().collect(),
            DrillKind::Skillshot => self.shoot(snapshot, now_ms).into_iter().collect(),
            DrillKind::Recall => self.recall(snapshot, now_ms, entered).into_iter().collect(),
            DrillKind::Cards => self.cards(snapshot),
            DrillKind::Reaction => self.react(snapshot, now_ms).into_iter().collect(),
            DrillKind::Multitask => {
                let mut actions: Vec<Action> = self.track(snapshot).into_iter().collect();
                actions.extend(self.answer_prompts(snapshot, now_ms));
                actions
            }
            DrillKind::Peripheral => self.spot_flash(snapshot, now_ms).into_iter().collect(),
            DrillKind::LastHit => self.last_hit(snapshot).into_iter().collect(),
        }
    }

    fn noticed(&self, e: &Entity, now_ms: u64) -> bool {
        e.is_alive() && e.age_ms(now_ms) >= self.reflex_ms
    }

    fn dodge(&mut self, snapshot: &Snapshot) -> Vec<Action> {
        let center = self.bounds.center();
        let Some(p) = snapshot.pointer else {
            return vec![Action::pointer_move(center)];
        };
        if snapshot.phase != Phase::Active {
            return Vec::new();
        }
        let mut push = (center - p) * 0.002;
        for e in snapshot.entities.iter().filter(|e| e.is_alive()) {
            let away = p - e.pos;
            let d = away.length() - e.size;
            if d < DODGE_LOOKAHEAD {
                let approaching = e.vel.dot(away) > 0.0;
                let weight = if approaching { 2.0 } else { 0.5 };
                push += away.normalize_or_zero() * weight / d.max(1.0);
            }
        }
        if !self.steady() {
            return Vec::new();
        }
        let next = self.bounds.inset(20.0).clamp(p + push.normalize_or_zero() * DODGE_STEP);
        vec![Action::pointer_move(next)]
    }

    fn track(&mut self, snapshot: &Snapshot) -> Option<Action> {
        let target = snapshot
            .entities
            .iter()
            .find(|e| e.is_alive() && e.kind == EntityKind::Target)?;
        let aim = if self.steady() {
            target.pos
        } else {
            target.pos + Vec2::splat(target.size * 3.0)
        };
        Some(Action::pointer_move(aim))
    }

    fn shoot(&mut self, snapshot: &Snapshot, now_ms: u64) -> Option<Action> {
        if snapshot.phase != Phase::Active || now_ms < self.last_input_ms + SHOT_COOLDOWN_MS {
            return None;
        }
        let target = snapshot
            .entities
            .iter()
            .find(|e| e.kind == EntityKind::Target && self.noticed(e, now_ms))?;
        let origin = launch_point(&self.bounds);
        // Two rounds of lead refinement are plenty at these speeds
        let mut aim = target.pos;
        for _ in 0..2 {
            let flight = origin.distance(aim) / PROJECTILE_SPEED;
            aim = target.pos + target.vel * flight;
        }
        if !self.steady() {
            aim.x += target.size * 4.0;
        }
        self.last_input_ms = now_ms;
        Some(Action::click(aim))
    }

    fn recall(&mut self, snapshot: &Snapshot, now_ms: u64, entered: bool) -> Option<Action> {
        let lit = snapshot.entities.iter().find_map(|e| match e.kind {
            EntityKind::Tile { index, lit: true } => Some(index),
            _ => None,
        });
        match snapshot.phase {
            Phase::Preparing => {
                if entered {
                    self.watched.clear();
                    self.replayed = 0;
                    self.lit = None;
                }
                if lit.is_some() && self.lit.is_none() {
                    self.watched.extend(lit);
                }
                self.lit = lit;
                None
            }
            Phase::Active => {
                if now_ms < self.last_input_ms + RECALL_INPUT_GAP_MS {
                    return None;
                }
                let mut index = *self.watched.get(self.replayed)?;
                if !self.steady() {
                    index = index.wrapping_add(1);
                }
                let id = snapshot.entities.iter().find_map(|e| match e.kind {
                    EntityKind::Tile { index: i, .. } if i == index => Some(e.id),
                    _ => None,
                })?;
                self.replayed += 1;
                self.last_input_ms = now_ms;
                Some(Action::Select { id })
            }
            _ => None,
        }
    }

    fn cards(&mut self, snapshot: &Snapshot) -> Vec<Action> {
        let mut face_up = None;
        for e in &snapshot.entities {
            if let EntityKind::Card {
                pair_id,
                face_up: up,
                matched,
            } = e.kind
            {
                if matched {
                    self.cards.remove(&e.id);
                    continue;
                }
                if up {
                    face_up = Some(e.id);
                    self.cards.insert(e.id, pair_id);
                }
            }
        }
        if snapshot.phase != Phase::Active {
            return Vec::new();
        }

        let hidden: Vec<EntityId> = snapshot
            .entities
            .iter()
            .filter_map(|e| match e.kind {
                EntityKind::Card {
                    face_up: false,
                    matched: false,
                    ..
                } => Some(e.id),
                _ => None,
            })
            .collect();
        let partner_of = |bot: &Self, id: EntityId| {
            let pair = bot.cards.get(&id)?;
            hidden
                .iter()
                .copied()
                .find(|other| *other != id && bot.cards.get(other) == Some(pair))
        };

        if let Some(first) = face_up {
            let guess = partner_of(&*self, first).filter(|_| self.steady());
            let second = guess.or_else(|| hidden.iter().copied().find(|id| !self.cards.contains_key(id)));
            return second
                .or_else(|| hidden.first().copied())
                .map(|id| vec![Action::Select { id }])
                .unwrap_or_default();
        }

        let known_pair = hidden
            .iter()
            .copied()
            .find_map(|id| partner_of(&*self, id).map(|other| (id, other)));
        match known_pair {
            Some((a, b)) if self.steady() => vec![Action::Select { id: a }, Action::Select { id: b }],
            _ => {
                let unknown = hidden.iter().copied().find(|id| !self.cards.contains_key(id));
                unknown
                    .or_else(|| hidden.first().copied())
                    .map(|id| vec![Action::Select { id }])
                    .unwrap_or_default()
            }
        }
    }

    fn react(&mut self, snapshot: &Snapshot, now_ms: u64) -> Option<Action> {
        let center = self.bounds.center();
        match snapshot.phase {
            Phase::Preparing if !self.steady() && self.rng.random_bool(0.01) => Some(Action::click(center)),
            Phase::Active => {
                let signal = snapshot
                    .entities
                    .iter()
                    .find(|e| e.kind == EntityKind::Target && self.noticed(e, now_ms))?;
                self.reflex_ms = self.rng.random_range(REFLEX_MS);
                Some(Action::click(signal.pos))
            }
            _ => None,
        }
    }

    fn answer_prompts(&mut self, snapshot: &Snapshot, now_ms: u64) -> Vec<Action> {
        let keys: Vec<char> = snapshot
            .entities
            .iter()
            .filter(|e| self.noticed(e, now_ms))
            .filter_map(|e| match e.kind {
                EntityKind::Prompt { key, .. } => Some(key),
                _ => None,
            })
            .collect();
        keys.into_iter()
            .map(|key| {
                if self.steady() {
                    Action::Key { key }
                } else {
                    let wrong = drills::PROMPT_KEYS.iter().copied().find(|k| *k != key);
                    Action::Key {
                        key: wrong.unwrap_or(key),
                    }
                }
            })
            .collect()
    }

    fn spot_flash(&mut self, snapshot: &Snapshot, now_ms: u64) -> Option<Action> {
        let flash = snapshot
            .entities
            .iter()
            .find(|e| matches!(e.kind, EntityKind::Flash { .. }) && self.noticed(e, now_ms))?;
        if self.steady() {
            Some(Action::click(flash.pos))
        } else {
            self.reflex_ms = self.rng.random_range(REFLEX_MS);
            None
        }
    }

    fn last_hit(&mut self, snapshot: &Snapshot) -> Option<Action> {
        let threshold = self.kill_threshold;
        let eager = !self.steady();
        let minion = snapshot.entities.iter().find(|e| {
            e.is_alive()
                && e.health_fraction().is_some_and(|f| {
                    if eager {
                        f <= threshold * 2.0
                    } else {
                        f > 0.0 && f <= threshold * 0.8
                    }
                })
        })?;
        Some(Action::click(minion.pos))
    }
}

/// Play a session to completion (or until `limit_ms` of simulated time)
pub fn play(session: &mut Session, bot: &mut Bot, limit_ms: u64) -> Option<ScoreRecord> {
    if session.phase() == Phase::Idle {
        session.start();
    }
    let start = session.now_ms();
    while session.phase() != Phase::Complete && session.now_ms() - start < limit_ms {
        session.advance(crate::consts::TICK_PERIOD_MS);
        for action in bot.act(&session.snapshot(), session.now_ms()) {
            session.act(action);
        }
    }
    session.record().cloned()
}
