//! Simulated entities: obstacles, targets, tiles, cards, minions, flashes

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Session-unique entity identifier (never reused within a session)
pub type EntityId = u32;

/// Lifecycle state of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityState {
    Alive,
    /// Consumed by a hit, match or last-hit
    Resolved,
    /// Left the field, timed out or died un-hit
    Expired,
}

/// Per-drill payload
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EntityKind {
    /// Dodge hazard crossing the field
    Obstacle,
    /// Tracked, aimed-at or signal target
    Target,
    /// Player shot
    Projectile,
    /// Recall grid tile
    Tile { index: u8, lit: bool },
    /// Memory card
    Card {
        pair_id: u32,
        face_up: bool,
        matched: bool,
    },
    /// Last-hit minion losing health over time
    Minion {
        health: f32,
        max_health: f32,
        decay_per_sec: f32,
    },
    /// Peripheral flash visible for `ttl_ms`
    Flash { ttl_ms: u64 },
    /// Multitask key prompt answered within `ttl_ms`
    Prompt { key: char, ttl_ms: u64 },
}

/// A simulated entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub pos: Vec2,
    pub vel: Vec2,
    /// Radius for round entities, half-extent for tiles and cards
    pub size: f32,
    pub created_at_ms: u64,
    pub state: EntityState,
    pub kind: EntityKind,
}

impl Entity {
    pub fn new(id: EntityId, kind: EntityKind, pos: Vec2, size: f32, now_ms: u64) -> Self {
        Self {
            id,
            pos,
            vel: Vec2::ZERO,
            size,
            created_at_ms: now_ms,
            state: EntityState::Alive,
            kind,
        }
    }

    pub fn with_velocity(mut self, vel: Vec2) -> Self {
        self.vel = vel;
        self
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.state == EntityState::Alive
    }

    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.created_at_ms)
    }

    /// Whether a time-limited entity has outlived its window
    pub fn timed_out(&self, now_ms: u64) -> bool {
        match self.kind {
            EntityKind::Flash { ttl_ms } | EntityKind::Prompt { ttl_ms, .. } => {
                self.age_ms(now_ms) >= ttl_ms
            }
            _ => false,
        }
    }

    /// Pair identity for matching drills
    pub fn pair_id(&self) -> Option<u32> {
        match self.kind {
            EntityKind::Card { pair_id, .. } => Some(pair_id),
            EntityKind::Tile { index, .. } => Some(index as u32),
            _ => None,
        }
    }

    /// Remaining health as a 0-1 fraction (minions only)
    pub fn health_fraction(&self) -> Option<f32> {
        match self.kind {
            EntityKind::Minion {
                health, max_health, ..
            } if max_health > 0.0 => Some((health / max_health).clamp(0.0, 1.0)),
            _ => None,
        }
    }

    pub fn resolve(&mut self) {
        self.state = EntityState::Resolved;
    }

    pub fn expire(&mut self) {
        self.state = EntityState::Expired;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flash_times_out() {
        let flash = Entity::new(1, EntityKind::Flash { ttl_ms: 500 }, Vec2::ZERO, 10.0, 1000);
        assert!(!flash.timed_out(1499));
        assert!(flash.timed_out(1500));
    }

    #[test]
    fn test_obstacles_never_time_out() {
        let rock = Entity::new(1, EntityKind::Obstacle, Vec2::ZERO, 10.0, 0);
        assert!(!rock.timed_out(u64::MAX));
    }

    #[test]
    fn test_health_fraction() {
        let minion = Entity::new(
            3,
            EntityKind::Minion {
                health: 25.0,
                max_health: 100.0,
                decay_per_sec: 10.0,
            },
            Vec2::ZERO,
            20.0,
            0,
        );
        assert_eq!(minion.health_fraction(), Some(0.25));
        assert_eq!(Entity::new(4, EntityKind::Target, Vec2::ZERO, 1.0, 0).health_fraction(), None);
    }
}
