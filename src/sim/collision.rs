//! Collision and match detection
//!
//! Three families, picked per drill: circle proximity, box containment and
//! identity matching. Plus the last-hit "valid window" rule.

use glam::Vec2;

use super::entity::{Entity, EntityId, EntityKind};

/// Circle-circle proximity. Strict: touching edges do not count.
#[inline]
pub fn circles_overlap(a: Vec2, ra: f32, b: Vec2, rb: f32, tolerance: f32) -> bool {
    let reach = ra + rb + tolerance;
    a.distance_squared(b) < reach * reach
}

/// Point inside (or on) a circle
#[inline]
pub fn point_in_circle(p: Vec2, center: Vec2, radius: f32) -> bool {
    p.distance_squared(center) <= radius * radius
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn from_center(center: Vec2, half_extent: Vec2) -> Self {
        Self {
            min: center - half_extent,
            max: center + half_extent,
        }
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// Click against a peripheral flash: must be alive, unexpired and under the cursor
pub fn flash_hit(point: Vec2, flash: &Entity, now_ms: u64) -> bool {
    matches!(flash.kind, EntityKind::Flash { .. })
        && flash.is_alive()
        && !flash.timed_out(now_ms)
        && point_in_circle(point, flash.pos, flash.size)
}

/// Outcome of comparing two selections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Match,
    Mismatch,
    /// Same entity picked twice; never scored
    SameEntity,
}

/// Identity match: distinct entities with the same pair id
pub fn pair_match(a: &Entity, b: &Entity) -> MatchOutcome {
    if a.id == b.id {
        return MatchOutcome::SameEntity;
    }
    match (a.pair_id(), b.pair_id()) {
        (Some(x), Some(y)) if x == y => MatchOutcome::Match,
        _ => MatchOutcome::Mismatch,
    }
}

/// Last-hit window: success only when health is at or under `threshold` of max
pub fn in_valid_window(entity: &Entity, threshold: f32) -> bool {
    entity
        .health_fraction()
        .is_some_and(|f| f > 0.0 && f <= threshold)
}

/// Shape used when hit-testing a click
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitShape {
    Circle,
    Square,
}

/// Newest alive entity under `point` accepted by `filter`.
///
/// Newest wins so that overlapping entities resolve to the one drawn on top.
pub fn pick<F>(entities: &[Entity], point: Vec2, shape: HitShape, tolerance: f32, filter: F) -> Option<EntityId>
where
    F: Fn(&Entity) -> bool,
{
    entities
        .iter()
        .rev()
        .filter(|e| e.is_alive() && filter(e))
        .find(|e| match shape {
            HitShape::Circle => point_in_circle(point, e.pos, e.size + tolerance),
            HitShape::Square => {
                Rect::from_center(e.pos, Vec2::splat(e.size + tolerance)).contains(point)
            }
        })
        .map(|e| e.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(id: EntityId, kind: EntityKind, x: f32, y: f32, size: f32) -> Entity {
        Entity::new(id, kind, Vec2::new(x, y), size, 0)
    }

    #[test]
    fn test_circle_proximity() {
        assert!(circles_overlap(Vec2::ZERO, 5.0, Vec2::new(9.0, 0.0), 5.0, 0.0));
        // Exactly touching is not a hit
        assert!(!circles_overlap(Vec2::ZERO, 5.0, Vec2::new(10.0, 0.0), 5.0, 0.0));
        // Tolerance widens the reach for cursors
        assert!(circles_overlap(Vec2::ZERO, 5.0, Vec2::new(12.0, 0.0), 5.0, 3.0));
    }

    #[test]
    fn test_square_pick_reaches_corners() {
        let tile = at(4, EntityKind::Target, 100.0, 100.0, 10.0);
        let entities = [tile];
        let corner = Vec2::new(109.0, 109.0);
        assert_eq!(pick(&entities, corner, HitShape::Square, 0.0, |_| true), Some(4));
        assert_eq!(pick(&entities, corner, HitShape::Circle, 0.0, |_| true), None);
        // Edges are inclusive; tolerance widens the box
        assert!(Rect::from_center(entities[0].pos, Vec2::splat(10.0)).contains(Vec2::new(110.0, 90.0)));
        assert_eq!(
            pick(&entities, Vec2::new(112.0, 100.0), HitShape::Square, 3.0, |_| true),
            Some(4)
        );
    }

    #[test]
    fn test_flash_hit_requires_live_flash() {
        let mut flash = at(1, EntityKind::Flash { ttl_ms: 500 }, 100.0, 100.0, 20.0);
        let inside = Vec2::new(110.0, 100.0);
        assert!(flash_hit(inside, &flash, 100));
        assert!(!flash_hit(Vec2::new(130.0, 100.0), &flash, 100));
        assert!(!flash_hit(inside, &flash, 500));
        flash.resolve();
        assert!(!flash_hit(inside, &flash, 100));
    }

    #[test]
    fn test_pair_match() {
        let card = |id, pair_id| {
            at(
                id,
                EntityKind::Card {
                    pair_id,
                    face_up: false,
                    matched: false,
                },
                0.0,
                0.0,
                10.0,
            )
        };
        let a = card(1, 7);
        let b = card(2, 7);
        let c = card(3, 8);
        assert_eq!(pair_match(&a, &b), MatchOutcome::Match);
        assert_eq!(pair_match(&a, &c), MatchOutcome::Mismatch);
        assert_eq!(pair_match(&a, &a), MatchOutcome::SameEntity);
    }

    #[test]
    fn test_valid_window() {
        let minion = |health| {
            at(
                1,
                EntityKind::Minion {
                    health,
                    max_health: 100.0,
                    decay_per_sec: 0.0,
                },
                0.0,
                0.0,
                10.0,
            )
        };
        assert!(in_valid_window(&minion(15.0), 0.2));
        assert!(in_valid_window(&minion(20.0), 0.2));
        assert!(!in_valid_window(&minion(21.0), 0.2));
        assert!(!in_valid_window(&minion(0.0), 0.2));
    }

    #[test]
    fn test_pick_prefers_newest() {
        let entities = vec![
            at(1, EntityKind::Target, 50.0, 50.0, 20.0),
            at(2, EntityKind::Target, 55.0, 50.0, 20.0),
        ];
        let hit = pick(&entities, Vec2::new(52.0, 50.0), HitShape::Circle, 0.0, |_| true);
        assert_eq!(hit, Some(2));
        let miss = pick(&entities, Vec2::new(200.0, 50.0), HitShape::Circle, 0.0, |_| true);
        assert_eq!(miss, None);
        let square = pick(&entities, Vec2::new(34.0, 34.0), HitShape::Square, 0.0, |e| e.id == 1);
        assert_eq!(square, Some(1));
    }
}
