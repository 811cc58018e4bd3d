//! Entity kinematics: integration, wall reflection and jitter
//!
//! Positions are field units, velocities are units per second.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::entity::Entity;
use crate::consts::{FIELD_HEIGHT, FIELD_WIDTH};

/// Axis-aligned play field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::new(FIELD_WIDTH, FIELD_HEIGHT)
    }
}

impl Bounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            min: Vec2::ZERO,
            max: Vec2::new(width, height),
        }
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Inclusive point test
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Clamp a point into the field
    pub fn clamp(&self, p: Vec2) -> Vec2 {
        p.clamp(self.min, self.max)
    }

    /// Shrink by `margin` on every side (collapses to the center if too small)
    pub fn inset(&self, margin: f32) -> Bounds {
        let c = self.center();
        let half = ((self.max - self.min) * 0.5 - Vec2::splat(margin)).max(Vec2::ZERO);
        Bounds {
            min: c - half,
            max: c + half,
        }
    }

    /// Uniform point at least `margin` away from every wall
    pub fn random_interior<R: Rng + ?Sized>(&self, rng: &mut R, margin: f32) -> Vec2 {
        let inner = self.inset(margin);
        Vec2::new(
            lerp(inner.min.x, inner.max.x, rng.random::<f32>()),
            lerp(inner.min.y, inner.max.y, rng.random::<f32>()),
        )
    }

    /// Point on a random wall plus the inward unit normal of that wall
    pub fn random_edge<R: Rng + ?Sized>(&self, rng: &mut R) -> (Vec2, Vec2) {
        let t = rng.random::<f32>();
        match rng.random_range(0..4u8) {
            0 => (
                Vec2::new(lerp(self.min.x, self.max.x, t), self.min.y),
                Vec2::Y,
            ),
            1 => (
                Vec2::new(self.max.x, lerp(self.min.y, self.max.y, t)),
                Vec2::NEG_X,
            ),
            2 => (
                Vec2::new(lerp(self.min.x, self.max.x, t), self.max.y),
                Vec2::NEG_Y,
            ),
            _ => (
                Vec2::new(self.min.x, lerp(self.min.y, self.max.y, t)),
                Vec2::X,
            ),
        }
    }
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// `pos += vel * dt`
#[inline]
pub fn integrate(entity: &mut Entity, dt: f32) {
    entity.pos += entity.vel * dt;
}

/// Bounce off the walls, keeping the whole entity inside.
///
/// `restitution` < 1 damps the reflected component for soft bounces.
/// Returns true if any wall was hit.
pub fn reflect(entity: &mut Entity, bounds: &Bounds, restitution: f32) -> bool {
    let inner = bounds.inset(entity.size);
    let mut bounced = false;

    if entity.pos.x < inner.min.x {
        entity.pos.x = inner.min.x;
        entity.vel.x = entity.vel.x.abs() * restitution;
        bounced = true;
    } else if entity.pos.x > inner.max.x {
        entity.pos.x = inner.max.x;
        entity.vel.x = -entity.vel.x.abs() * restitution;
        bounced = true;
    }

    if entity.pos.y < inner.min.y {
        entity.pos.y = inner.min.y;
        entity.vel.y = entity.vel.y.abs() * restitution;
        bounced = true;
    } else if entity.pos.y > inner.max.y {
        entity.pos.y = inner.max.y;
        entity.vel.y = -entity.vel.y.abs() * restitution;
        bounced = true;
    }

    bounced
}

/// Integrate then reflect
pub fn step_bouncing(entity: &mut Entity, bounds: &Bounds, dt: f32, restitution: f32) -> bool {
    integrate(entity, dt);
    reflect(entity, bounds, restitution)
}

/// Scale `vel` down so its length does not exceed `max_speed`
#[inline]
pub fn clamp_speed(vel: Vec2, max_speed: f32) -> Vec2 {
    vel.clamp_length_max(max_speed.max(0.0))
}

/// Random-walk jitter: with `probability` per call, nudge velocity by up to
/// `magnitude` and cap the result at `max_speed`.
pub fn perturb<R: Rng + ?Sized>(
    entity: &mut Entity,
    rng: &mut R,
    probability: f64,
    magnitude: f32,
    max_speed: f32,
) -> bool {
    if !rng.random_bool(probability.clamp(0.0, 1.0)) {
        return false;
    }
    let angle = rng.random::<f32>() * std::f32::consts::TAU;
    let delta = Vec2::from_angle(angle) * magnitude * rng.random::<f32>();
    entity.vel = clamp_speed(entity.vel + delta, max_speed);
    true
}

/// Random heading with speed in `[min_factor, 1] * speed`
pub fn random_velocity<R: Rng + ?Sized>(rng: &mut R, speed: f32, min_factor: f32) -> Vec2 {
    let angle = rng.random::<f32>() * std::f32::consts::TAU;
    let factor = lerp(min_factor.clamp(0.0, 1.0), 1.0, rng.random::<f32>());
    Vec2::from_angle(angle) * speed * factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::entity::EntityKind;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn ball(pos: Vec2, vel: Vec2, size: f32) -> Entity {
        Entity::new(1, EntityKind::Target, pos, size, 0).with_velocity(vel)
    }

    #[test]
    fn test_reflect_off_right_wall() {
        let bounds = Bounds::new(100.0, 100.0);
        let mut e = ball(Vec2::new(98.0, 50.0), Vec2::new(40.0, 10.0), 5.0);
        assert!(reflect(&mut e, &bounds, 1.0));
        assert_eq!(e.pos.x, 95.0);
        assert_eq!(e.vel, Vec2::new(-40.0, 10.0));
    }

    #[test]
    fn test_soft_bounce_damps() {
        let bounds = Bounds::new(100.0, 100.0);
        let mut e = ball(Vec2::new(50.0, -3.0), Vec2::new(0.0, -100.0), 0.0);
        reflect(&mut e, &bounds, 0.5);
        assert_eq!(e.pos.y, 0.0);
        assert_eq!(e.vel.y, 50.0);
    }

    #[test]
    fn test_no_bounce_inside() {
        let bounds = Bounds::new(100.0, 100.0);
        let mut e = ball(Vec2::new(50.0, 50.0), Vec2::new(10.0, 10.0), 5.0);
        assert!(!step_bouncing(&mut e, &bounds, 0.016, 1.0));
    }

    #[test]
    fn test_perturb_respects_speed_cap() {
        let mut rng = Pcg32::seed_from_u64(3);
        let mut e = ball(Vec2::ZERO, Vec2::new(100.0, 0.0), 1.0);
        for _ in 0..1000 {
            perturb(&mut e, &mut rng, 1.0, 80.0, 150.0);
            assert!(e.vel.length() <= 150.0 + 1e-3);
        }
    }

    #[test]
    fn test_random_edge_lies_on_boundary() {
        let bounds = Bounds::new(800.0, 600.0);
        let mut rng = Pcg32::seed_from_u64(11);
        for _ in 0..200 {
            let (p, inward) = bounds.random_edge(&mut rng);
            assert!(bounds.contains(p));
            let on_wall = p.x == 0.0 || p.x == 800.0 || p.y == 0.0 || p.y == 600.0;
            assert!(on_wall);
            assert!((inward.length() - 1.0).abs() < 1e-6);
        }
    }

    proptest! {
        #[test]
        fn prop_bouncing_stays_in_bounds(
            x in 0.0f32..400.0,
            y in 0.0f32..300.0,
            vx in -2000.0f32..2000.0,
            vy in -2000.0f32..2000.0,
            size in 0.0f32..40.0,
            restitution in 0.1f32..1.0,
            steps in proptest::collection::vec(1u64..100, 1..200),
        ) {
            let bounds = Bounds::new(400.0, 300.0);
            let mut e = ball(Vec2::new(x, y), Vec2::new(vx, vy), size);
            for dt_ms in steps {
                step_bouncing(&mut e, &bounds, crate::ms_to_secs(dt_ms), restitution);
                prop_assert!(bounds.contains(e.pos));
            }
        }
    }
}
