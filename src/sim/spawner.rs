//! Time-gated, capacity-bounded entity spawning
//!
//! The spawner owns id allocation, so ids are never reused within a session.

use super::entity::{Entity, EntityId, EntityState};

/// Spawn gate and id allocator
#[derive(Debug, Clone)]
pub struct Spawner {
    pub interval_ms: u64,
    pub capacity: usize,
    last_spawn_ms: Option<u64>,
    next_id: EntityId,
}

impl Spawner {
    pub fn new(interval_ms: u64, capacity: usize) -> Self {
        Self {
            interval_ms,
            capacity,
            last_spawn_ms: None,
            next_id: 1,
        }
    }

    /// Start the interval clock; the first timed spawn lands one interval later
    pub fn arm(&mut self, now_ms: u64) {
        self.last_spawn_ms = Some(now_ms);
    }

    pub fn is_armed(&self) -> bool {
        self.last_spawn_ms.is_some()
    }

    /// Allocate a fresh entity id
    pub fn allocate_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Number of entities counting against capacity
    pub fn alive(entities: &[Entity]) -> usize {
        entities.iter().filter(|e| e.is_alive()).count()
    }

    /// Whether a timed spawn may happen now
    pub fn due(&self, now_ms: u64, entities: &[Entity]) -> bool {
        self.due_with(now_ms, Self::alive(entities))
    }

    fn due_with(&self, now_ms: u64, alive: usize) -> bool {
        let Some(last) = self.last_spawn_ms else {
            return false;
        };
        now_ms.saturating_sub(last) >= self.interval_ms && alive < self.capacity
    }

    /// Spawn at most one entity if the interval has elapsed and there is room.
    ///
    /// `make` receives the allocated id and builds the entity.
    pub fn spawn_due<F>(&mut self, now_ms: u64, entities: &mut Vec<Entity>, make: F) -> Option<EntityId>
    where
        F: FnOnce(EntityId) -> Entity,
    {
        self.spawn_due_where(now_ms, entities, |_| true, make)
    }

    /// Like [`Spawner::spawn_due`], but only entities matching `counts`
    /// take up capacity (targets, not the projectiles fired at them).
    pub fn spawn_due_where<P, F>(
        &mut self,
        now_ms: u64,
        entities: &mut Vec<Entity>,
        counts: P,
        make: F,
    ) -> Option<EntityId>
    where
        P: Fn(&Entity) -> bool,
        F: FnOnce(EntityId) -> Entity,
    {
        let alive = entities.iter().filter(|e| e.is_alive() && counts(e)).count();
        if !self.due_with(now_ms, alive) {
            return None;
        }
        self.last_spawn_ms = Some(now_ms);
        let id = self.allocate_id();
        insert(entities, make(id)).then_some(id)
    }

    /// Constant-pressure refill: top up to capacity right away.
    ///
    /// Resets the interval clock when anything was spawned.
    pub fn replenish<F>(&mut self, now_ms: u64, entities: &mut Vec<Entity>, mut make: F) -> usize
    where
        F: FnMut(EntityId) -> Entity,
    {
        let mut spawned = 0;
        while Self::alive(entities) < self.capacity {
            let id = self.allocate_id();
            if !insert(entities, make(id)) {
                break;
            }
            spawned += 1;
        }
        if spawned > 0 {
            self.last_spawn_ms = Some(now_ms);
        }
        spawned
    }
}

/// Insert an entity, refusing duplicate ids.
///
/// A duplicate is a programmer error: fatal in debug builds, dropped in release.
pub fn insert(entities: &mut Vec<Entity>, entity: Entity) -> bool {
    if entities.iter().any(|e| e.id == entity.id) {
        debug_assert!(false, "duplicate entity id {}", entity.id);
        log::warn!("Dropping entity with duplicate id {}", entity.id);
        return false;
    }
    entities.push(entity);
    true
}

/// Remove every entity that is no longer alive, returning them
pub fn sweep(entities: &mut Vec<Entity>) -> Vec<Entity> {
    let mut removed = Vec::new();
    entities.retain(|e| {
        if e.state == EntityState::Alive {
            true
        } else {
            removed.push(e.clone());
            false
        }
    });
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::entity::EntityKind;
    use glam::Vec2;

    fn rock(id: EntityId, now: u64) -> Entity {
        Entity::new(id, EntityKind::Obstacle, Vec2::ZERO, 5.0, now)
    }

    #[test]
    fn test_capacity_bounded_spawning() {
        // capacity 3, 1000 ms interval, 3500 ms of 16 ms ticks, nothing removed
        let mut spawner = Spawner::new(1000, 3);
        let mut entities = Vec::new();
        spawner.arm(0);

        let mut now = 0;
        while now <= 3500 {
            spawner.spawn_due(now, &mut entities, |id| rock(id, now));
            assert!(entities.len() <= 3);
            now += 16;
        }
        assert_eq!(entities.len(), 3);

        // Still capped long after
        while now <= 10_000 {
            spawner.spawn_due(now, &mut entities, |id| rock(id, now));
            now += 16;
        }
        assert_eq!(entities.len(), 3);
    }

    #[test]
    fn test_capacity_counts_only_matching_entities() {
        let mut spawner = Spawner::new(0, 1);
        spawner.arm(0);
        let mut entities = vec![Entity::new(
            spawner.allocate_id(),
            EntityKind::Projectile,
            Vec2::ZERO,
            2.0,
            0,
        )];
        let is_rock = |e: &Entity| e.kind == EntityKind::Obstacle;
        assert!(spawner.spawn_due_where(1, &mut entities, is_rock, |id| rock(id, 1)).is_some());
        assert!(spawner.spawn_due_where(2, &mut entities, is_rock, |id| rock(id, 2)).is_none());
        assert_eq!(entities.len(), 2);
    }

    #[test]
    fn test_unarmed_spawner_is_idle() {
        let mut spawner = Spawner::new(10, 5);
        let mut entities = Vec::new();
        assert!(spawner.spawn_due(1000, &mut entities, |id| rock(id, 1000)).is_none());
    }

    #[test]
    fn test_ids_never_reused() {
        let mut spawner = Spawner::new(0, 1);
        let mut entities = Vec::new();
        spawner.arm(0);
        let mut seen = Vec::new();
        for t in 0..20 {
            if let Some(id) = spawner.spawn_due(t, &mut entities, |id| rock(id, t)) {
                assert!(!seen.contains(&id));
                seen.push(id);
            }
            entities[0].expire();
            sweep(&mut entities);
        }
        assert_eq!(seen.len(), 20);
    }

    #[test]
    fn test_sweep_returns_removed() {
        let mut entities = vec![rock(1, 0), rock(2, 0), rock(3, 0)];
        entities[1].resolve();
        let removed = sweep(&mut entities);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, 2);
        assert_eq!(entities.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_replenish_fills_to_capacity() {
        let mut spawner = Spawner::new(5000, 4);
        let mut entities = vec![rock(spawner.allocate_id(), 0)];
        let n = spawner.replenish(100, &mut entities, |id| rock(id, 100));
        assert_eq!(n, 3);
        assert_eq!(Spawner::alive(&entities), 4);
        assert!(spawner.is_armed());
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_duplicate_dropped_in_release() {
        let mut entities = vec![rock(1, 0)];
        assert!(!insert(&mut entities, rock(1, 0)));
        assert_eq!(entities.len(), 1);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "duplicate entity id")]
    fn test_duplicate_panics_in_debug() {
        let mut entities = vec![rock(1, 0)];
        insert(&mut entities, rock(1, 0));
    }
}
