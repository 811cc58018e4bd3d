//! Deterministic simulation module
//!
//! All drill logic lives here. This module must stay pure and deterministic:
//! - Simulated clock only, advanced by the session's scheduler
//! - Seeded RNG only
//! - Stable iteration order (entities kept sorted by id)
//! - No rendering or platform dependencies

pub mod collision;
pub mod drills;
pub mod entity;
pub mod kinematics;
pub mod phase;
pub mod scheduler;
pub mod scoring;
pub mod spawner;
pub mod state;
pub mod tick;

pub use drills::{Drill, DrillKind};
pub use entity::{Entity, EntityId, EntityKind, EntityState};
pub use kinematics::Bounds;
pub use phase::{Phase, PhaseMachine};
pub use scheduler::{DriverHandle, Fired, Scheduler, TimerPurpose};
pub use spawner::Spawner;
pub use state::{Effect, SessionState, Snapshot};
pub use tick::{Action, SimEvent};
