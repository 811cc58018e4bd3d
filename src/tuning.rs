//! Data-driven difficulty tables
//!
//! Every drill has one table of four tiers. Tables are static data and are
//! validated for monotonic difficulty: moving up a tier never lengthens the
//! spawn interval, never slows entities and never lowers the multiplier.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sim::DrillKind;

/// Preset difficulty tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyTier {
    Easy,
    Medium,
    Hard,
    Expert,
}

impl DifficultyTier {
    pub const ALL: [DifficultyTier; 4] = [
        DifficultyTier::Easy,
        DifficultyTier::Medium,
        DifficultyTier::Hard,
        DifficultyTier::Expert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DifficultyTier::Easy => "easy",
            DifficultyTier::Medium => "medium",
            DifficultyTier::Hard => "hard",
            DifficultyTier::Expert => "expert",
        }
    }

    /// Position in a tier table
    pub fn index(self) -> usize {
        match self {
            DifficultyTier::Easy => 0,
            DifficultyTier::Medium => 1,
            DifficultyTier::Hard => 2,
            DifficultyTier::Expert => 3,
        }
    }

    /// Pick one of four per-tier values
    pub fn pick<T: Copy>(self, values: [T; 4]) -> T {
        values[self.index()]
    }
}

impl FromStr for DifficultyTier {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(DifficultyTier::Easy),
            "medium" | "med" | "normal" => Ok(DifficultyTier::Medium),
            "hard" => Ok(DifficultyTier::Hard),
            "expert" => Ok(DifficultyTier::Expert),
            _ => Err(ConfigError::UnknownTier(s.to_string())),
        }
    }
}

/// Tuned constants for one tier of one drill
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyProfile {
    pub tier: DifficultyTier,
    /// Minimum gap between spawns (or per-step show time for turn-like drills)
    pub spawn_interval_ms: u64,
    /// Entity speed in field units per second
    pub speed: f32,
    /// Entity radius (or tile/card half-size)
    pub size: f32,
    /// Maximum simultaneously alive entities (pairs for card drills)
    pub capacity: usize,
    pub scoring_multiplier: f32,
    pub session_budget_ms: u64,
}

/// Four-tier table for one drill
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyTable {
    pub profiles: [DifficultyProfile; 4],
}

impl DifficultyTable {
    pub fn profile(&self, tier: DifficultyTier) -> DifficultyProfile {
        self.profiles[tier.index()]
    }

    /// Check ordering, tier labels and positivity
    pub fn validate(&self, drill: DrillKind) -> Result<(), ConfigError> {
        let fail = |reason: String| ConfigError::NonMonotonic { drill, reason };

        for (i, profile) in self.profiles.iter().enumerate() {
            if profile.tier != DifficultyTier::ALL[i] {
                return Err(fail(format!("slot {i} holds {:?}", profile.tier)));
            }
            if profile.session_budget_ms == 0 {
                return Err(fail(format!("{:?} has a zero session budget", profile.tier)));
            }
            if profile.capacity == 0 {
                return Err(fail(format!("{:?} has zero capacity", profile.tier)));
            }
        }

        for pair in self.profiles.windows(2) {
            let (lower, higher) = (&pair[0], &pair[1]);
            if higher.spawn_interval_ms > lower.spawn_interval_ms {
                return Err(fail(format!(
                    "{:?} spawns slower than {:?}",
                    higher.tier, lower.tier
                )));
            }
            if higher.speed < lower.speed {
                return Err(fail(format!("{:?} is slower than {:?}", higher.tier, lower.tier)));
            }
            if higher.scoring_multiplier < lower.scoring_multiplier {
                return Err(fail(format!(
                    "{:?} pays less than {:?}",
                    higher.tier, lower.tier
                )));
            }
        }
        Ok(())
    }
}

const MULTIPLIERS: [f32; 4] = [1.0, 1.25, 1.5, 2.0];

/// Build a table from per-tier columns
const fn table(
    spawn_interval_ms: [u64; 4],
    speed: [f32; 4],
    size: [f32; 4],
    capacity: [usize; 4],
    session_budget_ms: [u64; 4],
) -> DifficultyTable {
    let tiers = DifficultyTier::ALL;
    let mut profiles = [DifficultyProfile {
        tier: DifficultyTier::Easy,
        spawn_interval_ms: 0,
        speed: 0.0,
        size: 0.0,
        capacity: 0,
        scoring_multiplier: 0.0,
        session_budget_ms: 0,
    }; 4];
    let mut i = 0;
    while i < 4 {
        profiles[i] = DifficultyProfile {
            tier: tiers[i],
            spawn_interval_ms: spawn_interval_ms[i],
            speed: speed[i],
            size: size[i],
            capacity: capacity[i],
            scoring_multiplier: MULTIPLIERS[i],
            session_budget_ms: session_budget_ms[i],
        };
        i += 1;
    }
    DifficultyTable { profiles }
}

pub static DODGE: DifficultyTable = table(
    [900, 700, 520, 400],
    [160.0, 210.0, 260.0, 320.0],
    [14.0, 16.0, 18.0, 20.0],
    [6, 9, 12, 16],
    [30_000; 4],
);

/// Spawn interval unused (single persistent target)
pub static TRACKING: DifficultyTable = table(
    [1000, 1000, 1000, 1000],
    [120.0, 170.0, 230.0, 300.0],
    [40.0, 32.0, 26.0, 20.0],
    [1, 1, 1, 1],
    [30_000; 4],
);

pub static SKILLSHOT: DifficultyTable = table(
    [1500, 1200, 900, 700],
    [60.0, 90.0, 130.0, 170.0],
    [30.0, 24.0, 20.0, 16.0],
    [3, 4, 5, 6],
    [30_000; 4],
);

/// Interval is tile show time; capacity is tile count
pub static RECALL: DifficultyTable = table(
    [800, 650, 500, 400],
    [0.0; 4],
    [80.0, 80.0, 64.0, 64.0],
    [9, 9, 16, 16],
    [120_000; 4],
);

/// Interval is the preview time; capacity is the number of pairs
pub static CARDS: DifficultyTable = table(
    [3000, 2500, 2000, 1500],
    [0.0; 4],
    [60.0, 55.0, 50.0, 45.0],
    [6, 8, 10, 12],
    [90_000, 90_000, 120_000, 120_000],
);

/// Interval is the longest random wait before the signal
pub static REACTION: DifficultyTable = table(
    [5000, 4500, 4000, 3500],
    [0.0; 4],
    [60.0; 4],
    [1, 1, 1, 1],
    [60_000; 4],
);

/// Interval is the prompt spawn gap; speed drives the tracked target
pub static MULTITASK: DifficultyTable = table(
    [2500, 2000, 1600, 1200],
    [120.0, 170.0, 220.0, 280.0],
    [36.0, 30.0, 26.0, 22.0],
    [1, 2, 2, 3],
    [45_000; 4],
);

pub static PERIPHERAL: DifficultyTable = table(
    [1500, 1200, 1000, 800],
    [0.0; 4],
    [28.0, 24.0, 20.0, 16.0],
    [1, 1, 2, 2],
    [30_000; 4],
);

/// Speed is minion health decay per second
pub static LAST_HIT: DifficultyTable = table(
    [1200, 1000, 800, 700],
    [18.0, 24.0, 30.0, 38.0],
    [22.0, 22.0, 20.0, 18.0],
    [4, 5, 6, 7],
    [45_000; 4],
);

/// Table for a drill
pub fn table_for(kind: DrillKind) -> &'static DifficultyTable {
    match kind {
        DrillKind::Dodge => &DODGE,
        DrillKind::Tracking => &TRACKING,
        DrillKind::Skillshot => &SKILLSHOT,
        DrillKind::Recall => &RECALL,
        DrillKind::Cards => &CARDS,
        DrillKind::Reaction => &REACTION,
        DrillKind::Multitask => &MULTITASK,
        DrillKind::Peripheral => &PERIPHERAL,
        DrillKind::LastHit => &LAST_HIT,
    }
}

/// Profile for a drill at a tier
pub fn profile(kind: DrillKind, tier: DifficultyTier) -> DifficultyProfile {
    table_for(kind).profile(tier)
}
