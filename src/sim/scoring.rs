//! Scoring: per-event points, tier multiplier, end-of-session adjustment

use serde::{Deserialize, Serialize};

use crate::consts::BASE_POINTS;

/// Points for one success at a tier multiplier
#[inline]
pub fn points_for_success(multiplier: f32) -> u64 {
    (BASE_POINTS * multiplier.max(0.0) as f64).round() as u64
}

/// Running tally for a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub score: u64,
    pub success_count: u32,
    pub failure_count: u32,
}

impl Tally {
    /// Record a success and return the points awarded
    pub fn success(&mut self, multiplier: f32) -> u64 {
        let points = points_for_success(multiplier);
        self.success_count += 1;
        self.score = self.score.saturating_add(points);
        points
    }

    pub fn failure(&mut self) {
        self.failure_count += 1;
    }

    pub fn attempts(&self) -> u32 {
        self.success_count + self.failure_count
    }

    /// Successes over all scored events
    pub fn hit_ratio(&self) -> f64 {
        crate::ratio(self.success_count, self.attempts())
    }
}

/// `hits / attempts`, zero when nothing was attempted
pub fn efficiency_from_hits(hits: u32, attempts: u32) -> f64 {
    crate::ratio(hits, attempts).clamp(0.0, 1.0)
}

/// `1 - excess / expected`, clamped into [0, 1]
pub fn efficiency_from_moves(moves: u32, expected: u32) -> f64 {
    if expected == 0 {
        return 0.0;
    }
    let excess = moves.saturating_sub(expected) as f64;
    (1.0 - excess / expected as f64).clamp(0.0, 1.0)
}

/// `round(score * (1 + efficiency))`, never negative
pub fn final_score(score: u64, efficiency: f64) -> u64 {
    let e = if efficiency.is_finite() {
        efficiency.clamp(0.0, 1.0)
    } else {
        0.0
    };
    (score as f64 * (1.0 + e)).round().max(0.0) as u64
}
