//! Local high score board
//!
//! Keeps the top 10 records per widget. Doubles as an in-process
//! [`ScoreSubmitter`] for hosts without a statistics service.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SubmitError;
use crate::report::{ScoreRecord, ScoreSubmitter};

/// Maximum number of high scores kept per widget
pub const MAX_HIGH_SCORES: usize = 10;

/// Per-widget leaderboards, each sorted by descending score
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct HighScores {
    pub boards: BTreeMap<String, Vec<ScoreRecord>>,
}

impl HighScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries_for(&self, widget_id: &str) -> &[ScoreRecord] {
        self.boards.get(widget_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Check if a score qualifies for the widget's board
    pub fn qualifies(&self, widget_id: &str, score: u64) -> bool {
        if score == 0 {
            return false;
        }
        let entries = self.entries_for(widget_id);
        if entries.len() < MAX_HIGH_SCORES {
            return true;
        }
        entries.last().is_none_or(|e| score > e.score)
    }

    /// Rank a score would achieve (1-indexed, None if it doesn't qualify)
    pub fn potential_rank(&self, widget_id: &str, score: u64) -> Option<usize> {
        if !self.qualifies(widget_id, score) {
            return None;
        }
        let entries = self.entries_for(widget_id);
        let rank = entries.iter().position(|e| score > e.score);
        Some(rank.unwrap_or(entries.len()) + 1)
    }

    /// Add a record if it qualifies; returns the rank achieved.
    ///
    /// Ties keep the earlier record ahead.
    pub fn add(&mut self, record: ScoreRecord) -> Option<usize> {
        if !self.qualifies(&record.widget_id, record.score) {
            return None;
        }
        let entries = self.boards.entry(record.widget_id.clone()).or_default();
        let pos = entries
            .iter()
            .position(|e| record.score > e.score)
            .unwrap_or(entries.len());
        entries.insert(pos, record);
        entries.truncate(MAX_HIGH_SCORES);
        Some(pos + 1)
    }

    pub fn is_empty(&self) -> bool {
        self.boards.values().all(Vec::is_empty)
    }

    pub fn top_score(&self, widget_id: &str) -> Option<u64> {
        self.entries_for(widget_id).first().map(|e| e.score)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Load a saved board; a corrupt blob starts fresh
    pub fn from_json(json: &str) -> Self {
        match serde_json::from_str::<HighScores>(json) {
            Ok(scores) => {
                log::info!("Loaded high scores for {} widgets", scores.boards.len());
                scores
            }
            Err(err) => {
                log::warn!("Discarding unreadable high scores: {err}");
                Self::new()
            }
        }
    }
}

impl ScoreSubmitter for HighScores {
    fn submit(&mut self, record: &ScoreRecord) -> Result<(), SubmitError> {
        match self.add(record.clone()) {
            Some(rank) => log::info!("{} scored {} (rank {rank})", record.widget_id, record.score),
            None => log::debug!("{} score {} missed the board", record.widget_id, record.score),
        }
        Ok(())
    }
}
