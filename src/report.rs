//! Score records and the outbound boundary
//!
//! On completion a session produces exactly one [`ScoreRecord`]. The
//! [`ResultEmitter`] hands it to the score submitter (when auto-submit is on)
//! and then to the observer. Submission failures never touch session state.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::SubmitError;
use crate::sim::state::SessionState;
use crate::tuning::DifficultyTier;

/// Normalized result of one finished session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    pub widget_id: String,
    pub user_id: Option<String>,
    pub score: u64,
    pub metrics: BTreeMap<String, f64>,
    pub difficulty: DifficultyTier,
    /// Wall-clock completion time, ms since the Unix epoch
    pub completed_at_ms: u64,
    /// Simulated time from `start()` to completion
    pub duration_ms: u64,
}

impl ScoreRecord {
    /// Assemble the record of a completed session; `None` until complete
    pub fn from_state(
        state: &SessionState,
        user_id: Option<String>,
        completed_at_ms: u64,
    ) -> Option<Self> {
        let score = state.final_score?;
        Some(Self {
            widget_id: state.kind.widget_id().to_string(),
            user_id,
            score,
            metrics: state.metrics.clone(),
            difficulty: state.difficulty.tier,
            completed_at_ms,
            duration_ms: state.elapsed_ms(),
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Mid-session progress, sent on every scored event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub current_step: u32,
    pub total_steps: u32,
    pub partial_score: u64,
    pub metrics: BTreeMap<String, f64>,
}

impl Progress {
    pub fn from_state(state: &SessionState, (current_step, total_steps): (u32, u32)) -> Self {
        let mut metrics = BTreeMap::new();
        metrics.insert("successes".to_string(), state.tally.success_count as f64);
        metrics.insert("failures".to_string(), state.tally.failure_count as f64);
        metrics.insert("accuracy".to_string(), state.tally.hit_ratio());
        Self {
            current_step,
            total_steps,
            partial_score: state.tally.score,
            metrics,
        }
    }
}

/// Remote statistics service boundary
pub trait ScoreSubmitter {
    fn submit(&mut self, record: &ScoreRecord) -> Result<(), SubmitError>;
}

impl<T: ScoreSubmitter + ?Sized> ScoreSubmitter for Rc<RefCell<T>> {
    fn submit(&mut self, record: &ScoreRecord) -> Result<(), SubmitError> {
        self.borrow_mut().submit(record)
    }
}

/// Hosting shell callbacks
pub trait SessionObserver {
    fn on_progress(&mut self, _progress: &Progress) {}
    fn on_complete(&mut self, _record: &ScoreRecord) {}
    fn on_error(&mut self, _error: &SubmitError) {}
}

impl<T: SessionObserver + ?Sized> SessionObserver for Rc<RefCell<T>> {
    fn on_progress(&mut self, progress: &Progress) {
        self.borrow_mut().on_progress(progress);
    }

    fn on_complete(&mut self, record: &ScoreRecord) {
        self.borrow_mut().on_complete(record);
    }

    fn on_error(&mut self, error: &SubmitError) {
        self.borrow_mut().on_error(error);
    }
}

/// Observer that keeps everything it is told
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    pub progress: Vec<Progress>,
    pub completed: Vec<ScoreRecord>,
    pub errors: Vec<SubmitError>,
}

impl SessionObserver for EventLog {
    fn on_progress(&mut self, progress: &Progress) {
        self.progress.push(progress.clone());
    }

    fn on_complete(&mut self, record: &ScoreRecord) {
        self.completed.push(record.clone());
    }

    fn on_error(&mut self, error: &SubmitError) {
        self.errors.push(error.clone());
    }
}

/// Routes results to the submitter and observer
#[derive(Default)]
pub struct ResultEmitter {
    observer: Option<Box<dyn SessionObserver>>,
    submitter: Option<Box<dyn ScoreSubmitter>>,
}

impl ResultEmitter {
    pub fn set_observer(&mut self, observer: Box<dyn SessionObserver>) {
        self.observer = Some(observer);
    }

    pub fn set_submitter(&mut self, submitter: Box<dyn ScoreSubmitter>) {
        self.submitter = Some(submitter);
    }

    pub fn progress(&mut self, progress: &Progress) {
        if let Some(observer) = self.observer.as_mut() {
            observer.on_progress(progress);
        }
    }

    /// Submit (if enabled), report any failure, then announce completion
    pub fn emit(&mut self, record: &ScoreRecord, auto_submit: bool) {
        if auto_submit {
            match self.submitter.as_mut() {
                Some(submitter) => {
                    if let Err(err) = submitter.submit(record) {
                        log::warn!("Score submission for {} failed: {err}", record.widget_id);
                        if let Some(observer) = self.observer.as_mut() {
                            observer.on_error(&err);
                        }
                    }
                }
                None => log::debug!("No score submitter configured"),
            }
        }
        if let Some(observer) = self.observer.as_mut() {
            observer.on_complete(record);
        }
    }
}
