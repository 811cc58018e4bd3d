//! Session driver
//!
//! A [`Session`] is the single writer of one drill run. It owns the state, the
//! drill rules, the simulated-clock scheduler and the outbound emitter. Hosts
//! feed it wall-clock deltas (`advance`) and user input (`act`); everything
//! else happens in response.

use crate::config::{ResolvedConfig, SessionConfig};
use crate::consts::TICK_PERIOD_MS;
use crate::error::SessionError;
use crate::platform;
use crate::report::{Progress, ResultEmitter, ScoreRecord, ScoreSubmitter, SessionObserver};
use crate::sim::drills::{self, Drill, DrillKind};
use crate::sim::scheduler::{DriverHandle, Fired, Scheduler};
use crate::sim::state::{Effect, SessionState, Snapshot};
use crate::sim::tick::{self, Action, SimEvent};
use crate::sim::Phase;
use crate::tuning::DifficultyProfile;

type DrillFactory = Box<dyn Fn(&DifficultyProfile) -> Box<dyn Drill>>;

/// One drill run, from `start()` to `Complete`
pub struct Session {
    config: ResolvedConfig,
    factory: DrillFactory,
    drill: Box<dyn Drill>,
    state: SessionState,
    scheduler: Scheduler,
    emitter: ResultEmitter,
    record: Option<ScoreRecord>,
}

impl Session {
    /// Session with the stock rules for the configured drill
    pub fn new(config: ResolvedConfig) -> Self {
        let kind = config.kind;
        Self::with_drill(config, move |profile| drills::create(kind, profile))
    }

    /// Validate host configuration and build a session
    pub fn from_config(kind: DrillKind, config: &SessionConfig) -> Result<Self, SessionError> {
        Ok(Self::new(config.resolve(kind)?))
    }

    /// Session with custom drill rules. The factory runs on every (re)start.
    pub fn with_drill<F>(config: ResolvedConfig, factory: F) -> Self
    where
        F: Fn(&DifficultyProfile) -> Box<dyn Drill> + 'static,
    {
        let scheduler = Scheduler::new();
        let drill = factory(&config.profile);
        let state = SessionState::new(&config, scheduler.now_ms());
        Self {
            config,
            factory: Box::new(factory),
            drill,
            state,
            scheduler,
            emitter: ResultEmitter::default(),
            record: None,
        }
    }

    pub fn with_observer(mut self, observer: impl SessionObserver + 'static) -> Self {
        self.emitter.set_observer(Box::new(observer));
        self
    }

    pub fn with_submitter(mut self, submitter: impl ScoreSubmitter + 'static) -> Self {
        self.emitter.set_submitter(Box::new(submitter));
        self
    }

    pub fn kind(&self) -> DrillKind {
        self.config.kind
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Start (or restart) the session. Live drivers are cancelled first.
    pub fn start(&mut self) -> DriverHandle {
        let handle = self.scheduler.begin();
        self.fresh_state();
        if self.config.kind.is_continuous() {
            self.scheduler.start_tick();
        }
        if let Err(err) = tick::begin(&mut self.state, self.drill.as_mut()) {
            log::warn!("{:?}: could not start: {err}", self.config.kind);
        }
        self.flush();
        handle
    }

    /// Stop every driver and return to Idle
    pub fn reset(&mut self) {
        self.scheduler.cancel_all();
        self.fresh_state();
        log::info!("{:?} session reset", self.config.kind);
    }

    /// Cancel drivers through the handle returned by `start()`
    pub fn cancel(&mut self, handle: DriverHandle) -> bool {
        self.scheduler.cancel(handle)
    }

    /// Feed elapsed wall-clock time and run everything that fell due
    pub fn advance(&mut self, dt_ms: u64) {
        self.scheduler.advance(dt_ms);
        while let Some(fired) = self.scheduler.next_due() {
            self.state.clock_ms = fired.at_ms();
            let event = match fired {
                Fired::Tick { dt_ms, .. } => SimEvent::Tick { dt_ms },
                Fired::Countdown { elapsed_ms, .. } => SimEvent::Countdown { elapsed_ms },
                Fired::Timer { purpose, epoch, .. } => SimEvent::Timer { purpose, epoch },
            };
            tick::step(&mut self.state, self.drill.as_mut(), event);
            self.flush();
        }
        if !self.state.machine.is_complete() {
            self.state.clock_ms = self.scheduler.now_ms();
        }
    }

    /// Advance in tick-sized steps, the way a frame loop would
    pub fn run_for(&mut self, duration_ms: u64) {
        let mut left = duration_ms;
        while left > 0 {
            let dt = left.min(TICK_PERIOD_MS);
            self.advance(dt);
            left -= dt;
        }
    }

    /// Apply user input. Discarded outside live phases.
    pub fn act(&mut self, action: Action) {
        if matches!(self.phase(), Phase::Idle | Phase::Complete) {
            log::trace!("{:?}: ignoring {:?} in {:?}", self.config.kind, action, self.phase());
            return;
        }
        self.state.clock_ms = self.scheduler.now_ms();
        tick::step(&mut self.state, self.drill.as_mut(), SimEvent::Action(action));
        self.flush();
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.snapshot()
    }

    /// Score record, once complete
    pub fn record(&self) -> Option<&ScoreRecord> {
        self.record.as_ref()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[cfg(test)]
    pub(crate) fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    pub fn drill(&self) -> &dyn Drill {
        self.drill.as_ref()
    }

    pub fn now_ms(&self) -> u64 {
        self.scheduler.now_ms()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    fn fresh_state(&mut self) {
        self.state = SessionState::new(&self.config, self.scheduler.now_ms());
        self.drill = (self.factory)(&self.config.profile);
        self.record = None;
    }

    /// Carry out queued effects
    fn flush(&mut self) {
        for effect in std::mem::take(&mut self.state.effects) {
            match effect {
                Effect::Timer(request) => self.scheduler.schedule(self.state.clock_ms, request),
                Effect::StartCountdown => self
                    .scheduler
                    .start_countdown(self.state.clock_ms, self.state.remaining_ms),
                Effect::Scored { .. } => {
                    let progress = Progress::from_state(&self.state, self.drill.progress(&self.state));
                    self.emitter.progress(&progress);
                }
                Effect::Completed => {
                    self.scheduler.cancel_all();
                    self.complete();
                }
            }
        }
    }

    fn complete(&mut self) {
        if self.record.is_some() {
            debug_assert!(false, "session completed twice");
            log::warn!("{:?}: duplicate completion ignored", self.config.kind);
            return;
        }
        let Some(record) = ScoreRecord::from_state(
            &self.state,
            self.config.user_id.clone(),
            platform::now_ms(),
        ) else {
            log::warn!("{:?}: completed without a final score", self.config.kind);
            return;
        };
        self.emitter.emit(&record, self.config.auto_submit);
        self.record = Some(record);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::report::EventLog;
    use crate::tuning::DifficultyTier;

    fn session(kind: DrillKind) -> Session {
        Session::new(ResolvedConfig::new(kind, DifficultyTier::Easy, 7))
    }

    #[test]
    fn test_start_enters_preparing() {
        let mut s = session(DrillKind::Dodge);
        assert_eq!(s.phase(), Phase::Idle);
        s.start();
        assert_eq!(s.phase(), Phase::Preparing);
        assert!(s.scheduler().has_tick());
        s.run_for(3000);
        assert_eq!(s.phase(), Phase::Active);
        assert!(s.scheduler().has_countdown());
    }

    #[test]
    fn test_turn_drills_have_no_tick_driver() {
        let mut s = session(DrillKind::Cards);
        s.start();
        assert!(!s.scheduler().has_tick());
    }

    #[test]
    fn test_restart_replaces_drivers() {
        let mut s = session(DrillKind::Tracking);
        let first = s.start();
        s.run_for(5000);
        let second = s.start();
        assert_ne!(first, second);
        assert_eq!(s.phase(), Phase::Preparing);
        assert!(!s.cancel(first));
        assert!(s.cancel(second));
        s.run_for(10_000);
        assert_eq!(s.phase(), Phase::Preparing);
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let mut s = session(DrillKind::Peripheral);
        s.start();
        s.run_for(4000);
        s.reset();
        assert_eq!(s.phase(), Phase::Idle);
        assert_eq!(s.scheduler().pending_timers(), 0);
        assert!(!s.scheduler().has_tick());
        s.run_for(60_000);
        assert_eq!(s.phase(), Phase::Idle);
    }

    #[test]
    fn test_completion_emits_once() {
        let log = Rc::new(RefCell::new(EventLog::default()));
        let mut config = ResolvedConfig::new(DrillKind::Tracking, DifficultyTier::Easy, 3);
        config.profile.session_budget_ms = 5000;
        config.user_id = Some("player-1".into());
        let mut s = Session::new(config).with_observer(log.clone());
        s.start();
        s.run_for(20_000);
        assert_eq!(s.phase(), Phase::Complete);

        let log = log.borrow();
        assert_eq!(log.completed.len(), 1);
        let record = &log.completed[0];
        assert_eq!(record.widget_id, "target-tracking");
        assert_eq!(record.user_id.as_deref(), Some("player-1"));
        assert_eq!(record.duration_ms, 3000 + 5000);
        assert_eq!(Some(record), s.record());
        assert!(!log.progress.is_empty());
    }

    #[test]
    fn test_input_after_complete_is_discarded() {
        let mut config = ResolvedConfig::new(DrillKind::Peripheral, DifficultyTier::Easy, 3);
        config.profile.session_budget_ms = 1000;
        let mut s = Session::new(config);
        s.start();
        s.run_for(5000);
        assert_eq!(s.phase(), Phase::Complete);
        let before = s.snapshot();
        s.act(Action::click(glam::Vec2::new(400.0, 300.0)));
        s.run_for(1000);
        assert_eq!(s.snapshot(), before);
    }

    #[test]
    fn test_unknown_tier_rejected_before_start() {
        let config = SessionConfig {
            difficulty_tier: "impossible".into(),
            ..SessionConfig::default()
        };
        assert!(matches!(
            Session::from_config(DrillKind::Dodge, &config),
            Err(SessionError::Config(_))
        ));
    }
}
