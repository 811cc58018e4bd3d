//! Simulated-clock driver registry
//!
//! Stands in for interval/timeout callbacks. The host feeds wall-clock deltas
//! through [`Scheduler::advance`]; due work is pulled in chronological order
//! with [`Scheduler::next_due`]. Nothing here sleeps, so tests can run any
//! number of ticks instantly.
//!
//! Three kinds of drivers exist per session:
//! - a tick driver (~16 ms) that coalesces into one tick per pump, carrying the
//!   real delta since the previous tick
//! - a 1 Hz countdown driver that fires at exact multiples of its period, with
//!   a shortened last step so it lands exactly on the end of the budget
//! - one-shot phase timers tagged with the phase epoch they belong to

use crate::consts::{COUNTDOWN_PERIOD_MS, TICK_PERIOD_MS};

/// What a one-shot timer is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerPurpose {
    /// Preparing phase has run its course
    PrepareDone,
    /// Resolving hold has elapsed
    ResolveDone,
    /// Next step of a timed sequence (show tile, pause)
    SequenceStep,
    /// Per-round response window closed
    WindowClosed,
}

/// Request from the simulation to start a one-shot timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerRequest {
    pub purpose: TimerPurpose,
    pub delay_ms: u64,
    /// Phase epoch at scheduling time
    pub epoch: u32,
}

/// A driver firing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fired {
    Tick { at_ms: u64, dt_ms: u64 },
    /// `elapsed_ms` is the budget consumed by this step
    Countdown { at_ms: u64, elapsed_ms: u64 },
    Timer { at_ms: u64, purpose: TimerPurpose, epoch: u32 },
}

impl Fired {
    pub fn at_ms(&self) -> u64 {
        match *self {
            Fired::Tick { at_ms, .. } | Fired::Countdown { at_ms, .. } | Fired::Timer { at_ms, .. } => {
                at_ms
            }
        }
    }

    /// Ordering among drivers due at the same instant
    fn rank(&self) -> u8 {
        match self {
            Fired::Timer { .. } => 0,
            Fired::Countdown { .. } => 1,
            Fired::Tick { .. } => 2,
        }
    }
}

/// Cancellation token returned by `start()`; owns every driver of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverHandle {
    generation: u32,
}

impl DriverHandle {
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy)]
struct TickDriver {
    period_ms: u64,
    last_fire_ms: u64,
}

#[derive(Debug, Clone, Copy)]
struct CountdownDriver {
    period_ms: u64,
    next_fire_ms: u64,
    step_ms: u64,
    /// Budget left after the pending step
    remaining_ms: u64,
}

impl CountdownDriver {
    fn new(from_ms: u64, period_ms: u64, budget_ms: u64) -> Self {
        let step_ms = period_ms.min(budget_ms);
        Self {
            period_ms,
            next_fire_ms: from_ms + step_ms,
            step_ms,
            remaining_ms: budget_ms - step_ms,
        }
    }

    /// Queue the next step, or `None` once the budget is spent
    fn advanced(self) -> Option<Self> {
        if self.remaining_ms == 0 {
            return None;
        }
        Some(Self::new(self.next_fire_ms, self.period_ms, self.remaining_ms))
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingTimer {
    at_ms: u64,
    seq: u64,
    purpose: TimerPurpose,
    epoch: u32,
}

/// Driver registry on a simulated clock
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    now_ms: u64,
    generation: u32,
    live: bool,
    tick: Option<TickDriver>,
    countdown: Option<CountdownDriver>,
    timers: Vec<PendingTimer>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Open a new driver generation, cancelling anything still running
    pub fn begin(&mut self) -> DriverHandle {
        if self.live {
            log::info!(
                "Cancelling drivers of generation {} before restart",
                self.generation
            );
            self.cancel_all();
        }
        self.generation = self.generation.wrapping_add(1);
        self.live = true;
        DriverHandle {
            generation: self.generation,
        }
    }

    /// Cancel through a handle. Handles from older generations are ignored.
    pub fn cancel(&mut self, handle: DriverHandle) -> bool {
        if handle.generation != self.generation || !self.live {
            return false;
        }
        self.cancel_all();
        true
    }

    /// Drop every driver synchronously
    pub fn cancel_all(&mut self) {
        self.tick = None;
        self.countdown = None;
        self.timers.clear();
        self.live = false;
    }

    pub fn start_tick(&mut self) {
        self.start_tick_with_period(TICK_PERIOD_MS);
    }

    pub fn start_tick_with_period(&mut self, period_ms: u64) {
        debug_assert!(self.live, "tick driver started outside a generation");
        if self.tick.is_some() {
            debug_assert!(false, "overlapping tick drivers");
            log::warn!("Tick driver already running; replacing it");
        }
        self.tick = Some(TickDriver {
            period_ms: period_ms.max(1),
            last_fire_ms: self.now_ms,
        });
    }

    /// Start counting `budget_ms` down from `from_ms`, one period per fire
    pub fn start_countdown(&mut self, from_ms: u64, budget_ms: u64) {
        debug_assert!(self.live, "countdown started outside a generation");
        if self.countdown.is_some() {
            debug_assert!(false, "overlapping countdown drivers");
            log::warn!("Countdown already running; replacing it");
        }
        self.countdown = (budget_ms > 0)
            .then(|| CountdownDriver::new(from_ms, COUNTDOWN_PERIOD_MS, budget_ms));
    }

    pub fn has_tick(&self) -> bool {
        self.tick.is_some()
    }

    pub fn has_countdown(&self) -> bool {
        self.countdown.is_some()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Schedule a one-shot timer relative to `from_ms`
    pub fn schedule(&mut self, from_ms: u64, request: TimerRequest) {
        if !self.live {
            log::debug!("Ignoring {:?} timer: no live generation", request.purpose);
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.push(PendingTimer {
            at_ms: from_ms + request.delay_ms,
            seq,
            purpose: request.purpose,
            epoch: request.epoch,
        });
    }

    /// Move the clock forward
    pub fn advance(&mut self, dt_ms: u64) {
        self.now_ms += dt_ms;
    }

    /// Pop the earliest driver due at or before now
    pub fn next_due(&mut self) -> Option<Fired> {
        let now = self.now_ms;
        let mut best: Option<Fired> = None;
        let mut consider = |candidate: Fired| {
            let better = match best {
                None => true,
                Some(b) => (candidate.at_ms(), candidate.rank()) < (b.at_ms(), b.rank()),
            };
            if better {
                best = Some(candidate);
            }
        };

        // Timers are kept in insertion order; earliest deadline, then earliest seq
        if let Some(t) = self
            .timers
            .iter()
            .filter(|t| t.at_ms <= now)
            .min_by_key(|t| (t.at_ms, t.seq))
        {
            consider(Fired::Timer {
                at_ms: t.at_ms,
                purpose: t.purpose,
                epoch: t.epoch,
            });
        }
        if let Some(c) = self.countdown
            && c.next_fire_ms <= now
        {
            consider(Fired::Countdown {
                at_ms: c.next_fire_ms,
                elapsed_ms: c.step_ms,
            });
        }
        if let Some(t) = self.tick
            && now.saturating_sub(t.last_fire_ms) >= t.period_ms
        {
            consider(Fired::Tick {
                at_ms: now,
                dt_ms: now - t.last_fire_ms,
            });
        }

        let fired = best?;
        match fired {
            Fired::Timer { at_ms, purpose, epoch } => {
                if let Some(idx) = self
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.at_ms == at_ms && t.purpose == purpose && t.epoch == epoch)
                    .min_by_key(|(_, t)| t.seq)
                    .map(|(i, _)| i)
                {
                    self.timers.remove(idx);
                }
            }
            Fired::Countdown { .. } => {
                self.countdown = self.countdown.and_then(CountdownDriver::advanced);
            }
            Fired::Tick { at_ms, .. } => {
                if let Some(t) = self.tick.as_mut() {
                    t.last_fire_ms = at_ms;
                }
            }
        }
        Some(fired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(s: &mut Scheduler) -> Vec<Fired> {
        std::iter::from_fn(|| s.next_due()).collect()
    }

    #[test]
    fn test_tick_carries_real_delta() {
        let mut s = Scheduler::new();
        s.begin();
        s.start_tick();
        s.advance(10);
        assert!(drain(&mut s).is_empty());
        s.advance(13);
        assert_eq!(drain(&mut s), vec![Fired::Tick { at_ms: 23, dt_ms: 23 }]);
        // A long stall coalesces into one tick
        s.advance(250);
        assert_eq!(drain(&mut s), vec![Fired::Tick { at_ms: 273, dt_ms: 250 }]);
    }

    #[test]
    fn test_countdown_fires_every_period() {
        let mut s = Scheduler::new();
        s.begin();
        s.start_countdown(0, 60_000);
        s.advance(3500);
        let fired = drain(&mut s);
        assert_eq!(
            fired,
            vec![
                Fired::Countdown { at_ms: 1000, elapsed_ms: 1000 },
                Fired::Countdown { at_ms: 2000, elapsed_ms: 1000 },
                Fired::Countdown { at_ms: 3000, elapsed_ms: 1000 },
            ]
        );
    }

    #[test]
    fn test_countdown_last_step_lands_on_budget() {
        let mut s = Scheduler::new();
        s.begin();
        s.start_countdown(200, 2500);
        s.advance(10_000);
        assert_eq!(
            drain(&mut s),
            vec![
                Fired::Countdown { at_ms: 1200, elapsed_ms: 1000 },
                Fired::Countdown { at_ms: 2200, elapsed_ms: 1000 },
                Fired::Countdown { at_ms: 2700, elapsed_ms: 500 },
            ]
        );
        assert!(!s.has_countdown());
    }

    #[test]
    fn test_events_come_out_in_time_order() {
        let mut s = Scheduler::new();
        s.begin();
        s.start_tick();
        s.start_countdown(0, 60_000);
        s.schedule(
            0,
            TimerRequest {
                purpose: TimerPurpose::PrepareDone,
                delay_ms: 1500,
                epoch: 1,
            },
        );
        s.advance(2000);
        let at: Vec<u64> = drain(&mut s).iter().map(|f| f.at_ms()).collect();
        assert_eq!(at, vec![1000, 1500, 2000, 2000]);
    }

    #[test]
    fn test_timer_beats_countdown_on_tie() {
        let mut s = Scheduler::new();
        s.begin();
        s.start_countdown(0, 60_000);
        s.schedule(
            0,
            TimerRequest {
                purpose: TimerPurpose::ResolveDone,
                delay_ms: 1000,
                epoch: 4,
            },
        );
        s.advance(1000);
        assert!(matches!(s.next_due(), Some(Fired::Timer { .. })));
        assert!(matches!(s.next_due(), Some(Fired::Countdown { .. })));
        assert_eq!(s.next_due(), None);
    }

    #[test]
    fn test_cancel_clears_everything() {
        let mut s = Scheduler::new();
        let handle = s.begin();
        s.start_tick();
        s.start_countdown(0, 60_000);
        s.schedule(
            0,
            TimerRequest {
                purpose: TimerPurpose::SequenceStep,
                delay_ms: 10,
                epoch: 0,
            },
        );
        assert!(s.cancel(handle));
        s.advance(5000);
        assert_eq!(s.next_due(), None);
        assert!(!s.has_tick() && !s.has_countdown());
        assert_eq!(s.pending_timers(), 0);
    }

    #[test]
    fn test_stale_handle_cannot_cancel_new_generation() {
        let mut s = Scheduler::new();
        let old = s.begin();
        let new = s.begin();
        assert_ne!(old, new);
        s.start_tick();
        assert!(!s.cancel(old));
        assert!(s.has_tick());
        assert!(s.cancel(new));
    }

    #[test]
    fn test_restart_cancels_previous_drivers() {
        let mut s = Scheduler::new();
        s.begin();
        s.start_tick();
        s.start_countdown(0, 60_000);
        s.begin();
        assert!(!s.has_tick());
        assert!(!s.has_countdown());
        // Fresh drivers may start without tripping the overlap assertion
        s.start_tick();
        s.start_countdown(0, 60_000);
    }
}
