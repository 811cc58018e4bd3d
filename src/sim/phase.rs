//! Session phase state machine
//!
//! One shared automaton for every drill: `Idle → Preparing → Active →
//! Resolving → Complete`. Drills differ only in which edges their
//! [`TransitionTable`] allows.

use serde::{Deserialize, Serialize};

use crate::error::PhaseError;

/// Named session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Not started, or reset
    Idle,
    /// Get-ready countdown, memorize, or random wait
    Preparing,
    /// Accepting input
    Active,
    /// An outcome was recorded and is being shown
    Resolving,
    /// Finished; frozen until reset
    Complete,
}

/// Allowed edges for one family of drills
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionTable {
    pub name: &'static str,
    edges: &'static [(Phase, Phase)],
}

impl TransitionTable {
    pub const fn new(name: &'static str, edges: &'static [(Phase, Phase)]) -> Self {
        Self { name, edges }
    }

    pub fn allows(&self, from: Phase, to: Phase) -> bool {
        self.edges.iter().any(|&(f, t)| f == from && t == to)
    }

    pub fn edges(&self) -> &'static [(Phase, Phase)] {
        self.edges
    }
}

use Phase::*;

/// Continuous drills and card matching: rounds resume straight into Active
pub const CONTINUOUS: TransitionTable = TransitionTable::new(
    "continuous",
    &[
        (Idle, Preparing),
        (Preparing, Active),
        (Active, Resolving),
        (Resolving, Active),
        (Resolving, Complete),
    ],
);

/// Leveling drills: every level starts with a fresh memorize phase, while
/// correct inputs inside a level resolve straight back into Active
pub const LEVELED: TransitionTable = TransitionTable::new(
    "leveled",
    &[
        (Idle, Preparing),
        (Preparing, Active),
        (Active, Resolving),
        (Resolving, Active),
        (Resolving, Preparing),
        (Resolving, Complete),
    ],
);

/// Attempt-based drills where acting during the wait is itself an outcome
pub const ATTEMPTS: TransitionTable = TransitionTable::new(
    "attempts",
    &[
        (Idle, Preparing),
        (Preparing, Active),
        (Preparing, Resolving),
        (Active, Resolving),
        (Resolving, Preparing),
        (Resolving, Complete),
    ],
);

/// Phase automaton with per-drill edges.
///
/// The epoch bumps on every transition; timers carry the epoch they were
/// scheduled in so that a timer outliving its phase is recognised as stale.
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    phase: Phase,
    table: TransitionTable,
    epoch: u32,
    entered_at_ms: u64,
    prepared: bool,
    completed: bool,
}

impl PhaseMachine {
    pub fn new(table: TransitionTable) -> Self {
        Self {
            phase: Idle,
            table,
            epoch: 0,
            entered_at_ms: 0,
            prepared: false,
            completed: false,
        }
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    pub fn table(&self) -> TransitionTable {
        self.table
    }

    pub fn entered_at_ms(&self) -> u64 {
        self.entered_at_ms
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Complete
    }

    /// Move to `to`, returning the phase left behind
    pub fn transition(&mut self, to: Phase, now_ms: u64) -> Result<Phase, PhaseError> {
        let from = self.phase;
        if to == Complete && self.completed {
            return Err(PhaseError::AlreadyComplete);
        }
        if !self.table.allows(from, to) {
            return Err(PhaseError::Illegal { from, to });
        }
        if to == Active && from != Preparing && !self.prepared {
            return Err(PhaseError::NotPrepared);
        }

        if from == Preparing && to == Active {
            self.prepared = true;
        }
        if to == Complete {
            self.completed = true;
        }
        self.enter(to, now_ms);
        log::debug!("Phase {:?} -> {:?} ({})", from, to, self.table.name);
        Ok(from)
    }

    /// Timeout path: jump into Resolving from wherever play currently is.
    ///
    /// Bypasses the table so the session budget can always end a session, but
    /// still routes through Resolving. Returns false if already resolving or done.
    pub fn force_resolving(&mut self, now_ms: u64) -> bool {
        match self.phase {
            Preparing | Active => {
                log::debug!("Phase {:?} -> Resolving (forced)", self.phase);
                self.enter(Resolving, now_ms);
                true
            }
            Idle | Resolving | Complete => false,
        }
    }

    /// Back to Idle; the only way out of Complete
    pub fn reset(&mut self) {
        self.phase = Idle;
        self.prepared = false;
        self.completed = false;
        self.epoch = self.epoch.wrapping_add(1);
        self.entered_at_ms = 0;
    }

    fn enter(&mut self, to: Phase, now_ms: u64) {
        self.phase = to;
        self.entered_at_ms = now_ms;
        self.epoch = self.epoch.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_happy_path() {
        let mut m = PhaseMachine::new(CONTINUOUS);
        assert_eq!(m.phase(), Idle);
        m.transition(Preparing, 0).unwrap();
        m.transition(Active, 3000).unwrap();
        m.transition(Resolving, 5000).unwrap();
        m.transition(Active, 5600).unwrap();
        m.transition(Resolving, 9000).unwrap();
        m.transition(Complete, 9000).unwrap();
        assert!(m.is_complete());
    }

    #[test]
    fn test_active_requires_preparing() {
        let mut m = PhaseMachine::new(CONTINUOUS);
        assert_eq!(
            m.transition(Active, 0),
            Err(PhaseError::Illegal {
                from: Idle,
                to: Active
            })
        );
    }

    #[test]
    fn test_outcome_cannot_skip_resolving() {
        let mut m = PhaseMachine::new(ATTEMPTS);
        m.transition(Preparing, 0).unwrap();
        m.transition(Active, 10).unwrap();
        assert!(m.transition(Complete, 20).is_err());
    }

    #[test]
    fn test_too_early_path_only_in_attempt_table() {
        let mut attempts = PhaseMachine::new(ATTEMPTS);
        attempts.transition(Preparing, 0).unwrap();
        assert!(attempts.transition(Resolving, 500).is_ok());

        let mut continuous = PhaseMachine::new(CONTINUOUS);
        continuous.transition(Preparing, 0).unwrap();
        assert!(continuous.transition(Resolving, 500).is_err());
    }

    #[test]
    fn test_complete_is_terminal_until_reset() {
        let mut m = PhaseMachine::new(LEVELED);
        m.transition(Preparing, 0).unwrap();
        m.transition(Active, 1).unwrap();
        m.transition(Resolving, 2).unwrap();
        m.transition(Complete, 2).unwrap();
        assert!(m.transition(Preparing, 3).is_err());

        m.reset();
        assert_eq!(m.phase(), Idle);
        m.transition(Preparing, 0).unwrap();
        m.transition(Active, 1).unwrap();
        m.transition(Resolving, 2).unwrap();
        assert!(m.transition(Complete, 2).is_ok());
    }

    #[test]
    fn test_force_resolving_from_preparing() {
        let mut m = PhaseMachine::new(LEVELED);
        m.transition(Preparing, 0).unwrap();
        let epoch = m.epoch();
        assert!(m.force_resolving(100));
        assert_eq!(m.phase(), Resolving);
        assert!(m.epoch() != epoch);
        assert!(!m.force_resolving(100));
        assert!(m.transition(Complete, 100).is_ok());
    }

    fn phase_strategy() -> impl Strategy<Value = Phase> {
        prop_oneof![
            Just(Idle),
            Just(Preparing),
            Just(Active),
            Just(Resolving),
            Just(Complete),
        ]
    }

    proptest! {
        #[test]
        fn prop_machine_invariants(requests in proptest::collection::vec(phase_strategy(), 0..64)) {
            for table in [CONTINUOUS, LEVELED, ATTEMPTS] {
                let mut m = PhaseMachine::new(table);
                let mut seen_preparing = false;
                let mut completions = 0;
                for (t, &to) in requests.iter().enumerate() {
                    let before = m.phase();
                    if m.transition(to, t as u64).is_ok() {
                        if before == Preparing && to == Active {
                            seen_preparing = true;
                        }
                        if to == Active {
                            prop_assert!(seen_preparing);
                        }
                        if to == Complete {
                            completions += 1;
                            prop_assert_eq!(before, Resolving);
                        }
                    }
                }
                prop_assert!(completions <= 1);
            }
        }
    }
}
