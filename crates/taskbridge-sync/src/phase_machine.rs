//! [`PhaseMachine`] – the authoritative [`TreePhase`] state machine.
//!
//! All phase transitions are linearized through one instance: the tick thread
//! requests starts and consumes results, the executor-facing thread drives
//! `Resume`/`Success`/`Failure`/`Error` from acknowledgements.  Every
//! successful transition is mirrored into a [`LatestValue`] register so the
//! tick thread can observe the phase without contending the transition lock.
//!
//! Transition table (current → event → next):
//!
//! | Current | Event | Next |
//! |---|---|---|
//! | `Idle` | `StartAccepted` | `Pause` |
//! | `Idle` | `ExecutorStopped` | `Idle` |
//! | `Idle` | `HandoffTimedOut` | `Error` |
//! | `Pause` | `ExecutorRunning` | `Resume` |
//! | `Pause` | `HandoffTimedOut` | `Error` |
//! | `Pause` | `ExecutorStopped` | `Idle` |
//! | `Resume` | `ExecutorSucceeded` | `Success` |
//! | `Resume` | `ExecutorFailed` | `Failure` |
//! | `Resume` | `ExecutorFault` | `Error` |
//! | `Resume` | `ExecutorStopped` | `Idle` |
//! | `Resume` | `HandoffTimedOut` | `Error` |
//! | `Success` | `ResultConsumed { task_complete: false }` | `Idle` |
//! | `Success` | `ResultConsumed { task_complete: true }` | `Finish` |
//! | `Failure` | `ResultConsumed { task_complete: false }` | `Idle` |
//!
//! `Error` and `Finish` are terminal: every event is rejected with
//! [`PhaseError::Terminal`] and only an explicit [`PhaseMachine::reset`]
//! returns to `Idle`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, info};

use taskbridge_types::TreePhase;

use crate::register::LatestValue;

// ─────────────────────────────────────────────────────────────────────────────
// Events & errors
// ─────────────────────────────────────────────────────────────────────────────

/// A trigger that may advance the phase machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// The arbiter accepted a start request; awaiting executor confirmation.
    StartAccepted,
    /// The executor confirmed the skill is running.
    ExecutorRunning,
    /// The executor confirmed the prior skill has stopped.
    ExecutorStopped,
    ExecutorSucceeded,
    ExecutorFailed,
    /// The executor reported an internal fault.
    ExecutorFault,
    /// No acknowledgement arrived within the hand-off bound.
    HandoffTimedOut,
    /// The tree consumed a `Success`/`Failure` result.
    ResultConsumed { task_complete: bool },
}

/// Rejected phase transitions.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PhaseError {
    #[error("invalid phase transition: {from:?} does not accept {event:?}")]
    InvalidTransition { from: TreePhase, event: PhaseEvent },
    #[error("phase {0:?} is terminal; an external reset is required")]
    Terminal(TreePhase),
}

// ─────────────────────────────────────────────────────────────────────────────
// PhaseMachine
// ─────────────────────────────────────────────────────────────────────────────

/// The single source of truth for "what is currently happening".
#[derive(Debug)]
pub struct PhaseMachine {
    state: Mutex<TreePhase>,
    mirror: LatestValue<TreePhase>,
}

impl PhaseMachine {
    /// Start in [`TreePhase::Idle`].
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TreePhase::Idle),
            mirror: LatestValue::new(TreePhase::Idle),
        }
    }

    /// Attempt to advance the machine with `event`.
    ///
    /// On success the new phase is returned and mirrored; on rejection the
    /// phase is unchanged and the caller decides the consequence.
    pub fn apply(&self, event: PhaseEvent) -> Result<TreePhase, PhaseError> {
        let mut state = self.lock();
        let current = *state;
        if current.is_terminal() {
            return Err(PhaseError::Terminal(current));
        }
        let Some(next) = transition(current, event) else {
            return Err(PhaseError::InvalidTransition {
                from: current,
                event,
            });
        };
        *state = next;
        drop(state);
        self.mirror.write(next);
        debug!(from = ?current, to = ?next, ?event, "phase transition");
        Ok(next)
    }

    /// The current phase, read under the transition lock.
    pub fn current(&self) -> TreePhase {
        *self.lock()
    }

    /// The most recently mirrored phase, readable without contending the
    /// transition lock.  May lag `current` by one in-flight transition.
    pub fn mirror(&self) -> TreePhase {
        self.mirror.read()
    }

    /// External reset: return to `Idle` from any phase, including terminal
    /// ones.  This is the only exit from `Error` and `Finish`.
    pub fn reset(&self) -> TreePhase {
        let mut state = self.lock();
        let previous = *state;
        *state = TreePhase::Idle;
        drop(state);
        self.mirror.write(TreePhase::Idle);
        info!(from = ?previous, "phase machine reset to Idle");
        TreePhase::Idle
    }

    fn lock(&self) -> MutexGuard<'_, TreePhase> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// The transition table as a pure lookup.  `None` means the pair is rejected.
fn transition(current: TreePhase, event: PhaseEvent) -> Option<TreePhase> {
    use PhaseEvent::*;
    use TreePhase::*;
    match (current, event) {
        (Idle, StartAccepted) => Some(Pause),
        // A stop confirmed while nothing was running (session handshake)
        // leaves the machine idle.
        (Idle, ExecutorStopped) => Some(Idle),
        // A stop can be owed while the machine is still Idle (the session
        // handshake); a silent executor there is as dead as anywhere else.
        (Idle, HandoffTimedOut) => Some(Error),
        (Pause, ExecutorRunning) => Some(Resume),
        (Pause, HandoffTimedOut) => Some(Error),
        (Pause, ExecutorStopped) => Some(Idle),
        (Resume, ExecutorSucceeded) => Some(Success),
        (Resume, ExecutorFailed) => Some(Failure),
        (Resume, ExecutorFault) => Some(Error),
        (Resume, ExecutorStopped) => Some(Idle),
        // An unconfirmed stop must not be assumed successful; two skills
        // running concurrently is worse than requiring an external reset.
        (Resume, HandoffTimedOut) => Some(Error),
        (Success, ResultConsumed { task_complete: false }) => Some(Idle),
        (Success, ResultConsumed { task_complete: true }) => Some(Finish),
        (Failure, ResultConsumed { task_complete: false }) => Some(Idle),
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
