//! `taskbridge-sync` – Hand-off Primitives & Phase State Machine
//!
//! The synchronization layer between the tick thread (which must never block)
//! and the executor-facing thread (the only thread allowed to wait, and only
//! with a bound).
//!
//! # Modules
//!
//! - [`channel`] – [`HandoffChannel`]: a FIFO with non-blocking and
//!   bounded-wait access modes, used for discrete events (commands,
//!   acknowledgements).
//! - [`register`] – [`LatestValue`]: a single-slot last-write-wins cell for
//!   continuously updated state where only the freshest value matters.
//! - [`phase_machine`] – [`PhaseMachine`]: the authoritative reconciliation
//!   of tree-side and executor-side status into one shared
//!   [`TreePhase`][taskbridge_types::TreePhase].
//!
//! The channel and the register are deliberately two separate abstractions:
//! their blocking semantics differ fundamentally and modeling both with one
//! primitive conflates "wait for the next event" with "read whatever is
//! current".

pub mod channel;
pub mod phase_machine;
pub mod register;

pub use channel::{DEFAULT_POP_TIMEOUT, HandoffChannel};
pub use phase_machine::{PhaseError, PhaseEvent, PhaseMachine};
pub use register::LatestValue;
