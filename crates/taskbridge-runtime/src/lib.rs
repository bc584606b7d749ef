//! `taskbridge-runtime` – Session Wiring & Command Arbitration
//!
//! The top layer: one [`ExecutionSession`] per task, split into the
//! per-thread handles that a behavior-tree engine and an executor transport
//! plug into.
//!
//! # Modules
//!
//! - [`session`] – [`ExecutionSession`]: owns the phase machine, the hand-off
//!   channels, the status registers, and the action archive; splits into
//!   [`TreeHandle`] (tick thread, never blocks), [`ExecutorLink`]
//!   (executor-facing thread, bounded waits only), and [`SessionInbox`]
//!   (transport delivery callbacks).
//! - [`arbiter`] – [`CommandArbiter`]: turns a leaf node's
//!   [`SkillRequest`] into at most one [`CommandRequest`][taskbridge_types::CommandRequest]
//!   per state change, idempotent under repeated ticks.
//! - [`config`] – [`SessionConfig`]: TOML-loadable tunables (hand-off
//!   timeout, archive path).
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber setup.
//!
//! # Threading contract
//!
//! The tick thread calls [`TreeHandle::tick_skill`] once per leaf tick and is
//! guaranteed never to block.  The executor-facing thread loops on
//! [`ExecutorLink::step`] and blocks only inside the bounded acknowledgement
//! wait; a silent executor escalates the phase to `Error` instead of hanging
//! the session.

pub mod arbiter;
pub mod config;
pub mod session;
pub mod telemetry;

pub use arbiter::{ArbiterError, CommandArbiter, SkillRequest};
pub use config::{ConfigError, SessionConfig};
pub use session::{
    CommandTransport, ExecutionSession, ExecutorLink, SessionInbox, TickStatus, TransportError,
    TreeHandle,
};
pub use telemetry::init_tracing;
