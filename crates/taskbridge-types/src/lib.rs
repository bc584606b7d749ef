//! `taskbridge-types` – Shared Data Model
//!
//! Types exchanged between the tree-ticking thread and the executor-facing
//! thread.  Nothing in this crate synchronizes anything; it only defines the
//! vocabulary both sides agree on.
//!
//! # Modules
//!
//! - [`phase`] – [`TreePhase`] (the shared execution phase) and
//!   [`ActionPhase`] (the category of physical action), plus the canonical
//!   string table and the many-to-one grounding onto executor skill names.
//! - [`state`] – working records and wire units: [`NodeArchive`],
//!   [`TreeState`], [`CommandRequest`], [`ActionPhaseContext`],
//!   [`ExecutorAck`], and the perception snapshot ([`TaskState`]).

pub mod phase;
pub mod state;

pub use phase::{ActionPhase, TreePhase};
pub use state::{
    AckKind, ActionPhaseContext, CommandRequest, CommandType, ExecutorAck, NodeArchive,
    RobotState, SensorState, StateError, TaskState, TreeState,
};
