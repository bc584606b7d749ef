//! [`CommandArbiter`] – decides whether a tick turns into a command.
//!
//! Given the tree-side working record and a proposed action, the arbiter
//! reaches one of four decisions:
//!
//! | Decision | When |
//! |---|---|
//! | [`Initialization`][CommandType::Initialization] | First decision of a session. |
//! | [`StopOldStartNew`][CommandType::StopOldStartNew] | A different skill is currently active. |
//! | [`StartNewTask`][CommandType::StartNewTask] | No skill is active. |
//! | [`StopOldTask`][CommandType::StopOldTask] | Halt without a replacement ([`CommandArbiter::halt`]). |
//!
//! Repeated ticks while a skill is in flight are idempotent: the same phase
//! requested while `Pause`/`Resume` yields no command at all.  A start while
//! a stop is unconfirmed is rejected outright, never queued — overlapping
//! skill execution is the one thing this layer must make impossible.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use taskbridge_archive::default_context;
use taskbridge_types::{ActionPhase, CommandRequest, CommandType, NodeArchive, TreePhase, TreeState};

// ─────────────────────────────────────────────────────────────────────────────
// Request & error types
// ─────────────────────────────────────────────────────────────────────────────

/// A leaf node's proposal: "this action should be executing now".
#[derive(Debug, Clone)]
pub struct SkillRequest {
    pub archive: NodeArchive,
    /// Object names the skill operates on.
    pub objects: Vec<String>,
    /// Explicit parameter bundle; `None` falls back to the static per-skill
    /// defaults.
    pub context: Option<Value>,
}

impl SkillRequest {
    pub fn new(archive: NodeArchive) -> Self {
        Self {
            archive,
            objects: Vec::new(),
            context: None,
        }
    }

    pub fn with_objects(mut self, objects: Vec<String>) -> Self {
        self.objects = objects;
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }
}

/// Arbitration rejections.  Neither produces a command.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ArbiterError {
    /// Configuration defect: the phase grounds to no executor skill.
    #[error("action phase {0:?} has no executor skill grounding")]
    UnmappedPhase(ActionPhase),
    /// A prior stop has not been confirmed; starting now could leave two
    /// skills running concurrently.
    #[error("start of {requested:?} rejected: prior stop not yet confirmed")]
    StopUnconfirmed { requested: ActionPhase },
}

// ─────────────────────────────────────────────────────────────────────────────
// CommandArbiter
// ─────────────────────────────────────────────────────────────────────────────

/// One arbiter per session, owned by the tick thread.
#[derive(Debug, Default)]
pub struct CommandArbiter {
    initialized: bool,
}

impl CommandArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether `request` warrants a command given the current
    /// `TreeState`.
    ///
    /// `Ok(None)` means the request is already being served (idempotent under
    /// repeated ticks).  Errors are rejections, not failures of the arbiter
    /// itself; the caller decides how to surface them.
    pub fn decide(
        &mut self,
        state: &TreeState,
        request: &SkillRequest,
    ) -> Result<Option<CommandRequest>, ArbiterError> {
        let phase = request.archive.phase;
        let Some(skill) = phase.skill_name() else {
            warn!(?phase, "request for a phase with no skill grounding");
            return Err(ArbiterError::UnmappedPhase(phase));
        };

        if !self.initialized {
            self.initialized = true;
            debug!(?phase, skill, "first decision of the session");
            return Ok(Some(CommandRequest::new(
                CommandType::Initialization,
                command_context(request),
                skill,
            )));
        }

        let skill_active = matches!(state.tree_phase, TreePhase::Pause | TreePhase::Resume);

        if skill_active && phase == state.action_phase {
            // Same skill still in flight; nothing to do this tick.
            return Ok(None);
        }

        if skill_active {
            debug!(old = ?state.action_phase, new = ?phase, "arbitrating skill switch");
            return Ok(Some(CommandRequest::new(
                CommandType::StopOldStartNew,
                command_context(request),
                skill,
            )));
        }

        if state.is_interrupted {
            return Err(ArbiterError::StopUnconfirmed { requested: phase });
        }

        Ok(Some(CommandRequest::new(
            CommandType::StartNewTask,
            command_context(request),
            skill,
        )))
    }

    /// Halt without a replacement: the task finished or was cancelled.
    pub fn halt(&self) -> CommandRequest {
        CommandRequest::new(CommandType::StopOldTask, Value::Null, "")
    }

    /// Forget the session: the next decision is an `Initialization` again.
    pub fn reset(&mut self) {
        self.initialized = false;
    }
}

/// The parameter bundle a command carries: the explicit one when provided,
/// else the static per-skill defaults, else empty.
fn command_context(request: &SkillRequest) -> Value {
    request
        .context
        .clone()
        .or_else(|| default_context(request.archive.phase))
        .unwrap_or_else(|| Value::Object(serde_json::Map::new()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
