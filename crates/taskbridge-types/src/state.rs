//! Working records and wire units.
//!
//! [`TreeState`] is owned exclusively by the tree-ticking thread and written
//! once per tick.  [`CommandRequest`] and [`ExecutorAck`] travel over the
//! hand-off channels; [`ActionPhaseContext`] and [`TaskState`] land in the
//! latest-value registers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::phase::{ActionPhase, TreePhase};

/// Number of values in a flattened 4x4 end-effector transform.
pub const TRANSFORM_LEN: usize = 16;
/// Number of values in an external wrench (force + torque).
pub const WRENCH_LEN: usize = 6;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Validation errors for inbound state payloads.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum StateError {
    #[error("end-effector transform needs {TRANSFORM_LEN} values, got {0}")]
    TransformSize(usize),
    #[error("external wrench needs {WRENCH_LEN} values, got {0}")]
    WrenchSize(usize),
}

// ─────────────────────────────────────────────────────────────────────────────
// NodeArchive
// ─────────────────────────────────────────────────────────────────────────────

/// One leaf node's self-report of what it is executing.
///
/// Immutable once constructed.  A new report with the same `(group, id)`
/// replaces the prior dictionary entry wholesale; partial fields are never
/// merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeArchive {
    pub group: i32,
    pub id: i32,
    pub description: String,
    pub phase: ActionPhase,
}

impl NodeArchive {
    pub fn new(group: i32, id: i32, description: impl Into<String>, phase: ActionPhase) -> Self {
        Self {
            group,
            id,
            description: description.into(),
            phase,
        }
    }
}

impl Default for NodeArchive {
    fn default() -> Self {
        Self {
            group: 0,
            id: 0,
            description: "unspecified action".to_string(),
            phase: ActionPhase::Initialization,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TreeState
// ─────────────────────────────────────────────────────────────────────────────

/// The tree-side working record, written once per tick by the tick thread and
/// read by the command arbiter on the same thread.
///
/// `is_interrupted` starts `true`: until the first confirmed stop (or first
/// clean start), the arbiter must assume a prior skill may still be active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeState {
    pub action_name: String,
    pub last_action_name: String,
    pub action_phase: ActionPhase,
    pub last_action_phase: ActionPhase,

    pub node_archive: NodeArchive,
    pub last_node_archive: NodeArchive,

    /// Object names the current skill operates on.
    pub objects: Vec<String>,

    pub tree_phase: TreePhase,

    /// Whether the previous skill must be told to stop before a new start.
    /// Cleared only after a confirmed stop, never optimistically.
    pub is_interrupted: bool,
    pub is_succeeded: bool,
}

impl Default for TreeState {
    fn default() -> Self {
        Self {
            action_name: "initialization".to_string(),
            last_action_name: "initialization".to_string(),
            action_phase: ActionPhase::Initialization,
            last_action_phase: ActionPhase::Initialization,
            node_archive: NodeArchive::default(),
            last_node_archive: NodeArchive::default(),
            objects: Vec::new(),
            tree_phase: TreePhase::Idle,
            is_interrupted: true,
            is_succeeded: false,
        }
    }
}

impl TreeState {
    /// Shift the current action into the `last_*` slots and record a new one.
    pub fn record_action(&mut self, name: impl Into<String>, archive: NodeArchive) {
        self.last_action_name = std::mem::replace(&mut self.action_name, name.into());
        self.last_action_phase = self.action_phase;
        self.action_phase = archive.phase;
        self.last_node_archive = std::mem::replace(&mut self.node_archive, archive);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// The kind of decision the command arbiter reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    /// First command of a session.
    Initialization,
    /// A different skill is active: stop it, then start the new one,
    /// sequenced, never concurrent.
    StopOldStartNew,
    /// No skill is active: start directly.
    StartNewTask,
    /// Halt without a replacement (task finished or externally cancelled).
    StopOldTask,
}

/// One arbitration decision, consumed by the executor-facing thread.
///
/// Immutable after construction and never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub command_type: CommandType,
    /// Opaque parameter bundle handed through to the executor.
    pub context: serde_json::Value,
    /// Executor-side skill name; empty for pure stop commands.
    pub skill_type: String,
}

impl CommandRequest {
    pub fn new(
        command_type: CommandType,
        context: serde_json::Value,
        skill_type: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            issued_at: Utc::now(),
            command_type,
            context,
            skill_type: skill_type.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Executor status
// ─────────────────────────────────────────────────────────────────────────────

/// The minimal status unit the executor-facing thread writes back into the
/// latest-value register for the tree to read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPhaseContext {
    pub node_name: String,
    pub action_name: String,
    pub action_phase: ActionPhase,
    pub is_action_success: bool,
}

impl Default for ActionPhaseContext {
    fn default() -> Self {
        Self {
            node_name: "Initialization".to_string(),
            action_name: "initialization".to_string(),
            action_phase: ActionPhase::Initialization,
            is_action_success: false,
        }
    }
}

/// What an executor acknowledgement means for the running skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckKind {
    /// The skill has actually started executing.
    Started,
    /// The previously running skill has confirmed it stopped.
    Stopped,
    Succeeded,
    Failed,
    /// The executor itself faulted; distinct from a skill-level failure.
    Fault,
}

/// An acknowledgement received from the skill executor, carried over the
/// hand-off channel to the executor-facing thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorAck {
    pub kind: AckKind,
    pub node_name: String,
    pub message: String,
}

impl ExecutorAck {
    pub fn new(kind: AckKind, node_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            node_name: node_name.into(),
            message: message.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Perception snapshot
// ─────────────────────────────────────────────────────────────────────────────

/// Robot-side proprioception: external wrench and end-effector pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotState {
    /// External wrench at the end effector, `[fx, fy, fz, tx, ty, tz]`.
    pub external_wrench: Vec<f64>,
    /// Flattened column-major 4x4 end-effector transform.
    pub ee_transform: Vec<f64>,
}

impl Default for RobotState {
    fn default() -> Self {
        Self {
            external_wrench: vec![0.0; WRENCH_LEN],
            ee_transform: {
                // Identity transform.
                let mut t = vec![0.0; TRANSFORM_LEN];
                for i in 0..4 {
                    t[i * 4 + i] = 1.0;
                }
                t
            },
        }
    }
}

impl RobotState {
    /// Replace the end-effector transform, rejecting malformed payloads.
    pub fn update_transform(&mut self, values: Vec<f64>) -> Result<(), StateError> {
        if values.len() != TRANSFORM_LEN {
            return Err(StateError::TransformSize(values.len()));
        }
        self.ee_transform = values;
        Ok(())
    }

    /// Replace the external wrench, rejecting malformed payloads.
    pub fn update_wrench(&mut self, values: Vec<f64>) -> Result<(), StateError> {
        if values.len() != WRENCH_LEN {
            return Err(StateError::WrenchSize(values.len()));
        }
        self.external_wrench = values;
        Ok(())
    }
}

/// Auxiliary sensor channels, opaque to this layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorState {
    pub data: Vec<f64>,
}

/// The robot's perception of the current task, landed in a latest-value
/// register by the transport layer.  Staleness is acceptable; only the
/// freshest value matters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    pub robot: RobotState,
    pub sensor: SensorState,
    pub is_action_success: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_archive_roundtrip_serializes_phase_as_string() {
        let archive = NodeArchive::new(2, 7, "approach the peg", ActionPhase::CartesianMove);
        let json = serde_json::to_string(&archive).unwrap();
        assert!(json.contains("\"cartesian_move\""));
        let back: NodeArchive = serde_json::from_str(&json).unwrap();
        assert_eq!(back, archive);
    }

    #[test]
    fn tree_state_defaults_assume_interruption() {
        let state = TreeState::default();
        assert!(state.is_interrupted);
        assert!(!state.is_succeeded);
        assert_eq!(state.tree_phase, TreePhase::Idle);
        assert_eq!(state.action_phase, ActionPhase::Initialization);
    }

    #[test]
    fn record_action_shifts_current_into_last() {
        let mut state = TreeState::default();
        let archive = NodeArchive::new(1, 1, "push down", ActionPhase::Contact);
        state.record_action("contact", archive.clone());

        assert_eq!(state.action_name, "contact");
        assert_eq!(state.action_phase, ActionPhase::Contact);
        assert_eq!(state.node_archive, archive);
        assert_eq!(state.last_action_name, "initialization");
        assert_eq!(state.last_action_phase, ActionPhase::Initialization);

        let next = NodeArchive::new(1, 2, "wiggle in", ActionPhase::Wiggle);
        state.record_action("wiggle", next);
        assert_eq!(state.last_action_phase, ActionPhase::Contact);
        assert_eq!(state.last_node_archive, archive);
    }

    #[test]
    fn command_requests_get_unique_ids() {
        let a = CommandRequest::new(
            CommandType::StartNewTask,
            serde_json::json!({}),
            "CartesianMove",
        );
        let b = CommandRequest::new(
            CommandType::StartNewTask,
            serde_json::json!({}),
            "CartesianMove",
        );
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn command_request_roundtrip() {
        let request = CommandRequest::new(
            CommandType::StopOldStartNew,
            serde_json::json!({"skill": {"time_max": 30}}),
            "JointMove",
        );
        let json = serde_json::to_string(&request).unwrap();
        let back: CommandRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, request.id);
        assert_eq!(back.command_type, CommandType::StopOldStartNew);
        assert_eq!(back.skill_type, "JointMove");
    }

    #[test]
    fn transform_update_rejects_wrong_size() {
        let mut robot = RobotState::default();
        let err = robot.update_transform(vec![1.0; 9]).unwrap_err();
        assert_eq!(err, StateError::TransformSize(9));
        // Prior transform untouched.
        assert_eq!(robot.ee_transform.len(), TRANSFORM_LEN);
        assert!((robot.ee_transform[0] - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn wrench_update_accepts_six_values() {
        let mut robot = RobotState::default();
        robot.update_wrench(vec![0.0, 0.0, 5.0, 0.0, 0.0, 0.0]).unwrap();
        assert!((robot.external_wrench[2] - 5.0).abs() < f64::EPSILON);
        assert!(robot.update_wrench(vec![1.0; 3]).is_err());
    }

    #[test]
    fn default_robot_transform_is_identity() {
        let robot = RobotState::default();
        for row in 0..4 {
            for col in 0..4 {
                let expected = if row == col { 1.0 } else { 0.0 };
                assert!((robot.ee_transform[col * 4 + row] - expected).abs() < f64::EPSILON);
            }
        }
    }

    #[test]
    fn executor_ack_roundtrip() {
        let ack = ExecutorAck::new(AckKind::Succeeded, "pick_node", "skill done");
        let json = serde_json::to_string(&ack).unwrap();
        assert!(json.contains("\"succeeded\""));
        let back: ExecutorAck = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, AckKind::Succeeded);
        assert_eq!(back.node_name, "pick_node");
    }
}
