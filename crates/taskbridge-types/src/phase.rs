//! Phase enumerations.
//!
//! [`TreePhase`] is the single channel through which the tree layer learns
//! executor status.  [`ActionPhase`] names the category of physical action a
//! leaf node intends; it grounds to exactly one executor skill via
//! [`ActionPhase::skill_name`], while several phases may share the same skill
//! (distinguished by parameters, not by skill identity).

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// TreePhase
// ─────────────────────────────────────────────────────────────────────────────

/// The shared execution phase reconciling tree-side and executor-side status.
///
/// Exactly one value is current at any instant.  Transitions go only through
/// the phase state machine in `taskbridge-sync`; no component assigns this
/// arbitrarily.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreePhase {
    /// Nothing is running; the initial value.
    #[default]
    Idle,
    /// A start was requested; awaiting executor confirmation.
    Pause,
    /// The executor confirmed the skill is running; the tree may tick on.
    Resume,
    /// The executor reported the current skill succeeded.
    Success,
    /// The executor reported the current skill failed.
    Failure,
    /// Unrecoverable for the current task; requires an external reset.
    Error,
    /// The whole task (not just one skill) is done.  Terminal.
    Finish,
}

impl TreePhase {
    /// Whether this phase is terminal for the current task.
    ///
    /// Terminal phases exit only via an explicit external reset.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TreePhase::Error | TreePhase::Finish)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ActionPhase
// ─────────────────────────────────────────────────────────────────────────────

/// The category of physical action a tree leaf node intends.
///
/// `Condition`, `Error`, and `Recover` are sentinels: they have no canonical
/// string identifier and no executor skill, and [`ActionPhase::as_str`] /
/// [`ActionPhase::skill_name`] return `None` for them.  Attempting to ground
/// a sentinel is a configuration defect, not a runtime condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPhase {
    Condition,
    Error,
    #[default]
    Initialization,
    Approach,
    Recover,

    CartesianMove,
    JointMove,
    GripperMove,
    GripperForce,
    Contact,
    Wiggle,

    ToolLoad,
    ToolUnload,
    ToolGrasp,
    ToolRelease,
    ToolPick,
    ToolPlace,

    GripperGrasp,
    GripperRelease,
    GripperPick,
    GripperPlace,
}

impl ActionPhase {
    /// The canonical lowercase string identifier, used for serialization and
    /// for default-parameter dictionary lookup.
    ///
    /// Returns `None` for sentinel phases.
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            ActionPhase::Initialization => Some("initialization"),
            ActionPhase::Approach => Some("approach"),
            ActionPhase::CartesianMove => Some("cartesian_move"),
            ActionPhase::JointMove => Some("joint_move"),
            ActionPhase::GripperMove => Some("gripper_move"),
            ActionPhase::GripperForce => Some("gripper_force"),
            ActionPhase::Contact => Some("contact"),
            ActionPhase::Wiggle => Some("wiggle"),
            ActionPhase::ToolLoad => Some("tool_load"),
            ActionPhase::ToolUnload => Some("tool_unload"),
            ActionPhase::ToolGrasp => Some("tool_grasp"),
            ActionPhase::ToolRelease => Some("tool_release"),
            ActionPhase::ToolPick => Some("tool_pick"),
            ActionPhase::ToolPlace => Some("tool_place"),
            ActionPhase::GripperGrasp => Some("gripper_grasp"),
            ActionPhase::GripperRelease => Some("gripper_release"),
            ActionPhase::GripperPick => Some("gripper_pick"),
            ActionPhase::GripperPlace => Some("gripper_place"),
            ActionPhase::Condition | ActionPhase::Error | ActionPhase::Recover => None,
        }
    }

    /// Parse a canonical string identifier back into an [`ActionPhase`].
    ///
    /// Inverse of [`ActionPhase::as_str`] over the mapped values; any string
    /// outside the table yields `None`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "initialization" => Some(ActionPhase::Initialization),
            "approach" => Some(ActionPhase::Approach),
            "cartesian_move" => Some(ActionPhase::CartesianMove),
            "joint_move" => Some(ActionPhase::JointMove),
            "gripper_move" => Some(ActionPhase::GripperMove),
            "gripper_force" => Some(ActionPhase::GripperForce),
            "contact" => Some(ActionPhase::Contact),
            "wiggle" => Some(ActionPhase::Wiggle),
            "tool_load" => Some(ActionPhase::ToolLoad),
            "tool_unload" => Some(ActionPhase::ToolUnload),
            "tool_grasp" => Some(ActionPhase::ToolGrasp),
            "tool_release" => Some(ActionPhase::ToolRelease),
            "tool_pick" => Some(ActionPhase::ToolPick),
            "tool_place" => Some(ActionPhase::ToolPlace),
            "gripper_grasp" => Some(ActionPhase::GripperGrasp),
            "gripper_release" => Some(ActionPhase::GripperRelease),
            "gripper_pick" => Some(ActionPhase::GripperPick),
            "gripper_place" => Some(ActionPhase::GripperPlace),
            _ => None,
        }
    }

    /// Ground this phase to the executor-side skill that implements it.
    ///
    /// Many-to-one: e.g. `ToolGrasp` and `GripperGrasp` both run the
    /// `GripperForce` skill with different parameters.  Sentinels and phases
    /// without a physical skill return `None`.
    pub fn skill_name(&self) -> Option<&'static str> {
        match self {
            ActionPhase::CartesianMove => Some("CartesianMove"),
            ActionPhase::JointMove => Some("JointMove"),
            ActionPhase::GripperMove
            | ActionPhase::GripperRelease
            | ActionPhase::ToolRelease => Some("GripperMove"),
            ActionPhase::GripperForce
            | ActionPhase::GripperGrasp
            | ActionPhase::ToolGrasp => Some("GripperForce"),
            ActionPhase::Contact => Some("Contact"),
            ActionPhase::Wiggle => Some("Wiggle"),
            ActionPhase::ToolLoad | ActionPhase::ToolUnload => Some("ToolLoad"),
            ActionPhase::ToolPick | ActionPhase::GripperPick => Some("Pick"),
            ActionPhase::ToolPlace | ActionPhase::GripperPlace => Some("Place"),
            ActionPhase::Initialization
            | ActionPhase::Approach
            | ActionPhase::Condition
            | ActionPhase::Error
            | ActionPhase::Recover => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const MAPPED: &[ActionPhase] = &[
        ActionPhase::Initialization,
        ActionPhase::Approach,
        ActionPhase::CartesianMove,
        ActionPhase::JointMove,
        ActionPhase::GripperMove,
        ActionPhase::GripperForce,
        ActionPhase::Contact,
        ActionPhase::Wiggle,
        ActionPhase::ToolLoad,
        ActionPhase::ToolUnload,
        ActionPhase::ToolGrasp,
        ActionPhase::ToolRelease,
        ActionPhase::ToolPick,
        ActionPhase::ToolPlace,
        ActionPhase::GripperGrasp,
        ActionPhase::GripperRelease,
        ActionPhase::GripperPick,
        ActionPhase::GripperPlace,
    ];

    #[test]
    fn string_mapping_is_a_bijection_over_mapped_phases() {
        for phase in MAPPED {
            let s = phase.as_str().expect("mapped phase must have a string");
            assert_eq!(ActionPhase::from_str(s), Some(*phase), "round trip of {s}");
        }
    }

    #[test]
    fn sentinels_have_no_string_identifier() {
        assert_eq!(ActionPhase::Condition.as_str(), None);
        assert_eq!(ActionPhase::Error.as_str(), None);
        assert_eq!(ActionPhase::Recover.as_str(), None);
    }

    #[test]
    fn unknown_string_parses_to_none() {
        assert_eq!(ActionPhase::from_str("warp_drive"), None);
        assert_eq!(ActionPhase::from_str(""), None);
        // Near-misses must not match either.
        assert_eq!(ActionPhase::from_str("Cartesian_Move"), None);
    }

    #[test]
    fn serde_uses_canonical_strings() {
        let json = serde_json::to_string(&ActionPhase::CartesianMove).unwrap();
        assert_eq!(json, "\"cartesian_move\"");
        let back: ActionPhase = serde_json::from_str("\"tool_grasp\"").unwrap();
        assert_eq!(back, ActionPhase::ToolGrasp);
    }

    #[test]
    fn skill_grounding_is_many_to_one() {
        assert_eq!(ActionPhase::ToolGrasp.skill_name(), Some("GripperForce"));
        assert_eq!(ActionPhase::GripperGrasp.skill_name(), Some("GripperForce"));
        assert_eq!(ActionPhase::ToolLoad.skill_name(), Some("ToolLoad"));
        assert_eq!(ActionPhase::ToolUnload.skill_name(), Some("ToolLoad"));
        assert_eq!(ActionPhase::GripperPick.skill_name(), Some("Pick"));
        assert_eq!(ActionPhase::ToolPick.skill_name(), Some("Pick"));
    }

    #[test]
    fn sentinels_ground_to_no_skill() {
        assert_eq!(ActionPhase::Condition.skill_name(), None);
        assert_eq!(ActionPhase::Error.skill_name(), None);
        assert_eq!(ActionPhase::Recover.skill_name(), None);
        assert_eq!(ActionPhase::Initialization.skill_name(), None);
    }

    #[test]
    fn tree_phase_terminal_set() {
        assert!(TreePhase::Error.is_terminal());
        assert!(TreePhase::Finish.is_terminal());
        for phase in [
            TreePhase::Idle,
            TreePhase::Pause,
            TreePhase::Resume,
            TreePhase::Success,
            TreePhase::Failure,
        ] {
            assert!(!phase.is_terminal(), "{phase:?} must not be terminal");
        }
    }

    #[test]
    fn tree_phase_defaults_to_idle() {
        assert_eq!(TreePhase::default(), TreePhase::Idle);
    }
}
