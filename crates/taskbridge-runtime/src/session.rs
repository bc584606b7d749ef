//! [`ExecutionSession`] – wiring between the tick thread and the
//! executor-facing thread.
//!
//! One session owns one phase machine, the hand-off channels, the status
//! registers, and the action archive, and hands out three views of them:
//!
//! | Handle | Thread | Blocking |
//! |---|---|---|
//! | [`TreeHandle`] | tick thread | never blocks (`try_pop` / register reads only) |
//! | [`ExecutorLink`] | executor-facing thread | only inside `pop_wait`, bounded by the configured timeout |
//! | [`SessionInbox`] | transport callbacks | never blocks (push / register write) |
//!
//! The shared state is one explicitly owned instance with its lifecycle tied
//! to the session, passed by handle to both threads at construction; there
//! are no process-wide statics.  The archive lock and the phase lock are
//! never held at the same time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use taskbridge_archive::ActionArchive;
use taskbridge_sync::{HandoffChannel, LatestValue, PhaseError, PhaseEvent, PhaseMachine};
use taskbridge_types::{
    AckKind, ActionPhaseContext, CommandRequest, CommandType, ExecutorAck, NodeArchive, TaskState,
    TreePhase, TreeState,
};

use crate::arbiter::{ArbiterError, CommandArbiter, SkillRequest};
use crate::config::SessionConfig;

// ─────────────────────────────────────────────────────────────────────────────
// Tick contract & transport seam
// ─────────────────────────────────────────────────────────────────────────────

/// The three-valued result a leaf node reports back to its tree engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    Running,
    Success,
    Failure,
}

/// Raised when the transport layer cannot deliver a command.
#[derive(Error, Debug)]
#[error("transport publish failed: {0}")]
pub struct TransportError(pub String);

/// The outbound half of the external pub/sub transport.
///
/// The inbound half lands on [`SessionInbox`]; the transport implementation
/// itself (DDS, UDP, in-process) is outside this crate.
pub trait CommandTransport: Send + Sync {
    fn publish(&self, request: &CommandRequest) -> Result<(), TransportError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared session state
// ─────────────────────────────────────────────────────────────────────────────

struct Shared {
    session_id: Uuid,
    phase: PhaseMachine,
    commands: HandoffChannel<CommandRequest>,
    acks: HandoffChannel<ExecutorAck>,
    /// Executor → tree: one item per confirmed stop.  The tick thread drains
    /// this with `try_pop` and only then clears `is_interrupted`.
    stop_confirmations: HandoffChannel<()>,
    status: LatestValue<ActionPhaseContext>,
    task_state: LatestValue<TaskState>,
    /// The action the tree most recently handed to the executor; attributed
    /// on every terminal transition.
    active_action: LatestValue<NodeArchive>,
    archive: Mutex<ActionArchive>,
}

impl Shared {
    fn archive(&self) -> MutexGuard<'_, ActionArchive> {
        self.archive.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Constructor for one task session.
pub struct ExecutionSession;

impl ExecutionSession {
    /// Build the session and split it into its three per-thread handles.
    ///
    /// A prior archive snapshot at the configured path is loaded when
    /// present; a missing file is the normal first-run condition.
    pub fn new<T: CommandTransport>(
        config: SessionConfig,
        transport: T,
    ) -> (TreeHandle, ExecutorLink<T>, SessionInbox) {
        let shared = Arc::new(Shared {
            session_id: Uuid::new_v4(),
            phase: PhaseMachine::new(),
            commands: HandoffChannel::new(),
            acks: HandoffChannel::new(),
            stop_confirmations: HandoffChannel::new(),
            status: LatestValue::default(),
            task_state: LatestValue::default(),
            active_action: LatestValue::default(),
            archive: Mutex::new(ActionArchive::new(&config.archive_path)),
        });

        if let Err(e) = shared.archive().read_archive() {
            debug!(error = %e, "no prior archive snapshot loaded");
        }
        info!(session = %shared.session_id, "execution session created");

        let timeout = config.handoff_timeout();
        (
            TreeHandle {
                shared: Arc::clone(&shared),
                arbiter: CommandArbiter::new(),
            },
            ExecutorLink {
                shared: Arc::clone(&shared),
                transport,
                timeout,
                awaiting: None,
            },
            SessionInbox { shared },
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TreeHandle (tick thread)
// ─────────────────────────────────────────────────────────────────────────────

/// The tick-thread view of the session.  Every operation is non-blocking.
pub struct TreeHandle {
    shared: Arc<Shared>,
    arbiter: CommandArbiter,
}

impl TreeHandle {
    /// One leaf-node tick: reconcile the request against the shared phase and
    /// return the node's three-valued status.
    pub fn tick_skill(&mut self, state: &mut TreeState, request: &SkillRequest) -> TickStatus {
        self.absorb_confirmations(state);
        state.tree_phase = self.shared.phase.mirror();

        match state.tree_phase {
            TreePhase::Idle | TreePhase::Pause | TreePhase::Resume => {
                match self.arbiter.decide(state, request) {
                    Ok(Some(command)) => {
                        self.dispatch(state, request, command);
                        TickStatus::Running
                    }
                    Ok(None) => TickStatus::Running,
                    Err(ArbiterError::StopUnconfirmed { requested }) => {
                        debug!(?requested, "start deferred until the stop is confirmed");
                        TickStatus::Running
                    }
                    Err(e @ ArbiterError::UnmappedPhase(_)) => {
                        warn!(error = %e, "leaf request cannot proceed");
                        TickStatus::Failure
                    }
                }
            }
            TreePhase::Success => {
                state.is_succeeded = true;
                self.consume_result(state, false);
                TickStatus::Success
            }
            TreePhase::Failure => {
                // A success recorded earlier in the task no longer stands.
                state.is_succeeded = false;
                self.consume_result(state, false);
                TickStatus::Failure
            }
            TreePhase::Error => TickStatus::Failure,
            TreePhase::Finish => TickStatus::Success,
        }
    }

    /// Declare the whole task done.  Valid when the last skill's `Success`
    /// has not yet been consumed (drives `Success -> Finish`) or the machine
    /// is already in `Finish`.
    pub fn finish_task(&mut self, state: &mut TreeState) -> TickStatus {
        self.absorb_confirmations(state);
        state.tree_phase = self.shared.phase.mirror();
        match state.tree_phase {
            TreePhase::Success => {
                state.is_succeeded = true;
                self.consume_result(state, true);
                self.halt(state);
                TickStatus::Success
            }
            TreePhase::Finish => TickStatus::Success,
            TreePhase::Error => TickStatus::Failure,
            _ => TickStatus::Running,
        }
    }

    /// Halt without a replacement (external cancel, end of task).  The stop
    /// is advisory until the executor confirms it.
    pub fn halt(&mut self, state: &mut TreeState) {
        let command = self.arbiter.halt();
        info!(id = %command.id, "halting current skill");
        state.is_interrupted = true;
        self.shared.commands.push(command);
    }

    /// External reset: back to `Idle`, fresh tree state, next decision is an
    /// `Initialization` again.  The archive dictionary is kept.
    pub fn reset(&mut self, state: &mut TreeState) {
        self.shared.phase.reset();
        self.arbiter.reset();
        *state = TreeState::default();
    }

    /// The latest mirrored phase.
    pub fn phase(&self) -> TreePhase {
        self.shared.phase.mirror()
    }

    /// The freshest perception snapshot.
    pub fn task_state(&self) -> TaskState {
        self.shared.task_state.read()
    }

    /// The executor status most recently written back.
    pub fn status(&self) -> ActionPhaseContext {
        self.shared.status.read()
    }

    pub fn session_id(&self) -> Uuid {
        self.shared.session_id
    }

    fn absorb_confirmations(&self, state: &mut TreeState) {
        while self.shared.stop_confirmations.try_pop().is_some() {
            state.is_interrupted = false;
        }
    }

    fn consume_result(&self, state: &mut TreeState, task_complete: bool) {
        if let Err(e) = self
            .shared
            .phase
            .apply(PhaseEvent::ResultConsumed { task_complete })
        {
            warn!(error = %e, "result consumption rejected");
        }
        state.tree_phase = self.shared.phase.mirror();
    }

    fn dispatch(&self, state: &mut TreeState, request: &SkillRequest, command: CommandRequest) {
        let action_name = request.archive.phase.as_str().unwrap_or("unknown");
        state.record_action(action_name, request.archive.clone());
        state.objects = request.objects.clone();
        if matches!(
            command.command_type,
            CommandType::Initialization | CommandType::StopOldStartNew | CommandType::StopOldTask
        ) {
            state.is_interrupted = true;
        }
        self.shared.active_action.write(request.archive.clone());

        let start_now = command.command_type == CommandType::StartNewTask;
        info!(
            id = %command.id,
            kind = ?command.command_type,
            skill = %command.skill_type,
            action = action_name,
            "command queued"
        );
        self.shared.commands.push(command);
        if start_now {
            if let Err(e) = self.shared.phase.apply(PhaseEvent::StartAccepted) {
                warn!(error = %e, "start accepted out of phase");
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ExecutorLink (executor-facing thread)
// ─────────────────────────────────────────────────────────────────────────────

/// What the executor-facing thread is waiting to hear back about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Awaiting {
    Start,
    Stop { restart: bool },
}

/// The executor-facing view of the session: publishes queued commands,
/// absorbs acknowledgements, and drives the phase machine.  This is the only
/// thread allowed to block, and only inside `pop_wait`.
pub struct ExecutorLink<T: CommandTransport> {
    shared: Arc<Shared>,
    transport: T,
    timeout: Duration,
    awaiting: Option<Awaiting>,
}

impl<T: CommandTransport> ExecutorLink<T> {
    /// One iteration: flush queued commands to the transport, then wait (up
    /// to the hand-off bound) for one acknowledgement.
    ///
    /// A timeout while an acknowledgement is owed escalates the phase to
    /// `Error`; a timeout with nothing owed is an idle iteration.
    pub fn step(&mut self) -> Result<(), TransportError> {
        while let Some(command) = self.shared.commands.try_pop() {
            debug!(
                id = %command.id,
                kind = ?command.command_type,
                skill = %command.skill_type,
                "publishing command"
            );
            self.transport.publish(&command)?;
            self.awaiting = Some(match command.command_type {
                CommandType::StartNewTask => Awaiting::Start,
                CommandType::StopOldStartNew => Awaiting::Stop { restart: true },
                CommandType::Initialization | CommandType::StopOldTask => {
                    Awaiting::Stop { restart: false }
                }
            });
        }

        match self.shared.acks.pop_wait(self.timeout) {
            Some(ack) => self.handle_ack(ack),
            None if self.awaiting.is_some() => self.escalate_timeout(),
            None => {}
        }
        Ok(())
    }

    /// Run [`step`][Self::step] until `shutdown` is raised.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<(), TransportError> {
        info!(session = %self.shared.session_id, "executor link running");
        while !shutdown.load(Ordering::Relaxed) {
            self.step()?;
        }
        info!(session = %self.shared.session_id, "executor link stopped");
        Ok(())
    }

    fn handle_ack(&mut self, ack: ExecutorAck) {
        debug!(kind = ?ack.kind, node = %ack.node_name, "acknowledgement received");
        match ack.kind {
            AckKind::Started => {
                self.awaiting = None;
                self.apply(PhaseEvent::ExecutorRunning);
                self.write_status(&ack.node_name, false);
            }
            AckKind::Stopped => {
                let restart = self.awaiting == Some(Awaiting::Stop { restart: true });
                self.awaiting = None;
                self.apply(PhaseEvent::ExecutorStopped);
                if restart {
                    // Stop confirmed; the start half of StopOldStartNew may
                    // now proceed without any overlap.  It must be accepted
                    // before the confirmation is published: a tick landing
                    // in between would see Idle with the interrupt cleared
                    // and issue a second start for the same skill.
                    self.apply(PhaseEvent::StartAccepted);
                    self.awaiting = Some(Awaiting::Start);
                }
                self.shared.stop_confirmations.push(());
            }
            AckKind::Succeeded => {
                self.apply(PhaseEvent::ExecutorSucceeded);
                self.record_outcome(&ack.node_name, true);
            }
            AckKind::Failed => {
                self.apply(PhaseEvent::ExecutorFailed);
                self.record_outcome(&ack.node_name, false);
            }
            AckKind::Fault => {
                warn!(node = %ack.node_name, message = %ack.message, "executor fault");
                self.apply(PhaseEvent::ExecutorFault);
                self.record_outcome(&ack.node_name, false);
            }
        }
    }

    fn escalate_timeout(&mut self) {
        let awaiting = self.awaiting.take();
        warn!(
            ?awaiting,
            timeout = ?self.timeout,
            "no acknowledgement within the hand-off bound"
        );
        self.apply(PhaseEvent::HandoffTimedOut);
        let node_name = self.shared.status.read().node_name;
        self.record_outcome(&node_name, false);
    }

    /// Archive the active action and mirror the outcome.  Every transition
    /// into `Success`/`Failure`/`Error` is attributable through this write.
    fn record_outcome(&mut self, node_name: &str, success: bool) {
        self.awaiting = None;
        self.write_status(node_name, success);
        let active = self.shared.active_action.read();
        let mut archive = self.shared.archive();
        archive.archive_action(active);
        if let Err(e) = archive.store_archive() {
            // Recoverable: the in-memory dictionary is intact.
            warn!(error = %e, "archive snapshot failed");
        }
    }

    fn write_status(&self, node_name: &str, success: bool) {
        let active = self.shared.active_action.read();
        self.shared.status.write(ActionPhaseContext {
            node_name: node_name.to_string(),
            action_name: active.phase.as_str().unwrap_or("unknown").to_string(),
            action_phase: active.phase,
            is_action_success: success,
        });
    }

    fn apply(&self, event: PhaseEvent) {
        match self.shared.phase.apply(event) {
            Ok(_) => {}
            // Terminal phases absorb nothing until an external reset.
            Err(e @ PhaseError::Terminal(_)) => debug!(error = %e, "event ignored"),
            Err(e) => warn!(error = %e, "phase event rejected"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SessionInbox (transport callbacks)
// ─────────────────────────────────────────────────────────────────────────────

/// Landing point for inbound transport messages.  Cheap to clone; safe to
/// call from any delivery thread.
#[derive(Clone)]
pub struct SessionInbox {
    shared: Arc<Shared>,
}

impl SessionInbox {
    /// Hand an executor acknowledgement to the executor-facing thread,
    /// waking it if it is waiting.
    pub fn submit_ack(&self, ack: ExecutorAck) {
        self.shared.acks.push_notify(ack);
    }

    /// Land the freshest perception snapshot.  Last-write-wins.
    pub fn publish_task_state(&self, state: TaskState) {
        self.shared.task_state.write(state);
    }

    pub fn session_id(&self) -> Uuid {
        self.shared.session_id
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
