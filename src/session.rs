//! Session identity and the lifecycle state machine.
//!
//! Every client owns exactly one session. The lifecycle moves strictly
//! forward: `Uninitialized → Initializing → Active → ShuttingDown →
//! Terminated`, with `Failed` branching off `Initializing` or `Active` on
//! unrecoverable errors and continuing only into `ShuttingDown`. No state
//! is ever revisited.
//!
//! Transitions go through [`Lifecycle::advance`], whose compare-and-set
//! runs inside the watch channel's write path, so racing contexts observe
//! one deterministic winner.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

/// Opaque session identity. Issued once per successful `initialize`;
/// never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

impl Handle {
    /// Allocate the next handle value. Zero is never issued.
    pub(crate) fn next() -> Self {
        Handle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    /// The numeric value of this handle.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "usp-{}", self.0)
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not yet initialized.
    Uninitialized,
    /// `initialize` is connecting the transport.
    Initializing,
    /// Connected; audio writes and the run loop are valid.
    Active,
    /// `shutdown` was requested; the run loop is winding down.
    ShuttingDown,
    /// Fully shut down. The handle is permanently invalid.
    Terminated,
    /// An unrecoverable error stopped the session. Only `shutdown`
    /// remains valid.
    Failed,
}

impl SessionState {
    /// True once the session can never become active again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Terminated)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Initializing => "initializing",
            SessionState::Active => "active",
            SessionState::ShuttingDown => "shutting-down",
            SessionState::Terminated => "terminated",
            SessionState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// The forward-only transition table. Everything not listed is forbidden.
pub(crate) fn transition_allowed(from: SessionState, to: SessionState) -> bool {
    use SessionState::*;
    matches!(
        (from, to),
        (Uninitialized, Initializing)
            | (Initializing, Active)
            | (Initializing, ShuttingDown)
            | (Initializing, Failed)
            | (Active, ShuttingDown)
            | (Active, Failed)
            | (Failed, ShuttingDown)
            | (ShuttingDown, Terminated)
    )
}

/// Watch-backed lifecycle storage.
///
/// Readers can take the current state synchronously or await a transition;
/// writers race through one serialized compare-and-set.
pub(crate) struct Lifecycle {
    tx: watch::Sender<SessionState>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Uninitialized);
        Self { tx }
    }

    /// The current state.
    pub(crate) fn current(&self) -> SessionState {
        *self.tx.borrow()
    }

    /// Subscribe to state transitions.
    pub(crate) fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Attempt `current → to`, allowed only when the current state is in
    /// `from` and the transition table permits it. Returns the previous
    /// state on success, the actual state on refusal.
    pub(crate) fn advance(
        &self,
        from: &[SessionState],
        to: SessionState,
    ) -> Result<SessionState, SessionState> {
        let mut outcome = Err(to);
        self.tx.send_modify(|state| {
            if from.contains(state) && transition_allowed(*state, to) {
                outcome = Ok(*state);
                *state = to;
            } else {
                outcome = Err(*state);
            }
        });
        outcome
    }
}
