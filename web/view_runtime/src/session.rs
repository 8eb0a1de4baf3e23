use crate::error::{Result, SyncError};
use crate::node::{NodeId, Tree};
use crate::patch::{Patch, PatchEmitter};
use crate::protocol::{ServerEnvelope, error_envelope, patch_envelope};
use std::sync::mpsc::SyncSender;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextPhase {
    Running,
    Blocked,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitTarget {
    Node(NodeId),
    AnyChange,
}

impl WaitTarget {
    pub(crate) fn matches(self, touched: &[NodeId]) -> bool {
        match self {
            WaitTarget::Node(id) => touched.contains(&id),
            WaitTarget::AnyChange => !touched.is_empty(),
        }
    }
}

pub(crate) struct SessionState {
    pub(crate) sid: String,
    pub(crate) tree: Tree,
    pub(crate) emitter: PatchEmitter,
    pub(crate) phase: ContextPhase,
    pub(crate) interest: Option<WaitTarget>,
    pub(crate) woken: bool,
    pub(crate) closed: bool,
    outbound: SyncSender<ServerEnvelope>,
}

impl SessionState {
    pub(crate) fn is_mutable(&self) -> bool {
        !self.closed && self.phase != ContextPhase::Terminated
    }

    pub(crate) fn render(&mut self, root: NodeId) -> Result<()> {
        let patch = self.emitter.render(&mut self.tree, root)?;
        self.send_patch(patch);
        Ok(())
    }

    pub(crate) fn flush(&mut self) {
        if let Some(patch) = self.emitter.flush(&mut self.tree) {
            self.send_patch(patch);
        }
    }

    fn send_patch(&self, patch: Patch) {
        self.send(patch_envelope(self.sid.clone(), patch));
    }

    // Blocks on a full queue; the writer drains it without touching this lock.
    fn send(&self, envelope: ServerEnvelope) {
        if self.outbound.send(envelope).is_err() {
            warn!(sid = %self.sid, "outbound channel closed; dropping envelope");
        }
    }
}

/// The view thread holds the state lock for as long as it runs and releases
/// it only while parked on `resumed`.
pub struct Session {
    sid: String,
    state: Mutex<SessionState>,
    resumed: Condvar,
}

impl Session {
    pub fn new(sid: impl Into<String>, outbound: SyncSender<ServerEnvelope>) -> Self {
        let sid = sid.into();
        Self {
            state: Mutex::new(SessionState {
                sid: sid.clone(),
                tree: Tree::new(),
                emitter: PatchEmitter::new(),
                phase: ContextPhase::Running,
                interest: None,
                woken: false,
                closed: false,
                outbound,
            }),
            sid,
            resumed: Condvar::new(),
        }
    }

    pub fn sid(&self) -> &str {
        &self.sid
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn park<'a>(
        &'a self,
        guard: MutexGuard<'a, SessionState>,
    ) -> MutexGuard<'a, SessionState> {
        self.resumed
            .wait_while(guard, |state| !state.woken && !state.closed)
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn wake(&self) {
        self.resumed.notify_all();
    }

    /// Current phase. Waits for the view to block or finish if it is running.
    pub fn phase(&self) -> ContextPhase {
        self.lock().phase
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Marks the connection gone and fails any pending wait.
    pub fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }

        state.closed = true;
        info!(sid = %self.sid, phase = ?state.phase, "connection closed");
        drop(state);
        self.wake();
    }

    pub(crate) fn report_failure(&self, err: &SyncError) {
        let state = self.lock();
        warn!(sid = %self.sid, error = %err, "view failed");
        state.send(error_envelope(self.sid.clone(), err.code(), err.to_string()));
    }
}
