use crate::error::{Result, SyncError};
use crate::node::{AttrName, AttrValue, NodeId, Tree};
use crate::session::{ContextPhase, Session, SessionState, WaitTarget};
use crate::widgets::{Select, SelectValue};
use std::sync::MutexGuard;
use tracing::debug;

/// While a context exists and is not parked, it owns the session lock, so
/// nothing else mutates the tree between two `wait_for_change` calls.
pub struct ViewContext<'a> {
    session: &'a Session,
    guard: Option<MutexGuard<'a, SessionState>>,
}

impl<'a> ViewContext<'a> {
    pub fn enter(session: &'a Session) -> Self {
        let mut guard = session.lock();
        if guard.is_mutable() {
            guard.phase = ContextPhase::Running;
        }
        debug!(sid = %guard.sid, "view entered");

        Self {
            session,
            guard: Some(guard),
        }
    }

    fn state(&self) -> Result<&SessionState> {
        self.guard.as_deref().ok_or(SyncError::ConnectionClosed)
    }

    fn state_mut(&mut self) -> Result<&mut SessionState> {
        let state = self
            .guard
            .as_deref_mut()
            .ok_or(SyncError::ConnectionClosed)?;
        if !state.is_mutable() {
            return Err(SyncError::ConnectionClosed);
        }
        Ok(state)
    }

    pub fn phase(&self) -> ContextPhase {
        self.guard
            .as_deref()
            .map_or(ContextPhase::Terminated, |state| state.phase)
    }

    pub fn tree(&self) -> Result<&Tree> {
        Ok(&self.state()?.tree)
    }

    pub fn tree_mut(&mut self) -> Result<&mut Tree> {
        Ok(&mut self.state_mut()?.tree)
    }

    pub fn build(&mut self, select: Select) -> Result<NodeId> {
        select.build(self.tree_mut()?)
    }

    pub fn create_element(&mut self, tag: impl Into<String>) -> Result<NodeId> {
        self.tree_mut()?.create_element(tag)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.tree_mut()?.append_child(parent, child)
    }

    pub fn set_attribute(
        &mut self,
        node: NodeId,
        name: impl Into<AttrName>,
        value: impl Into<AttrValue>,
    ) -> Result<()> {
        self.tree_mut()?.set_attribute(node, name, value)
    }

    pub fn get_attribute(&self, node: NodeId, name: impl Into<AttrName>) -> Result<AttrValue> {
        self.tree()?.get_attribute(node, name)
    }

    pub fn select_value(&self, select: NodeId) -> Result<SelectValue> {
        self.tree()?.select_value(select)
    }

    pub fn show(&mut self, root: NodeId) -> Result<()> {
        self.state_mut()?.render(root)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.state_mut()?.flush();
        Ok(())
    }

    /// Parks until an event touches `target`, or any node when `None`.
    /// Events applied before the view actually resumes are merged.
    pub fn wait_for_change(&mut self, target: Option<NodeId>) -> Result<()> {
        let state = self.state_mut()?;
        if let Some(node) = target {
            state.tree.node(node)?;
        }

        state.flush();
        state.interest = Some(target.map_or(WaitTarget::AnyChange, WaitTarget::Node));
        state.woken = false;
        state.phase = ContextPhase::Blocked;
        debug!(sid = %state.sid, ?target, "view blocked");

        let guard = self.guard.take().ok_or(SyncError::ConnectionClosed)?;
        let mut guard = self.session.park(guard);
        guard.interest = None;

        let outcome = if guard.woken {
            guard.woken = false;
            guard.phase = ContextPhase::Running;
            Ok(())
        } else {
            guard.phase = ContextPhase::Terminated;
            Err(SyncError::ConnectionClosed)
        };
        debug!(sid = %guard.sid, phase = ?guard.phase, "view resumed");

        self.guard = Some(guard);
        outcome
    }
}

impl Drop for ViewContext<'_> {
    fn drop(&mut self) {
        let Some(mut state) = self.guard.take() else {
            return;
        };

        if state.is_mutable() {
            state.flush();
        }
        state.phase = ContextPhase::Terminated;
        state.interest = None;
        debug!(sid = %state.sid, "view terminated");
    }
}
