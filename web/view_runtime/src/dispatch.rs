use crate::error::{Result, SyncError};
use crate::node::{AttrName, AttrValue, NodeId, NodeKind, Tree};
use crate::session::{ContextPhase, Session};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Change,
    Input,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventValue {
    One(String),
    Many(Vec<String>),
}

impl EventValue {
    pub fn many<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EventValue::Many(values.into_iter().map(Into::into).collect())
    }

    pub fn as_slice(&self) -> &[String] {
        match self {
            EventValue::One(value) => std::slice::from_ref(value),
            EventValue::Many(values) => values,
        }
    }
}

impl From<&str> for EventValue {
    fn from(value: &str) -> Self {
        EventValue::One(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub node_id: NodeId,
    pub kind: EventKind,
    pub value: EventValue,
}

impl InboundEvent {
    pub fn change(node_id: NodeId, value: impl Into<EventValue>) -> Self {
        Self {
            node_id,
            kind: EventKind::Change,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Applied {
    pub touched: Vec<NodeId>,
}

impl Applied {
    pub fn is_noop(&self) -> bool {
        self.touched.is_empty()
    }
}

pub fn apply_event(tree: &mut Tree, event: &InboundEvent) -> Result<Applied> {
    let id = event.node_id;
    let kind = tree.node(id)?.kind().clone();

    match kind {
        NodeKind::Select { bubble_up, .. } => {
            let change = tree.apply_selection(id, event.value.as_slice())?;
            if change.changed.is_empty() {
                return Ok(Applied::default());
            }

            let mut touched = vec![id];
            touched.extend(change.changed);
            if bubble_up {
                touched.extend(tree.ancestors(id));
            }
            Ok(Applied { touched })
        }
        NodeKind::Option => Err(SyncError::InvalidEvent {
            node: id,
            reason: "options change through their select".to_string(),
        }),
        NodeKind::Element(_) => {
            let EventValue::One(value) = &event.value else {
                return Err(SyncError::InvalidEvent {
                    node: id,
                    reason: "generic elements take a single string value".to_string(),
                });
            };

            if tree.write_attr(id, AttrName::Value, AttrValue::Text(value.clone()))? {
                Ok(Applied { touched: vec![id] })
            } else {
                Ok(Applied::default())
            }
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    session: Arc<Session>,
}

impl Dispatcher {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Blocks until the view is parked or finished.
    pub fn dispatch(&self, event: InboundEvent) -> Result<Applied> {
        let mut state = self.session.lock();
        if !state.is_mutable() {
            debug!(sid = %state.sid, node = %event.node_id, "connection finished; dropping event");
            return Err(SyncError::ConnectionClosed);
        }

        let applied = match apply_event(&mut state.tree, &event) {
            Ok(applied) => applied,
            Err(err) => {
                warn!(sid = %state.sid, node = %event.node_id, error = %err, "dropping event");
                return Err(err);
            }
        };

        if applied.is_noop() {
            debug!(sid = %state.sid, node = %event.node_id, "event changed nothing");
            return Ok(applied);
        }

        state.flush();

        let qualifies = state
            .interest
            .is_some_and(|interest| interest.matches(&applied.touched));
        if state.phase == ContextPhase::Blocked && qualifies {
            state.woken = true;
            drop(state);
            self.session.wake();
        }

        Ok(applied)
    }
}
