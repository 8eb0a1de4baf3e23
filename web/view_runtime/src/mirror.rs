use crate::error::{Result, SyncError};
use crate::node::{AttrValue, NodeId};
use crate::patch::NodeSnapshot;
use crate::protocol::ServerEnvelope;
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceCursor {
    last_seq: Option<u64>,
}

impl SequenceCursor {
    pub fn last_seq(&self) -> Option<u64> {
        self.last_seq
    }

    pub fn validate_render(&self, seq: u64) -> Result<()> {
        match self.last_seq {
            Some(last_seq) if seq == last_seq.wrapping_add(1) => Ok(()),
            Some(last_seq) => Err(SyncError::PatchSequenceGap {
                expected: last_seq.wrapping_add(1),
                got: seq,
            }),
            None => Ok(()),
        }
    }

    pub fn validate_patch(&self, seq: u64) -> Result<()> {
        match self.last_seq {
            Some(last_seq) if seq == last_seq.wrapping_add(1) => Ok(()),
            Some(last_seq) => Err(SyncError::PatchSequenceGap {
                expected: last_seq.wrapping_add(1),
                got: seq,
            }),
            None => Err(SyncError::MissingInitialRender { seq }),
        }
    }

    pub fn mark_applied(&mut self, seq: u64) {
        self.last_seq = Some(seq);
    }
}

#[derive(Debug, Default)]
pub struct RemoteMirror {
    nodes: HashMap<NodeId, NodeSnapshot>,
    root: Option<NodeId>,
    cursor: SequenceCursor,
}

impl RemoteMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeSnapshot> {
        self.nodes.get(&id)
    }

    pub fn cursor(&self) -> SequenceCursor {
        self.cursor
    }

    /// On error the mirror is reset and the caller must request a resync.
    pub fn apply(&mut self, envelope: &ServerEnvelope) -> Result<()> {
        match envelope {
            ServerEnvelope::Render { seq, nodes, .. } => {
                if let Err(err) = self.cursor.validate_render(*seq) {
                    return Err(self.reset_for_resync(err));
                }

                self.nodes.clear();
                self.root = nodes.first().map(|node| node.id);
                self.insert(nodes);
                self.cursor.mark_applied(*seq);
            }
            ServerEnvelope::Patch { seq, nodes, .. } => {
                if let Err(err) = self.cursor.validate_patch(*seq) {
                    return Err(self.reset_for_resync(err));
                }

                self.insert(nodes);
                self.cursor.mark_applied(*seq);
            }
            ServerEnvelope::Error { code, message, .. } => {
                warn!(%code, %message, "server reported an error");
            }
        }

        Ok(())
    }

    fn insert(&mut self, nodes: &[NodeSnapshot]) {
        for node in nodes {
            self.nodes.insert(node.id, node.clone());
        }
    }

    fn reset_for_resync(&mut self, err: SyncError) -> SyncError {
        warn!(error = %err, "mirror out of sync; resync required");
        *self = Self::default();
        err
    }

    pub fn selected_values(&self, select: NodeId) -> Vec<String> {
        let Some(node) = self.node(select) else {
            return Vec::new();
        };

        let options: Vec<&NodeSnapshot> = node
            .children_ids
            .iter()
            .filter_map(|id| self.node(*id))
            .collect();
        let value_of = |option: &NodeSnapshot| {
            option
                .attributes
                .get("value")
                .and_then(AttrValue::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let mut selected: Vec<String> = options
            .iter()
            .filter(|option| option.attributes.get("selected") == Some(&AttrValue::Flag(true)))
            .map(|option| value_of(*option))
            .collect();

        let multiple = node.attributes.get("multiple") == Some(&AttrValue::Flag(true));
        if !multiple && selected.is_empty() {
            selected.extend(options.first().map(|option| value_of(*option)));
        }

        selected
    }
}
