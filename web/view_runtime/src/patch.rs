use crate::error::Result;
use crate::node::{AttrValue, Node, NodeId, Tree};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub tag: String,
    pub attributes: IndexMap<String, AttrValue>,
    pub children_ids: Vec<NodeId>,
}

impl NodeSnapshot {
    pub fn capture(node: &Node) -> Self {
        Self {
            id: node.id(),
            tag: node.tag().to_string(),
            attributes: node
                .attributes()
                .map(|(name, value)| (name.as_str().to_string(), value.clone()))
                .collect(),
            children_ids: node.children().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchKind {
    Full,
    Incremental,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub seq: u64,
    pub kind: PatchKind,
    pub nodes: Vec<NodeSnapshot>,
}

#[derive(Debug, Default)]
pub struct PatchEmitter {
    last_seq: u64,
    root: Option<NodeId>,
}

impl PatchEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    pub fn render(&mut self, tree: &mut Tree, root: NodeId) -> Result<Patch> {
        tree.node(root)?;
        self.root = Some(root);
        let ids = tree.document_order(root);
        Ok(self.emit(tree, PatchKind::Full, ids))
    }

    pub fn flush(&mut self, tree: &mut Tree) -> Option<Patch> {
        let root = self.root?;
        let dirty: Vec<NodeId> = tree
            .document_order(root)
            .into_iter()
            .filter(|id| tree.get(*id).is_some_and(Node::is_dirty))
            .collect();

        if dirty.is_empty() {
            return None;
        }

        Some(self.emit(tree, PatchKind::Incremental, dirty))
    }

    fn emit(&mut self, tree: &mut Tree, kind: PatchKind, ids: Vec<NodeId>) -> Patch {
        let nodes: Vec<NodeSnapshot> = ids
            .iter()
            .filter_map(|id| tree.get(*id))
            .map(NodeSnapshot::capture)
            .collect();

        for id in ids {
            tree.clear_dirty(id);
        }

        self.last_seq += 1;
        debug!(seq = self.last_seq, ?kind, nodes = nodes.len(), "emitting patch");

        Patch {
            seq: self.last_seq,
            kind,
            nodes,
        }
    }
}
