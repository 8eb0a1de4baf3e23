use crate::error::{Result, SyncError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()?.checked_sub(1)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element(String),
    Select { multiple: bool, bubble_up: bool },
    Option,
}

impl NodeKind {
    pub fn tag(&self) -> &str {
        match self {
            NodeKind::Element(tag) => tag,
            NodeKind::Select { .. } => "select",
            NodeKind::Option => "option",
        }
    }
}

const DIR_TOKENS: &[&str] = &["auto", "ltr", "rtl"];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttrName {
    Id,
    Class,
    Name,
    Value,
    Label,
    Selected,
    Multiple,
    Disabled,
    Dir,
    Custom(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Text,
    Flag,
    Enumerated(&'static [&'static str]),
    Any,
}

impl AttrKind {
    pub fn default_value(self) -> AttrValue {
        match self {
            AttrKind::Flag => AttrValue::Flag(false),
            AttrKind::Enumerated(tokens) => {
                AttrValue::Text(tokens.first().copied().unwrap_or_default().to_string())
            }
            AttrKind::Text | AttrKind::Any => AttrValue::Text(String::new()),
        }
    }

    fn accepts(self, value: &AttrValue) -> bool {
        match (self, value) {
            (AttrKind::Any, _) => true,
            (AttrKind::Flag, AttrValue::Flag(_)) => true,
            (AttrKind::Text, AttrValue::Text(_)) => true,
            (AttrKind::Enumerated(tokens), AttrValue::Text(token)) => {
                tokens.iter().any(|allowed| *allowed == token.as_str())
            }
            _ => false,
        }
    }
}

impl AttrName {
    pub fn parse(name: &str) -> Self {
        match name {
            "id" => AttrName::Id,
            "class" => AttrName::Class,
            "name" => AttrName::Name,
            "value" => AttrName::Value,
            "label" => AttrName::Label,
            "selected" => AttrName::Selected,
            "multiple" => AttrName::Multiple,
            "disabled" => AttrName::Disabled,
            "dir" => AttrName::Dir,
            other => AttrName::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AttrName::Id => "id",
            AttrName::Class => "class",
            AttrName::Name => "name",
            AttrName::Value => "value",
            AttrName::Label => "label",
            AttrName::Selected => "selected",
            AttrName::Multiple => "multiple",
            AttrName::Disabled => "disabled",
            AttrName::Dir => "dir",
            AttrName::Custom(name) => name,
        }
    }

    pub fn kind(&self) -> AttrKind {
        match self {
            AttrName::Selected | AttrName::Multiple | AttrName::Disabled => AttrKind::Flag,
            AttrName::Dir => AttrKind::Enumerated(DIR_TOKENS),
            AttrName::Custom(_) => AttrKind::Any,
            _ => AttrKind::Text,
        }
    }

    fn is_data(&self) -> bool {
        matches!(self, AttrName::Custom(name) if name.starts_with("data-"))
    }
}

impl From<&str> for AttrName {
    fn from(name: &str) -> Self {
        AttrName::parse(name)
    }
}

impl From<String> for AttrName {
    fn from(name: String) -> Self {
        AttrName::parse(&name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Flag(bool),
    Text(String),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(text) => Some(text),
            AttrValue::Flag(_) => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            AttrValue::Flag(flag) => Some(*flag),
            AttrValue::Text(_) => None,
        }
    }
}

impl From<bool> for AttrValue {
    fn from(flag: bool) -> Self {
        AttrValue::Flag(flag)
    }
}

impl From<&str> for AttrValue {
    fn from(text: &str) -> Self {
        AttrValue::Text(text.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(text: String) -> Self {
        AttrValue::Text(text)
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    attributes: IndexMap<AttrName, AttrValue>,
    children: Vec<NodeId>,
    // Non-owning; only walked for bubbling.
    parent: Option<NodeId>,
    version: u64,
    dirty: bool,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn tag(&self) -> &str {
        self.kind.tag()
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&AttrName, &AttrValue)> {
        self.attributes.iter()
    }

    pub fn attribute(&self, name: &AttrName) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    pub fn flag(&self, name: &AttrName) -> bool {
        self.attribute(name)
            .and_then(AttrValue::as_flag)
            .unwrap_or(false)
    }

    pub fn text(&self, name: &AttrName) -> Option<&str> {
        self.attribute(name).and_then(AttrValue::as_str)
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn touch(&mut self) {
        self.version += 1;
        self.dirty = true;
    }

    fn allows(&self, name: &AttrName) -> std::result::Result<(), &'static str> {
        match (&self.kind, name) {
            (NodeKind::Element(_), _) => Ok(()),
            (_, name) if name.is_data() => Ok(()),
            (NodeKind::Select { .. }, AttrName::Multiple) => Err("fixed at construction"),
            (
                NodeKind::Select { .. },
                AttrName::Id | AttrName::Class | AttrName::Name | AttrName::Disabled | AttrName::Dir,
            ) => Ok(()),
            (NodeKind::Select { .. }, _) => Err("not in the select attribute set"),
            (
                NodeKind::Option,
                AttrName::Id
                | AttrName::Class
                | AttrName::Value
                | AttrName::Label
                | AttrName::Selected
                | AttrName::Disabled
                | AttrName::Dir,
            ) => Ok(()),
            (NodeKind::Option, _) => Err("not in the option attribute set"),
        }
    }
}

pub struct Ancestors<'a> {
    tree: &'a Tree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.get(current).and_then(Node::parent);
        Some(current)
    }
}

#[derive(Debug, Default)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()?)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.get(id).ok_or(SyncError::UnknownNodeId(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        id.index()
            .and_then(|index| self.nodes.get_mut(index))
            .ok_or(SyncError::UnknownNodeId(id))
    }

    pub fn create_element(&mut self, tag: impl Into<String>) -> Result<NodeId> {
        let tag = tag.into();
        if tag == "select" || tag == "option" {
            return Err(SyncError::InvalidTree(format!(
                "<{tag}> must be built through Select"
            )));
        }

        Ok(self.alloc(NodeKind::Element(tag)))
    }

    pub(crate) fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u64 + 1);
        self.nodes.push(Node {
            id,
            kind,
            attributes: IndexMap::new(),
            children: Vec::new(),
            parent: None,
            version: 0,
            dirty: true,
        });
        id
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let parent_node = self.node(parent)?;
        let child_node = self.node(child)?;

        if !matches!(parent_node.kind, NodeKind::Element(_)) {
            return Err(SyncError::InvalidTree(format!(
                "<{}> {parent} cannot adopt children",
                parent_node.tag()
            )));
        }

        if matches!(child_node.kind, NodeKind::Option) {
            return Err(SyncError::InvalidTree(format!(
                "option {child} belongs to its select"
            )));
        }

        if child_node.parent.is_some() {
            return Err(SyncError::InvalidTree(format!("{child} is already attached")));
        }

        if parent == child || self.ancestors(parent).any(|ancestor| ancestor == child) {
            return Err(SyncError::InvalidTree(format!(
                "attaching {child} under {parent} would create a cycle"
            )));
        }

        self.link(parent, child)
    }

    pub(crate) fn link(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.node_mut(child)?.parent = Some(parent);
        let parent_node = self.node_mut(parent)?;
        parent_node.children.push(child);
        parent_node.touch();
        Ok(())
    }

    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.get(id).and_then(Node::parent),
        }
    }

    pub fn document_order(&self, root: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            let Some(node) = self.get(id) else {
                continue;
            };
            order.push(id);
            stack.extend(node.children.iter().rev().copied());
        }

        order
    }

    pub fn set_attribute(
        &mut self,
        id: NodeId,
        name: impl Into<AttrName>,
        value: impl Into<AttrValue>,
    ) -> Result<()> {
        let name = name.into();
        let value = value.into();
        let node = self.node(id)?;

        let invalid = |reason| SyncError::InvalidAttribute {
            tag: node.tag().to_string(),
            name: name.as_str().to_string(),
            reason,
        };
        node.allows(&name).map_err(invalid)?;
        if !name.kind().accepts(&value) {
            return Err(invalid("value does not match the attribute kind"));
        }

        if name == AttrName::Selected && value == AttrValue::Flag(true) {
            crate::widgets::deselect_siblings(self, id)?;
        }

        let node = self.node_mut(id)?;
        node.attributes.insert(name, value);
        node.touch();
        Ok(())
    }

    pub fn get_attribute(&self, id: NodeId, name: impl Into<AttrName>) -> Result<AttrValue> {
        let name = name.into();
        let node = self.node(id)?;
        Ok(node
            .attributes
            .get(&name)
            .cloned()
            .unwrap_or_else(|| name.kind().default_value()))
    }

    /// Unvalidated write. Only bumps the version when the value changes.
    pub(crate) fn write_attr(
        &mut self,
        id: NodeId,
        name: AttrName,
        value: AttrValue,
    ) -> Result<bool> {
        let node = self.node_mut(id)?;
        if node.attributes.get(&name) == Some(&value) {
            return Ok(false);
        }

        node.attributes.insert(name, value);
        node.touch();
        Ok(true)
    }

    pub(crate) fn touch(&mut self, id: NodeId) -> Result<()> {
        self.node_mut(id)?.touch();
        Ok(())
    }

    pub(crate) fn clear_dirty(&mut self, id: NodeId) {
        if let Ok(node) = self.node_mut(id) {
            node.dirty = false;
        }
    }
}
