use crate::error::{Result, SyncError};
use crate::node::{AttrName, AttrValue, NodeId, NodeKind, Tree};
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    label: String,
    value: String,
    selected: bool,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            selected: false,
        }
    }

    pub fn selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Select {
    options: Vec<SelectOption>,
    multiple: bool,
    bubble_up: bool,
}

impl Select {
    pub fn new(options: impl IntoIterator<Item = SelectOption>) -> Self {
        Self {
            options: options.into_iter().collect(),
            multiple: false,
            bubble_up: false,
        }
    }

    pub fn multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }

    pub fn bubble_up(mut self, bubble_up: bool) -> Self {
        self.bubble_up = bubble_up;
        self
    }

    /// In single mode the last option constructed as selected wins.
    pub fn build(self, tree: &mut Tree) -> Result<NodeId> {
        let Select {
            options,
            multiple,
            bubble_up,
        } = self;

        let select = tree.alloc(NodeKind::Select {
            multiple,
            bubble_up,
        });
        tree.write_attr(select, AttrName::Multiple, AttrValue::Flag(multiple))?;

        let winner = if multiple {
            None
        } else {
            options.iter().rposition(|option| option.selected)
        };

        for (index, option) in options.into_iter().enumerate() {
            let selected = match winner {
                Some(winner) => index == winner,
                None => option.selected,
            };

            let id = tree.alloc(NodeKind::Option);
            tree.write_attr(id, AttrName::Value, AttrValue::Text(option.value))?;
            tree.write_attr(id, AttrName::Label, AttrValue::Text(option.label))?;
            tree.write_attr(id, AttrName::Selected, AttrValue::Flag(selected))?;
            tree.link(select, id)?;
        }

        Ok(select)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectValue {
    Single(Option<String>),
    Multiple(Vec<String>),
}

impl SelectValue {
    pub fn as_single(&self) -> Option<&str> {
        match self {
            SelectValue::Single(value) => value.as_deref(),
            SelectValue::Multiple(_) => None,
        }
    }

    pub fn as_multiple(&self) -> Option<&[String]> {
        match self {
            SelectValue::Multiple(values) => Some(values),
            SelectValue::Single(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionChange {
    pub changed: Vec<NodeId>,
    pub ignored: Vec<String>,
}

impl Tree {
    fn select_mode(&self, select: NodeId) -> Result<bool> {
        match self.node(select)?.kind() {
            NodeKind::Select { multiple, .. } => Ok(*multiple),
            _ => Err(SyncError::InvalidTree(format!("{select} is not a select"))),
        }
    }

    fn option_states(&self, select: NodeId) -> Result<Vec<(NodeId, &str, bool)>> {
        let node = self.node(select)?;
        node.children()
            .iter()
            .map(|&id| {
                let option = self.node(id)?;
                Ok((
                    id,
                    option.text(&AttrName::Value).unwrap_or_default(),
                    option.flag(&AttrName::Selected),
                ))
            })
            .collect()
    }

    pub fn select_value(&self, select: NodeId) -> Result<SelectValue> {
        let multiple = self.select_mode(select)?;
        let options = self.option_states(select)?;

        if multiple {
            return Ok(SelectValue::Multiple(
                options
                    .iter()
                    .filter(|(_, _, selected)| *selected)
                    .map(|(_, value, _)| value.to_string())
                    .collect(),
            ));
        }

        let chosen = options
            .iter()
            .find(|(_, _, selected)| *selected)
            .or_else(|| options.first())
            .map(|(_, value, _)| value.to_string());
        Ok(SelectValue::Single(chosen))
    }

    /// Applies a requested selection in one pass. Every flag is computed
    /// before any is written; a rejected request leaves the tree untouched.
    pub fn apply_selection(
        &mut self,
        select: NodeId,
        requested: &[String],
    ) -> Result<SelectionChange> {
        let multiple = self.select_mode(select)?;
        let options = self.option_states(select)?;
        let mut ignored = Vec::new();

        let targets: Vec<(NodeId, bool)> = if multiple {
            let wanted: HashSet<&str> = requested.iter().map(String::as_str).collect();
            let known: HashSet<&str> = options.iter().map(|(_, value, _)| *value).collect();

            for value in requested {
                if !known.contains(value.as_str()) {
                    debug!(%select, value = %value, "ignoring unknown multi-select value");
                    ignored.push(value.clone());
                }
            }

            options
                .iter()
                .map(|(id, value, _)| (*id, wanted.contains(value)))
                .collect()
        } else {
            let [value] = requested else {
                return Err(SyncError::InvalidEvent {
                    node: select,
                    reason: format!(
                        "single select expects exactly one value, got {}",
                        requested.len()
                    ),
                });
            };

            let Some(position) = options.iter().position(|(_, option, _)| option == value)
            else {
                return Err(SyncError::UnknownOptionValue {
                    select,
                    value: value.clone(),
                });
            };

            options
                .iter()
                .enumerate()
                .map(|(index, (id, _, _))| (*id, index == position))
                .collect()
        };

        let mut changed = Vec::new();
        for (id, selected) in targets {
            if self.write_attr(id, AttrName::Selected, AttrValue::Flag(selected))? {
                changed.push(id);
            }
        }

        if !changed.is_empty() {
            self.touch(select)?;
        }

        Ok(SelectionChange { changed, ignored })
    }
}

pub(crate) fn deselect_siblings(tree: &mut Tree, option: NodeId) -> Result<()> {
    let Some(parent) = tree.node(option)?.parent() else {
        return Ok(());
    };

    let parent_node = tree.node(parent)?;
    if !matches!(
        parent_node.kind(),
        NodeKind::Select {
            multiple: false,
            ..
        }
    ) {
        return Ok(());
    }

    let siblings: Vec<NodeId> = parent_node
        .children()
        .iter()
        .copied()
        .filter(|id| *id != option)
        .collect();

    for sibling in siblings {
        tree.write_attr(sibling, AttrName::Selected, AttrValue::Flag(false))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn foo_bar_baz(selected: [bool; 3]) -> Vec<SelectOption> {
        vec![
            SelectOption::new("Foo", "foo").selected(selected[0]),
            SelectOption::new("Bar", "bar").selected(selected[1]),
            SelectOption::new("Baz", "baz").selected(selected[2]),
        ]
    }

    fn values(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    fn option_id(tree: &Tree, select: NodeId, index: usize) -> NodeId {
        tree.node(select).expect("select").children()[index]
    }

    #[test]
    fn single_without_selection_defaults_to_first_option() {
        let mut tree = Tree::new();
        let select = Select::new(foo_bar_baz([false; 3]))
            .build(&mut tree)
            .expect("build");

        assert_eq!(
            tree.select_value(select).expect("value"),
            SelectValue::Single(Some("foo".into()))
        );

        tree.apply_selection(select, &values(&["bar"]))
            .expect("apply");
        assert_eq!(tree.select_value(select).expect("value").as_single(), Some("bar"));
    }

    #[test]
    fn single_pre_selected_then_changed() {
        let mut tree = Tree::new();
        let select = Select::new(foo_bar_baz([false, true, false]))
            .build(&mut tree)
            .expect("build");
        let bar = option_id(&tree, select, 1);

        assert_eq!(tree.select_value(select).expect("value").as_single(), Some("bar"));

        let change = tree
            .apply_selection(select, &values(&["foo"]))
            .expect("apply");

        assert_eq!(tree.select_value(select).expect("value").as_single(), Some("foo"));
        assert!(!tree.node(bar).expect("bar").flag(&AttrName::Selected));
        assert_eq!(change.changed.len(), 2);
    }

    #[test]
    fn single_without_options_has_no_value() {
        let mut tree = Tree::new();
        let select = Select::new(Vec::<SelectOption>::new()).build(&mut tree).expect("build");
        assert_eq!(
            tree.select_value(select).expect("value"),
            SelectValue::Single(None)
        );
    }

    #[test]
    fn single_construction_keeps_last_selected_option() {
        let mut tree = Tree::new();
        let select = Select::new(foo_bar_baz([true, false, true]))
            .build(&mut tree)
            .expect("build");

        assert_eq!(tree.select_value(select).expect("value").as_single(), Some("baz"));
        let foo = option_id(&tree, select, 0);
        assert!(!tree.node(foo).expect("foo").flag(&AttrName::Selected));
    }

    #[test]
    fn single_unknown_value_leaves_tree_unchanged() {
        let mut tree = Tree::new();
        let select = Select::new(foo_bar_baz([false, true, false]))
            .build(&mut tree)
            .expect("build");
        let version = tree.node(select).expect("select").version();

        let err = tree
            .apply_selection(select, &values(&["qux"]))
            .expect_err("unknown value");

        assert!(matches!(err, SyncError::UnknownOptionValue { ref value, .. } if value == "qux"));
        assert_eq!(tree.select_value(select).expect("value").as_single(), Some("bar"));
        assert_eq!(tree.node(select).expect("select").version(), version);
    }

    #[test]
    fn single_requires_exactly_one_value() {
        let mut tree = Tree::new();
        let select = Select::new(foo_bar_baz([false; 3]))
            .build(&mut tree)
            .expect("build");

        assert!(matches!(
            tree.apply_selection(select, &values(&["foo", "bar"])),
            Err(SyncError::InvalidEvent { .. })
        ));
        assert!(matches!(
            tree.apply_selection(select, &[]),
            Err(SyncError::InvalidEvent { .. })
        ));
    }

    #[test]
    fn multi_without_selection_follows_document_order() {
        let mut tree = Tree::new();
        let select = Select::new(foo_bar_baz([false; 3]))
            .multiple(true)
            .build(&mut tree)
            .expect("build");

        assert_eq!(
            tree.select_value(select).expect("value"),
            SelectValue::Multiple(vec![])
        );

        tree.apply_selection(select, &values(&["bar", "foo"]))
            .expect("apply");
        assert_eq!(
            tree.select_value(select).expect("value"),
            SelectValue::Multiple(values(&["foo", "bar"]))
        );
    }

    #[test]
    fn multi_pre_selected_then_replaced_then_cleared() {
        let mut tree = Tree::new();
        let select = Select::new(foo_bar_baz([true, true, false]))
            .multiple(true)
            .build(&mut tree)
            .expect("build");
        let bar = option_id(&tree, select, 1);

        assert_eq!(
            tree.select_value(select).expect("value").as_multiple(),
            Some(values(&["foo", "bar"]).as_slice())
        );

        tree.apply_selection(select, &values(&["foo", "baz"]))
            .expect("apply");
        assert_eq!(
            tree.select_value(select).expect("value").as_multiple(),
            Some(values(&["foo", "baz"]).as_slice())
        );
        assert!(!tree.node(bar).expect("bar").flag(&AttrName::Selected));

        tree.apply_selection(select, &[]).expect("clear");
        assert_eq!(
            tree.select_value(select).expect("value"),
            SelectValue::Multiple(vec![])
        );
    }

    #[test]
    fn multi_ignores_unknown_values_individually() {
        let mut tree = Tree::new();
        let select = Select::new(foo_bar_baz([false; 3]))
            .multiple(true)
            .build(&mut tree)
            .expect("build");

        let change = tree
            .apply_selection(select, &values(&["baz", "qux"]))
            .expect("apply");

        assert_eq!(change.ignored, values(&["qux"]));
        assert_eq!(
            tree.select_value(select).expect("value").as_multiple(),
            Some(values(&["baz"]).as_slice())
        );
    }

    #[test]
    fn reapplying_same_selection_changes_nothing() {
        let mut tree = Tree::new();
        let select = Select::new(foo_bar_baz([false; 3]))
            .build(&mut tree)
            .expect("build");

        tree.apply_selection(select, &values(&["baz"]))
            .expect("first");
        let version = tree.node(select).expect("select").version();

        let change = tree
            .apply_selection(select, &values(&["baz"]))
            .expect("second");

        assert!(change.changed.is_empty());
        assert_eq!(tree.node(select).expect("select").version(), version);
    }

    #[test]
    fn reapplying_multi_selection_in_another_order_changes_nothing() {
        let mut tree = Tree::new();
        let select = Select::new(foo_bar_baz([false; 3]))
            .multiple(true)
            .build(&mut tree)
            .expect("build");

        tree.apply_selection(select, &values(&["foo", "baz"]))
            .expect("first");
        let version = tree.node(select).expect("select").version();

        let change = tree
            .apply_selection(select, &values(&["baz", "foo"]))
            .expect("reordered");

        assert!(change.changed.is_empty());
        assert!(change.ignored.is_empty());
        assert_eq!(tree.node(select).expect("select").version(), version);
        assert_eq!(
            tree.select_value(select).expect("value").as_multiple(),
            Some(values(&["foo", "baz"]).as_slice())
        );
    }

    #[test]
    fn setting_selected_on_single_option_deselects_siblings() {
        let mut tree = Tree::new();
        let select = Select::new(foo_bar_baz([true, false, false]))
            .build(&mut tree)
            .expect("build");
        let baz = option_id(&tree, select, 2);

        tree.set_attribute(baz, "selected", true).expect("select baz");

        assert_eq!(tree.select_value(select).expect("value").as_single(), Some("baz"));
        let foo = option_id(&tree, select, 0);
        assert!(!tree.node(foo).expect("foo").flag(&AttrName::Selected));
    }

    #[test]
    fn select_rejects_option_only_and_fixed_attributes() {
        let mut tree = Tree::new();
        let select = Select::new(foo_bar_baz([false; 3]))
            .build(&mut tree)
            .expect("build");
        let foo = option_id(&tree, select, 0);

        for name in ["multiple", "value", "onclick"] {
            assert!(matches!(
                tree.set_attribute(select, name, "x"),
                Err(SyncError::InvalidAttribute { .. })
            ));
        }
        assert!(matches!(
            tree.set_attribute(foo, "href", "/x"),
            Err(SyncError::InvalidAttribute { .. })
        ));
        tree.set_attribute(select, "data-role", "picker")
            .expect("data attributes are allowed");
        tree.set_attribute(foo, "label", "Food").expect("label");
    }
}
