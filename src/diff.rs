//! Two-tree diff: merges independently built groupings into one tree whose
//! nodes are tagged with their provenance.

use std::collections::HashMap;

use generational_arena::Index;
use itertools::Itertools;
use serde::Serialize;
use tracing::instrument;

use crate::arena::{GroupNode, GroupTree, NodeList};
use crate::builder::{FanOut, GroupBuilder, GroupOptions};
use crate::dimension::Dimension;
use crate::errors::{GroupError, GroupResult};
use crate::key::{GroupKey, Record};

/// Which side(s) of a diff a key appeared on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    From,
    To,
    Both,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provenance::From => write!(f, "from"),
            Provenance::To => write!(f, "to"),
            Provenance::Both => write!(f, "both"),
        }
    }
}

/// Diff annotations on a merged node.
///
/// `records` on such a node is the "from" records followed by the "to"
/// records; `from_len` is the split point between the halves.
#[derive(Debug, Clone)]
pub struct DiffInfo {
    pub provenance: Provenance,
    /// Original position in the "from" source list.
    pub from_idx: Option<usize>,
    /// Original position in the "to" source list.
    pub to_idx: Option<usize>,
    /// How many leading records came from the "from" side.
    pub from_len: usize,
}

/// Builds and merges two groupings of the same dimension.
pub struct DiffEngine {
    opts: GroupOptions,
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DiffEngine {
    pub fn new() -> Self {
        Self {
            opts: GroupOptions::default(),
        }
    }

    pub fn with_options(opts: GroupOptions) -> Self {
        Self { opts }
    }

    /// Groups both record collections independently, merges the top-level
    /// lists by key, then sub-diffs every remaining dimension level.
    #[instrument(level = "debug", skip_all, fields(from = from.len(), to = to.len(), levels = dims.len()))]
    pub fn diff(
        &self,
        from: &[Record],
        to: &[Record],
        dims: &[Dimension],
    ) -> GroupResult<GroupTree> {
        if dims.len() > 1 && self.opts.fan_out == FanOut::All {
            return Err(GroupError::AmbiguousMultiValuedConfig);
        }
        let builder = GroupBuilder::with_options(self.opts.clone());
        let first = &dims[..dims.len().min(1)];
        let from_tree = builder.build(from, first)?;
        let to_tree = builder.build(to, first)?;
        let mut merged = self.compare(&from_tree, &to_tree)?;
        for dim in dims.iter().skip(1) {
            self.add_diff_level_all(&mut merged, dim)?;
        }
        Ok(merged)
    }

    /// Merges the top-level lists of two trees into one diff-tagged tree.
    ///
    /// Emission order: stable sort on `(from_idx, to_idx)` with missing
    /// indices last, so from-only and both nodes keep their original "from"
    /// order and to-only nodes interleave by their own position.
    pub fn compare(&self, from_tree: &GroupTree, to_tree: &GroupTree) -> GroupResult<GroupTree> {
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut slots: Vec<Slot> = Vec::new();

        for (i, idx) in from_tree.roots().iter().enumerate() {
            let Some(node) = from_tree.node(idx) else { continue };
            positions.insert(node.identity(), slots.len());
            slots.push(Slot {
                key: node.value.clone(),
                provenance: Provenance::From,
                from_idx: Some(i),
                to_idx: None,
                from_records: node.records.clone(),
                to_records: Vec::new(),
            });
        }
        for (j, idx) in to_tree.roots().iter().enumerate() {
            let Some(node) = to_tree.node(idx) else { continue };
            match positions.get(&node.identity()) {
                Some(&pos) => {
                    let slot = &mut slots[pos];
                    slot.provenance = Provenance::Both;
                    slot.to_idx = Some(j);
                    slot.to_records = node.records.clone();
                }
                None => slots.push(Slot {
                    key: node.value.clone(),
                    provenance: Provenance::To,
                    from_idx: None,
                    to_idx: Some(j),
                    from_records: Vec::new(),
                    to_records: node.records.clone(),
                }),
            }
        }

        let mut records = from_tree.records().to_vec();
        records.extend_from_slice(to_tree.records());
        let dim_name = from_tree.roots().dim_name().to_string();
        let mut tree = GroupTree::new(dim_name.clone(), records);
        let mut roots = NodeList::new(dim_name.clone(), 0);

        let ordered = slots.into_iter().sorted_by_key(|slot| {
            (
                slot.from_idx.unwrap_or(usize::MAX),
                slot.to_idx.unwrap_or(usize::MAX),
            )
        });
        for slot in ordered {
            let identity = slot.key.identity();
            let mut node = GroupNode::new(slot.key, dim_name.clone(), 0, None);
            let from_len = slot.from_records.len();
            node.records = slot.from_records;
            node.records.extend(slot.to_records);
            node.diff = Some(DiffInfo {
                provenance: slot.provenance,
                from_idx: slot.from_idx,
                to_idx: slot.to_idx,
                from_len,
            });
            let idx = tree.insert_node(node);
            roots.push(idx, &identity);
        }
        tree.set_roots(roots);
        Ok(tree)
    }

    /// Adds the next level below a diff node: a recursive diff of the two
    /// record halves for `both` nodes, an ordinary sub-grouping (with
    /// inherited provenance) for one-sided nodes.
    #[instrument(level = "debug", skip(self, tree, dim))]
    pub fn add_diff_level(
        &self,
        tree: &mut GroupTree,
        node: Index,
        dim: &Dimension,
    ) -> GroupResult<()> {
        let builder = GroupBuilder::with_options(self.opts.clone());
        let Some(target) = tree.node(node) else {
            return Ok(());
        };
        let Some(info) = target.diff.clone() else {
            // Not a diff node: plain level.
            return builder.add_level(tree, node, dim);
        };

        match info.provenance {
            Provenance::Both => {
                let from_records = target.from_records().to_vec();
                let to_records = target.to_records().to_vec();
                let sub = self.diff(&from_records, &to_records, std::slice::from_ref(dim))?;
                let base_depth = target.depth + 1;
                let children = graft_list(tree, Some(node), base_depth, &sub, sub.roots());
                if let Some(n) = tree.node_mut(node) {
                    n.children = Some(children);
                }
            }
            one_sided => {
                builder.add_level(tree, node, dim)?;
                let children: Vec<Index> = tree
                    .node(node)
                    .and_then(|n| n.children.as_ref())
                    .map(|c| c.iter().collect())
                    .unwrap_or_default();
                for child in children {
                    if let Some(child_node) = tree.node_mut(child) {
                        let from_len = match one_sided {
                            Provenance::From => child_node.records.len(),
                            _ => 0,
                        };
                        child_node.diff = Some(DiffInfo {
                            provenance: one_sided,
                            from_idx: None,
                            to_idx: None,
                            from_len,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Applies [`DiffEngine::add_diff_level`] under every current leaf.
    pub fn add_diff_level_all(&self, tree: &mut GroupTree, dim: &Dimension) -> GroupResult<()> {
        let leaves: Vec<Index> = tree.leaf_nodes().iter().collect();
        for leaf in leaves {
            self.add_diff_level(tree, leaf, dim)?;
        }
        Ok(())
    }
}

struct Slot {
    key: GroupKey,
    provenance: Provenance,
    from_idx: Option<usize>,
    to_idx: Option<usize>,
    from_records: Vec<Record>,
    to_records: Vec<Record>,
}

/// Merges two same-dimension nodes into a single `both` node named
/// "A to B", with the record concatenation invariant of diff nodes.
pub fn combine_nodes(from: &GroupNode, to: &GroupNode) -> GroupResult<GroupNode> {
    if from.dim_name != to.dim_name {
        return Err(GroupError::DimensionMismatch {
            from: from.dim_name.clone(),
            to: to.dim_name.clone(),
        });
    }
    let mut node = GroupNode::new(
        GroupKey::Text(format!("{} to {}", from.value, to.value)),
        from.dim_name.clone(),
        0,
        None,
    );
    node.records = from.records.clone();
    node.records.extend_from_slice(&to.records);
    node.diff = Some(DiffInfo {
        provenance: Provenance::Both,
        from_idx: None,
        to_idx: None,
        from_len: from.records.len(),
    });
    Ok(node)
}

/// Copies a subtree out of `sub` into `tree` under `parent`, re-basing
/// depths and parent links onto the destination arena.
fn graft_list(
    tree: &mut GroupTree,
    parent: Option<Index>,
    base_depth: usize,
    sub: &GroupTree,
    sub_list: &NodeList,
) -> NodeList {
    let mut list = NodeList::new(sub_list.dim_name().to_string(), base_depth);
    for sub_idx in sub_list.iter() {
        let Some(sub_node) = sub.node(sub_idx) else { continue };
        let identity = sub_node.identity();
        let mut node = GroupNode::new(
            sub_node.value.clone(),
            sub_node.dim_name.clone(),
            base_depth,
            parent,
        );
        node.records = sub_node.records.clone();
        node.diff = sub_node.diff.clone();
        let idx = tree.insert_node(node);
        if let Some(sub_children) = &sub_node.children {
            let grafted = graft_list(tree, Some(idx), base_depth + 1, sub, sub_children);
            if let Some(n) = tree.node_mut(idx) {
                n.children = Some(grafted);
            }
        }
        list.push(idx, &identity);
    }
    list
}

impl GroupTree {
    /// Convenience form of [`DiffEngine::add_diff_level`].
    pub fn add_diff_level(
        &mut self,
        node: Index,
        dim: &Dimension,
        opts: &GroupOptions,
    ) -> GroupResult<()> {
        DiffEngine::with_options(opts.clone()).add_diff_level(self, node, dim)
    }
}
