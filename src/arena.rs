//! Arena-based group tree.
//!
//! Nodes live in a generational arena and reference each other by `Index`:
//! parent links are non-owning indices, while each node owns the `NodeList`
//! of its children. This keeps the parent/child/sibling wiring cycle-free
//! and makes every navigation step an O(1) arena lookup.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use generational_arena::{Arena, Index};
use tracing::{instrument, warn};

use crate::diff::DiffInfo;
use crate::errors::{GroupError, GroupResult};
use crate::key::{GroupKey, Record};

/// One distinct value of a grouping dimension, with its member records and
/// tree linkage.
#[derive(Debug, Clone)]
pub struct GroupNode {
    /// The group key, also the node's string identity.
    pub value: GroupKey,
    /// Display name of the dimension that produced this node.
    pub dim_name: String,
    /// 0 for top-level groups; always parent depth + 1 below that.
    pub depth: usize,
    /// Member records in encounter order during grouping.
    pub records: Vec<Record>,
    /// Arena index of the owning node, None at the top level.
    pub parent: Option<Index>,
    /// Next grouping level, present once one has been added.
    pub children: Option<NodeList>,
    /// Diff provenance, populated only on nodes produced by the diff engine.
    pub diff: Option<DiffInfo>,
}

impl GroupNode {
    pub(crate) fn new(
        value: GroupKey,
        dim_name: impl Into<String>,
        depth: usize,
        parent: Option<Index>,
    ) -> Self {
        Self {
            value,
            dim_name: dim_name.into(),
            depth,
            records: Vec::new(),
            parent,
            children: None,
            diff: None,
        }
    }

    /// String identity used for lookup and diff keying.
    pub fn identity(&self) -> String {
        self.value.identity()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.as_ref().map_or(true, NodeList::is_empty)
    }

    /// The records contributed by the "from" side of a diff node.
    /// On ordinary nodes this is all of them.
    pub fn from_records(&self) -> &[Record] {
        match &self.diff {
            Some(info) => &self.records[..info.from_len],
            None => &self.records,
        }
    }

    /// The records contributed by the "to" side of a diff node.
    /// Empty on ordinary nodes.
    pub fn to_records(&self) -> &[Record] {
        match &self.diff {
            Some(info) => &self.records[info.from_len..],
            None => &[],
        }
    }
}

impl fmt::Display for GroupNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Ordered siblings sharing one parent and one grouping dimension.
///
/// Order is insertion order of first-seen key during the grouping pass. The
/// key index makes `lookup` O(1); two members with the same identity are a
/// usage warning, not an error, and the later one shadows the earlier.
#[derive(Debug, Clone)]
pub struct NodeList {
    dim_name: String,
    depth: usize,
    members: Vec<Index>,
    index: HashMap<String, Index>,
}

impl NodeList {
    pub(crate) fn new(dim_name: impl Into<String>, depth: usize) -> Self {
        Self {
            dim_name: dim_name.into(),
            depth,
            members: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Builds a list (with its lookup index) from already-inserted nodes.
    pub(crate) fn from_members(
        dim_name: impl Into<String>,
        depth: usize,
        members: Vec<Index>,
        arena: &Arena<GroupNode>,
    ) -> Self {
        let mut list = Self::new(dim_name, depth);
        for idx in members {
            if let Some(node) = arena.get(idx) {
                list.push(idx, &node.identity());
            }
        }
        list
    }

    pub(crate) fn push(&mut self, idx: Index, identity: &str) {
        if self.index.insert(identity.to_string(), idx).is_some() {
            warn!(
                key = identity,
                "multiple occurrence of key in list, lookup resolves to the last"
            );
        }
        self.members.push(idx);
    }

    pub fn dim_name(&self) -> &str {
        &self.dim_name
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, pos: usize) -> Option<Index> {
        self.members.get(pos).copied()
    }

    pub fn position(&self, idx: Index) -> Option<usize> {
        self.members.iter().position(|&m| m == idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = Index> + '_ {
        self.members.iter().copied()
    }

    /// Looks a single key up in this list.
    pub fn lookup(&self, key: &str) -> Option<Index> {
        self.index.get(key).copied()
    }

    /// Descends the hierarchy level by level: the first segment resolves
    /// against this list, the rest against each resolved node's children.
    ///
    /// `Ok(None)` when a segment does not resolve; `LookupOnLeaf` when
    /// segments remain at a childless node; `InvalidQuery` for an empty path.
    pub fn lookup_path(&self, tree: &GroupTree, path: &[&str]) -> GroupResult<Option<Index>> {
        if path.is_empty() {
            return Err(GroupError::InvalidQuery);
        }
        let mut list = self;
        let mut resolved = None;
        for (pos, segment) in path.iter().enumerate() {
            let idx = match list.lookup(segment) {
                Some(idx) => idx,
                None => return Ok(None),
            };
            resolved = Some(idx);
            if pos + 1 == path.len() {
                break;
            }
            let node = match tree.node(idx) {
                Some(node) => node,
                None => return Ok(None),
            };
            list = match &node.children {
                Some(children) => children,
                None => {
                    return Err(GroupError::LookupOnLeaf {
                        value: node.identity(),
                        remaining: path.len() - pos - 1,
                    })
                }
            };
        }
        Ok(resolved)
    }

    /// Looks up several keys at once, skipping the ones that miss.
    pub fn lookup_many(&self, tree: &GroupTree, keys: &[&str]) -> NodeList {
        let found: Vec<Index> = keys.iter().filter_map(|k| self.lookup(k)).collect();
        NodeList::from_members(self.dim_name.clone(), self.depth, found, tree.arena())
    }

    /// Childless descendants of all members, depth-first, in document order.
    pub fn leaf_nodes(&self, tree: &GroupTree) -> NodeList {
        let mut leaves = Vec::new();
        for idx in self.iter() {
            tree.collect_leaves(idx, &mut leaves);
        }
        NodeList::from_members(self.dim_name.clone(), self.depth, leaves, tree.arena())
    }

    /// Every member plus all its descendants, depth-first, in document order.
    pub fn flatten(&self, tree: &GroupTree) -> NodeList {
        let mut all = Vec::new();
        for idx in self.iter() {
            tree.collect_subtree(idx, &mut all);
        }
        NodeList::from_members(self.dim_name.clone(), self.depth, all, tree.arena())
    }

    /// Stable sort by a node comparator, preserving the list augmentation.
    pub fn sorted_by<F>(&self, tree: &GroupTree, mut cmp: F) -> NodeList
    where
        F: FnMut(&GroupNode, &GroupNode) -> Ordering,
    {
        let mut members = self.members.clone();
        members.sort_by(|&a, &b| match (tree.node(a), tree.node(b)) {
            (Some(a), Some(b)) => cmp(a, b),
            _ => Ordering::Equal,
        });
        NodeList::from_members(self.dim_name.clone(), self.depth, members, tree.arena())
    }
}

/// A complete grouping of one record collection: arena storage for the
/// nodes, the top-level `NodeList`, and the grouped input records.
#[derive(Debug, Clone)]
pub struct GroupTree {
    arena: Arena<GroupNode>,
    roots: NodeList,
    records: Vec<Record>,
}

impl GroupTree {
    pub(crate) fn new(dim_name: impl Into<String>, records: Vec<Record>) -> Self {
        let dim_name = dim_name.into();
        Self {
            arena: Arena::new(),
            roots: NodeList::new(dim_name, 0),
            records,
        }
    }

    pub(crate) fn insert_node(&mut self, node: GroupNode) -> Index {
        self.arena.insert(node)
    }

    pub(crate) fn set_roots(&mut self, roots: NodeList) {
        self.roots = roots;
    }

    pub(crate) fn arena(&self) -> &Arena<GroupNode> {
        &self.arena
    }

    pub fn node(&self, idx: Index) -> Option<&GroupNode> {
        self.arena.get(idx)
    }

    pub(crate) fn node_mut(&mut self, idx: Index) -> Option<&mut GroupNode> {
        self.arena.get_mut(idx)
    }

    /// The top-level groups, in first-seen order.
    pub fn roots(&self) -> &NodeList {
        &self.roots
    }

    /// The grouped input records (after any pre-hook and truncation).
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Depth-first preorder traversal over every node in the tree.
    pub fn iter(&self) -> TreeIter<'_> {
        TreeIter::new(self)
    }

    /// Number of grouping levels; 0 for an empty tree.
    #[instrument(level = "trace", skip(self))]
    pub fn depth(&self) -> usize {
        self.iter().map(|(_, node)| node.depth + 1).max().unwrap_or(0)
    }

    pub fn leaf_nodes(&self) -> NodeList {
        self.roots.leaf_nodes(self)
    }

    pub fn flatten(&self) -> NodeList {
        self.roots.flatten(self)
    }

    /// Path lookup starting at the top-level list.
    pub fn lookup(&self, path: &[&str]) -> GroupResult<Option<Index>> {
        self.roots.lookup_path(self, path)
    }

    /// Single-key lookup in the top-level list.
    pub fn lookup_key(&self, key: &str) -> Option<Index> {
        self.roots.lookup(key)
    }

    /// Path lookup anchored at a node: the first segment must match the
    /// node itself, the remaining segments descend through its children.
    ///
    /// Same miss and error semantics as [`NodeList::lookup_path`].
    pub fn lookup_from(&self, idx: Index, path: &[&str]) -> GroupResult<Option<Index>> {
        if path.is_empty() {
            return Err(GroupError::InvalidQuery);
        }
        let Some(node) = self.node(idx) else {
            return Ok(None);
        };
        if node.identity() != path[0] {
            return Ok(None);
        }
        if path.len() == 1 {
            return Ok(Some(idx));
        }
        match &node.children {
            Some(children) => children.lookup_path(self, &path[1..]),
            None => Err(GroupError::LookupOnLeaf {
                value: node.identity(),
                remaining: path.len() - 1,
            }),
        }
    }

    /// The sibling list containing a node: the parent's children, or the
    /// top-level list for depth-0 nodes.
    pub fn parent_list(&self, idx: Index) -> Option<&NodeList> {
        let node = self.node(idx)?;
        match node.parent {
            Some(parent) => self.node(parent)?.children.as_ref(),
            None => Some(&self.roots),
        }
    }

    /// The topmost ancestor of a node (itself for depth-0 nodes).
    pub fn root_ancestor(&self, idx: Index) -> Option<Index> {
        let mut current = idx;
        self.node(current)?;
        while let Some(parent) = self.node(current)?.parent {
            current = parent;
        }
        Some(current)
    }

    /// Fraction of the parent's records that belong to this node.
    /// Top-level nodes divide by the full grouped input.
    pub fn pct(&self, idx: Index) -> Option<f64> {
        let node = self.node(idx)?;
        let denominator = match node.parent {
            Some(parent) => self.node(parent)?.records.len(),
            None => self.records.len(),
        };
        if denominator == 0 {
            return Some(0.0);
        }
        Some(node.records.len() as f64 / denominator as f64)
    }

    /// The sibling directly before a node in its list, if any.
    pub fn previous(&self, idx: Index) -> Option<Index> {
        let list = self.parent_list(idx)?;
        let pos = list.position(idx)?;
        if pos == 0 {
            None
        } else {
            list.get(pos - 1)
        }
    }

    /// The group keys of a list's members, in list order.
    pub fn raw_values(&self, list: &NodeList) -> Vec<GroupKey> {
        list.iter()
            .filter_map(|idx| self.node(idx).map(|n| n.value.clone()))
            .collect()
    }

    fn collect_leaves(&self, idx: Index, leaves: &mut Vec<Index>) {
        if let Some(node) = self.node(idx) {
            match &node.children {
                Some(children) if !children.is_empty() => {
                    for child in children.iter() {
                        self.collect_leaves(child, leaves);
                    }
                }
                _ => leaves.push(idx),
            }
        }
    }

    fn collect_subtree(&self, idx: Index, out: &mut Vec<Index>) {
        if let Some(node) = self.node(idx) {
            out.push(idx);
            if let Some(children) = &node.children {
                for child in children.iter() {
                    self.collect_subtree(child, out);
                }
            }
        }
    }
}

pub struct TreeIter<'a> {
    tree: &'a GroupTree,
    stack: Vec<Index>,
}

impl<'a> TreeIter<'a> {
    fn new(tree: &'a GroupTree) -> Self {
        // Push roots in reverse for left-to-right traversal
        let stack = tree.roots.members.iter().rev().copied().collect();
        Self { tree, stack }
    }
}

impl<'a> Iterator for TreeIter<'a> {
    type Item = (Index, &'a GroupNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(idx) = self.stack.pop() {
            if let Some(node) = self.tree.node(idx) {
                if let Some(children) = &node.children {
                    for child in children.members.iter().rev() {
                        self.stack.push(*child);
                    }
                }
                return Some((idx, node));
            }
        }
        None
    }
}
