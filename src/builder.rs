//! Grouping engine: partitions record collections into group trees.
//!
//! Exclusive partitioning and fan-out membership are two separate algorithm
//! variants, selected per dimension by `FanOut` before the record pass.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use generational_arena::Index;
use tracing::instrument;

use crate::arena::{GroupNode, GroupTree, NodeList};
use crate::dimension::Dimension;
use crate::errors::{GroupError, GroupResult};
use crate::key::{blank_value, GroupKey, Record};

/// Which dimensions use fan-out (multi-valued) membership.
///
/// Under fan-out, a record whose dimension value is an array is filed under
/// every element's key instead of exactly one group. `All` is only valid for
/// single-level builds; multi-level builds must whitelist the fan-out
/// dimensions by name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FanOut {
    /// Exclusive partitioning everywhere.
    #[default]
    None,
    /// Fan-out on the (single) dimension.
    All,
    /// Fan-out on the named dimensions only.
    Dims(Vec<String>),
}

/// Options for one grouping run. Applied at every level of a multi-level
/// build, the way the level's input records are seen there.
#[derive(Clone, Default)]
pub struct GroupOptions {
    /// String identities to skip entirely: no node is created and the
    /// records drop out of that branch.
    pub exclude_values: Vec<String>,
    /// Pre-filter records whose dimension value is empty/non-finite.
    pub truncate_on_empty: bool,
    /// Fan-out membership configuration.
    pub fan_out: FanOut,
    /// Display-name overrides, parallel to the dimension array.
    pub dim_names: Vec<String>,
    /// Arbitrary filter/map run over a level's records before grouping.
    pub pre_hook: Option<Rc<dyn Fn(Vec<Record>) -> Vec<Record>>>,
}

impl fmt::Debug for GroupOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupOptions")
            .field("exclude_values", &self.exclude_values)
            .field("truncate_on_empty", &self.truncate_on_empty)
            .field("fan_out", &self.fan_out)
            .field("dim_names", &self.dim_names)
            .field("pre_hook", &self.pre_hook.as_ref().map(|_| "..."))
            .finish()
    }
}

/// Builds group trees from flat record collections.
pub struct GroupBuilder {
    opts: GroupOptions,
}

impl Default for GroupBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupBuilder {
    pub fn new() -> Self {
        Self {
            opts: GroupOptions::default(),
        }
    }

    pub fn with_options(opts: GroupOptions) -> Self {
        Self { opts }
    }

    /// Groups `records` by `dims`, one tree level per dimension, applied
    /// left to right. Each node's children are built from that node's own
    /// records.
    #[instrument(level = "debug", skip(self, records), fields(records = records.len(), levels = dims.len()))]
    pub fn build(&self, records: &[Record], dims: &[Dimension]) -> GroupResult<GroupTree> {
        self.validate_fan_out(dims)?;

        let top_name = self.display_name(dims.first(), 0);
        if dims.is_empty() {
            // No grouping yet: an empty tree holding the records.
            return Ok(GroupTree::new(top_name, records.to_vec()));
        }

        let effective = self.effective_records(records.to_vec(), &dims[0]);
        let mut tree = GroupTree::new(top_name, effective.clone());
        let roots = self.build_level(&mut tree, None, effective, dims, 0)?;
        tree.set_roots(roots);
        Ok(tree)
    }

    /// Adds one grouping level under an existing node, built from that
    /// node's records. A previously added level is overwritten.
    #[instrument(level = "debug", skip(self, tree, dim))]
    pub fn add_level(&self, tree: &mut GroupTree, node: Index, dim: &Dimension) -> GroupResult<()> {
        let records = match tree.node(node) {
            Some(n) => n.records.clone(),
            None => return Ok(()),
        };
        let dims = std::slice::from_ref(dim);
        let effective = self.effective_records(records, dim);
        let children = self.build_level(tree, Some(node), effective, dims, 0)?;
        if let Some(n) = tree.node_mut(node) {
            n.children = Some(children);
        }
        Ok(())
    }

    /// Adds one grouping level under every current leaf of the tree.
    pub fn add_level_all(&self, tree: &mut GroupTree, dim: &Dimension) -> GroupResult<()> {
        let leaves: Vec<Index> = tree.leaf_nodes().iter().collect();
        for leaf in leaves {
            self.add_level(tree, leaf, dim)?;
        }
        Ok(())
    }

    /// One grouping pass. `records` must already have the pre-hook and
    /// truncation for this level applied; recursion applies them for the
    /// next level before descending.
    fn build_level(
        &self,
        tree: &mut GroupTree,
        parent: Option<Index>,
        records: Vec<Record>,
        dims: &[Dimension],
        level: usize,
    ) -> GroupResult<NodeList> {
        let dim = &dims[level];
        let dim_name = self.display_name(Some(dim), level);
        let depth = match parent.and_then(|p| tree.node(p)) {
            Some(parent_node) => parent_node.depth + 1,
            None => 0,
        };

        let groups = if self.fan_out_applies(dim) {
            partition_fan_out(&records, dim)
        } else {
            partition_exclusive(&records, dim)
        };

        let mut list = NodeList::new(dim_name.clone(), depth);
        for (key, group_records) in groups {
            let identity = key.identity();
            if self.opts.exclude_values.iter().any(|v| v == &identity) {
                continue;
            }
            let idx = tree.insert_node(GroupNode::new(key, dim_name.clone(), depth, parent));
            if level + 1 < dims.len() {
                let next = self.effective_records(group_records.clone(), &dims[level + 1]);
                let children = self.build_level(tree, Some(idx), next, dims, level + 1)?;
                if let Some(node) = tree.node_mut(idx) {
                    node.children = Some(children);
                }
            }
            if let Some(node) = tree.node_mut(idx) {
                node.records = group_records;
            }
            list.push(idx, &identity);
        }
        Ok(list)
    }

    /// Pre-hook, then the empty/non-finite truncation filter for `dim`.
    fn effective_records(&self, records: Vec<Record>, dim: &Dimension) -> Vec<Record> {
        let mut records = match &self.opts.pre_hook {
            Some(hook) => hook(records),
            None => records,
        };
        if self.opts.truncate_on_empty {
            records.retain(|r| !blank_value(&dim.extract(r)));
        }
        records
    }

    fn validate_fan_out(&self, dims: &[Dimension]) -> GroupResult<()> {
        if dims.len() > 1 && self.opts.fan_out == FanOut::All {
            return Err(GroupError::AmbiguousMultiValuedConfig);
        }
        Ok(())
    }

    fn fan_out_applies(&self, dim: &Dimension) -> bool {
        match &self.opts.fan_out {
            FanOut::None => false,
            FanOut::All => true,
            FanOut::Dims(names) => names.iter().any(|n| n == dim.name()),
        }
    }

    fn display_name(&self, dim: Option<&Dimension>, level: usize) -> String {
        self.opts
            .dim_names
            .get(level)
            .cloned()
            .or_else(|| dim.map(|d| d.name().to_string()))
            .unwrap_or_default()
    }
}

/// Exclusive partition: each record lands in exactly one group, keyed by
/// its dimension value. First-seen key order, O(n) over records.
fn partition_exclusive(records: &[Record], dim: &Dimension) -> Vec<(GroupKey, Vec<Record>)> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(GroupKey, Vec<Record>)> = Vec::new();
    for record in records {
        let key = GroupKey::from_value(&dim.extract(record));
        file_record(&mut slots, &mut groups, key, record);
    }
    groups
}

/// Fan-out membership: a record whose dimension value is an array is filed
/// under every element's key; scalar values behave as in the exclusive
/// variant.
fn partition_fan_out(records: &[Record], dim: &Dimension) -> Vec<(GroupKey, Vec<Record>)> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(GroupKey, Vec<Record>)> = Vec::new();
    for record in records {
        match dim.extract(record) {
            serde_json::Value::Array(values) => {
                for value in &values {
                    file_record(&mut slots, &mut groups, GroupKey::from_value(value), record);
                }
            }
            value => {
                file_record(&mut slots, &mut groups, GroupKey::from_value(&value), record);
            }
        }
    }
    groups
}

fn file_record(
    slots: &mut HashMap<String, usize>,
    groups: &mut Vec<(GroupKey, Vec<Record>)>,
    key: GroupKey,
    record: &Record,
) {
    let identity = key.identity();
    let slot = match slots.get(&identity) {
        Some(&slot) => slot,
        None => {
            let slot = groups.len();
            slots.insert(identity, slot);
            groups.push((key, Vec::new()));
            slot
        }
    };
    groups[slot].1.push(record.clone());
}

impl GroupTree {
    /// Convenience form of [`GroupBuilder::add_level`].
    pub fn add_level(
        &mut self,
        node: Index,
        dim: &Dimension,
        opts: &GroupOptions,
    ) -> GroupResult<()> {
        GroupBuilder::with_options(opts.clone()).add_level(self, node, dim)
    }

    /// Convenience form of [`GroupBuilder::add_level_all`].
    pub fn add_level_all(&mut self, dim: &Dimension, opts: &GroupOptions) -> GroupResult<()> {
        GroupBuilder::with_options(opts.clone()).add_level_all(self, dim)
    }
}
