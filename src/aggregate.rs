//! Generic per-node aggregation hook.
//!
//! The core only extracts values and hands them to a caller-supplied
//! reduction; sum/mean/median and friends are external collaborators
//! layered on top of this.

use serde_json::Value;

use crate::arena::{GroupNode, GroupTree, NodeList};
use crate::key::Record;

/// What to feed the reduction for each record: the whole record, a named
/// field, or a per-record transform.
pub enum FieldSel<'a> {
    /// No selection: each record as a JSON object.
    All,
    Name(&'a str),
    Func(&'a dyn Fn(&Record) -> Value),
}

/// The selected value of every member record, in record order.
/// Missing fields yield null, mirroring the grouping key conversion.
pub fn extract_values(node: &GroupNode, field: &FieldSel<'_>) -> Vec<Value> {
    node.records
        .iter()
        .map(|record| match field {
            FieldSel::All => Value::Object(record.clone()),
            FieldSel::Name(name) => record.get(*name).cloned().unwrap_or(Value::Null),
            FieldSel::Func(func) => func(record),
        })
        .collect()
}

/// Applies `reduce` to the node's selected record values.
pub fn aggregate<T>(
    node: &GroupNode,
    field: &FieldSel<'_>,
    reduce: impl FnOnce(Vec<Value>) -> T,
) -> T {
    reduce(extract_values(node, field))
}

/// [`aggregate`] over every member of a list, in list order.
pub fn aggregates<T>(
    tree: &GroupTree,
    list: &NodeList,
    field: &FieldSel<'_>,
    mut reduce: impl FnMut(Vec<Value>) -> T,
) -> Vec<T> {
    list.iter()
        .filter_map(|idx| tree.node(idx))
        .map(|node| reduce(extract_values(node, field)))
        .collect()
}
