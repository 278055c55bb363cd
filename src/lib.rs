//! regroup: hierarchical grouping of flat records.
//!
//! Turns a flat collection of records into a navigable group tree keyed by
//! one or more dimensions, and compares two such trees to find additions,
//! removals, and overlaps at any level.
//!
//! ```
//! use regroup::{group, Dimension, Record};
//! use serde_json::json;
//!
//! let records: Vec<Record> = [
//!     json!({"c": "US", "s": "CA"}),
//!     json!({"c": "US", "s": "NY"}),
//!     json!({"c": "CA", "s": "ON"}),
//! ]
//! .iter()
//! .map(|v| v.as_object().unwrap().clone())
//! .collect();
//!
//! let dims = [Dimension::field("c"), Dimension::field("s")];
//! let tree = group(&records, &dims).unwrap();
//! assert_eq!(tree.roots().len(), 2);
//! let us = tree.lookup_key("US").unwrap();
//! assert_eq!(tree.node(us).unwrap().records.len(), 2);
//! ```

pub mod aggregate;
pub mod arena;
pub mod builder;
pub mod diff;
pub mod dimension;
pub mod display;
pub mod errors;
pub mod key;
pub mod navigate;
pub mod util;

pub use aggregate::{aggregate, aggregates, FieldSel};
pub use arena::{GroupNode, GroupTree, NodeList};
pub use builder::{FanOut, GroupBuilder, GroupOptions};
pub use diff::{combine_nodes, DiffEngine, DiffInfo, Provenance};
pub use dimension::Dimension;
pub use display::TreeDisplay;
pub use errors::{GroupError, GroupResult};
pub use key::{GroupKey, Record};
pub use navigate::{NamePathOpts, PathOpts};

/// Groups records with default options.
pub fn group(records: &[Record], dims: &[Dimension]) -> GroupResult<GroupTree> {
    GroupBuilder::new().build(records, dims)
}

/// Diffs two record collections with default options.
pub fn diff(from: &[Record], to: &[Record], dims: &[Dimension]) -> GroupResult<GroupTree> {
    DiffEngine::new().diff(from, to, dims)
}
