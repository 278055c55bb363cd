//! Ancestry chains and path strings for tree nodes.

use generational_arena::Index;

use crate::arena::{GroupTree, NodeList};

/// Options for [`GroupTree::pedigree`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PathOpts {
    /// Exclude the node itself from the chain.
    pub not_this: bool,
    /// Self-to-root instead of root-to-self.
    pub backwards: bool,
}

/// Options for [`GroupTree::name_path`].
#[derive(Debug, Clone)]
pub struct NamePathOpts {
    /// Segment separator.
    pub delim: String,
    /// Join dimension names instead of group values.
    pub dim_name: bool,
}

impl Default for NamePathOpts {
    fn default() -> Self {
        Self {
            delim: "/".to_string(),
            dim_name: false,
        }
    }
}

impl NamePathOpts {
    pub fn with_delim(delim: impl Into<String>) -> Self {
        Self {
            delim: delim.into(),
            ..Self::default()
        }
    }
}

impl GroupTree {
    /// The ordered ancestor chain from the topmost group down to `idx`.
    pub fn pedigree(&self, idx: Index, opts: &PathOpts) -> Vec<Index> {
        let mut chain = Vec::new();
        if self.node(idx).is_none() {
            return chain;
        }
        if !opts.not_this {
            chain.push(idx);
        }
        let mut current = idx;
        while let Some(parent) = self.node(current).and_then(|n| n.parent) {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        if opts.backwards {
            chain.reverse();
        }
        chain
    }

    /// The pedigree as path segments: group identities, or dimension names
    /// when `dim_name` is set.
    pub fn name_path_segments(&self, idx: Index, opts: &NamePathOpts) -> Vec<String> {
        self.pedigree(idx, &PathOpts::default())
            .into_iter()
            .filter_map(|i| self.node(i))
            .map(|node| {
                if opts.dim_name {
                    node.dim_name.clone()
                } else {
                    node.identity()
                }
            })
            .collect()
    }

    /// The pedigree joined into one delimited string.
    pub fn name_path(&self, idx: Index, opts: &NamePathOpts) -> String {
        self.name_path_segments(idx, opts).join(&opts.delim)
    }

    /// `name_path` over dimension names.
    pub fn dim_path(&self, idx: Index, opts: &NamePathOpts) -> String {
        let opts = NamePathOpts {
            dim_name: true,
            ..opts.clone()
        };
        self.name_path(idx, &opts)
    }

    /// Name paths for every member of a list, in list order.
    pub fn name_paths(&self, list: &NodeList, opts: &NamePathOpts) -> Vec<String> {
        list.iter().map(|idx| self.name_path(idx, opts)).collect()
    }
}
