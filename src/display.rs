//! termtree rendering of group trees, for logs and quick inspection.

use generational_arena::Index;
use termtree::Tree;

use crate::arena::GroupTree;

pub trait TreeDisplay {
    fn to_tree_string(&self) -> Tree<String>;
}

impl TreeDisplay for GroupTree {
    fn to_tree_string(&self) -> Tree<String> {
        let mut tree = Tree::new(self.roots().dim_name().to_string());
        for root in self.roots().iter() {
            tree.push(node_tree(self, root));
        }
        tree
    }
}

fn node_tree(tree: &GroupTree, idx: Index) -> Tree<String> {
    let label = match tree.node(idx) {
        Some(node) => match &node.diff {
            Some(info) => format!(
                "{} [{}] ({} records)",
                node,
                info.provenance,
                node.records.len()
            ),
            None => format!("{} ({} records)", node, node.records.len()),
        },
        None => "?".to_string(),
    };
    let mut out = Tree::new(label);
    if let Some(node) = tree.node(idx) {
        if let Some(children) = &node.children {
            for child in children.iter() {
                out.push(node_tree(tree, child));
            }
        }
    }
    out
}
