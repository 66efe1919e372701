//! Statistics and introspection.
//!
//! Gathers per node-type counts and fan-out density, the number of values
//! stored inline versus in nodes, memory held by nodes and the tree height.
//! Useful when tuning key layouts or checking how much a snapshot shares.

use crate::node::{NodePtr, NodeType, Slot};
use crate::root::RootNode;
use crate::value::ValueRepr;
use std::collections::HashMap;

pub trait TreeStatsTrait {
    fn get_tree_stats(&self) -> TreeStats;
}

#[derive(Debug, Default)]
pub struct NodeStats {
    pub width: usize,
    pub node_type: String,
    pub total_nodes: usize,
    pub total_children: usize,
    pub density: f64,
}

#[derive(Debug, Default)]
pub struct TreeStats {
    pub node_stats: HashMap<String, NodeStats>,
    /// Nodes carrying their own value.
    pub num_leaves: usize,
    pub num_values: usize,
    pub num_inline_values: usize,
    pub num_inner_nodes: usize,
    pub total_bytes: usize,
    pub total_density: f64,
    pub max_height: usize,
}

fn tree_stats<R: ValueRepr>(root: Option<NodePtr<R>>) -> TreeStats {
    let mut stats = TreeStats::default();
    let mut pending: Vec<(NodePtr<R>, usize)> = root.into_iter().map(|node| (node, 1)).collect();
    let (mut children, mut capacity) = (0usize, 0usize);
    while let Some((node, height)) = pending.pop() {
        stats.max_height = stats.max_height.max(height);
        stats.total_bytes += node.size();
        if node.is_leaf() {
            stats.num_leaves += 1;
            stats.num_values += 1;
        }
        let ntype = node.node_type();
        if ntype == NodeType::Leaf {
            continue;
        }
        stats.num_inner_nodes += 1;
        let count = node.child_count();
        children += count;
        capacity += ntype.capacity();
        stats
            .node_stats
            .entry(ntype.name().to_string())
            .and_modify(|e| {
                e.total_nodes += 1;
                e.total_children += count;
            })
            .or_insert(NodeStats {
                width: ntype.capacity(),
                node_type: ntype.name().to_string(),
                total_nodes: 1,
                total_children: count,
                density: 0.0,
            });
        for pos in node.positions() {
            match node.slot_at_pos(pos) {
                Slot::Child(child) => pending.push((child, height + 1)),
                Slot::Value(_) => {
                    stats.num_values += 1;
                    stats.num_inline_values += 1;
                }
                Slot::Empty => {}
            }
        }
    }
    for node_stats in stats.node_stats.values_mut() {
        node_stats.density =
            node_stats.total_children as f64 / (node_stats.total_nodes * node_stats.width) as f64;
    }
    if capacity > 0 {
        stats.total_density = children as f64 / capacity as f64;
    }
    stats
}

impl<R: ValueRepr> TreeStatsTrait for RootNode<R> {
    fn get_tree_stats(&self) -> TreeStats {
        tree_stats(self.node)
    }
}
