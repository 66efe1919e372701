use super::{CursorItem, Engine, own_value_of};
use crate::node::{Entries, NodePtr, NodeType, Slot};
use crate::value::{RawSlot, ValueRepr};
use smallvec::SmallVec;
use tracing::trace;

/// What happens to the child a range boundary passes through.
enum Edge<R> {
    /// The boundary key itself is stored here, inline or as the own value.
    Key,
    /// The boundary runs deeper; the subtree was already pruned to this,
    /// losing the given number of keys.
    Pruned(Option<NodePtr<R>>, u64),
}

impl<R: ValueRepr> Engine<'_, R> {
    /// Removes every key from the one `left` is positioned on through the one
    /// `right` is positioned on, both included. `left` must not sort after
    /// `right`. Returns the number of keys removed. Both paths refer to
    /// rewritten or freed nodes afterwards and must be discarded.
    pub(crate) fn erase_range(
        &self,
        root: &mut Option<NodePtr<R>>,
        left: &mut [CursorItem<R>],
        right: &mut [CursorItem<R>],
    ) -> u64 {
        if left.is_empty() || right.is_empty() {
            return 0;
        }
        self.make_unique(root, left);
        let mut split = 0;
        while split + 1 < left.len()
            && split + 1 < right.len()
            && left[split].pos == right[split].pos
        {
            split += 1;
        }
        // Down to the split both paths run through the same nodes, which
        // are exclusively owned now.
        for (r, l) in right[..=split].iter_mut().zip(left.iter()) {
            r.node = l.node;
        }
        self.make_unique(root, right);

        let left_edge = self.prune_side(&left[split + 1..], true);
        let right_edge = self.prune_side(&right[split + 1..], false);
        let fork = left[split];
        let (mut node, mut removed) =
            self.prune(fork.node, fork.byte, right[split].byte, left_edge, right_edge);
        for item in left[..split].iter().rev() {
            // Single-child levels: only the low edge is ever consulted.
            (node, removed) = self.prune(
                item.node,
                item.byte,
                item.byte,
                Edge::Pruned(node, removed),
                Edge::Key,
            );
        }
        *root = node;
        removed
    }

    /// Prunes the part of a path below the split, deepest level first. The
    /// left side keeps everything before its key, the right side everything
    /// after its key.
    fn prune_side(&self, items: &[CursorItem<R>], left_side: bool) -> Edge<R> {
        let mut edge = Edge::Key;
        for item in items.iter().rev() {
            let (node, removed) = if left_side {
                self.prune(item.node, item.byte, 256, edge, Edge::Key)
            } else {
                self.prune(item.node, -1, item.byte, Edge::Key, edge)
            };
            edge = Edge::Pruned(node, removed);
        }
        edge
    }

    /// Drops the own value when `lo` is negative and every child whose byte
    /// lies in `lo..=hi`, except that the children at `lo` and `hi` follow
    /// their edge. `node` must be exclusively owned and is consumed; the
    /// returned node takes its place.
    fn prune(
        &self,
        node: NodePtr<R>,
        lo: i16,
        hi: i16,
        lo_edge: Edge<R>,
        hi_edge: Edge<R>,
    ) -> (Option<NodePtr<R>>, u64) {
        let keep_value = node.is_leaf() && lo >= 0;
        let mut removed = u64::from(node.is_leaf() && !keep_value);
        let mut edges = [Some(lo_edge), Some(hi_edge)];
        let mut survivors = Entries::new();
        for pos in node.positions() {
            let byte = node.pos_byte(pos);
            let b = i16::from(byte);
            let raw = node.raw_slot(node.pos_slot(pos));
            if b < lo || b > hi {
                survivors.push((byte, raw));
                continue;
            }
            let edge = if b == lo {
                edges[0].take()
            } else if b == hi {
                edges[1].take()
            } else {
                None
            };
            match edge {
                Some(Edge::Pruned(child, count)) => {
                    removed += count;
                    if let Some(child) = child {
                        survivors.push((byte, self.slot_for(child)));
                    }
                }
                Some(Edge::Key) | None => removed += self.drop_slot(&raw),
            }
        }
        let count = node.recursive_count() - removed;
        (self.reshape(node, keep_value, &survivors, count), removed)
    }

    /// Releases whatever a slot holds and returns the keys that went with it.
    fn drop_slot(&self, raw: &RawSlot) -> u64 {
        match Self::decode_raw(raw) {
            Slot::Child(child) => {
                let count = child.recursive_count();
                self.release(child);
                count
            }
            Slot::Value(_) => 1,
            Slot::Empty => 0,
        }
    }

    /// Gives a pruned node the smallest shape that holds what is left.
    fn reshape(
        &self,
        node: NodePtr<R>,
        keep_value: bool,
        entries: &[(u8, RawSlot)],
        count: u64,
    ) -> Option<NodePtr<R>> {
        let value = keep_value.then(|| node.value());
        match (entries, value) {
            ([], None) => {
                self.free(node);
                None
            }
            ([only], None) => Some(self.collapse(node, *only)),
            (entries, value) => {
                let ntype = NodeType::for_children(entries.len());
                if ntype == node.node_type() && value.is_some() == node.is_leaf() {
                    node.write_children(entries);
                    node.set_recursive_count(count);
                    return Some(node);
                }
                trace!(from = node.node_type().name(), to = ntype.name(), "shrink node");
                let shrunk = self.build(ntype, node.prefix(), value, entries, count);
                self.free(node);
                Some(shrunk)
            }
        }
    }

    /// Merges a value-less node with its only child.
    fn collapse(&self, node: NodePtr<R>, (byte, raw): (u8, RawSlot)) -> NodePtr<R> {
        let mut prefix: SmallVec<[u8; 64]> = SmallVec::new();
        prefix.extend_from_slice(node.prefix());
        prefix.push(byte);
        let merged = match Self::decode_raw(&raw) {
            Slot::Child(child) => {
                prefix.extend_from_slice(child.prefix());
                let merged = self.rebuild(
                    child,
                    child.node_type(),
                    &prefix,
                    own_value_of(child),
                    child.recursive_count(),
                );
                self.release(child);
                merged
            }
            Slot::Value(value) => self.new_leaf(&prefix, value),
            Slot::Empty => unreachable!("collapse onto an empty slot"),
        };
        trace!(prefix_len = prefix.len(), "collapse node into its only child");
        self.free(node);
        merged
    }
}
