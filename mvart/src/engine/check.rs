use super::Engine;
use crate::error::{ArtError, Result};
use crate::node::{N48_ABSENT, NodePtr, NodeType, Slot, TYPE_MASK};
use crate::value::{SlotTag, ValueRepr};
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// How reference counts are compared against the references found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CheckMode {
    /// The given roots are every owner there is.
    Exact,
    /// Other owners may exist outside the given roots.
    AtLeast,
}

fn corrupted<R>(node: NodePtr<R>, what: impl std::fmt::Display) -> ArtError {
    ArtError::Corrupted(format!("{node:?}: {what}"))
}

impl<R: ValueRepr> Engine<'_, R> {
    /// Walks every node reachable from `roots`, each once, and verifies the
    /// structural invariants and reference counts.
    pub(crate) fn check(&self, roots: &[Option<NodePtr<R>>], mode: CheckMode) -> Result<()> {
        let mut incoming: HashMap<NodePtr<R>, u32> = HashMap::new();
        let mut pending = Vec::new();
        let mut reach = |node: NodePtr<R>, pending: &mut Vec<NodePtr<R>>| match incoming.entry(node) {
            Entry::Occupied(mut seen) => *seen.get_mut() += 1,
            Entry::Vacant(slot) => {
                slot.insert(1);
                pending.push(node);
            }
        };
        for root in roots.iter().flatten() {
            reach(*root, &mut pending);
        }
        while let Some(node) = pending.pop() {
            self.check_node(node)?;
            for child in node.child_nodes() {
                if NodeType::from_tag(child.type_byte() & TYPE_MASK) == Some(NodeType::Leaf)
                    && child.is_leaf()
                    && child.prefix_len() == 0
                    && R::is_inlinable(child.value())
                {
                    return Err(corrupted(child, "leaf should have been stored inline"));
                }
                reach(child, &mut pending);
            }
        }
        for (node, refs) in incoming {
            let count = node.ref_count();
            let ok = match mode {
                CheckMode::Exact => count == refs,
                CheckMode::AtLeast => count >= refs,
            };
            if !ok {
                return Err(corrupted(
                    node,
                    format_args!("reference count {count} with {refs} references"),
                ));
            }
        }
        Ok(())
    }

    fn check_node(&self, node: NodePtr<R>) -> Result<()> {
        let tag = node.type_byte();
        let Some(ntype) = NodeType::from_tag(tag & TYPE_MASK) else {
            return Err(corrupted(node, format_args!("unknown type byte {tag:#04x}")));
        };
        if node.has_wide_slots() != R::WIDE_SLOTS {
            return Err(corrupted(node, "slot width does not match the value representation"));
        }
        let count = node.child_count();
        if NodeType::for_children(count) != ntype {
            return Err(corrupted(
                node,
                format_args!("{} holding {count} children", ntype.name()),
            ));
        }
        if !node.is_leaf() && count < 2 {
            return Err(corrupted(node, format_args!("valueless node with {count} children")));
        }
        match ntype {
            NodeType::Leaf => {}
            NodeType::Node4 | NodeType::Node16 => {
                if node.sorted_keys().windows(2).any(|w| w[0] >= w[1]) {
                    return Err(corrupted(node, "keys out of order"));
                }
                for idx in 0..ntype.capacity() {
                    let empty = R::decode(node.slot_bytes(idx)) == SlotTag::Empty;
                    if empty == (idx < count) {
                        return Err(corrupted(node, format_args!("slot {idx} occupancy")));
                    }
                }
            }
            NodeType::Node48 => {
                let mut used = [false; 48];
                let mut mapped = 0;
                for &idx in node.n48_table() {
                    if idx == N48_ABSENT {
                        continue;
                    }
                    let idx = idx as usize;
                    if idx >= 48 || used[idx] {
                        return Err(corrupted(node, format_args!("bad slot index {idx}")));
                    }
                    used[idx] = true;
                    mapped += 1;
                }
                if mapped != count {
                    return Err(corrupted(node, format_args!("{mapped} mapped of {count}")));
                }
                for (idx, &used) in used.iter().enumerate() {
                    let empty = R::decode(node.slot_bytes(idx)) == SlotTag::Empty;
                    if empty == used {
                        return Err(corrupted(node, format_args!("slot {idx} occupancy")));
                    }
                }
            }
            NodeType::Node256 => {
                let occupied = (0..256)
                    .filter(|&idx| R::decode(node.slot_bytes(idx)) != SlotTag::Empty)
                    .count();
                if occupied != count {
                    return Err(corrupted(node, format_args!("{occupied} occupied of {count}")));
                }
            }
        }
        if let Some(len) = R::FIXED_LEN
            && node.is_leaf()
            && node.value().len() != len
        {
            return Err(corrupted(node, "own value of the wrong length"));
        }
        let mut expected = u64::from(node.is_leaf());
        for pos in node.positions() {
            match node.slot_at_pos(pos) {
                Slot::Child(child) => expected += child.recursive_count(),
                Slot::Value(_) => expected += 1,
                Slot::Empty => return Err(corrupted(node, "empty slot at an occupied position")),
            }
        }
        if expected != node.recursive_count() {
            return Err(corrupted(
                node,
                format_args!("recursive count {} but {expected} keys below", node.recursive_count()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::Path;
    use super::*;
    use crate::alloc::CountingAllocator;
    use crate::value::VarValue;

    #[test]
    fn detects_bad_counts() {
        let alloc = CountingAllocator::new();
        let engine = Engine::<VarValue>::new(&alloc);
        let mut root = None;
        let mut path = Path::new();
        for i in 0..20u8 {
            engine.upsert(&mut root, &mut path, &[i, i], b"value");
        }
        engine.check(&[root], CheckMode::Exact).unwrap();
        let Some(node) = root else { panic!("empty tree") };

        node.add_ref();
        assert!(matches!(
            engine.check(&[root], CheckMode::Exact),
            Err(ArtError::Corrupted(_))
        ));
        engine.check(&[root], CheckMode::AtLeast).unwrap();
        engine.check(&[root, root], CheckMode::Exact).unwrap();
        assert!(!node.drop_ref());

        node.set_recursive_count(19);
        assert!(engine.check(&[root], CheckMode::Exact).is_err());
        node.set_recursive_count(20);
        engine.check(&[root], CheckMode::Exact).unwrap();
        engine.release(node);
        assert_eq!(alloc.live_blocks(), 0);
    }
}
