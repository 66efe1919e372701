use super::{CursorItem, Engine, Path, bump_counts, own_value_of};
use crate::node::{NodePtr, NodeType, Slot};
use crate::utils::prefix::common_prefix_len;
use crate::value::{ValueRepr, child_slot, inline_slot};
use tracing::trace;

impl<R: ValueRepr> Engine<'_, R> {
    /// Inserts `key` or overwrites its value. Leaves `path` positioned on the
    /// key and returns true when the key was not present before.
    pub(crate) fn upsert(
        &self,
        root: &mut Option<NodePtr<R>>,
        path: &mut Path<R>,
        key: &[u8],
        value: &[u8],
    ) -> bool {
        path.clear();
        let Some(mut node) = *root else {
            let leaf = self.new_leaf(key, value);
            *root = Some(leaf);
            path.push(CursorItem::own_value(leaf, key.len()));
            return true;
        };
        let mut start = 0;
        loop {
            let prefix = node.prefix();
            let common = common_prefix_len(prefix, &key[start..]);
            if common < prefix.len() {
                self.split(root, path, node, start + common, key, value);
                return true;
            }
            let depth = start + prefix.len();
            if depth == key.len() {
                path.push(CursorItem::own_value(node, depth));
                return self.store_own_value(root, path, value);
            }
            let byte = key[depth];
            let Some(pos) = node.find_pos(byte) else {
                path.push(CursorItem::own_value(node, depth));
                self.add_child(root, path, byte, &key[depth + 1..], value);
                return true;
            };
            path.push(CursorItem::child(node, depth, pos, byte));
            match node.slot_at_pos(pos) {
                Slot::Child(child) => {
                    node = child;
                    start = depth + 1;
                }
                Slot::Value(_) if depth + 1 == key.len() => {
                    self.store_inline_value(root, path, value);
                    return false;
                }
                Slot::Value(_) => {
                    self.extend_inline(root, path, &key[depth + 1..], value);
                    return true;
                }
                Slot::Empty => unreachable!("occupied position decoded as an empty slot"),
            }
        }
    }

    /// `key` diverges from `node`'s prefix at key offset `depth`. Puts a new
    /// branch node holding the shared part of the prefix in `node`'s place.
    fn split(
        &self,
        root: &mut Option<NodePtr<R>>,
        path: &mut Path<R>,
        node: NodePtr<R>,
        depth: usize,
        key: &[u8],
        value: &[u8],
    ) {
        self.make_unique(root, path.as_mut_slice());
        let start = path.top().map_or(0, |parent| parent.key_len + 1);
        let prefix = node.prefix();
        let common = depth - start;
        let old_byte = prefix[common];
        let tail_count = node.recursive_count();
        let tail = self.rebuild(
            node,
            node.node_type(),
            &prefix[common + 1..],
            own_value_of(node),
            tail_count,
        );
        let tail_raw = self.slot_for(tail);

        let (branch, leaf) = if depth == key.len() {
            let branch = self.build(
                NodeType::Node4,
                &prefix[..common],
                Some(value),
                &[(old_byte, tail_raw)],
                tail_count + 1,
            );
            (branch, None)
        } else {
            let new_byte = key[depth];
            let (raw, leaf) = self.new_child_slot(&key[depth + 1..], value);
            let entries = if new_byte < old_byte {
                [(new_byte, raw), (old_byte, tail_raw)]
            } else {
                [(old_byte, tail_raw), (new_byte, raw)]
            };
            let branch = self.build(
                NodeType::Node4,
                &prefix[..common],
                None,
                &entries,
                tail_count + 1,
            );
            (branch, leaf)
        };
        trace!(common, prefix_len = prefix.len(), "split node prefix");

        self.set_child_pointer(root, path.as_slice(), branch);
        self.release(node);
        bump_counts(path.as_slice());

        if depth == key.len() {
            path.push(CursorItem::own_value(branch, depth));
            return;
        }
        let byte = key[depth];
        let Some(pos) = branch.find_pos(byte) else {
            unreachable!("fresh branch lost its new child")
        };
        path.push(CursorItem::child(branch, depth, pos, byte));
        if let Some(leaf) = leaf {
            path.push(CursorItem::own_value(leaf, key.len()));
        }
    }

    /// The key ends at the top node's prefix: set or overwrite its own value.
    fn store_own_value(
        &self,
        root: &mut Option<NodePtr<R>>,
        path: &mut Path<R>,
        value: &[u8],
    ) -> bool {
        self.make_unique(root, path.as_mut_slice());
        let Some(&top) = path.top() else {
            unreachable!("store on an empty path")
        };
        let node = top.node;
        if !node.is_leaf() {
            let replacement = self.rebuild(
                node,
                node.node_type(),
                node.prefix(),
                Some(value),
                node.recursive_count() + 1,
            );
            self.replace_top(root, path.as_mut_slice(), replacement);
            let parents = path.len() - 1;
            bump_counts(&path.as_slice()[..parents]);
            return true;
        }

        if node.node_type() == NodeType::Leaf
            && node.prefix_len() == 0
            && path.len() > 1
            && R::is_inlinable(value)
        {
            path.pop();
            let Some((parent, pos)) = path.top().and_then(|p| p.position().map(|pos| (p.node, pos)))
            else {
                unreachable!("leaf below a frame without a child position")
            };
            parent.write_raw_slot(parent.pos_slot(pos), &inline_slot::<R>(value));
            self.release(node);
            return false;
        }

        if node.value_fits(value) {
            node.write_value(value);
        } else {
            let replacement = self.rebuild(
                node,
                node.node_type(),
                node.prefix(),
                Some(value),
                node.recursive_count(),
            );
            self.replace_top(root, path.as_mut_slice(), replacement);
        }
        false
    }

    /// The key ends at an inline slot of the top node: overwrite it, moving
    /// the value into a leaf node when it no longer fits.
    fn store_inline_value(&self, root: &mut Option<NodePtr<R>>, path: &mut Path<R>, value: &[u8]) {
        self.make_unique(root, path.as_mut_slice());
        let Some(&top) = path.top() else {
            unreachable!("store on an empty path")
        };
        let Some(pos) = top.position() else {
            unreachable!("inline store without a child position")
        };
        let slot = top.node.pos_slot(pos);
        if R::is_inlinable(value) {
            top.node.write_raw_slot(slot, &inline_slot::<R>(value));
            return;
        }
        let leaf = self.new_leaf(&[], value);
        top.node.write_raw_slot(slot, &child_slot::<R>(leaf.addr()));
        path.push(CursorItem::own_value(leaf, top.key_len + 1));
    }

    /// An inline value's key is a proper prefix of the new key. The slot
    /// becomes a node holding the old value and the new key below it.
    fn extend_inline(
        &self,
        root: &mut Option<NodePtr<R>>,
        path: &mut Path<R>,
        suffix: &[u8],
        value: &[u8],
    ) {
        self.make_unique(root, path.as_mut_slice());
        let Some(&top) = path.top() else {
            unreachable!("extend on an empty path")
        };
        let Some(pos) = top.position() else {
            unreachable!("inline extend without a child position")
        };
        let parent = top.node;
        let slot = parent.pos_slot(pos);
        let Slot::Value(old) = parent.slot(slot) else {
            unreachable!("inline extend on a non-inline slot")
        };
        let byte = suffix[0];
        let (raw, leaf) = self.new_child_slot(&suffix[1..], value);
        let branch = self.build(NodeType::Node4, &[], Some(old), &[(byte, raw)], 2);
        parent.write_raw_slot(slot, &child_slot::<R>(branch.addr()));
        bump_counts(path.as_slice());

        let depth = top.key_len + 1;
        path.push(CursorItem::child(branch, depth, 0, byte));
        if let Some(leaf) = leaf {
            path.push(CursorItem::own_value(leaf, depth + suffix.len()));
        }
    }

    /// Adds a child for `byte` to the top node, growing it first when full.
    fn add_child(
        &self,
        root: &mut Option<NodePtr<R>>,
        path: &mut Path<R>,
        byte: u8,
        suffix: &[u8],
        value: &[u8],
    ) {
        self.make_unique(root, path.as_mut_slice());
        let Some(&top) = path.top() else {
            unreachable!("add_child on an empty path")
        };
        let mut node = top.node;
        let ntype = node.node_type();
        if node.child_count() == ntype.capacity() {
            let grown_type = ntype.grown();
            trace!(from = ntype.name(), to = grown_type.name(), "grow node");
            let grown = self.rebuild(
                node,
                grown_type,
                node.prefix(),
                own_value_of(node),
                node.recursive_count(),
            );
            self.replace_top(root, path.as_mut_slice(), grown);
            node = grown;
        }
        let (raw, leaf) = self.new_child_slot(suffix, value);
        let pos = node.insert_child(byte, &raw);
        bump_counts(path.as_slice());
        if let Some(top) = path.top_mut() {
            top.pos = pos as i16;
            top.byte = byte as i16;
        }
        if let Some(leaf) = leaf {
            path.push(CursorItem::own_value(leaf, top.key_len + 1 + suffix.len()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::CheckMode;
    use super::super::tests::collect;
    use super::*;
    use crate::alloc::CountingAllocator;
    use crate::value::{Value12, VarValue, VarValue12};
    use std::collections::BTreeMap;

    #[test]
    fn grows_through_every_class() {
        let alloc = CountingAllocator::new();
        let engine = Engine::<VarValue>::new(&alloc);
        let mut root = None;
        let mut path = Path::new();
        let expect = [
            (1, NodeType::Node4),
            (4, NodeType::Node4),
            (5, NodeType::Node16),
            (16, NodeType::Node16),
            (17, NodeType::Node48),
            (48, NodeType::Node48),
            (49, NodeType::Node256),
            (256, NodeType::Node256),
        ];
        engine.upsert(&mut root, &mut path, b"k", b"root");
        let mut inserted = 0usize;
        for (count, ntype) in expect {
            while inserted < count {
                let key = [b'k', inserted as u8];
                assert!(engine.upsert(&mut root, &mut path, &key, b"v"));
                inserted += 1;
            }
            let Some(node) = root else { panic!("empty tree") };
            assert_eq!(node.node_type(), ntype, "after {count} children");
            assert_eq!(node.child_count(), count);
            assert_eq!(node.recursive_count(), count as u64 + 1);
            engine.check(&[root], CheckMode::Exact).unwrap();
        }
        if let Some(node) = root {
            engine.release(node);
        }
        assert_eq!(alloc.live_blocks(), 0);
    }

    #[test]
    fn overwrite_reports_existing_key() {
        let alloc = CountingAllocator::new();
        let engine = Engine::<VarValue>::new(&alloc);
        let mut root = None;
        let mut path = Path::new();
        assert!(engine.upsert(&mut root, &mut path, b"a", b"1"));
        assert!(engine.upsert(&mut root, &mut path, b"ab", b"2"));
        assert!(!engine.upsert(&mut root, &mut path, b"ab", b"a much longer value"));
        assert_eq!(engine.value(&path), b"a much longer value");
        assert!(!engine.upsert(&mut root, &mut path, b"ab", b"short"));
        assert!(!engine.upsert(&mut root, &mut path, b"a", b"another long value"));
        assert!(!engine.upsert(&mut root, &mut path, b"a", b""));
        engine.check(&[root], CheckMode::Exact).unwrap();
        assert_eq!(
            collect(&engine, root),
            vec![(b"a".to_vec(), b"".to_vec()), (b"ab".to_vec(), b"short".to_vec())]
        );
        // The long value went to a leaf node and came back inline.
        let Some(node) = root else { panic!("empty tree") };
        assert_eq!(node.node_type(), NodeType::Node4);
        engine.release(node);
        assert_eq!(alloc.live_blocks(), 0);
    }

    fn matches_btree<R: ValueRepr>(value_of: impl Fn(usize) -> Vec<u8>) {
        let alloc = CountingAllocator::new();
        let engine = Engine::<R>::new(&alloc);
        let mut root = None;
        let mut path = Path::new();
        let mut model = BTreeMap::new();
        let words = ["", "a", "ab", "abc", "abd", "b", "ba", "zz", "zzzzzzzzzzzzzzzzzzzzzz"];
        for (i, first) in words.iter().enumerate() {
            for (j, second) in words.iter().enumerate() {
                let key = format!("{first}/{second}").into_bytes();
                let value = value_of(i * 31 + j);
                let fresh = model.insert(key.clone(), value.clone()).is_none();
                assert_eq!(engine.upsert(&mut root, &mut path, &key, &value), fresh);
                let mut found = Vec::new();
                engine.fill_key(&path, &mut found);
                assert_eq!(found, key);
                assert_eq!(engine.value(&path), &value[..]);
            }
            let key = first.as_bytes().to_vec();
            let value = value_of(i);
            let fresh = model.insert(key.clone(), value.clone()).is_none();
            assert_eq!(engine.upsert(&mut root, &mut path, &key, &value), fresh);
        }
        engine.check(&[root], CheckMode::Exact).unwrap();
        let expected: Vec<_> = model.into_iter().collect();
        assert_eq!(collect(&engine, root), expected);
        if let Some(node) = root {
            engine.release(node);
        }
        assert_eq!(alloc.live_blocks(), 0);
    }

    #[test]
    fn upsert_matches_btree_for_every_repr() {
        matches_btree::<VarValue>(|i| vec![i as u8; i % 13]);
        matches_btree::<VarValue12>(|i| vec![i as u8; i % 17]);
        matches_btree::<Value12>(|i| {
            let mut v = [0u8; 12];
            v[..8].copy_from_slice(&(i as u64).to_le_bytes());
            v.to_vec()
        });
    }
}
