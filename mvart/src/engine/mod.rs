//! Tree algorithms over raw nodes.
//!
//! The engine owns no state besides the allocator it draws nodes from. Root
//! handles and cursors call into it with the root pointer and a path of
//! [`CursorItem`] frames.
//!
//! Mutations follow one protocol: find the path, make every node on it
//! exclusively owned (cloning shared ones top-down), then modify in place or
//! swap in a freshly built node. A clone takes a reference on every child it
//! keeps, so snapshots holding the originals are never disturbed.

mod check;
mod erase;
mod lookup;
mod upsert;

pub(crate) use check::CheckMode;

use crate::alloc::Allocator;
use crate::node::{NodePtr, NodeType, Slot, decode_slot};
use crate::utils::path_stack::PathStack;
use crate::value::{RawSlot, ValueRepr, child_slot, inline_slot};
use smallvec::SmallVec;
use std::marker::PhantomData;
use std::ptr;

/// One step of a cursor path.
///
/// `key_len` is the length of the key consumed once this node's prefix has
/// been matched. `pos` is the child position taken from this node, or -1 when
/// the path ends at the node's own value; `byte` is the matching
/// discriminator or -1.
pub(crate) struct CursorItem<R> {
    pub(crate) node: NodePtr<R>,
    pub(crate) key_len: usize,
    pub(crate) pos: i16,
    pub(crate) byte: i16,
}

impl<R> Clone for CursorItem<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for CursorItem<R> {}

impl<R> std::fmt::Debug for CursorItem<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorItem")
            .field("node", &self.node)
            .field("key_len", &self.key_len)
            .field("pos", &self.pos)
            .field("byte", &self.byte)
            .finish()
    }
}

impl<R> CursorItem<R> {
    pub(crate) fn own_value(node: NodePtr<R>, key_len: usize) -> Self {
        Self {
            node,
            key_len,
            pos: -1,
            byte: -1,
        }
    }

    pub(crate) fn child(node: NodePtr<R>, key_len: usize, pos: usize, byte: u8) -> Self {
        Self {
            node,
            key_len,
            pos: pos as i16,
            byte: byte as i16,
        }
    }

    #[inline]
    pub(crate) fn position(&self) -> Option<usize> {
        usize::try_from(self.pos).ok()
    }
}

pub(crate) type Path<R> = PathStack<CursorItem<R>>;

fn own_value_of<'a, R: ValueRepr>(node: NodePtr<R>) -> Option<&'a [u8]> {
    node.is_leaf().then(|| node.value())
}

fn bump_counts<R: ValueRepr>(items: &[CursorItem<R>]) {
    for item in items {
        item.node.set_recursive_count(item.node.recursive_count() + 1);
    }
}

pub(crate) struct Engine<'a, R> {
    alloc: &'a dyn Allocator,
    _repr: PhantomData<fn() -> R>,
}

impl<'a, R: ValueRepr> Engine<'a, R> {
    pub(crate) fn new(alloc: &'a dyn Allocator) -> Self {
        Self {
            alloc,
            _repr: PhantomData,
        }
    }

    pub(crate) fn allocate(
        &self,
        ntype: NodeType,
        is_leaf: bool,
        prefix_len: usize,
        value_len: usize,
    ) -> NodePtr<R> {
        let size = NodePtr::<R>::layout_size(ntype, is_leaf, prefix_len, value_len);
        let raw = self.alloc.allocate(size);
        // SAFETY: `raw` is a fresh block of exactly `size` bytes.
        unsafe { NodePtr::init(raw, size, ntype, is_leaf, prefix_len, value_len) }
    }

    /// Returns the block of a node whose children have already been moved,
    /// released or accounted for elsewhere.
    fn free(&self, node: NodePtr<R>) {
        let size = node.size();
        // SAFETY: the block came from this allocator with this size, and the
        // caller holds the last reference.
        unsafe { self.alloc.deallocate(node.raw(), size) }
    }

    /// Drops one reference to `node`, freeing every node that becomes
    /// unreachable. Runs off an explicit worklist so deep trees cannot
    /// overflow the native stack.
    pub(crate) fn release(&self, node: NodePtr<R>) {
        let mut pending: SmallVec<[NodePtr<R>; 32]> = SmallVec::new();
        pending.push(node);
        while let Some(node) = pending.pop() {
            if !node.drop_ref() {
                continue;
            }
            pending.extend(node.child_nodes());
            self.free(node);
        }
    }

    /// Byte-for-byte copy of a shared node with a fresh reference count.
    fn clone_node(&self, node: NodePtr<R>) -> NodePtr<R> {
        let size = node.size();
        let raw = self.alloc.allocate(size);
        // The reference count (bytes 4..8) may be updated concurrently by
        // another handle, so it is left out of the copy.
        // SAFETY: both blocks are `size` bytes long and do not overlap.
        unsafe {
            ptr::copy_nonoverlapping(node.raw().as_ptr(), raw.as_ptr(), 4);
            ptr::copy_nonoverlapping(
                node.raw().as_ptr().add(8),
                raw.as_ptr().add(8),
                size - 8,
            );
        }
        let copy = NodePtr::from_raw(raw);
        copy.reset_ref_count();
        for child in copy.child_nodes() {
            child.add_ref();
        }
        copy
    }

    /// Fresh node holding `entries`, whose pointers it takes over as-is.
    fn build(
        &self,
        ntype: NodeType,
        prefix: &[u8],
        value: Option<&[u8]>,
        entries: &[(u8, RawSlot)],
        recursive: u64,
    ) -> NodePtr<R> {
        let node = self.allocate(ntype, value.is_some(), prefix.len(), value.map_or(0, <[u8]>::len));
        node.prefix_mut().copy_from_slice(prefix);
        if let Some(value) = value {
            node.write_value(value);
        }
        node.write_children(entries);
        node.set_recursive_count(recursive);
        node
    }

    /// Copy of `node`'s children under a new shape. Every child pointer gains
    /// a reference; the caller releases `node` afterwards.
    fn rebuild(
        &self,
        node: NodePtr<R>,
        ntype: NodeType,
        prefix: &[u8],
        value: Option<&[u8]>,
        recursive: u64,
    ) -> NodePtr<R> {
        let entries = node.entries();
        for child in node.child_nodes() {
            child.add_ref();
        }
        self.build(ntype, prefix, value, &entries, recursive)
    }

    pub(crate) fn new_leaf(&self, prefix: &[u8], value: &[u8]) -> NodePtr<R> {
        self.build(NodeType::Leaf, prefix, Some(value), &[], 1)
    }

    /// Slot content for a key that continues with `suffix` past a
    /// discriminator: inline when possible, otherwise a new leaf node.
    fn new_child_slot(&self, suffix: &[u8], value: &[u8]) -> (RawSlot, Option<NodePtr<R>>) {
        if suffix.is_empty() && R::is_inlinable(value) {
            return (inline_slot::<R>(value), None);
        }
        let leaf = self.new_leaf(suffix, value);
        (child_slot::<R>(leaf.addr()), Some(leaf))
    }

    /// Slot content for a node returned by a structural rewrite. Leaves with
    /// an empty prefix fold back into an inline value when they fit.
    fn slot_for(&self, node: NodePtr<R>) -> RawSlot {
        if node.node_type() == NodeType::Leaf
            && node.prefix_len() == 0
            && R::is_inlinable(node.value())
        {
            let raw = inline_slot::<R>(node.value());
            self.release(node);
            return raw;
        }
        child_slot::<R>(node.addr())
    }

    /// Clones every shared node on `path`, top-down, so the whole path can be
    /// modified in place. Parents are rewired to the clones and the originals
    /// lose the reference the parent held.
    pub(crate) fn make_unique(&self, root: &mut Option<NodePtr<R>>, path: &mut [CursorItem<R>]) {
        for i in 0..path.len() {
            let node = path[i].node;
            if node.is_unique() {
                continue;
            }
            let copy = self.clone_node(node);
            self.set_child_pointer(root, &path[..i], copy);
            self.release(node);
            path[i].node = copy;
        }
    }

    /// Points the slot the last of `parents` descends through (or the root
    /// when there is no parent) at `child`. No reference counts change.
    fn set_child_pointer(
        &self,
        root: &mut Option<NodePtr<R>>,
        parents: &[CursorItem<R>],
        child: NodePtr<R>,
    ) {
        match parents.last() {
            None => *root = Some(child),
            Some(parent) => {
                let Some(pos) = parent.position() else {
                    unreachable!("interior path frame without a child position")
                };
                let slot = parent.node.pos_slot(pos);
                parent.node.write_raw_slot(slot, &child_slot::<R>(child.addr()));
            }
        }
    }

    /// Swaps the last node of `path` for `replacement` and drops the
    /// reference its parent held on the old node.
    fn replace_top(
        &self,
        root: &mut Option<NodePtr<R>>,
        path: &mut [CursorItem<R>],
        replacement: NodePtr<R>,
    ) {
        let Some((top, parents)) = path.split_last_mut() else {
            return;
        };
        let old = top.node;
        self.set_child_pointer(root, parents, replacement);
        top.node = replacement;
        self.release(old);
    }

    pub(crate) fn decode_raw<'s>(raw: &'s RawSlot) -> Slot<'s, R> {
        decode_slot::<R>(&raw[..R::SLOT_SIZE])
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::alloc::CountingAllocator;
    use crate::value::{Value12, VarValue, VarValue12};

    pub(crate) fn collect<R: ValueRepr>(
        engine: &Engine<'_, R>,
        root: Option<NodePtr<R>>,
    ) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut out = Vec::new();
        let mut path = Path::new();
        let mut key = Vec::new();
        if !engine.find_first(root, &mut path, &[]) {
            return out;
        }
        loop {
            engine.fill_key(&path, &mut key);
            out.push((key.clone(), engine.value(&path).to_vec()));
            if !engine.move_next(&mut path) {
                return out;
            }
        }
    }

    fn value_for<R: ValueRepr>(seed: usize) -> Vec<u8> {
        match R::FIXED_LEN {
            Some(len) => {
                let mut v = vec![(seed % 200) as u8; len];
                v[len - 1] = (seed / 200) as u8;
                v
            }
            None => vec![b'v'; seed % 20],
        }
    }

    fn shares_structure_after_clone<R: ValueRepr>() {
        let alloc = CountingAllocator::new();
        let engine = Engine::<R>::new(&alloc);
        let mut root = None;
        let mut path = Path::new();
        for i in 0..300u32 {
            let key = i.to_be_bytes();
            assert!(engine.upsert(&mut root, &mut path, &key, &value_for::<R>(i as usize)));
        }
        let Some(top) = root else { panic!("empty tree") };
        assert_eq!(top.recursive_count(), 300);

        // A second owner of the root, as a snapshot would hold.
        top.add_ref();
        let snapshot = root;
        assert!(engine.upsert(&mut root, &mut path, &[0, 0, 9, 9], &value_for::<R>(1)));
        assert_ne!(root, snapshot);
        assert_eq!(collect(&engine, snapshot).len(), 300);
        assert_eq!(collect(&engine, root).len(), 301);
        engine.check(&[snapshot, root], CheckMode::Exact).unwrap();

        engine.release(top);
        if let Some(node) = root {
            engine.release(node);
        }
        assert_eq!(alloc.live_blocks(), 0);
    }

    #[test]
    fn clone_keeps_snapshots_intact() {
        shares_structure_after_clone::<VarValue>();
        shares_structure_after_clone::<Value12>();
        shares_structure_after_clone::<VarValue12>();
    }

    #[test]
    fn release_frees_deep_chains() {
        let alloc = CountingAllocator::new();
        let engine = Engine::<VarValue>::new(&alloc);
        let mut root = None;
        let mut path = Path::new();
        // Every key extends the previous one, giving a chain as deep as the
        // number of keys.
        let mut key = Vec::new();
        for i in 0..2000u32 {
            key.push((i % 251) as u8);
            key.push(1);
            engine.upsert(&mut root, &mut path, &key, b"x");
        }
        assert_eq!(root.map(NodePtr::recursive_count), Some(2000));
        engine.check(&[root], CheckMode::Exact).unwrap();
        if let Some(node) = root {
            engine.release(node);
        }
        assert_eq!(alloc.live_blocks(), 0);
        assert_eq!(alloc.live_bytes(), 0);
    }
}
