//! Byte layout of tree nodes.
//!
//! Every node is one allocation:
//!
//! ```text
//! +--------+----------+-----------------+--------+-----------+
//! | header | overflow | fan-out table   | prefix | own value |
//! | 16 B   | 0 or 8 B | depends on type | n B    | if leaf   |
//! +--------+----------+-----------------+--------+-----------+
//! ```
//!
//! Header: type byte (arity class, `IS_LEAF`, `WIDE_SLOTS`), child count,
//! 16-bit prefix length (`0xFFFF` moves the length to the overflow word),
//! atomic reference count and the recursive child count.
//!
//! Fan-out tables:
//!
//! - `Node4` / `Node16`: sorted key array (8 / 16 bytes) then 4 / 16 slots.
//! - `Node48`: 256-entry byte to slot-index table (`0xFF` = absent) then 48
//!   slots.
//! - `Node256`: 256 slots indexed directly by byte.
//! - `Leaf`: nothing.
//!
//! A [`NodePtr`] is only created for a live node and is only dereferenced
//! while a root handle keeps that node reachable. All accessors rely on that,
//! which is why they are safe functions inside the crate.

use crate::utils::u8_keys::{u8_keys_find_insert_position, u8_keys_find_key_position_sorted};
use crate::value::{MAX_SLOT_SIZE, RawSlot, SlotTag, ValueRepr};
use num_traits::PrimInt;
use smallvec::SmallVec;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::slice;
use std::sync::atomic::{AtomicU32, Ordering, fence};

const TYPE_OFFSET: usize = 0;
const CHILDREN_OFFSET: usize = 1;
const PREFIX_LEN_OFFSET: usize = 2;
const REF_COUNT_OFFSET: usize = 4;
const RECURSIVE_OFFSET: usize = 8;
const HEADER_SIZE: usize = 16;
const OVERFLOW_SIZE: usize = 8;

pub(crate) const TYPE_MASK: u8 = 0x07;
const IS_LEAF: u8 = 0x08;
const WIDE_SLOTS: u8 = 0x10;

const MAX_SHORT_PREFIX: usize = 0xFFFE;
const PREFIX_OVERFLOW: u16 = 0xFFFF;

/// Longest key prefix a single node can carry.
pub(crate) const MAX_PREFIX_LEN: usize = u32::MAX as usize;

pub(crate) const N48_ABSENT: u8 = 0xFF;

/// Arity class of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeType {
    Leaf = 0,
    Node4 = 1,
    Node16 = 2,
    Node48 = 3,
    Node256 = 4,
}

impl NodeType {
    pub(crate) fn from_tag(tag: u8) -> Option<NodeType> {
        match tag {
            0 => Some(NodeType::Leaf),
            1 => Some(NodeType::Node4),
            2 => Some(NodeType::Node16),
            3 => Some(NodeType::Node48),
            4 => Some(NodeType::Node256),
            _ => None,
        }
    }

    pub const fn capacity(self) -> usize {
        match self {
            NodeType::Leaf => 0,
            NodeType::Node4 => 4,
            NodeType::Node16 => 16,
            NodeType::Node48 => 48,
            NodeType::Node256 => 256,
        }
    }

    /// Smallest class that holds `count` children.
    pub const fn for_children(count: usize) -> NodeType {
        match count {
            0 => NodeType::Leaf,
            1..=4 => NodeType::Node4,
            5..=16 => NodeType::Node16,
            17..=48 => NodeType::Node48,
            _ => NodeType::Node256,
        }
    }

    pub const fn grown(self) -> NodeType {
        match self {
            NodeType::Leaf => NodeType::Node4,
            NodeType::Node4 => NodeType::Node16,
            NodeType::Node16 => NodeType::Node48,
            NodeType::Node48 | NodeType::Node256 => NodeType::Node256,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            NodeType::Leaf => "Leaf",
            NodeType::Node4 => "Node4",
            NodeType::Node16 => "Node16",
            NodeType::Node48 => "Node48",
            NodeType::Node256 => "Node256",
        }
    }

    const fn keys_len(self) -> usize {
        match self {
            NodeType::Leaf | NodeType::Node256 => 0,
            NodeType::Node4 => 8,
            NodeType::Node16 => 16,
            NodeType::Node48 => 256,
        }
    }
}

/// Decoded content of a child slot.
pub(crate) enum Slot<'a, R> {
    Empty,
    Child(NodePtr<R>),
    Value(&'a [u8]),
}

pub(crate) fn decode_slot<R: ValueRepr>(bytes: &[u8]) -> Slot<'_, R> {
    match R::decode(bytes) {
        SlotTag::Empty => Slot::Empty,
        SlotTag::Inline => Slot::Value(R::inline_value(bytes)),
        SlotTag::Child(addr) => match NodePtr::from_addr(addr) {
            Some(child) => Slot::Child(child),
            None => Slot::Empty,
        },
    }
}

/// Children of a node as `(byte, encoded slot)`, in byte order.
pub(crate) type Entries = SmallVec<[(u8, RawSlot); 16]>;

pub(crate) struct NodePtr<R> {
    raw: NonNull<u8>,
    _repr: PhantomData<fn() -> R>,
}

impl<R> Clone for NodePtr<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for NodePtr<R> {}

impl<R> PartialEq for NodePtr<R> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<R> Eq for NodePtr<R> {}

impl<R> Hash for NodePtr<R> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<R> fmt::Debug for NodePtr<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodePtr({:p})", self.raw)
    }
}

impl<R: ValueRepr> NodePtr<R> {
    /// Exact byte size of a node with the given shape.
    pub(crate) fn layout_size(
        ntype: NodeType,
        is_leaf: bool,
        prefix_len: usize,
        value_len: usize,
    ) -> usize {
        let header = if prefix_len > MAX_SHORT_PREFIX {
            HEADER_SIZE + OVERFLOW_SIZE
        } else {
            HEADER_SIZE
        };
        let value = if is_leaf { R::stored_len(value_len) } else { 0 };
        header + Self::fanout_len(ntype) + prefix_len + value
    }

    const fn fanout_len(ntype: NodeType) -> usize {
        ntype.keys_len() + ntype.capacity() * R::SLOT_SIZE
    }

    /// Formats a fresh node in a block of `size` bytes.
    ///
    /// # Safety
    ///
    /// `raw` must point to `size` writable bytes aligned for `u64`, where
    /// `size == Self::layout_size(ntype, is_leaf, prefix_len, value_len)`.
    pub(crate) unsafe fn init(
        raw: NonNull<u8>,
        size: usize,
        ntype: NodeType,
        is_leaf: bool,
        prefix_len: usize,
        value_len: usize,
    ) -> Self {
        // SAFETY: the caller hands over `size` writable bytes.
        unsafe { raw.as_ptr().write_bytes(0, size) };
        let node = Self::from_raw(raw);
        let mut tag = ntype as u8;
        if is_leaf {
            tag |= IS_LEAF;
        }
        if R::WIDE_SLOTS {
            tag |= WIDE_SLOTS;
        }
        node.store::<u8>(TYPE_OFFSET, tag);
        if prefix_len > MAX_SHORT_PREFIX {
            node.store::<u16>(PREFIX_LEN_OFFSET, PREFIX_OVERFLOW);
            node.store::<u32>(HEADER_SIZE, prefix_len as u32);
        } else {
            node.store::<u16>(PREFIX_LEN_OFFSET, prefix_len as u16);
        }
        node.reset_ref_count();
        node.set_recursive_count(1);
        if ntype == NodeType::Node48 {
            node.keys_mut().fill(N48_ABSENT);
        }
        if !R::EMPTY_IS_ZERO {
            for idx in 0..ntype.capacity() {
                node.clear_slot(idx);
            }
        }
        if is_leaf && R::FIXED_LEN.is_none() {
            node.store::<u32>(node.value_offset(), value_len as u32);
        }
        node
    }

    #[inline]
    pub(crate) fn from_raw(raw: NonNull<u8>) -> Self {
        Self {
            raw,
            _repr: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn from_addr(addr: usize) -> Option<Self> {
        NonNull::new(std::ptr::with_exposed_provenance_mut::<u8>(addr)).map(Self::from_raw)
    }

    #[inline]
    pub(crate) fn raw(self) -> NonNull<u8> {
        self.raw
    }

    #[inline]
    pub(crate) fn addr(self) -> usize {
        self.raw.as_ptr().expose_provenance()
    }

    #[inline]
    fn ptr(self, offset: usize) -> *mut u8 {
        // SAFETY: callers only pass offsets inside the node's block.
        unsafe { self.raw.as_ptr().add(offset) }
    }

    #[inline]
    fn load<T: PrimInt>(self, offset: usize) -> T {
        // SAFETY: see `ptr`; header and body fields may be unaligned.
        T::from_le(unsafe { self.ptr(offset).cast::<T>().read_unaligned() })
    }

    #[inline]
    fn store<T: PrimInt>(self, offset: usize, value: T) {
        // SAFETY: see `ptr`.
        unsafe { self.ptr(offset).cast::<T>().write_unaligned(value.to_le()) }
    }

    #[inline]
    fn bytes<'a>(self, offset: usize, len: usize) -> &'a [u8] {
        // SAFETY: `offset..offset + len` lies inside the block, which outlives
        // every borrow handed out under the module invariant.
        unsafe { slice::from_raw_parts(self.ptr(offset), len) }
    }

    #[inline]
    fn bytes_mut<'a>(self, offset: usize, len: usize) -> &'a mut [u8] {
        // SAFETY: as `bytes`; writers hold the only reference to the node.
        unsafe { slice::from_raw_parts_mut(self.ptr(offset), len) }
    }

    // Header.

    #[inline]
    pub(crate) fn type_byte(self) -> u8 {
        self.load::<u8>(TYPE_OFFSET)
    }

    #[inline]
    pub(crate) fn node_type(self) -> NodeType {
        let tag = self.type_byte() & TYPE_MASK;
        match NodeType::from_tag(tag) {
            Some(ntype) => ntype,
            None => unreachable!("unknown node type tag {tag:#04x}"),
        }
    }

    #[inline]
    pub(crate) fn is_leaf(self) -> bool {
        self.type_byte() & IS_LEAF != 0
    }

    pub(crate) fn has_wide_slots(self) -> bool {
        self.type_byte() & WIDE_SLOTS != 0
    }

    #[inline]
    pub(crate) fn child_count(self) -> usize {
        let count = self.load::<u8>(CHILDREN_OFFSET) as usize;
        if count == 0 && self.node_type() == NodeType::Node256 {
            256
        } else {
            count
        }
    }

    #[inline]
    pub(crate) fn set_child_count(self, count: usize) {
        self.store::<u8>(CHILDREN_OFFSET, count as u8);
    }

    #[inline]
    pub(crate) fn prefix_len(self) -> usize {
        match self.load::<u16>(PREFIX_LEN_OFFSET) {
            PREFIX_OVERFLOW => self.load::<u32>(HEADER_SIZE) as usize,
            len => len as usize,
        }
    }

    #[inline]
    fn body_offset(self) -> usize {
        if self.load::<u16>(PREFIX_LEN_OFFSET) == PREFIX_OVERFLOW {
            HEADER_SIZE + OVERFLOW_SIZE
        } else {
            HEADER_SIZE
        }
    }

    #[inline]
    fn ref_count_cell(&self) -> &AtomicU32 {
        // SAFETY: the reference count is 4-byte aligned inside an 8-byte
        // aligned block and is only ever accessed atomically.
        unsafe { &*self.ptr(REF_COUNT_OFFSET).cast::<AtomicU32>() }
    }

    pub(crate) fn ref_count(self) -> u32 {
        self.ref_count_cell().load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn is_unique(self) -> bool {
        self.ref_count() == 1
    }

    pub(crate) fn reset_ref_count(self) {
        self.ref_count_cell().store(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_ref(self) {
        self.ref_count_cell().fetch_add(1, Ordering::Relaxed);
    }

    /// Drops one reference; true when it was the last one.
    #[inline]
    pub(crate) fn drop_ref(self) -> bool {
        if self.ref_count_cell().fetch_sub(1, Ordering::Release) != 1 {
            return false;
        }
        fence(Ordering::Acquire);
        true
    }

    #[inline]
    pub(crate) fn recursive_count(self) -> u64 {
        self.load::<u64>(RECURSIVE_OFFSET)
    }

    #[inline]
    pub(crate) fn set_recursive_count(self, count: u64) {
        self.store::<u64>(RECURSIVE_OFFSET, count);
    }

    // Body.

    #[inline]
    fn slots_offset(self) -> usize {
        self.body_offset() + self.node_type().keys_len()
    }

    #[inline]
    fn prefix_offset(self) -> usize {
        self.body_offset() + Self::fanout_len(self.node_type())
    }

    #[inline]
    fn value_offset(self) -> usize {
        self.prefix_offset() + self.prefix_len()
    }

    /// Total size of the block, as passed to the allocator.
    pub(crate) fn size(self) -> usize {
        let value = if self.is_leaf() {
            R::stored_len(self.value().len())
        } else {
            0
        };
        self.value_offset() + value
    }

    #[inline]
    pub(crate) fn prefix<'a>(self) -> &'a [u8] {
        self.bytes(self.prefix_offset(), self.prefix_len())
    }

    pub(crate) fn prefix_mut<'a>(self) -> &'a mut [u8] {
        self.bytes_mut(self.prefix_offset(), self.prefix_len())
    }

    /// The node's own value. Only meaningful when [`Self::is_leaf`].
    pub(crate) fn value<'a>(self) -> &'a [u8] {
        let offset = self.value_offset();
        match R::FIXED_LEN {
            Some(len) => self.bytes(offset, len),
            None => self.bytes(offset + 4, self.load::<u32>(offset) as usize),
        }
    }

    /// Overwrites the own value. The node must have been allocated for a
    /// value of this length.
    pub(crate) fn write_value(self, value: &[u8]) {
        let offset = self.value_offset();
        match R::FIXED_LEN {
            Some(len) => self.bytes_mut(offset, len).copy_from_slice(value),
            None => {
                self.store::<u32>(offset, value.len() as u32);
                self.bytes_mut(offset + 4, value.len()).copy_from_slice(value);
            }
        }
    }

    /// Whether `value` can replace the own value without resizing the block.
    pub(crate) fn value_fits(self, value: &[u8]) -> bool {
        self.is_leaf() && (R::FIXED_LEN.is_some() || self.value().len() == value.len())
    }

    #[inline]
    fn keys<'a>(self) -> &'a [u8] {
        self.bytes(self.body_offset(), self.node_type().keys_len())
    }

    fn keys_mut<'a>(self) -> &'a mut [u8] {
        self.bytes_mut(self.body_offset(), self.node_type().keys_len())
    }

    // Slots.

    #[inline]
    pub(crate) fn slot_bytes<'a>(self, idx: usize) -> &'a [u8] {
        debug_assert!(idx < self.node_type().capacity());
        self.bytes(self.slots_offset() + idx * R::SLOT_SIZE, R::SLOT_SIZE)
    }

    fn slot_bytes_mut<'a>(self, idx: usize) -> &'a mut [u8] {
        debug_assert!(idx < self.node_type().capacity());
        self.bytes_mut(self.slots_offset() + idx * R::SLOT_SIZE, R::SLOT_SIZE)
    }

    #[inline]
    pub(crate) fn slot<'a>(self, idx: usize) -> Slot<'a, R> {
        decode_slot(self.slot_bytes(idx))
    }

    pub(crate) fn raw_slot(self, idx: usize) -> RawSlot {
        let mut raw = [0u8; MAX_SLOT_SIZE];
        raw[..R::SLOT_SIZE].copy_from_slice(self.slot_bytes(idx));
        raw
    }

    pub(crate) fn write_raw_slot(self, idx: usize, raw: &RawSlot) {
        self.slot_bytes_mut(idx).copy_from_slice(&raw[..R::SLOT_SIZE]);
    }

    pub(crate) fn clear_slot(self, idx: usize) {
        R::encode_empty(self.slot_bytes_mut(idx));
    }

    // Positions.
    //
    // A position walks children in byte order: an index into the sorted key
    // array for Node4/Node16 and the byte itself for Node48/Node256.

    #[inline]
    fn occupied(self, byte: u8) -> bool {
        match self.node_type() {
            NodeType::Node48 => self.keys()[byte as usize] != N48_ABSENT,
            NodeType::Node256 => R::decode(self.slot_bytes(byte as usize)) != SlotTag::Empty,
            _ => unreachable!("byte-indexed lookup on a sorted node"),
        }
    }

    fn scan_up(self, from: usize) -> Option<usize> {
        (from..256).find(|&b| self.occupied(b as u8))
    }

    fn scan_down(self, from: usize) -> Option<usize> {
        (0..=from).rev().find(|&b| self.occupied(b as u8))
    }

    pub(crate) fn find_pos(self, byte: u8) -> Option<usize> {
        match self.node_type() {
            NodeType::Leaf => None,
            NodeType::Node4 => {
                u8_keys_find_key_position_sorted::<4>(byte, self.keys(), self.child_count())
            }
            NodeType::Node16 => {
                u8_keys_find_key_position_sorted::<16>(byte, self.keys(), self.child_count())
            }
            NodeType::Node48 | NodeType::Node256 => {
                self.occupied(byte).then_some(byte as usize)
            }
        }
    }

    /// First position whose byte is greater than `byte`.
    pub(crate) fn pos_after(self, byte: u8) -> Option<usize> {
        let count = self.child_count();
        match self.node_type() {
            NodeType::Leaf => None,
            NodeType::Node4 => {
                let at = u8_keys_find_insert_position::<4>(byte, self.keys(), count);
                (at < count).then_some(at)
            }
            NodeType::Node16 => {
                let at = u8_keys_find_insert_position::<16>(byte, self.keys(), count);
                (at < count).then_some(at)
            }
            NodeType::Node48 | NodeType::Node256 => {
                if byte == u8::MAX {
                    None
                } else {
                    self.scan_up(byte as usize + 1)
                }
            }
        }
    }

    #[inline]
    pub(crate) fn pos_byte(self, pos: usize) -> u8 {
        match self.node_type() {
            NodeType::Node4 | NodeType::Node16 => self.keys()[pos],
            _ => pos as u8,
        }
    }

    #[inline]
    pub(crate) fn pos_slot(self, pos: usize) -> usize {
        match self.node_type() {
            NodeType::Node48 => self.keys()[pos] as usize,
            _ => pos,
        }
    }

    #[inline]
    pub(crate) fn slot_at_pos<'a>(self, pos: usize) -> Slot<'a, R> {
        self.slot(self.pos_slot(pos))
    }

    pub(crate) fn first_pos(self) -> Option<usize> {
        match self.node_type() {
            NodeType::Leaf => None,
            NodeType::Node4 | NodeType::Node16 => (self.child_count() > 0).then_some(0),
            NodeType::Node48 | NodeType::Node256 => self.scan_up(0),
        }
    }

    pub(crate) fn last_pos(self) -> Option<usize> {
        match self.node_type() {
            NodeType::Leaf => None,
            NodeType::Node4 | NodeType::Node16 => self.child_count().checked_sub(1),
            NodeType::Node48 | NodeType::Node256 => self.scan_down(255),
        }
    }

    pub(crate) fn next_pos(self, pos: usize) -> Option<usize> {
        match self.node_type() {
            NodeType::Leaf => None,
            NodeType::Node4 | NodeType::Node16 => {
                (pos + 1 < self.child_count()).then_some(pos + 1)
            }
            NodeType::Node48 | NodeType::Node256 => self.scan_up(pos + 1),
        }
    }

    pub(crate) fn prev_pos(self, pos: usize) -> Option<usize> {
        match self.node_type() {
            NodeType::Leaf => None,
            NodeType::Node4 | NodeType::Node16 => pos.checked_sub(1),
            NodeType::Node48 | NodeType::Node256 => pos.checked_sub(1).and_then(|p| self.scan_down(p)),
        }
    }

    pub(crate) fn positions(self) -> Positions<R> {
        Positions {
            node: self,
            next: self.first_pos(),
        }
    }

    /// Keys stored under the slot at `pos`.
    pub(crate) fn count_at(self, pos: usize) -> u64 {
        match self.slot_at_pos(pos) {
            Slot::Child(child) => child.recursive_count(),
            Slot::Value(_) => 1,
            Slot::Empty => 0,
        }
    }

    pub(crate) fn child_nodes(self) -> impl Iterator<Item = NodePtr<R>> {
        self.positions().filter_map(move |pos| match self.slot_at_pos(pos) {
            Slot::Child(child) => Some(child),
            _ => None,
        })
    }

    pub(crate) fn entries(self) -> Entries {
        self.positions()
            .map(|pos| (self.pos_byte(pos), self.raw_slot(self.pos_slot(pos))))
            .collect()
    }

    /// Adds a child for a byte that is not present yet. The node must have
    /// room for it. Returns the child's position.
    pub(crate) fn insert_child(self, byte: u8, raw: &RawSlot) -> usize {
        let count = self.child_count();
        let ntype = self.node_type();
        debug_assert!(count < ntype.capacity());
        match ntype {
            NodeType::Leaf => unreachable!("leaf nodes have no fan-out"),
            NodeType::Node4 | NodeType::Node16 => {
                let at = if ntype == NodeType::Node4 {
                    u8_keys_find_insert_position::<4>(byte, self.keys(), count)
                } else {
                    u8_keys_find_insert_position::<16>(byte, self.keys(), count)
                };
                let keys = self.keys_mut();
                keys.copy_within(at..count, at + 1);
                keys[at] = byte;
                let width = R::SLOT_SIZE;
                let slots = self.bytes_mut(self.slots_offset(), (count + 1) * width);
                slots.copy_within(at * width..count * width, (at + 1) * width);
                self.write_raw_slot(at, raw);
                self.set_child_count(count + 1);
                at
            }
            NodeType::Node48 => {
                let Some(free) = (0..48).find(|&i| R::decode(self.slot_bytes(i)) == SlotTag::Empty)
                else {
                    unreachable!("Node48 with {count} children has no free slot")
                };
                self.write_raw_slot(free, raw);
                self.keys_mut()[byte as usize] = free as u8;
                self.set_child_count(count + 1);
                byte as usize
            }
            NodeType::Node256 => {
                self.write_raw_slot(byte as usize, raw);
                self.set_child_count(count + 1);
                byte as usize
            }
        }
    }

    /// Replaces the whole fan-out table with `entries`, which must be sorted
    /// by byte and fit the node's class. Pointers are moved, not referenced.
    pub(crate) fn write_children(self, entries: &[(u8, RawSlot)]) {
        let ntype = self.node_type();
        debug_assert!(entries.len() <= ntype.capacity());
        match ntype {
            NodeType::Leaf => {}
            NodeType::Node4 | NodeType::Node16 => {
                let keys = self.keys_mut();
                for (i, (byte, raw)) in entries.iter().enumerate() {
                    keys[i] = *byte;
                    self.write_raw_slot(i, raw);
                }
                for i in entries.len()..ntype.capacity() {
                    keys[i] = 0;
                    self.clear_slot(i);
                }
            }
            NodeType::Node48 => {
                self.keys_mut().fill(N48_ABSENT);
                for i in 0..48 {
                    self.clear_slot(i);
                }
                let keys = self.keys_mut();
                for (i, (byte, raw)) in entries.iter().enumerate() {
                    keys[*byte as usize] = i as u8;
                    self.write_raw_slot(i, raw);
                }
            }
            NodeType::Node256 => {
                for i in 0..256 {
                    self.clear_slot(i);
                }
                for (byte, raw) in entries {
                    self.write_raw_slot(*byte as usize, raw);
                }
            }
        }
        self.set_child_count(entries.len());
    }

    /// Byte-to-slot table of a Node48, for the structural checker.
    pub(crate) fn n48_table<'a>(self) -> &'a [u8] {
        debug_assert_eq!(self.node_type(), NodeType::Node48);
        self.keys()
    }

    /// Sorted key array of a Node4/Node16, for the structural checker.
    pub(crate) fn sorted_keys<'a>(self) -> &'a [u8] {
        &self.keys()[..self.child_count()]
    }
}

pub(crate) struct Positions<R> {
    node: NodePtr<R>,
    next: Option<usize>,
}

impl<R: ValueRepr> Iterator for Positions<R> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let pos = self.next?;
        self.next = self.node.next_pos(pos);
        Some(pos)
    }
}
