//! Versioned root handles.
//!
//! A [`RootNode`] owns one reference to a tree root. Snapshots are cheap: a
//! new handle takes another reference to the same root node, and the first
//! write through either handle copies only the nodes on the path it touches.

use crate::config::TreeOptions;
use crate::cursor::Cursor;
use crate::engine::{CheckMode, Engine, Path};
use crate::error::{ArtError, Result};
use crate::iter::Iter;
use crate::node::{MAX_PREFIX_LEN, NodePtr};
use crate::range::Range;
use crate::value::{ValueRepr, VarValue};
use smallvec::SmallVec;
use std::fmt;
use std::ops::RangeBounds;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Longest key the tree accepts.
pub const MAX_KEY_LEN: usize = MAX_PREFIX_LEN;

static NEXT_ROOT_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_STAMP: AtomicU64 = AtomicU64::new(1);

fn next_root_id() -> u64 {
    NEXT_ROOT_ID.fetch_add(1, Ordering::Relaxed)
}

fn next_stamp() -> u64 {
    NEXT_STAMP.fetch_add(1, Ordering::Relaxed)
}

/// A handle on one version of a tree.
///
/// Handles created with [`RootNode::new`] and by
/// [`RootNode::create_writable_transaction`] are writable; snapshots are
/// read-only. Dropping a handle releases its reference to the root node.
///
/// ```rust
/// use mvart::RootNode;
///
/// let mut tree: RootNode = RootNode::new();
/// tree.insert(b"key1", b"value1").unwrap();
///
/// let snapshot = tree.snapshot();
/// tree.insert(b"key2", b"value2").unwrap();
///
/// assert_eq!(snapshot.len(), 1);
/// assert_eq!(tree.len(), 2);
/// assert_eq!(snapshot.get(b"key2"), None);
/// ```
pub struct RootNode<R: ValueRepr = VarValue> {
    pub(crate) id: u64,
    pub(crate) stamp: u64,
    pub(crate) node: Option<NodePtr<R>>,
    writable: bool,
    generation: u64,
    aux: SmallVec<[u64; 4]>,
    options: TreeOptions,
}

// SAFETY: nodes reachable from more than one handle are never written, and
// their reference counts are atomic. Writes need `&mut RootNode`.
unsafe impl<R: ValueRepr> Send for RootNode<R> {}
unsafe impl<R: ValueRepr> Sync for RootNode<R> {}

impl<R: ValueRepr> Default for RootNode<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ValueRepr> RootNode<R> {
    /// Empty writable tree on the global heap.
    pub fn new() -> Self {
        Self::with_options(TreeOptions::default())
    }

    pub fn with_options(options: TreeOptions) -> Self {
        Self {
            id: next_root_id(),
            stamp: next_stamp(),
            node: None,
            writable: true,
            generation: 0,
            aux: SmallVec::new(),
            options,
        }
    }

    pub(crate) fn engine(&self) -> Engine<'_, R> {
        Engine::new(&*self.options.allocator)
    }

    /// Engine and root slot borrowed at the same time, for writers.
    pub(crate) fn parts_mut(&mut self) -> (Engine<'_, R>, &mut Option<NodePtr<R>>) {
        (Engine::new(&*self.options.allocator), &mut self.node)
    }

    /// An unpositioned cursor bound to this handle.
    pub fn cursor(&self) -> Cursor<R> {
        Cursor::new(self)
    }

    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    /// Read-only handle on the current contents. Bumps this handle's
    /// generation so later writes are told apart from the snapshot.
    pub fn snapshot(&mut self) -> RootNode<R> {
        if let Some(node) = self.node {
            node.add_ref();
        }
        let snapshot = RootNode {
            id: next_root_id(),
            stamp: self.stamp,
            node: self.node,
            writable: false,
            generation: self.generation,
            aux: self.aux.clone(),
            options: self.options.clone(),
        };
        self.generation += 1;
        debug!(generation = snapshot.generation, len = snapshot.len(), "snapshot taken");
        snapshot
    }

    /// Writable handle starting from this handle's contents.
    pub fn create_writable_transaction(&self) -> Result<RootNode<R>> {
        if self.writable {
            return Err(ArtError::AlreadyWritable);
        }
        if let Some(node) = self.node {
            node.add_ref();
        }
        let transaction = RootNode {
            id: next_root_id(),
            stamp: self.stamp,
            node: self.node,
            writable: true,
            generation: self.generation + 1,
            aux: self.aux.clone(),
            options: self.options.clone(),
        };
        debug!(generation = transaction.generation, "writable transaction created");
        Ok(transaction)
    }

    /// Ends the transaction; the handle is read-only from here on.
    pub fn commit(&mut self) -> Result<()> {
        self.check_writable()?;
        self.writable = false;
        debug!(generation = self.generation, len = self.len(), "transaction committed");
        Ok(())
    }

    /// Throws away everything written since `snapshot` was taken.
    pub fn revert_to(&mut self, snapshot: &RootNode<R>) -> Result<()> {
        self.check_writable()?;
        if !self.options.same_allocator(&snapshot.options) {
            return Err(ArtError::RootMismatch);
        }
        if let Some(node) = snapshot.node {
            node.add_ref();
        }
        let (engine, root) = self.parts_mut();
        if let Some(old) = std::mem::replace(root, snapshot.node) {
            engine.release(old);
        }
        self.stamp = snapshot.stamp;
        self.generation = snapshot.generation;
        self.aux = snapshot.aux.clone();
        debug!(generation = self.generation, len = self.len(), "reverted to snapshot");
        Ok(())
    }

    /// Number of keys.
    pub fn len(&self) -> u64 {
        self.node.map_or(0, NodePtr::recursive_count)
    }

    pub fn is_empty(&self) -> bool {
        self.node.is_none()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Auxiliary counter `idx`; counters never set read as zero.
    pub fn aux_counter(&self, idx: usize) -> u64 {
        self.aux.get(idx).copied().unwrap_or(0)
    }

    pub fn set_aux_counter(&mut self, idx: usize, value: u64) -> Result<()> {
        self.check_writable()?;
        if idx >= self.aux.len() {
            self.aux.resize(idx + 1, 0);
        }
        self.aux[idx] = value;
        Ok(())
    }

    pub fn aux_counter_count(&self) -> usize {
        self.aux.len()
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        let engine = self.engine();
        let mut path = Path::new();
        engine
            .find_exact(self.node, &mut path, key)
            .then(|| engine.value(&path))
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.engine().find_exact(self.node, &mut Path::new(), key)
    }

    /// Inserts or overwrites `key`. Returns true when the key is new.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<bool> {
        self.check_write(key, value)?;
        let (engine, root) = self.parts_mut();
        let added = engine.upsert(root, &mut Path::new(), key, value);
        self.after_write();
        Ok(added)
    }

    /// Removes `key`. Returns true when it was present.
    pub fn remove(&mut self, key: &[u8]) -> Result<bool> {
        self.check_writable()?;
        let (engine, root) = self.parts_mut();
        let mut left = Path::new();
        if !engine.find_exact(*root, &mut left, key) {
            return Ok(false);
        }
        let mut right = left.clone();
        engine.erase_range(root, left.as_mut_slice(), right.as_mut_slice());
        self.after_write();
        Ok(true)
    }

    /// Removes every key starting with `prefix`. Returns how many went.
    pub fn remove_prefix(&mut self, prefix: &[u8]) -> Result<u64> {
        self.check_writable()?;
        let (engine, root) = self.parts_mut();
        let mut left = Path::new();
        let mut right = Path::new();
        if !engine.find_first(*root, &mut left, prefix) {
            return Ok(0);
        }
        engine.find_last(*root, &mut right, prefix);
        let removed = engine.erase_range(root, left.as_mut_slice(), right.as_mut_slice());
        self.after_write();
        Ok(removed)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.check_writable()?;
        let (engine, root) = self.parts_mut();
        if let Some(node) = root.take() {
            engine.release(node);
        }
        self.after_write();
        Ok(())
    }

    /// Every pair in key order.
    pub fn iter(&self) -> Iter<'_, R> {
        Iter::with_prefix(self, &[])
    }

    /// Every pair whose key starts with `prefix`, in key order.
    pub fn prefix_iter(&self, prefix: &[u8]) -> Iter<'_, R> {
        Iter::with_prefix(self, prefix)
    }

    pub fn range<K, B>(&self, bounds: B) -> Range<'_, R>
    where
        K: AsRef<[u8]>,
        B: RangeBounds<K>,
    {
        Range::new(self, bounds)
    }

    /// Verifies the structure below this handle. Reference counts may be
    /// higher than what this handle accounts for, as other handles can share
    /// its nodes.
    pub fn validate(&self) -> Result<()> {
        self.engine().check(&[self.node], CheckMode::AtLeast)
    }

    /// Verifies a set of handles that together own every node they reach,
    /// with exact reference counts.
    pub fn validate_shared(handles: &[&RootNode<R>]) -> Result<()> {
        let Some(first) = handles.first() else {
            return Ok(());
        };
        if handles
            .iter()
            .any(|handle| !handle.options.same_allocator(&first.options))
        {
            return Err(ArtError::RootMismatch);
        }
        let roots: Vec<_> = handles.iter().map(|handle| handle.node).collect();
        first.engine().check(&roots, CheckMode::Exact)
    }

    pub(crate) fn check_writable(&self) -> Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(ArtError::ReadOnly)
        }
    }

    pub(crate) fn check_write(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_writable()?;
        if key.len() > MAX_KEY_LEN {
            return Err(ArtError::KeyTooLong { len: key.len() });
        }
        R::check_value(value)
    }

    /// Moves the handle to a new content stamp, which makes every cursor
    /// positioned before the write stale.
    pub(crate) fn after_write(&mut self) {
        self.stamp = next_stamp();
        if self.options.check_mutations
            && let Err(err) = self.validate()
        {
            panic!("tree check failed after mutation: {err}");
        }
    }
}

impl<R: ValueRepr> Drop for RootNode<R> {
    fn drop(&mut self) {
        let (engine, root) = self.parts_mut();
        if let Some(node) = root.take() {
            engine.release(node);
        }
    }
}

impl<R: ValueRepr> fmt::Debug for RootNode<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootNode")
            .field("id", &self.id)
            .field("len", &self.len())
            .field("writable", &self.writable)
            .field("generation", &self.generation)
            .field("aux", &self.aux)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::CountingAllocator;
    use crate::value::Value12;
    use std::sync::Arc;

    fn counting() -> (Arc<CountingAllocator>, TreeOptions) {
        let alloc = Arc::new(CountingAllocator::new());
        let options = TreeOptions::new()
            .with_allocator(alloc.clone())
            .check_mutations(true);
        (alloc, options)
    }

    #[test]
    fn map_operations() {
        let (alloc, options) = counting();
        let mut tree = RootNode::<VarValue>::with_options(options);
        assert!(tree.is_empty());
        assert!(tree.insert(b"hello", b"world").unwrap());
        assert!(tree.insert(b"help", b"me").unwrap());
        assert!(!tree.insert(b"hello", b"there, general").unwrap());
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.get(b"hello"), Some(&b"there, general"[..]));
        assert_eq!(tree.get(b"hel"), None);
        assert!(tree.contains_key(b"help"));

        assert!(tree.remove(b"help").unwrap());
        assert!(!tree.remove(b"help").unwrap());
        assert_eq!(tree.len(), 1);

        for i in 0..10u8 {
            tree.insert(&[b'p', i], &[i]).unwrap();
        }
        assert_eq!(tree.remove_prefix(b"p").unwrap(), 10);
        assert_eq!(tree.remove_prefix(b"p").unwrap(), 0);
        assert_eq!(tree.len(), 1);
        tree.clear().unwrap();
        assert!(tree.is_empty());
        drop(tree);
        assert_eq!(alloc.live_blocks(), 0);
    }

    #[test]
    fn snapshot_and_transactions() {
        let (alloc, options) = counting();
        let mut tree = RootNode::<VarValue>::with_options(options);
        tree.insert(b"a", b"1").unwrap();
        tree.set_aux_counter(2, 7).unwrap();
        let mut snapshot = tree.snapshot();
        assert_eq!(snapshot.generation(), 0);
        assert_eq!(tree.generation(), 1);
        assert_eq!(snapshot.insert(b"b", b"2"), Err(ArtError::ReadOnly));
        assert_eq!(snapshot.set_aux_counter(0, 1), Err(ArtError::ReadOnly));
        assert_eq!(snapshot.aux_counter(2), 7);
        assert_eq!(snapshot.aux_counter(9), 0);

        tree.insert(b"b", b"2").unwrap();
        tree.set_aux_counter(2, 8).unwrap();
        RootNode::validate_shared(&[&tree, &snapshot]).unwrap();
        assert_eq!(snapshot.len(), 1);

        let mut txn = snapshot.create_writable_transaction().unwrap();
        assert_eq!(txn.generation(), 1);
        assert_eq!(
            tree.create_writable_transaction().unwrap_err(),
            ArtError::AlreadyWritable
        );
        txn.insert(b"c", b"3").unwrap();
        RootNode::validate_shared(&[&tree, &snapshot, &txn]).unwrap();
        txn.commit().unwrap();
        assert_eq!(txn.commit(), Err(ArtError::ReadOnly));
        assert!(!txn.is_writable());

        tree.revert_to(&snapshot).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.aux_counter(2), 7);
        assert_eq!(tree.get(b"b"), None);
        tree.insert(b"z", b"26").unwrap();
        assert_eq!(snapshot.get(b"z"), None);

        drop(txn);
        drop(snapshot);
        RootNode::validate_shared(&[&tree]).unwrap();
        drop(tree);
        assert_eq!(alloc.live_blocks(), 0);
    }

    #[test]
    fn revert_needs_same_allocator() {
        let mut tree = RootNode::<VarValue>::new();
        let (_, options) = counting();
        let mut other = RootNode::<VarValue>::with_options(options);
        let snapshot = other.snapshot();
        assert_eq!(tree.revert_to(&snapshot), Err(ArtError::RootMismatch));
    }

    #[test]
    fn fixed_values_are_checked() {
        let mut tree = RootNode::<Value12>::new();
        assert_eq!(
            tree.insert(b"k", b"short"),
            Err(ArtError::InvalidValue("fixed values must be exactly 12 bytes"))
        );
        assert!(tree.insert(b"k", &[1; 12]).unwrap());
        assert_eq!(tree.get(b"k"), Some(&[1u8; 12][..]));
    }
}
