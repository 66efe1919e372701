//! Positioned access to a tree.
//!
//! A [`Cursor`] is a stack of node frames from the root down to one key. It
//! does not borrow the tree: every call takes the root handle the cursor was
//! created for, and the cursor checks it is still looking at the same content
//! before following any of its stored node pointers.

use crate::engine::Path;
use crate::error::{ArtError, Result};
use crate::root::RootNode;
use crate::value::{ValueRepr, VarValue};
use std::cmp::Ordering;
use tracing::trace;

/// Outcome of [`Cursor::find`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindResult {
    /// The key is present.
    Exact,
    /// Positioned on the closest smaller key sharing the prefix.
    Previous,
    /// Positioned on the closest greater key sharing the prefix.
    Next,
    /// No key with the prefix; the cursor is invalid.
    NotFound,
}

/// A position in one root handle's tree.
///
/// Any write through the handle, or through another cursor, makes the
/// cursor stale. Stale cursors report `false` from [`Cursor::is_valid`] and
/// [`ArtError::InvalidCursor`] from calls that need a position.
///
/// ```rust
/// use mvart::RootNode;
///
/// let mut tree: RootNode = RootNode::new();
/// for key in [&b"a"[..], b"ab", b"ac"] {
///     tree.insert(key, key).unwrap();
/// }
/// let mut cursor = tree.cursor();
/// assert!(cursor.find_last(&tree, b"a").unwrap());
/// assert_eq!(cursor.key(&tree).unwrap(), b"ac");
/// assert!(cursor.move_previous(&tree).unwrap());
/// assert_eq!(cursor.value(&tree).unwrap(), b"ab");
/// ```
#[derive(Clone, Debug)]
pub struct Cursor<R: ValueRepr = VarValue> {
    root_id: u64,
    stamp: u64,
    path: Path<R>,
}

// SAFETY: the stored node pointers are only followed while the caller lends
// the owning root handle, after checking the cursor is current.
unsafe impl<R: ValueRepr> Send for Cursor<R> {}

impl<R: ValueRepr> Cursor<R> {
    pub(crate) fn new(root: &RootNode<R>) -> Self {
        Self {
            root_id: root.id,
            stamp: root.stamp,
            path: Path::new(),
        }
    }

    fn check_root(&self, root: &RootNode<R>) -> Result<()> {
        if root.id != self.root_id {
            return Err(ArtError::ForeignCursor);
        }
        Ok(())
    }

    fn check_positioned(&self, root: &RootNode<R>) -> Result<()> {
        self.check_root(root)?;
        if self.stamp != root.stamp || self.path.is_empty() {
            return Err(ArtError::InvalidCursor);
        }
        Ok(())
    }

    /// Takes the root's current stamp before repositioning from scratch.
    fn rebind(&mut self, root: &RootNode<R>) -> Result<()> {
        self.check_root(root)?;
        self.stamp = root.stamp;
        Ok(())
    }

    /// Whether the cursor sits on a key of `root`'s current content.
    pub fn is_valid(&self, root: &RootNode<R>) -> bool {
        self.check_positioned(root).is_ok()
    }

    pub fn invalidate(&mut self) {
        self.path.clear();
    }

    /// Rebinds the cursor to another handle on the same content, such as the
    /// writable transaction created from the snapshot the cursor was on.
    pub fn set_new_root(&mut self, root: &RootNode<R>) -> Result<()> {
        if root.stamp != self.stamp {
            return Err(ArtError::RootMismatch);
        }
        self.root_id = root.id;
        Ok(())
    }

    pub fn find_exact(&mut self, root: &RootNode<R>, key: &[u8]) -> Result<bool> {
        self.rebind(root)?;
        Ok(root.engine().find_exact(root.node, &mut self.path, key))
    }

    /// Looks up `key_prefix ++ key`, falling back to the nearest key that
    /// still starts with `key_prefix`.
    pub fn find(&mut self, root: &RootNode<R>, key_prefix: &[u8], key: &[u8]) -> Result<FindResult> {
        self.rebind(root)?;
        Ok(root.engine().find(root.node, &mut self.path, key_prefix, key))
    }

    /// Smallest key starting with `prefix`.
    pub fn find_first(&mut self, root: &RootNode<R>, prefix: &[u8]) -> Result<bool> {
        self.rebind(root)?;
        Ok(root.engine().find_first(root.node, &mut self.path, prefix))
    }

    /// Greatest key starting with `prefix`.
    pub fn find_last(&mut self, root: &RootNode<R>, prefix: &[u8]) -> Result<bool> {
        self.rebind(root)?;
        Ok(root.engine().find_last(root.node, &mut self.path, prefix))
    }

    /// First key not less than `key`.
    pub fn seek(&mut self, root: &RootNode<R>, key: &[u8]) -> Result<bool> {
        self.rebind(root)?;
        Ok(root.engine().seek_ge(root.node, &mut self.path, key).is_some())
    }

    /// Key of rank `index` (zero-based).
    pub fn seek_index(&mut self, root: &RootNode<R>, index: u64) -> Result<bool> {
        self.rebind(root)?;
        Ok(root.engine().seek_index(root.node, &mut self.path, index))
    }

    /// Returns false, leaving the cursor invalid, past the last key.
    pub fn move_next(&mut self, root: &RootNode<R>) -> Result<bool> {
        self.check_positioned(root)?;
        Ok(root.engine().move_next(&mut self.path))
    }

    /// Returns false, leaving the cursor invalid, before the first key.
    pub fn move_previous(&mut self, root: &RootNode<R>) -> Result<bool> {
        self.check_positioned(root)?;
        Ok(root.engine().move_previous(&mut self.path))
    }

    /// Rank of the current key.
    pub fn calc_index(&self, root: &RootNode<R>) -> Result<u64> {
        self.check_positioned(root)?;
        Ok(root.engine().calc_index(&self.path))
    }

    pub fn key_len(&self, root: &RootNode<R>) -> Result<usize> {
        self.check_positioned(root)?;
        Ok(root.engine().key_len(&self.path))
    }

    /// Writes the current key into `key`, replacing its contents.
    pub fn fill_key(&self, root: &RootNode<R>, key: &mut Vec<u8>) -> Result<()> {
        self.check_positioned(root)?;
        root.engine().fill_key(&self.path, key);
        Ok(())
    }

    pub fn key(&self, root: &RootNode<R>) -> Result<Vec<u8>> {
        let mut key = Vec::new();
        self.fill_key(root, &mut key)?;
        Ok(key)
    }

    pub fn key_has_prefix(&self, root: &RootNode<R>, prefix: &[u8]) -> Result<bool> {
        self.check_positioned(root)?;
        Ok(root.engine().key_has_prefix(&self.path, prefix))
    }

    pub fn value<'a>(&self, root: &'a RootNode<R>) -> Result<&'a [u8]> {
        self.check_positioned(root)?;
        Ok(root.engine().value(&self.path))
    }

    /// Replaces the current key's value. The cursor stays on the key.
    pub fn write_value(&mut self, root: &mut RootNode<R>, value: &[u8]) -> Result<()> {
        self.check_positioned(root)?;
        let key = self.key(root)?;
        root.check_write(&key, value)?;
        let (engine, node) = root.parts_mut();
        engine.upsert(node, &mut self.path, &key, value);
        root.after_write();
        self.stamp = root.stamp;
        Ok(())
    }

    /// Inserts or overwrites `key` and leaves the cursor on it. Returns true
    /// when the key is new.
    pub fn upsert(&mut self, root: &mut RootNode<R>, key: &[u8], value: &[u8]) -> Result<bool> {
        self.check_root(root)?;
        root.check_write(key, value)?;
        let (engine, node) = root.parts_mut();
        let added = engine.upsert(node, &mut self.path, key, value);
        root.after_write();
        self.stamp = root.stamp;
        Ok(added)
    }

    /// Removes the current key. The cursor is invalid afterwards.
    pub fn erase(&mut self, root: &mut RootNode<R>) -> Result<()> {
        self.check_positioned(root)?;
        root.check_writable()?;
        let mut right = self.path.clone();
        let (engine, node) = root.parts_mut();
        engine.erase_range(node, self.path.as_mut_slice(), right.as_mut_slice());
        self.path.clear();
        root.after_write();
        Ok(())
    }

    /// Removes every key between this cursor and `other`, both included and
    /// in either order. Returns the number of keys removed; both cursors are
    /// invalid afterwards.
    pub fn erase_to(&mut self, root: &mut RootNode<R>, other: &mut Cursor<R>) -> Result<u64> {
        self.check_root(root)?;
        if other.root_id != self.root_id {
            return Err(ArtError::CursorMismatch);
        }
        self.check_positioned(root)?;
        other.check_positioned(root)?;
        root.check_writable()?;
        let order = self.key(root)?.cmp(&other.key(root)?);
        let (left, right) = match order {
            Ordering::Greater => (&mut other.path, &mut self.path),
            Ordering::Less | Ordering::Equal => (&mut self.path, &mut other.path),
        };
        let (engine, node) = root.parts_mut();
        let removed = engine.erase_range(node, left.as_mut_slice(), right.as_mut_slice());
        trace!(removed, "erased key range");
        self.path.clear();
        other.path.clear();
        root.after_write();
        Ok(removed)
    }
}
