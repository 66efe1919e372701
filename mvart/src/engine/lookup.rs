use super::{CursorItem, Engine, Path};
use crate::cursor::FindResult;
use crate::node::{NodePtr, Slot};
use crate::utils::prefix::common_prefix_len;
use crate::value::ValueRepr;
use smallvec::SmallVec;

impl<R: ValueRepr> Engine<'_, R> {
    /// Positions `path` on `key`. Leaves it empty when the key is absent.
    pub(crate) fn find_exact(
        &self,
        root: Option<NodePtr<R>>,
        path: &mut Path<R>,
        key: &[u8],
    ) -> bool {
        path.clear();
        let Some(mut node) = root else {
            return false;
        };
        let mut start = 0;
        loop {
            let prefix = node.prefix();
            if common_prefix_len(prefix, &key[start..]) != prefix.len() {
                break;
            }
            let depth = start + prefix.len();
            if depth == key.len() {
                if node.is_leaf() {
                    path.push(CursorItem::own_value(node, depth));
                    return true;
                }
                break;
            }
            let byte = key[depth];
            let Some(pos) = node.find_pos(byte) else {
                break;
            };
            path.push(CursorItem::child(node, depth, pos, byte));
            match node.slot_at_pos(pos) {
                Slot::Child(child) => {
                    node = child;
                    start = depth + 1;
                }
                Slot::Value(_) if depth + 1 == key.len() => return true,
                _ => break,
            }
        }
        path.clear();
        false
    }

    /// Positions `path` on the first key that is not less than `probe`.
    /// `Some(true)` on an exact hit, `Some(false)` on a greater key, `None`
    /// (and an empty path) when every key is smaller.
    pub(crate) fn seek_ge(
        &self,
        root: Option<NodePtr<R>>,
        path: &mut Path<R>,
        probe: &[u8],
    ) -> Option<bool> {
        path.clear();
        let mut node = root?;
        let mut start = 0;
        loop {
            let prefix = node.prefix();
            let rest = &probe[start..];
            let common = common_prefix_len(prefix, rest);
            if common < prefix.len() {
                // The probe leaves this subtree at byte `common` of the prefix.
                if common == rest.len() || rest[common] < prefix[common] {
                    self.push_leftmost(path, node, start);
                    return Some(false);
                }
                self.push_rightmost(path, node, start);
                return self.move_next(path).then_some(false);
            }
            let depth = start + prefix.len();
            if depth == probe.len() {
                if node.is_leaf() {
                    path.push(CursorItem::own_value(node, depth));
                    return Some(true);
                }
                self.push_leftmost(path, node, start);
                return Some(false);
            }
            let byte = probe[depth];
            if let Some(pos) = node.find_pos(byte) {
                path.push(CursorItem::child(node, depth, pos, byte));
                match node.slot_at_pos(pos) {
                    Slot::Child(child) => {
                        node = child;
                        start = depth + 1;
                        continue;
                    }
                    _ if depth + 1 == probe.len() => return Some(true),
                    _ => return self.move_next(path).then_some(false),
                }
            }
            return match node.pos_after(byte) {
                Some(pos) => {
                    self.push_at(path, node, depth, pos, true);
                    Some(false)
                }
                None => {
                    self.push_rightmost(path, node, start);
                    self.move_next(path).then_some(false)
                }
            };
        }
    }

    /// Nearest key to `key_prefix ++ key` that still starts with
    /// `key_prefix`. The side is taken from the byte where the descent stops;
    /// the other neighbour is only tried when that key lacks the prefix.
    pub(crate) fn find(
        &self,
        root: Option<NodePtr<R>>,
        path: &mut Path<R>,
        key_prefix: &[u8],
        key: &[u8],
    ) -> FindResult {
        let mut probe: SmallVec<[u8; 64]> = SmallVec::with_capacity(key_prefix.len() + key.len());
        probe.extend_from_slice(key_prefix);
        probe.extend_from_slice(key);
        let landed = match self.seek_nearest(root, path, &probe) {
            Some(FindResult::Exact) => return FindResult::Exact,
            Some(landed) => landed,
            None => return FindResult::NotFound,
        };
        if self.key_has_prefix(path, key_prefix) {
            return landed;
        }
        let (moved, other) = if landed == FindResult::Next {
            (self.move_previous(path), FindResult::Previous)
        } else {
            (self.move_next(path), FindResult::Next)
        };
        if moved && self.key_has_prefix(path, key_prefix) {
            return other;
        }
        path.clear();
        FindResult::NotFound
    }

    /// Descends towards `probe` and lands beside the point where it leaves
    /// the tree: on the subtree's leftmost key (`Next`) when the probe sorts
    /// before it, on the rightmost key (`Previous`) otherwise.
    fn seek_nearest(
        &self,
        root: Option<NodePtr<R>>,
        path: &mut Path<R>,
        probe: &[u8],
    ) -> Option<FindResult> {
        path.clear();
        let mut node = root?;
        let mut start = 0;
        loop {
            let prefix = node.prefix();
            let rest = &probe[start..];
            let common = common_prefix_len(prefix, rest);
            if common < prefix.len() {
                if common == rest.len() || rest[common] < prefix[common] {
                    self.push_leftmost(path, node, start);
                    return Some(FindResult::Next);
                }
                self.push_rightmost(path, node, start);
                return Some(FindResult::Previous);
            }
            let depth = start + prefix.len();
            if depth == probe.len() {
                if node.is_leaf() {
                    path.push(CursorItem::own_value(node, depth));
                    return Some(FindResult::Exact);
                }
                self.push_leftmost(path, node, start);
                return Some(FindResult::Next);
            }
            let byte = probe[depth];
            if let Some(pos) = node.find_pos(byte) {
                path.push(CursorItem::child(node, depth, pos, byte));
                match node.slot_at_pos(pos) {
                    Slot::Child(child) => {
                        node = child;
                        start = depth + 1;
                        continue;
                    }
                    _ if depth + 1 == probe.len() => return Some(FindResult::Exact),
                    // An inline value whose key is a proper prefix of the probe.
                    _ => return Some(FindResult::Previous),
                }
            }
            return Some(match node.pos_after(byte) {
                Some(pos) => {
                    self.push_at(path, node, depth, pos, true);
                    FindResult::Next
                }
                None => {
                    self.push_rightmost(path, node, start);
                    FindResult::Previous
                }
            });
        }
    }

    pub(crate) fn find_first(
        &self,
        root: Option<NodePtr<R>>,
        path: &mut Path<R>,
        prefix: &[u8],
    ) -> bool {
        self.find_edge(root, path, prefix, true)
    }

    pub(crate) fn find_last(
        &self,
        root: Option<NodePtr<R>>,
        path: &mut Path<R>,
        prefix: &[u8],
    ) -> bool {
        self.find_edge(root, path, prefix, false)
    }

    fn find_edge(
        &self,
        root: Option<NodePtr<R>>,
        path: &mut Path<R>,
        prefix: &[u8],
        leftmost: bool,
    ) -> bool {
        path.clear();
        let Some(mut node) = root else {
            return false;
        };
        let mut start = 0;
        loop {
            let node_prefix = node.prefix();
            let rest = &prefix[start..];
            let common = common_prefix_len(node_prefix, rest);
            if common == rest.len() {
                // Every key below this node carries the whole prefix.
                if leftmost {
                    self.push_leftmost(path, node, start);
                } else {
                    self.push_rightmost(path, node, start);
                }
                return true;
            }
            if common < node_prefix.len() {
                break;
            }
            let depth = start + node_prefix.len();
            let byte = prefix[depth];
            let Some(pos) = node.find_pos(byte) else {
                break;
            };
            path.push(CursorItem::child(node, depth, pos, byte));
            match node.slot_at_pos(pos) {
                Slot::Child(child) => {
                    node = child;
                    start = depth + 1;
                }
                Slot::Value(_) if depth + 1 == prefix.len() => return true,
                _ => break,
            }
        }
        path.clear();
        false
    }

    fn push_at(&self, path: &mut Path<R>, node: NodePtr<R>, depth: usize, pos: usize, leftmost: bool) {
        path.push(CursorItem::child(node, depth, pos, node.pos_byte(pos)));
        if let Slot::Child(child) = node.slot_at_pos(pos) {
            if leftmost {
                self.push_leftmost(path, child, depth + 1);
            } else {
                self.push_rightmost(path, child, depth + 1);
            }
        }
    }

    /// Descends from `node`, whose prefix starts at key offset `start`, to
    /// the smallest key below it.
    pub(crate) fn push_leftmost(&self, path: &mut Path<R>, mut node: NodePtr<R>, mut start: usize) {
        loop {
            let depth = start + node.prefix_len();
            if node.is_leaf() {
                path.push(CursorItem::own_value(node, depth));
                return;
            }
            let Some(pos) = node.first_pos() else {
                unreachable!("branch node without children")
            };
            path.push(CursorItem::child(node, depth, pos, node.pos_byte(pos)));
            match node.slot_at_pos(pos) {
                Slot::Child(child) => {
                    node = child;
                    start = depth + 1;
                }
                _ => return,
            }
        }
    }

    /// Descends from `node` to the greatest key below it.
    pub(crate) fn push_rightmost(&self, path: &mut Path<R>, mut node: NodePtr<R>, mut start: usize) {
        loop {
            let depth = start + node.prefix_len();
            let Some(pos) = node.last_pos() else {
                debug_assert!(node.is_leaf());
                path.push(CursorItem::own_value(node, depth));
                return;
            };
            path.push(CursorItem::child(node, depth, pos, node.pos_byte(pos)));
            match node.slot_at_pos(pos) {
                Slot::Child(child) => {
                    node = child;
                    start = depth + 1;
                }
                _ => return,
            }
        }
    }

    /// Steps to the next key in order. An exhausted path ends up empty.
    pub(crate) fn move_next(&self, path: &mut Path<R>) -> bool {
        while let Some(top) = path.top_mut() {
            let node = top.node;
            let next = match top.position() {
                None => node.first_pos(),
                Some(pos) => node.next_pos(pos),
            };
            if let Some(pos) = next {
                let depth = top.key_len;
                top.pos = pos as i16;
                top.byte = node.pos_byte(pos) as i16;
                if let Slot::Child(child) = node.slot_at_pos(pos) {
                    self.push_leftmost(path, child, depth + 1);
                }
                return true;
            }
            path.pop();
        }
        false
    }

    /// Steps to the previous key in order. An exhausted path ends up empty.
    pub(crate) fn move_previous(&self, path: &mut Path<R>) -> bool {
        while let Some(top) = path.top_mut() {
            let node = top.node;
            if let Some(pos) = top.position() {
                if let Some(prev) = node.prev_pos(pos) {
                    let depth = top.key_len;
                    top.pos = prev as i16;
                    top.byte = node.pos_byte(prev) as i16;
                    if let Slot::Child(child) = node.slot_at_pos(prev) {
                        self.push_rightmost(path, child, depth + 1);
                    }
                    return true;
                }
                if node.is_leaf() {
                    // The node's own value sorts before all of its children.
                    top.pos = -1;
                    top.byte = -1;
                    return true;
                }
            }
            path.pop();
        }
        false
    }

    pub(crate) fn key_len(&self, path: &Path<R>) -> usize {
        path.top()
            .map_or(0, |top| top.key_len + usize::from(top.pos >= 0))
    }

    pub(crate) fn fill_key(&self, path: &Path<R>, key: &mut Vec<u8>) {
        key.clear();
        key.reserve(self.key_len(path));
        for item in path.iter() {
            key.extend_from_slice(item.node.prefix());
            if item.pos >= 0 {
                key.push(item.byte as u8);
            }
        }
    }

    pub(crate) fn key_has_prefix(&self, path: &Path<R>, prefix: &[u8]) -> bool {
        let mut matched = 0;
        for item in path.iter() {
            if matched == prefix.len() {
                return true;
            }
            let node_prefix = item.node.prefix();
            let take = node_prefix.len().min(prefix.len() - matched);
            if node_prefix[..take] != prefix[matched..matched + take] {
                return false;
            }
            matched += take;
            if matched < prefix.len() && item.pos >= 0 {
                if item.byte as u8 != prefix[matched] {
                    return false;
                }
                matched += 1;
            }
        }
        matched == prefix.len()
    }

    /// Value of the key `path` is positioned on.
    pub(crate) fn value<'v>(&self, path: &Path<R>) -> &'v [u8] {
        let Some(top) = path.top() else {
            return &[];
        };
        match top.position() {
            None => top.node.value(),
            Some(pos) => match top.node.slot_at_pos(pos) {
                Slot::Value(value) => value,
                _ => unreachable!("cursor path ends on a child pointer"),
            },
        }
    }

    /// Zero-based rank of the key `path` is positioned on.
    pub(crate) fn calc_index(&self, path: &Path<R>) -> u64 {
        let mut index = 0;
        for item in path.iter() {
            let Some(target) = item.position() else {
                break;
            };
            let node = item.node;
            if node.is_leaf() {
                index += 1;
            }
            let mut pos = node.first_pos();
            while let Some(p) = pos {
                if p == target {
                    break;
                }
                index += node.count_at(p);
                pos = node.next_pos(p);
            }
        }
        index
    }

    /// Positions `path` on the key of rank `index`.
    pub(crate) fn seek_index(
        &self,
        root: Option<NodePtr<R>>,
        path: &mut Path<R>,
        index: u64,
    ) -> bool {
        path.clear();
        let Some(mut node) = root else {
            return false;
        };
        if index >= node.recursive_count() {
            return false;
        }
        let mut remaining = index;
        let mut start = 0;
        loop {
            let depth = start + node.prefix_len();
            if node.is_leaf() {
                if remaining == 0 {
                    path.push(CursorItem::own_value(node, depth));
                    return true;
                }
                remaining -= 1;
            }
            let mut found = None;
            for pos in node.positions() {
                let count = node.count_at(pos);
                if remaining < count {
                    found = Some(pos);
                    break;
                }
                remaining -= count;
            }
            let Some(pos) = found else {
                unreachable!("recursive child count out of sync with children")
            };
            path.push(CursorItem::child(node, depth, pos, node.pos_byte(pos)));
            match node.slot_at_pos(pos) {
                Slot::Child(child) => {
                    node = child;
                    start = depth + 1;
                }
                _ => return true,
            }
        }
    }
}
