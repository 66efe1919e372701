use crate::engine::{Engine, Path};
use crate::root::RootNode;
use crate::value::{ValueRepr, VarValue};

/// Pairs of a tree in key order, from both ends.
///
/// Holds one path per end and the number of keys left between them, taken
/// from the ranks of both ends up front.
pub struct Iter<'a, R: ValueRepr = VarValue> {
    engine: Engine<'a, R>,
    front: Path<R>,
    back: Path<R>,
    remaining: u64,
}

impl<'a, R: ValueRepr> Iter<'a, R> {
    pub(crate) fn with_prefix(root: &'a RootNode<R>, prefix: &[u8]) -> Self {
        let engine = root.engine();
        let mut front = Path::new();
        let mut back = Path::new();
        if engine.find_first(root.node, &mut front, prefix) {
            engine.find_last(root.node, &mut back, prefix);
        }
        Self::between(engine, front, back)
    }

    /// Iterates from `front` through `back`, both included. Either path may
    /// be empty, and `front` may sort after `back`; both give an empty
    /// iterator.
    pub(crate) fn between(engine: Engine<'a, R>, front: Path<R>, back: Path<R>) -> Self {
        let remaining = if front.is_empty() || back.is_empty() {
            0
        } else {
            let first = engine.calc_index(&front);
            let last = engine.calc_index(&back);
            if first > last { 0 } else { last - first + 1 }
        };
        Self {
            engine,
            front,
            back,
            remaining,
        }
    }

    fn entry(&self, path: &Path<R>) -> (Vec<u8>, &'a [u8]) {
        let mut key = Vec::new();
        self.engine.fill_key(path, &mut key);
        (key, self.engine.value(path))
    }
}

impl<'a, R: ValueRepr> Iterator for Iter<'a, R> {
    type Item = (Vec<u8>, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let entry = self.entry(&self.front);
        self.remaining -= 1;
        if self.remaining > 0 {
            self.engine.move_next(&mut self.front);
        }
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (len, Some(len))
    }
}

impl<R: ValueRepr> DoubleEndedIterator for Iter<'_, R> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let entry = self.entry(&self.back);
        self.remaining -= 1;
        if self.remaining > 0 {
            self.engine.move_previous(&mut self.back);
        }
        Some(entry)
    }
}

impl<R: ValueRepr> ExactSizeIterator for Iter<'_, R> {}

#[cfg(test)]
mod tests {
    use crate::RootNode;

    #[test]
    fn prefix_and_reverse() {
        let mut tree: RootNode = RootNode::new();
        for key in ["car", "cart", "carton", "cat", "dog", ""] {
            tree.insert(key.as_bytes(), key.as_bytes()).unwrap();
        }
        let all: Vec<_> = tree.iter().map(|(k, _)| String::from_utf8(k).unwrap()).collect();
        assert_eq!(all, vec!["", "car", "cart", "carton", "cat", "dog"]);

        let cars: Vec<_> = tree.prefix_iter(b"car").rev().map(|(k, v)| {
            assert_eq!(k, v);
            String::from_utf8(k).unwrap()
        }).collect();
        assert_eq!(cars, vec!["carton", "cart", "car"]);

        let mut both = tree.prefix_iter(b"ca");
        assert_eq!(both.len(), 4);
        assert_eq!(both.next().map(|(k, _)| k), Some(b"car".to_vec()));
        assert_eq!(both.next_back().map(|(k, _)| k), Some(b"cat".to_vec()));
        assert_eq!(both.next().map(|(k, _)| k), Some(b"cart".to_vec()));
        assert_eq!(both.next_back().map(|(k, _)| k), Some(b"carton".to_vec()));
        assert_eq!(both.next(), None);
        assert_eq!(both.next_back(), None);

        assert_eq!(tree.prefix_iter(b"x").count(), 0);
        assert_eq!(RootNode::<crate::VarValue>::new().iter().count(), 0);
    }
}
