use std::ops::{Bound, RangeBounds};

use crate::engine::Path;
use crate::iter::Iter;
use crate::root::RootNode;
use crate::value::{ValueRepr, VarValue};

/// Pairs whose keys fall inside a [`RangeBounds`], in key order.
pub struct Range<'a, R: ValueRepr = VarValue> {
    inner: Iter<'a, R>,
}

impl<'a, R: ValueRepr> Range<'a, R> {
    pub(crate) fn new<K, B>(root: &'a RootNode<R>, bounds: B) -> Self
    where
        K: AsRef<[u8]>,
        B: RangeBounds<K>,
    {
        let engine = root.engine();
        let mut front = Path::new();
        match bounds.start_bound() {
            Bound::Unbounded => {
                engine.find_first(root.node, &mut front, &[]);
            }
            Bound::Included(start) => {
                engine.seek_ge(root.node, &mut front, start.as_ref());
            }
            Bound::Excluded(start) => {
                if engine.seek_ge(root.node, &mut front, start.as_ref()) == Some(true) {
                    engine.move_next(&mut front);
                }
            }
        }

        let mut back = Path::new();
        match bounds.end_bound() {
            Bound::Unbounded => {
                engine.find_last(root.node, &mut back, &[]);
            }
            Bound::Included(end) => match engine.seek_ge(root.node, &mut back, end.as_ref()) {
                Some(true) => {}
                Some(false) => {
                    engine.move_previous(&mut back);
                }
                None => {
                    engine.find_last(root.node, &mut back, &[]);
                }
            },
            Bound::Excluded(end) => match engine.seek_ge(root.node, &mut back, end.as_ref()) {
                Some(_) => {
                    engine.move_previous(&mut back);
                }
                None => {
                    engine.find_last(root.node, &mut back, &[]);
                }
            },
        }

        Self {
            inner: Iter::between(engine, front, back),
        }
    }
}

impl<'a, R: ValueRepr> Iterator for Range<'a, R> {
    type Item = (Vec<u8>, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<R: ValueRepr> DoubleEndedIterator for Range<'_, R> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl<R: ValueRepr> ExactSizeIterator for Range<'_, R> {}
