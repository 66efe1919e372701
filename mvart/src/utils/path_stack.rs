use smallvec::SmallVec;
use std::ops::Index;

/// Frames kept inline before the stack spills to the heap. Trees are rarely
/// deeper than this.
const INLINE_FRAMES: usize = 16;

/// Growable stack of cursor frames.
#[derive(Clone, Debug, Default)]
pub struct PathStack<T> {
    items: SmallVec<[T; INLINE_FRAMES]>,
}

impl<T: Copy> PathStack<T> {
    pub fn new() -> Self {
        Self {
            items: SmallVec::new(),
        }
    }

    #[inline]
    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    #[inline]
    pub fn top(&self) -> Option<&T> {
        self.items.last()
    }

    #[inline]
    pub fn top_mut(&mut self) -> Option<&mut T> {
        self.items.last_mut()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T> Index<usize> for PathStack<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_past_inline_capacity() {
        let mut stack = PathStack::new();
        for i in 0..100usize {
            stack.push(i);
        }
        assert_eq!(stack.len(), 100);
        assert_eq!(stack.top(), Some(&99));
        *stack.top_mut().unwrap() = 7;
        assert_eq!(stack.pop(), Some(7));
        stack.truncate(3);
        assert_eq!(stack.as_slice(), &[0, 1, 2]);
        assert_eq!(stack[1], 1);
        stack.clear();
        assert!(stack.is_empty());
        assert_eq!(stack.pop(), None);
    }
}
