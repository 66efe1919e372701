//! Raw memory for tree nodes.
//!
//! Nodes are untyped byte blocks. The engine asks an [`Allocator`] for a block
//! of an exact size and hands it back with the same size, recomputed from the
//! node header, when the last reference goes away.

use std::alloc::{Layout, handle_alloc_error};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Alignment of every node block. Child pointers rely on the low bits being
/// clear.
pub const NODE_ALIGN: usize = 8;

pub trait Allocator: Send + Sync {
    /// Returns a block of at least `size` bytes aligned to [`NODE_ALIGN`].
    fn allocate(&self, size: usize) -> NonNull<u8>;

    /// Returns a block to the allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`Allocator::allocate`] on this allocator with the
    /// same `size`, and must not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize);
}

fn node_layout(size: usize) -> Layout {
    match Layout::from_size_align(size.max(1), NODE_ALIGN) {
        Ok(layout) => layout,
        Err(_) => panic!("node size {size} overflows the address space"),
    }
}

/// Allocator backed by the global Rust allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAllocator;

impl Allocator for HeapAllocator {
    fn allocate(&self, size: usize) -> NonNull<u8> {
        let layout = node_layout(size);
        // SAFETY: the layout has a non-zero size.
        let ptr = unsafe { std::alloc::alloc(layout) };
        match NonNull::new(ptr) {
            Some(ptr) => ptr,
            None => handle_alloc_error(layout),
        }
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) {
        // SAFETY: forwarded from the caller's contract.
        unsafe { std::alloc::dealloc(ptr.as_ptr(), node_layout(size)) }
    }
}

/// Heap allocator that keeps live counters, used to detect leaked nodes.
#[derive(Debug, Default)]
pub struct CountingAllocator {
    live_bytes: AtomicUsize,
    live_blocks: AtomicUsize,
    total_blocks: AtomicUsize,
}

impl CountingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_bytes(&self) -> usize {
        self.live_bytes.load(Ordering::Acquire)
    }

    pub fn live_blocks(&self) -> usize {
        self.live_blocks.load(Ordering::Acquire)
    }

    /// Number of blocks handed out since creation.
    pub fn total_blocks(&self) -> usize {
        self.total_blocks.load(Ordering::Acquire)
    }
}

impl Allocator for CountingAllocator {
    fn allocate(&self, size: usize) -> NonNull<u8> {
        let ptr = HeapAllocator.allocate(size);
        self.live_bytes.fetch_add(size, Ordering::AcqRel);
        self.live_blocks.fetch_add(1, Ordering::AcqRel);
        self.total_blocks.fetch_add(1, Ordering::AcqRel);
        ptr
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) {
        self.live_bytes.fetch_sub(size, Ordering::AcqRel);
        self.live_blocks.fetch_sub(1, Ordering::AcqRel);
        // SAFETY: forwarded from the caller's contract.
        unsafe { HeapAllocator.deallocate(ptr, size) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counting_allocator_tracks_blocks() {
        let alloc = CountingAllocator::new();
        let a = alloc.allocate(24);
        let b = alloc.allocate(100);
        assert_eq!(alloc.live_blocks(), 2);
        assert_eq!(alloc.live_bytes(), 124);
        assert_eq!(a.as_ptr() as usize % NODE_ALIGN, 0);
        assert_eq!(b.as_ptr() as usize % NODE_ALIGN, 0);
        unsafe {
            alloc.deallocate(a, 24);
            alloc.deallocate(b, 100);
        }
        assert_eq!(alloc.live_blocks(), 0);
        assert_eq!(alloc.live_bytes(), 0);
        assert_eq!(alloc.total_blocks(), 2);
    }
}
