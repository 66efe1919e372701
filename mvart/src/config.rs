use crate::alloc::{Allocator, HeapAllocator};
use std::fmt;
use std::sync::Arc;

/// Settings shared by a root handle and every snapshot or transaction derived
/// from it.
#[derive(Clone)]
pub struct TreeOptions {
    pub(crate) allocator: Arc<dyn Allocator>,
    pub(crate) check_mutations: bool,
}

impl TreeOptions {
    pub fn new() -> Self {
        Self {
            allocator: Arc::new(HeapAllocator),
            check_mutations: false,
        }
    }

    /// Allocate nodes from `allocator` instead of the global heap.
    pub fn with_allocator(mut self, allocator: Arc<dyn Allocator>) -> Self {
        self.allocator = allocator;
        self
    }

    /// Run the structural checker after every mutation and panic on failure.
    /// Costs a full tree walk per write; meant for tests and debugging.
    pub fn check_mutations(mut self, enabled: bool) -> Self {
        self.check_mutations = enabled;
        self
    }

    pub fn allocator(&self) -> &Arc<dyn Allocator> {
        &self.allocator
    }

    pub(crate) fn same_allocator(&self, other: &TreeOptions) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.allocator), Arc::as_ptr(&other.allocator))
    }
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TreeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeOptions")
            .field("check_mutations", &self.check_mutations)
            .finish_non_exhaustive()
    }
}
