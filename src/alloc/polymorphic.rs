use std::{
    alloc::{AllocError, Allocator, Layout},
    fmt,
    ptr::NonNull,
    sync::Arc,
};

use crate::resource::{get_default_resource, resources_equal, MemoryResource};

/// An [`Allocator`] that forwards every request to a [`MemoryResource`] chosen
/// at runtime.
///
/// Clones share the resource, so memory allocated through one clone can be
/// released through any other. `grow()` and `shrink()` use the trait's
/// allocate-copy-deallocate fallbacks, so every byte a container touches is
/// visible to the resource.
#[derive(Clone)]
pub struct PolymorphicAllocator {
    resource: Arc<dyn MemoryResource>,
}

impl PolymorphicAllocator {
    pub fn new(resource: Arc<dyn MemoryResource>) -> Self {
        Self { resource }
    }

    pub fn resource(&self) -> &Arc<dyn MemoryResource> {
        &self.resource
    }
}

/// Uses whatever is in the default resource slot *right now*. The slot is not
/// consulted again afterwards.
impl Default for PolymorphicAllocator {
    fn default() -> Self {
        Self::new(get_default_resource())
    }
}

impl PartialEq for PolymorphicAllocator {
    fn eq(&self, other: &Self) -> bool {
        resources_equal(&*self.resource, &*other.resource)
    }
}

impl fmt::Debug for PolymorphicAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolymorphicAllocator")
            .field("resource", &Arc::as_ptr(&self.resource))
            .finish()
    }
}

// SAFETY: every block comes from `self.resource` and goes back to it. Clones
// share the same `Arc`, so they satisfy the "any clone may free" requirement.
unsafe impl Allocator for PolymorphicAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        self.resource.allocate(layout.size(), layout.align())
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: `Allocator::deallocate()` has the same contract, and
        // `allocate()` used exactly this size and alignment.
        unsafe {
            self.resource
                .deallocate(ptr, layout.size(), layout.align())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::alloc::Allocator;

    use super::*;
    use crate::{
        mock::MockMemoryResource,
        resource::{new_delete_resource, null_memory_resource},
    };

    #[test]
    fn vec_allocates_through_its_resource() {
        let mock = Arc::new(MockMemoryResource::new());
        mock.delegate_to_new_delete();
        let alloc = PolymorphicAllocator::new(mock.clone());

        let mut v: Vec<u32, _> = Vec::with_capacity_in(4, alloc);
        assert_eq!(mock.allocate_count(), 1);
        v.extend(0..100);
        // growing went through the resource too
        assert!(mock.allocate_count() > 1);
        assert_eq!(mock.live_allocations(), 1);
        drop(v);
        assert_eq!(mock.live_allocations(), 0);
        assert_eq!(mock.allocate_count(), mock.deallocate_count());
    }

    #[test]
    fn clones_compare_equal_and_share_the_resource() {
        let alloc = PolymorphicAllocator::new(new_delete_resource());
        let copy = alloc.clone();
        assert_eq!(alloc, copy);
        assert!(Arc::ptr_eq(alloc.resource(), copy.resource()));
    }

    #[test]
    fn equality_follows_the_resources() {
        let a = PolymorphicAllocator::new(Arc::new(MockMemoryResource::new()));
        let b = PolymorphicAllocator::new(Arc::new(MockMemoryResource::new()));
        // un-configured mocks say no
        assert_ne!(a, b);

        let mock = Arc::new(MockMemoryResource::new());
        mock.delegate_to_new_delete();
        let c = PolymorphicAllocator::new(mock);
        assert_eq!(c, b);
        assert_ne!(c, PolymorphicAllocator::new(new_delete_resource()));
    }

    #[test]
    fn failure_comes_back_out_of_the_container() {
        let alloc = PolymorphicAllocator::new(null_memory_resource());
        assert!(Box::try_new_in(5u64, alloc.clone()).is_err());
        assert_eq!(alloc.allocate(Layout::new::<u64>()), Err(AllocError));
    }
}
