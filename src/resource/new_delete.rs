use std::{
    alloc::{AllocError, Allocator, Global, Layout},
    any::Any,
    ptr::NonNull,
    sync::Arc,
};

use log::trace;
use once_cell::sync::Lazy;

use super::{is_resource, MemoryResource};

static NEW_DELETE: Lazy<Arc<NewDeleteResource>> = Lazy::new(|| Arc::new(NewDeleteResource(())));

/// The platform heap, as a [`MemoryResource`]. Every request goes straight to
/// [`Global`], so any two `NewDeleteResource`s are interchangeable.
#[derive(Debug)]
pub struct NewDeleteResource(());

/// The process-wide [`NewDeleteResource`]. This is what the default resource
/// slot holds until somebody replaces it.
pub fn new_delete_resource() -> Arc<dyn MemoryResource> {
    NEW_DELETE.clone()
}

impl MemoryResource for NewDeleteResource {
    fn do_allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        trace!(
            "new_delete: allocate(size: {}, align: {})",
            layout.size(),
            layout.align()
        );
        Global.allocate(layout)
    }

    unsafe fn do_deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        trace!(
            "new_delete: deallocate({:p}, size: {}, align: {})",
            ptr,
            layout.size(),
            layout.align()
        );
        // SAFETY: identical contract to `Allocator::deallocate()`, and every
        // block this resource hands out comes from `Global`.
        unsafe { Global.deallocate(ptr, layout) }
    }

    fn do_is_equal(&self, other: &dyn MemoryResource) -> bool {
        is_resource::<Self>(other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
