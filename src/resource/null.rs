use std::{
    alloc::{AllocError, Layout},
    any::Any,
    ptr::NonNull,
    sync::Arc,
};

use log::trace;
use once_cell::sync::Lazy;

use super::{is_resource, MemoryResource};
use crate::util::hint::cold;

static NULL: Lazy<Arc<NullMemoryResource>> = Lazy::new(|| Arc::new(NullMemoryResource(())));

/// A resource that never has any memory. `allocate()` always fails and
/// `deallocate()` is a nop. Handy as an upstream when a test wants to see
/// allocation failure come back out of a container.
#[derive(Debug)]
pub struct NullMemoryResource(());

pub fn null_memory_resource() -> Arc<dyn MemoryResource> {
    NULL.clone()
}

impl MemoryResource for NullMemoryResource {
    fn do_allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        cold(|| {
            trace!("null: refusing allocate(size: {})", layout.size());
            Err(AllocError)
        })
    }

    unsafe fn do_deallocate(&self, _: NonNull<u8>, _: Layout) {}

    // Nothing is ever allocated, so any two null resources can stand in for
    // one another.
    fn do_is_equal(&self, other: &dyn MemoryResource) -> bool {
        is_resource::<Self>(other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::new_delete_resource;

    #[test]
    fn null_resource_never_allocates() {
        let null = null_memory_resource();
        assert_eq!(null.allocate(0, 1), Err(AllocError));
        assert_eq!(null.allocate(64, 8), Err(AllocError));
    }

    #[test]
    fn null_resource_equality() {
        let null = null_memory_resource();
        assert!(null.is_equal(&NullMemoryResource(())));
        assert!(!null.is_equal(&*new_delete_resource()));
    }
}
