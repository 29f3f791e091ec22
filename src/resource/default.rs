//! The process-wide default resource slot.
//!
//! Only [`PolymorphicAllocator::default()`](crate::alloc::PolymorphicAllocator)
//! reads this. Anything that is handed a resource explicitly never looks here,
//! which is exactly the property the scoped override in [`crate::scope`] lets
//! tests check.
//!
//! The slot is behind a lock, so touching it from several threads is memory
//! safe. It is still a single cell for the whole process though: tests that
//! replace it must not run concurrently with each other.

use std::{
    mem,
    sync::{Arc, PoisonError, RwLock},
};

use log::debug;
use once_cell::sync::Lazy;

use super::{new_delete_resource, MemoryResource};

static DEFAULT_RESOURCE: Lazy<RwLock<Arc<dyn MemoryResource>>> =
    Lazy::new(|| RwLock::new(new_delete_resource()));

/// The resource currently in the slot.
pub fn get_default_resource() -> Arc<dyn MemoryResource> {
    DEFAULT_RESOURCE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Put `resource` in the slot, returning whatever was there before.
pub fn set_default_resource(resource: Arc<dyn MemoryResource>) -> Arc<dyn MemoryResource> {
    debug!("default resource <- {:p}", Arc::as_ptr(&resource));
    let mut slot = DEFAULT_RESOURCE
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    mem::replace(&mut *slot, resource)
}

/// Put the [`new_delete_resource()`] back in the slot.
pub fn reset_default_resource() -> Arc<dyn MemoryResource> {
    set_default_resource(new_delete_resource())
}
