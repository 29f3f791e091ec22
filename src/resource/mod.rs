//! The memory resource capability.
//!
//! A [`MemoryResource`] hands out raw blocks of memory and takes them back. It
//! is the dynamically dispatched layer underneath
//! [`PolymorphicAllocator`](crate::alloc::PolymorphicAllocator): containers only
//! ever see an [`Allocator`](std::alloc::Allocator), and the allocator forwards
//! every request to whatever resource it was built with.
//!
//! Implementors provide the three `do_*` hooks. Callers use the provided
//! [`allocate()`](MemoryResource::allocate),
//! [`deallocate()`](MemoryResource::deallocate) and
//! [`is_equal()`](MemoryResource::is_equal) wrappers, which validate arguments
//! before anything reaches the hooks.

use std::{
    alloc::{AllocError, Layout},
    any::Any,
    ptr::{self, NonNull},
};

mod default;
mod new_delete;
mod null;

pub use default::{get_default_resource, reset_default_resource, set_default_resource};
pub use new_delete::{new_delete_resource, NewDeleteResource};
pub use null::{null_memory_resource, NullMemoryResource};

pub trait MemoryResource: Send + Sync {
    /// Allocate a block fitting `layout`. The returned slice is at least
    /// `layout.size()` bytes long and aligned to `layout.align()`.
    fn do_allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError>;

    /// # Safety
    ///
    /// `ptr` must have been returned by `do_allocate()` on this resource (or on
    /// a resource that compares equal to it) with the same `layout`, and must
    /// not have been deallocated since.
    unsafe fn do_deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Can memory allocated from `self` be released through `other`, and vice
    /// versa?
    fn do_is_equal(&self, other: &dyn MemoryResource) -> bool;

    /// Used for type-based equality checks, implement as `self`.
    fn as_any(&self) -> &dyn Any;

    /// Allocate `bytes` bytes aligned to `align`.
    ///
    /// # Errors
    ///
    /// - `align` is not a power of two, or `bytes` rounded up to `align`
    ///   overflows `isize`
    /// - whatever `do_allocate()` returns, unchanged
    fn allocate(&self, bytes: usize, align: usize) -> Result<NonNull<[u8]>, AllocError> {
        let layout = Layout::from_size_align(bytes, align).map_err(|_| AllocError)?;
        self.do_allocate(layout)
    }

    /// # Safety
    ///
    /// `ptr` must have come from `allocate(bytes, align)` on this resource (or
    /// an equal one). Mismatches are not detected.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, bytes: usize, align: usize) {
        debug_assert!(align.is_power_of_two());
        // SAFETY: the caller passes the arguments of a successful `allocate()`,
        // which already went through `Layout::from_size_align()`.
        let layout = unsafe { Layout::from_size_align_unchecked(bytes, align) };
        // SAFETY: identical contract to the caller's.
        unsafe { self.do_deallocate(ptr, layout) }
    }

    fn is_equal(&self, other: &dyn MemoryResource) -> bool {
        self.do_is_equal(other)
    }
}

/// `true` if `resource` is a `T`.
pub fn is_resource<T: Any>(resource: &dyn MemoryResource) -> bool {
    resource.as_any().is::<T>()
}

/// Two resources are equal when they are the same object, or when `a` says it
/// can stand in for `b`.
pub fn resources_equal(a: &dyn MemoryResource, b: &dyn MemoryResource) -> bool {
    ptr::addr_eq(a, b) || a.is_equal(b)
}
