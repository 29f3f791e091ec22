//! Test harness for allocator propagation.
//!
//! Containers parameterised over an [`Allocator`](std::alloc::Allocator) are
//! given a [`PolymorphicAllocator`], which forwards to a runtime-chosen
//! [`MemoryResource`]. A [`MockMemoryResource`] records every call it sees, and
//! [`with_default_mock_memory_resource()`] makes one the process-wide default
//! for the length of a block, so a test can assert that code which was handed
//! an explicit resource never quietly allocates from the default one.

#![feature(allocator_api)]

pub mod alloc;
pub mod mock;
pub mod resource;
pub mod scope;
mod util;

pub use crate::alloc::{pmr, PolymorphicAllocator};
pub use mock::{EqualityPolicy, MockMemoryResource, Times};
pub use resource::{
    get_default_resource, new_delete_resource, null_memory_resource, resources_equal,
    set_default_resource, MemoryResource,
};
pub use scope::{with_default_mock_memory_resource, with_default_resource, with_mock_memory_resource};
