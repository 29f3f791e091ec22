//! Standard containers whose memory comes from a
//! [`PolymorphicAllocator`].
//!
//! Propagation works the way the standard library does it: a container keeps
//! the allocator it was built with, and `clone()` clones that allocator.
//! Elements are not told about their container's allocator, so nested
//! containers have to be built with one explicitly.

use super::PolymorphicAllocator;

pub type Vec<T> = std::vec::Vec<T, PolymorphicAllocator>;
pub type VecDeque<T> = std::collections::VecDeque<T, PolymorphicAllocator>;
pub type Box<T> = std::boxed::Box<T, PolymorphicAllocator>;
