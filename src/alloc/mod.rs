//! Allocators for containers under test.

mod polymorphic;
pub mod pmr;

pub use polymorphic::PolymorphicAllocator;
