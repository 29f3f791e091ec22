//! An observable, stubbable [`MemoryResource`].
//!
//! [`MockMemoryResource`] intercepts each of the three resource hooks. Every
//! call is recorded (count and arguments), then handed to a configurable
//! behaviour. A fresh mock has no behaviour at all, like an un-stubbed mock
//! method: `allocate()` fails, `deallocate()` does nothing and `is_equal()` is
//! `false`. [`delegate_to_new_delete()`](MockMemoryResource::delegate_to_new_delete)
//! installs the usual test setup: real allocations from the platform heap, and
//! equality with any other mock.
//!
//! All configuration goes through `&self`, so a mock can be shared (it is
//! normally held in an `Arc`, see [`crate::scope`]) and still be stubbed and
//! inspected by the test holding it.
//!
//! ```ignore
//! let mock = MockMemoryResource::new();
//! mock.delegate_to_new_delete().expect_allocate(Times::Exactly(1));
//! let data = mock.allocate(64, 8)?;
//! unsafe { mock.deallocate(data.cast(), 64, 8) };
//! mock.verify()?;
//! ```

use std::{
    alloc::{AllocError, Layout},
    any::Any,
    fmt, ptr,
    ptr::NonNull,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread,
};

use log::trace;

use crate::{
    resource::{is_resource, new_delete_resource, MemoryResource},
    util::hint::cold,
};

mod calls;
mod expect;

use calls::Recorder;
use expect::{Expectation, Expectations};

pub use calls::{AllocateCall, CallLog, DeallocateCall};
pub use expect::{ExpectationError, Operation, Times, UnmetExpectation};

pub type AllocateFn = dyn Fn(Layout) -> Result<NonNull<[u8]>, AllocError> + Send + Sync;
pub type DeallocateFn = dyn Fn(NonNull<u8>, Layout) + Send + Sync;
pub type IsEqualFn = dyn Fn(&dyn MemoryResource) -> bool + Send + Sync;

/// Which resources a mock reports itself equal to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EqualityPolicy {
    /// Any other `MockMemoryResource`, whatever its identity
    #[default]
    SameType,
    /// Only this very mock
    Identity,
    Always,
    Never,
}

impl EqualityPolicy {
    fn holds(self, mock: &MockMemoryResource, other: &dyn MemoryResource) -> bool {
        match self {
            EqualityPolicy::SameType => is_resource::<MockMemoryResource>(other),
            EqualityPolicy::Identity => ptr::addr_eq(mock, other),
            EqualityPolicy::Always => true,
            EqualityPolicy::Never => false,
        }
    }
}

#[derive(Clone, Default)]
enum IsEqualBehavior {
    #[default]
    Unset,
    Policy(EqualityPolicy),
    Custom(Arc<IsEqualFn>),
}

#[derive(Clone, Default)]
struct Behaviors {
    allocate: Option<Arc<AllocateFn>>,
    deallocate: Option<Arc<DeallocateFn>>,
    is_equal: IsEqualBehavior,
}

#[derive(Default)]
pub struct MockMemoryResource {
    behaviors: Mutex<Behaviors>,
    recorder: Mutex<Recorder>,
    expectations: Mutex<Expectations>,
}

impl MockMemoryResource {
    pub fn new() -> Self {
        Self::default()
    }

    // Behaviours are cloned out before being called, so none of these locks are
    // ever held while user code runs. A stub may call back into the mock.

    fn behaviors(&self) -> MutexGuard<'_, Behaviors> {
        self.behaviors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn recorder(&self) -> MutexGuard<'_, Recorder> {
        self.recorder.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn expectations(&self) -> MutexGuard<'_, Expectations> {
        self.expectations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Forward `allocate()` and `deallocate()` to `upstream`, and compare equal
    /// to any other mock.
    pub fn delegate_to(&self, upstream: Arc<dyn MemoryResource>) -> &Self {
        let deallocate_upstream = upstream.clone();
        let mut behaviors = self.behaviors();
        behaviors.allocate = Some(Arc::new(move |layout: Layout| {
            upstream.allocate(layout.size(), layout.align())
        }));
        behaviors.deallocate = Some(Arc::new(move |ptr: NonNull<u8>, layout: Layout| {
            // SAFETY: `MemoryResource::deallocate()` on the mock has the same
            // contract, and the block was handed out by `upstream` through the
            // allocate behaviour above.
            unsafe { deallocate_upstream.deallocate(ptr, layout.size(), layout.align()) }
        }));
        behaviors.is_equal = IsEqualBehavior::Policy(EqualityPolicy::SameType);
        drop(behaviors);
        self
    }

    /// [`delegate_to()`](Self::delegate_to) the platform heap.
    pub fn delegate_to_new_delete(&self) -> &Self {
        self.delegate_to(new_delete_resource())
    }

    /// Replace the `allocate()` behaviour. Other operations are unaffected.
    pub fn on_allocate<F>(&self, f: F) -> &Self
    where
        F: Fn(Layout) -> Result<NonNull<[u8]>, AllocError> + Send + Sync + 'static,
    {
        self.behaviors().allocate = Some(Arc::new(f));
        self
    }

    /// Replace the `deallocate()` behaviour. Other operations are unaffected.
    pub fn on_deallocate<F>(&self, f: F) -> &Self
    where
        F: Fn(NonNull<u8>, Layout) + Send + Sync + 'static,
    {
        self.behaviors().deallocate = Some(Arc::new(f));
        self
    }

    /// Replace the `is_equal()` behaviour. Other operations are unaffected.
    pub fn on_is_equal<F>(&self, f: F) -> &Self
    where
        F: Fn(&dyn MemoryResource) -> bool + Send + Sync + 'static,
    {
        self.behaviors().is_equal = IsEqualBehavior::Custom(Arc::new(f));
        self
    }

    pub fn set_equality_policy(&self, policy: EqualityPolicy) -> &Self {
        self.behaviors().is_equal = IsEqualBehavior::Policy(policy);
        self
    }

    /// Expect `operation` to be called `times` from now on. Replaces any
    /// earlier expectation on the same operation.
    pub fn expect(&self, operation: Operation, times: Times) -> &Self {
        let baseline = self.recorder().count(operation);
        *self.expectations().slot(operation) = Some(Expectation { times, baseline });
        self
    }

    pub fn expect_allocate(&self, times: Times) -> &Self {
        self.expect(Operation::Allocate, times)
    }

    pub fn expect_deallocate(&self, times: Times) -> &Self {
        self.expect(Operation::Deallocate, times)
    }

    pub fn expect_is_equal(&self, times: Times) -> &Self {
        self.expect(Operation::IsEqual, times)
    }

    /// Check every registered expectation against the calls recorded so far.
    pub fn verify(&self) -> Result<(), ExpectationError> {
        let expectations = *self.expectations();
        let recorder = self.recorder();
        let unmet: Vec<UnmetExpectation> = [
            (Operation::Allocate, expectations.allocate),
            (Operation::Deallocate, expectations.deallocate),
            (Operation::IsEqual, expectations.is_equal),
        ]
        .into_iter()
        .filter_map(|(operation, expectation)| {
            expectation?
                .check(operation, recorder.count(operation))
                .err()
        })
        .collect();

        if unmet.is_empty() {
            Ok(())
        } else {
            Err(ExpectationError {
                unmet,
                log: recorder.log.to_json(),
            })
        }
    }

    /// [`verify()`](Self::verify), then forget every expectation (whether or
    /// not they were met).
    pub fn checkpoint(&self) -> Result<(), ExpectationError> {
        let result = self.verify();
        *self.expectations() = Expectations::default();
        result
    }

    pub fn allocate_calls(&self) -> Vec<AllocateCall> {
        self.recorder().log.allocate.clone()
    }

    pub fn deallocate_calls(&self) -> Vec<DeallocateCall> {
        self.recorder().log.deallocate.clone()
    }

    pub fn allocate_count(&self) -> usize {
        self.recorder().count(Operation::Allocate)
    }

    pub fn deallocate_count(&self) -> usize {
        self.recorder().count(Operation::Deallocate)
    }

    pub fn is_equal_count(&self) -> usize {
        self.recorder().count(Operation::IsEqual)
    }

    pub fn call_log(&self) -> CallLog {
        self.recorder().log.clone()
    }

    /// Blocks handed out by this mock and not yet given back.
    pub fn live_allocations(&self) -> usize {
        self.recorder().live_allocations()
    }

    pub fn live_bytes(&self) -> usize {
        self.recorder().live_bytes()
    }

    /// Forget all recorded calls. Expectations registered before the reset
    /// keep counting from zero.
    pub fn reset(&self) {
        self.recorder().reset();
        let mut expectations = self.expectations();
        for operation in [Operation::Allocate, Operation::Deallocate, Operation::IsEqual] {
            if let Some(expectation) = expectations.slot(operation) {
                expectation.baseline = 0;
            }
        }
    }
}

impl MemoryResource for MockMemoryResource {
    fn do_allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        trace!(
            "mock {:p}: allocate(size: {}, align: {})",
            self,
            layout.size(),
            layout.align()
        );
        let index = self.recorder().record_allocate(layout);
        let behavior = self.behaviors().allocate.clone();
        let result = match behavior {
            Some(allocate) => allocate(layout),
            None => cold(|| Err(AllocError)),
        };
        if let Ok(data) = result {
            self.recorder().complete_allocate(index, data, layout);
        }
        result
    }

    unsafe fn do_deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        trace!(
            "mock {:p}: deallocate({:p}, size: {}, align: {})",
            self,
            ptr,
            layout.size(),
            layout.align()
        );
        self.recorder().record_deallocate(ptr, layout);
        let behavior = self.behaviors().deallocate.clone();
        if let Some(deallocate) = behavior {
            deallocate(ptr, layout);
        }
    }

    fn do_is_equal(&self, other: &dyn MemoryResource) -> bool {
        trace!("mock {:p}: is_equal()", self);
        self.recorder().record_is_equal();
        let behavior = self.behaviors().is_equal.clone();
        match behavior {
            IsEqualBehavior::Unset => false,
            IsEqualBehavior::Policy(policy) => policy.holds(self, other),
            IsEqualBehavior::Custom(is_equal) => is_equal(other),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for MockMemoryResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let recorder = self.recorder();
        f.debug_struct("MockMemoryResource")
            .field("allocate_calls", &recorder.count(Operation::Allocate))
            .field("deallocate_calls", &recorder.count(Operation::Deallocate))
            .field("is_equal_calls", &recorder.count(Operation::IsEqual))
            .field("live_allocations", &recorder.live_allocations())
            .finish()
    }
}

/// Unmet expectations fail the test when the mock goes away, unless the test
/// is already failing.
impl Drop for MockMemoryResource {
    fn drop(&mut self) {
        if thread::panicking() || self.expectations().is_empty() {
            return;
        }
        if let Err(e) = self.verify() {
            panic!("{e}");
        }
    }
}
