//! Scoped helpers that hand a fresh [`MockMemoryResource`] to a block of test
//! code, optionally making it the process-wide default for the duration.
//!
//! The default resource slot is one cell for the whole process. These helpers
//! restore it on every way out of the block, but they do not stop two tests
//! from overriding it at the same time: tests using
//! [`with_default_mock_memory_resource()`] must be serialised by the caller
//! (for example with `#[serial]` from the `serial_test` crate).

use std::sync::Arc;

use log::debug;

use crate::{
    mock::MockMemoryResource,
    resource::{set_default_resource, MemoryResource},
};

/// Puts a resource in the default slot, and puts the previous one back when
/// dropped. Dropping happens on normal return, early return and unwinding
/// alike.
#[must_use = "the previous default resource is restored as soon as the guard is dropped"]
pub struct DefaultResourceGuard {
    previous: Option<Arc<dyn MemoryResource>>,
}

impl DefaultResourceGuard {
    pub fn install(resource: Arc<dyn MemoryResource>) -> Self {
        let previous = set_default_resource(resource);
        debug!("default resource overridden, saved {:p}", Arc::as_ptr(&previous));
        Self {
            previous: Some(previous),
        }
    }
}

impl Drop for DefaultResourceGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            debug!("restoring default resource {:p}", Arc::as_ptr(&previous));
            // the overriding resource comes back out; dropping it here is fine
            let _ = set_default_resource(previous);
        }
    }
}

/// Run `run` with `resource` as the default, restoring the previous default
/// afterwards. Whatever `run` returns (or panics with) comes back unchanged.
pub fn with_default_resource<F, R>(resource: Arc<dyn MemoryResource>, run: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = DefaultResourceGuard::install(resource);
    run()
}

/// Run `run` with a newly-constructed mock that delegates to the platform heap.
/// Nothing global is touched.
///
/// The mock is dropped when this returns, which fails the test if any of its
/// expectations are unmet (and `run` did not panic already).
pub fn with_mock_memory_resource<F, R>(run: F) -> R
where
    F: FnOnce(&Arc<MockMemoryResource>) -> R,
{
    let mock = Arc::new(MockMemoryResource::new());
    mock.delegate_to_new_delete();
    run(&mock)
}

/// Like [`with_mock_memory_resource()`], but the mock is also the default
/// resource while `run` executes. The previous default is restored before the
/// result is returned or the panic continues.
pub fn with_default_mock_memory_resource<F, R>(run: F) -> R
where
    F: FnOnce(&Arc<MockMemoryResource>) -> R,
{
    with_mock_memory_resource(|mock| with_default_resource(mock.clone(), || run(mock)))
}

#[cfg(test)]
mod tests {
    use std::{
        panic::{self, AssertUnwindSafe},
        ptr,
    };

    use serial_test::serial;

    use super::*;
    use crate::{
        alloc::{pmr, PolymorphicAllocator},
        mock::Times,
        resource::{get_default_resource, is_resource, null_memory_resource},
    };

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn same(a: &Arc<dyn MemoryResource>, b: &Arc<dyn MemoryResource>) -> bool {
        ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
    }

    #[test]
    #[serial]
    fn provisioning_leaves_the_default_alone() {
        init();
        let before = get_default_resource();
        let seen = with_mock_memory_resource(|mock| {
            assert!(!is_resource::<MockMemoryResource>(&*get_default_resource()));
            let data = mock.allocate(8, 8).unwrap();
            unsafe { mock.deallocate(data.cast(), 8, 8) };
            mock.allocate_count()
        });
        assert_eq!(seen, 1);
        assert!(same(&before, &get_default_resource()));
    }

    #[test]
    #[serial]
    fn override_installs_the_mock_and_restores_on_return() {
        init();
        let before = get_default_resource();
        let value = with_default_mock_memory_resource(|mock| {
            let current = get_default_resource();
            assert!(ptr::addr_eq(Arc::as_ptr(&current), Arc::as_ptr(mock)));
            42
        });
        assert_eq!(value, 42);
        assert!(same(&before, &get_default_resource()));
    }

    #[test]
    #[serial]
    fn override_restores_and_returns_errors_unchanged() {
        let before = get_default_resource();
        let result: Result<(), String> =
            with_default_mock_memory_resource(|_| Err("block failed".to_owned()));
        assert_eq!(result, Err("block failed".to_owned()));
        assert!(same(&before, &get_default_resource()));
    }

    #[test]
    #[serial]
    fn override_restores_on_panic_and_keeps_the_payload() {
        init();
        let before = get_default_resource();
        let caught = panic::catch_unwind(|| {
            with_default_mock_memory_resource(|_| {
                panic!("boom");
            })
        });
        let payload = caught.unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"boom"));
        assert!(same(&before, &get_default_resource()));
    }

    #[test]
    #[serial]
    fn override_restores_even_if_the_block_changes_the_slot() {
        let before = get_default_resource();
        with_default_mock_memory_resource(|_| {
            set_default_resource(null_memory_resource());
        });
        assert!(same(&before, &get_default_resource()));
    }

    #[test]
    #[serial]
    fn nested_overrides_unwind_in_order() {
        let before = get_default_resource();
        with_default_mock_memory_resource(|outer| {
            let outer: Arc<dyn MemoryResource> = outer.clone();
            with_default_mock_memory_resource(|inner| {
                assert!(ptr::addr_eq(
                    Arc::as_ptr(&get_default_resource()),
                    Arc::as_ptr(inner)
                ));
            });
            assert!(same(&outer, &get_default_resource()));
        });
        assert!(same(&before, &get_default_resource()));
    }

    #[test]
    #[serial]
    fn call_count_survives_a_panicking_block() {
        init();
        let mut captured = None;
        let caught = panic::catch_unwind(AssertUnwindSafe(|| {
            with_default_mock_memory_resource(|mock| {
                captured = Some(mock.clone());
                let mut boxes = Vec::new();
                for i in 0..3u64 {
                    let b: pmr::Box<u64> = Box::new_in(i, PolymorphicAllocator::default());
                    boxes.push(b);
                }
                panic!("after three allocations");
            })
        }));
        assert!(caught.is_err());
        let mock = captured.unwrap();
        assert_eq!(mock.allocate_count(), 3);
        // the boxes were dropped while unwinding
        assert_eq!(mock.deallocate_count(), 3);
        assert_eq!(mock.live_allocations(), 0);
    }

    #[test]
    #[serial]
    fn with_default_resource_accepts_any_resource() {
        let before = get_default_resource();
        let null = null_memory_resource();
        with_default_resource(null.clone(), || {
            assert!(same(&null, &get_default_resource()));
            let alloc = PolymorphicAllocator::default();
            assert!(Box::try_new_in(1u8, alloc).is_err());
        });
        assert!(same(&before, &get_default_resource()));
    }

    #[test]
    #[serial]
    #[should_panic(expected = "unmet expectations")]
    fn unmet_expectations_fail_when_the_scope_ends() {
        with_default_mock_memory_resource(|mock| {
            mock.expect_allocate(Times::AtLeast(1));
        });
    }
}
