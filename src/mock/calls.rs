//! What a [`MockMemoryResource`](super::MockMemoryResource) has seen.

use std::{alloc::Layout, ptr::NonNull};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use super::expect::Operation;

/// One call to `allocate()`. `address` is filled in once the configured
/// behaviour returns, and stays `None` if it failed (or panicked).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AllocateCall {
    pub bytes: usize,
    pub align: usize,
    pub address: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeallocateCall {
    pub address: usize,
    pub bytes: usize,
    pub align: usize,
}

/// A snapshot of every call a mock has recorded since its last `reset()`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallLog {
    pub allocate: Vec<AllocateCall>,
    pub deallocate: Vec<DeallocateCall>,
    pub is_equal: usize,
}

impl CallLog {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!("<call log could not be serialized: {e}>"))
    }
}

/// The mutable half of the mock: the call log plus the blocks currently
/// handed out.
#[derive(Default)]
pub(crate) struct Recorder {
    pub(crate) log: CallLog,
    /// Several live blocks can share an address (zero-sized blocks, or a stub
    /// handing out the same pointer twice), so each address keeps a list.
    live: HashMap<usize, Vec<Layout>>,
}

impl Recorder {
    /// Returns the index of the new call, for `complete_allocate()`.
    pub(crate) fn record_allocate(&mut self, layout: Layout) -> usize {
        self.log.allocate.push(AllocateCall {
            bytes: layout.size(),
            align: layout.align(),
            address: None,
        });
        self.log.allocate.len() - 1
    }

    pub(crate) fn complete_allocate(&mut self, index: usize, data: NonNull<[u8]>, layout: Layout) {
        let address = data.cast::<u8>().as_ptr() as usize;
        // `reset()` may have run while the behaviour was executing
        if let Some(call) = self.log.allocate.get_mut(index) {
            call.address = Some(address);
        }
        self.live.entry(address).or_default().push(layout);
    }

    pub(crate) fn record_deallocate(&mut self, ptr: NonNull<u8>, layout: Layout) {
        let address = ptr.as_ptr() as usize;
        self.log.deallocate.push(DeallocateCall {
            address,
            bytes: layout.size(),
            align: layout.align(),
        });
        if let Some(layouts) = self.live.get_mut(&address) {
            match layouts.iter().rposition(|l| *l == layout) {
                Some(i) => {
                    layouts.swap_remove(i);
                }
                None => {
                    layouts.pop();
                }
            }
            if layouts.is_empty() {
                self.live.remove(&address);
            }
        }
    }

    pub(crate) fn record_is_equal(&mut self) {
        self.log.is_equal += 1;
    }

    pub(crate) fn count(&self, operation: Operation) -> usize {
        match operation {
            Operation::Allocate => self.log.allocate.len(),
            Operation::Deallocate => self.log.deallocate.len(),
            Operation::IsEqual => self.log.is_equal,
        }
    }

    pub(crate) fn live_allocations(&self) -> usize {
        self.live.values().map(Vec::len).sum()
    }

    pub(crate) fn live_bytes(&self) -> usize {
        self.live.values().flatten().map(Layout::size).sum()
    }

    pub(crate) fn reset(&mut self) {
        self.log = CallLog::default();
        self.live.clear();
    }
}
