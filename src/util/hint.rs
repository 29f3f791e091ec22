/// Run `f` on a path the optimiser should treat as unlikely.
#[cold]
#[inline(never)]
pub fn cold<R, F: FnOnce() -> R>(f: F) -> R {
    f()
}
