//! Per-worker thread identity.
//!
//! A small integer id, set once per worker and retrieved by every per-thread
//! data structure (EBR reservations, RNG state, partial-queue indices).
//! Grounded on the original's `MyThreadID` (`my_thread_id.h`): `Set`/`Get`
//! misuse is a programmer error, not a recoverable one.

use std::cell::Cell;

/// The id reserved for the driver/main thread, which never performs queue
/// operations but does construct subjects and graphs.
pub const MAIN_THREAD_ID: i32 = -1;

thread_local! {
    static THREAD_ID: Cell<Option<i32>> = const { Cell::new(None) };
}

/// Assign this worker's id. Must be called exactly once per OS thread,
/// before any call to [`get`].
///
/// # Panics
/// Panics if this thread already has an id assigned.
pub fn set(id: i32) {
    THREAD_ID.with(|cell| {
        if cell.get().is_some() {
            panic!("thread id has already been assigned on this thread");
        }
        cell.set(Some(id));
    });
}

/// Retrieve this worker's id.
///
/// # Panics
/// Panics if [`set`] has not been called on this thread yet.
pub fn get() -> i32 {
    THREAD_ID.with(|cell| {
        cell.get()
            .unwrap_or_else(|| panic!("must register thread id via thread_id::set before use"))
    })
}

/// Convenience for spawned workers: index into a `num_thread`-sized array.
pub fn get_index() -> usize {
    let id = get();
    debug_assert!(id >= 0, "worker index requested on a non-worker thread");
    id as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each #[test] already runs on its own fresh OS thread under the test
    // harness, so the thread-local state here does not leak across cases.

    #[test]
    fn set_then_get_roundtrips() {
        set(3);
        assert_eq!(get(), 3);
        assert_eq!(get_index(), 3);
    }

    #[test]
    #[should_panic(expected = "must register thread id")]
    fn get_before_set_panics() {
        let _ = get();
    }

    #[test]
    #[should_panic(expected = "already been assigned")]
    fn double_set_panics() {
        set(0);
        set(1);
    }
}
