//! Stack growth for the recursive parser and evaluator.
//!
//! Deeply nested source (or deep interpreted recursion below the call depth
//! limit) would otherwise overflow the native stack before any error could be
//! reported.

/// Grow when less than this remains.
const RED_ZONE: usize = 100 * 1024;

/// Size of each newly allocated stack segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}
