//! [`ContinuationSlot`] is the successor-waker bookkeeping shared by every
//! `task` primitive, and [`Stoppable`] is the trait backing the
//! "unhandled stop" behaviour a frame falls back to when nobody is left to
//! wake.

use std::task::Waker;

/// Holds the waker of whichever task is currently awaiting this frame.
///
/// Defaults to a no-op waker so a frame can always be polled even before a
/// successor has registered interest (matching the C++ `continuation`
/// field's "resume a no-op coroutine" default).
pub struct ContinuationSlot {
	next: Waker,
}

impl Default for ContinuationSlot {
	fn default() -> Self {
		Self {
			next: Waker::noop().clone(),
		}
	}
}

impl ContinuationSlot {
	/// Creates a slot with no registered successor.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `waker` as the successor, replacing any previous one.
	pub fn set(&mut self, waker: &Waker) {
		if !self.next.will_wake(waker) {
			self.next = waker.clone();
		}
	}

	/// Returns the currently registered successor waker.
	pub fn get(&self) -> &Waker {
		&self.next
	}

	/// Wakes the registered successor (or the no-op waker if none was ever
	/// registered).
	pub fn wake(&self) {
		self.next.wake_by_ref();
	}
}

/// A frame that can be abandoned: dropped, or polled past completion,
/// without a successor ever having registered a waker.
///
/// The default implementation mirrors the destructor-time
/// `std::unreachable()`/`std::terminate()` behaviour the original
/// specification assigns to states that must never be reachable: it aborts
/// the process. A primitive whose body keeps running after its last
/// observer is gone (for example a forked `SemiDetachedTask` body) relies on
/// exactly this default when its continuation panics with nobody left to
/// report to.
pub trait Stoppable {
	/// Called when this frame is abandoned with no successor registered.
	///
	/// The default aborts the process and never returns. A type that wants
	/// to forward the stop structurally instead overrides this to return the
	/// ancestor's waker, so the caller can decide whether to resume it or
	/// propagate the stop further up.
	fn unhandled_stopped(&self) -> Waker {
		std::process::abort()
	}
}
