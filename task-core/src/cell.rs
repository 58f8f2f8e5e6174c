//! [`ResultCell`] is the tri-state value/failure holder shared by every
//! primitive in `task`. It plays the role the original specification calls
//! the "result cell": written at most once, read at most once.

use std::{
	any::Any,
	error::Error,
	future::Future,
	panic::{catch_unwind, AssertUnwindSafe},
	pin::Pin,
	task::{Context, Poll},
};

/// A captured panic payload, exactly the type `std::panic::catch_unwind`
/// produces. Using the same type as the standard library's own unwind
/// machinery lets [`ResultCell::take`] "rethrow" a failure with
/// `std::panic::resume_unwind`, propagating through any synchronous `.await`
/// chain the same way an exception would propagate through resumed
/// coroutine frames in the original specification.
pub type Failure = Box<dyn Any + Send>;

/// Wraps `e` as a [`Failure`]. A convenience for callers who have a concrete
/// error value rather than an in-flight panic.
pub fn capture<E: Error + Send + 'static>(e: E) -> Failure {
	Box::new(e)
}

/// Tri-state holder: empty / value / failure.
///
/// Invariants (see `SPEC_FULL.md` §3):
/// - empty from construction until exactly one of `set_value`/`set_void`/
///   `set_failure` is called;
/// - at most one of those three is ever called;
/// - `take` is called at most once and requires the cell non-empty.
pub enum ResultCell<T> {
	/// Nothing has been written yet.
	Empty,
	/// A value was written.
	Value(T),
	/// A failure was written; `take` resumes it.
	Failure(Failure),
}

impl<T> Default for ResultCell<T> {
	fn default() -> Self {
		ResultCell::Empty
	}
}

impl<T> ResultCell<T> {
	/// Writes `v` into the cell.
	///
	/// # Panics
	///
	/// Panics (contract violation) if the cell is not empty.
	pub fn set_value(&mut self, v: T) {
		debug_assert!(self.is_empty(), "ResultCell written to twice");
		*self = ResultCell::Value(v);
	}

	/// Writes a failure into the cell.
	///
	/// # Panics
	///
	/// Panics (contract violation) if the cell is not empty.
	pub fn set_failure(&mut self, e: Failure) {
		debug_assert!(self.is_empty(), "ResultCell written to twice");
		*self = ResultCell::Failure(e);
	}

	/// Whether the cell is still unwritten.
	pub fn is_empty(&self) -> bool {
		matches!(self, ResultCell::Empty)
	}

	/// Moves the value out, or resumes the captured failure.
	///
	/// # Panics
	///
	/// Panics if the cell is empty (a contract violation: `take` must only be
	/// called once the cell holds something). Resumes the captured panic if
	/// the cell holds a [`Failure`].
	pub fn take(&mut self) -> T {
		match std::mem::replace(self, ResultCell::Empty) {
			ResultCell::Empty => panic!("ResultCell::take called on an empty cell"),
			ResultCell::Value(v) => v,
			ResultCell::Failure(e) => std::panic::resume_unwind(e),
		}
	}
}

impl<T> ResultCell<T> {
	/// Alias for `set_value(())`, spelled out for the void case to match the
	/// original's `return_void` vocabulary.
	pub fn set_void(&mut self)
	where
		T: Default,
	{
		self.set_value(T::default());
	}
}

/// Polls `fut`, catching any panic, and writes whichever of value/failure
/// results into `cell`.
///
/// This is the Rust analogue of the promise hooks `unhandled_exception`/
/// `return_value`/`return_void` from the original specification: every
/// primitive in `task` is built by driving its inner future through this
/// helper rather than polling it directly.
///
/// Returns `Poll::Ready(())` once `cell` holds something, `Poll::Pending`
/// otherwise.
pub fn poll_into_cell<T>(
	fut: Pin<&mut (dyn Future<Output = T> + '_)>,
	cell: &mut ResultCell<T>,
	cx: &mut Context<'_>,
) -> Poll<()> {
	match catch_unwind(AssertUnwindSafe(|| fut.poll(cx))) {
		Ok(Poll::Ready(v)) => {
			cell.set_value(v);
			Poll::Ready(())
		}
		Ok(Poll::Pending) => Poll::Pending,
		Err(payload) => {
			cell.set_failure(payload);
			Poll::Ready(())
		}
	}
}
