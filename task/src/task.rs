//! [`Task`], the plain lazy single-shot awaitable.

use std::{
	future::Future,
	pin::Pin,
	task::{Context, Poll},
};

use task_core::cell::{poll_into_cell, ResultCell};

/// A lazy, single-shot suspendable computation.
///
/// A `Task<T>` does not run its body until first polled (typically via
/// `.await`), and panics if polled again after it has already produced
/// `Poll::Ready`. Dropping a `Task<T>` that has not resolved yet simply
/// drops its boxed body, running local destructors without resuming it any
/// further.
#[must_use = "a Task does nothing unless awaited"]
pub struct Task<T> {
	body: Option<Pin<Box<dyn Future<Output = T>>>>,
	cell: ResultCell<T>,
}

impl<T> Task<T> {
	/// Boxes and pins `future` as a new, not-yet-started task.
	pub fn new(future: impl Future<Output = T> + 'static) -> Self {
		Self {
			body: Some(Box::pin(future)),
			cell: ResultCell::Empty,
		}
	}

	/// Drains this task to completion on the current thread, parking
	/// between wakes.
	///
	/// Test-only: this only terminates for tasks that complete without a
	/// genuine external suspension, since this crate ships no I/O reactor.
	/// Production code should `.await` a `Task` from within its own async
	/// context instead.
	pub fn sync_await(self) -> T
	where
		T: Unpin,
	{
		task_core::runtime::drive(self)
	}
}

// `cell: ResultCell<T>` is stored by value (unlike C5/C6, which park their
// cell behind `Rc<RefCell<_>>`), so `Task<T>: Unpin` only when `T: Unpin`;
// `Pin<&mut Self>::deref_mut` below needs exactly that.
impl<T: Unpin> Future for Task<T> {
	type Output = T;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
		let body = self
			.body
			.as_mut()
			.expect("Task polled again after it already resolved");
		match poll_into_cell(body.as_mut(), &mut self.cell, cx) {
			Poll::Pending => Poll::Pending,
			Poll::Ready(()) => {
				self.body = None;
				Poll::Ready(self.cell.take())
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn resolves_with_inner_value() {
		let task = Task::new(async { 2 + 2 });
		assert_eq!(task.sync_await(), 4);
	}

	#[test]
	fn runs_nested_tasks_in_one_poll_chain() {
		let task = Task::new(async {
			let inner = Task::new(async { 41 });
			inner.await + 1
		});
		assert_eq!(task.sync_await(), 42);
	}

	#[test]
	#[should_panic(expected = "boom")]
	fn panic_in_body_propagates_on_take() {
		let task = Task::new(async {
			panic!("boom");
			#[allow(unreachable_code)]
			()
		});
		task.sync_await();
	}

	#[test]
	#[should_panic(expected = "polled again")]
	fn double_poll_after_ready_panics() {
		use std::task::Waker;
		let mut task = Task::new(async { 1 });
		let waker = Waker::noop().clone();
		let mut cx = Context::from_waker(&waker);
		let pinned = Pin::new(&mut task);
		let _ = Future::poll(pinned, &mut cx);
		let pinned = Pin::new(&mut task);
		let _ = Future::poll(pinned, &mut cx);
	}
}
