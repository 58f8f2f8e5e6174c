//! A minimal single-threaded driver: enough to pump a `Future` to
//! completion by parking the current thread between wakes, and enough to
//! let an orphaned frame keep running to completion after its creator has
//! stopped polling it.
//!
//! There is no reactor here: no timers, no I/O readiness, no work-stealing.
//! Anything that needs those belongs to the surrounding application, not to
//! this substrate.

use std::{
	cell::RefCell,
	collections::VecDeque,
	future::Future,
	pin::Pin,
	sync::Arc,
	task::{Context, Poll, Wake, Waker},
	thread::{self, Thread},
};

struct ParkWaker(Thread);

impl Wake for ParkWaker {
	fn wake(self: Arc<Self>) {
		self.0.unpark();
	}
	fn wake_by_ref(self: &Arc<Self>) {
		self.0.unpark();
	}
}

/// Drives `fut` to completion on the current thread, parking between wakes.
///
/// This is the driver behind `Task::sync_await` and behind the detached
/// top-level spawn used by `DetachedTask`/`SemiDetachedTask`/transaction
/// rollback: it is deliberately the only way a future ever actually gets
/// polled in this crate family, so every other primitive composes futures
/// rather than drives them.
pub fn drive<F: Future>(fut: F) -> F::Output {
	let waker = Waker::from(Arc::new(ParkWaker(thread::current())));
	let mut cx = Context::from_waker(&waker);
	let mut fut = std::pin::pin!(fut);
	loop {
		match fut.as_mut().poll(&mut cx) {
			Poll::Ready(v) => return v,
			Poll::Pending => thread::park(),
		}
	}
}

thread_local! {
	static DETACHED: RefCell<VecDeque<Pin<Box<dyn Future<Output = ()>>>>> = RefCell::new(VecDeque::new());
}

/// Registers `fut` to be run to completion independently of its creator.
///
/// This backs `DetachedTask` and `SemiDetachedTask`'s forked continuation:
/// both need a frame that keeps going after the handle that spawned it is
/// gone, matching the original specification's "leaked, self-driving
/// coroutine" contract. `Transaction`'s drop-triggered rollback cannot use
/// this path (its subject borrow does not outlive the `Transaction` itself),
/// so it falls back to [`drive`] run synchronously inside `Drop::drop`
/// instead.
///
/// The frame is not actually polled until [`run_detached`] is called
/// (typically once, at the end of `main`, or once per test). This keeps the
/// substrate single-threaded and free of any background thread or global
/// executor.
pub fn spawn_detached(fut: impl Future<Output = ()> + 'static) {
	DETACHED.with(|queue| queue.borrow_mut().push_back(Box::pin(fut)));
}

/// Polls every detached frame registered via [`spawn_detached`] to
/// completion, including any further frames spawned transitively while
/// draining the queue.
pub fn run_detached() {
	let waker = Waker::noop().clone();
	let mut cx = Context::from_waker(&waker);
	loop {
		let next = DETACHED.with(|queue| queue.borrow_mut().pop_front());
		let Some(mut fut) = next else {
			break;
		};
		loop {
			match fut.as_mut().poll(&mut cx) {
				Poll::Ready(()) => break,
				Poll::Pending => thread::yield_now(),
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::future::ready;

	#[test]
	fn drive_returns_ready_value() {
		assert_eq!(drive(ready(5)), 5);
	}

	#[test]
	fn run_detached_drains_queue() {
		use std::sync::atomic::{AtomicBool, Ordering};
		static DONE: AtomicBool = AtomicBool::new(false);
		spawn_detached(async {
			DONE.store(true, Ordering::SeqCst);
		});
		run_detached();
		assert!(DONE.load(Ordering::SeqCst));
	}
}
