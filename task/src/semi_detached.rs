//! [`SemiDetachedTask`]: behaves like [`Task`](crate::Task) until its body
//! calls [`fork_return`], after which the awaiter resolves early and the
//! body keeps running detached.

use std::{
	cell::RefCell,
	future::Future,
	panic::{catch_unwind, AssertUnwindSafe},
	pin::Pin,
	rc::Rc,
	task::{Context, Poll},
};

use task_core::{cell::ResultCell, continuation::Stoppable};

type SharedCell<T> = Rc<RefCell<ResultCell<T>>>;

/// A task whose body can publish an early result via [`fork_return`] and
/// keep running afterwards, detached from its former awaiter.
#[must_use = "a SemiDetachedTask does nothing unless awaited"]
pub struct SemiDetachedTask<T> {
	body: Option<Pin<Box<dyn Future<Output = ()>>>>,
	cell: SharedCell<T>,
}

impl<T: 'static> SemiDetachedTask<T> {
	/// Constructs a semi-detached task from a body that receives a
	/// [`ForkHandle`] it can use to call [`fork_return`].
	pub fn new<Fut>(body: impl FnOnce(ForkHandle<T>) -> Fut) -> Self
	where
		Fut: Future<Output = ()> + 'static,
	{
		let cell: SharedCell<T> = Rc::new(RefCell::new(ResultCell::Empty));
		let handle = ForkHandle { cell: cell.clone() };
		Self {
			body: Some(Box::pin(body(handle))),
			cell,
		}
	}
}

/// Handle passed to a [`SemiDetachedTask`]'s body, used to call
/// [`fork_return`].
pub struct ForkHandle<T> {
	cell: SharedCell<T>,
}

impl<T> Clone for ForkHandle<T> {
	fn clone(&self) -> Self {
		Self {
			cell: self.cell.clone(),
		}
	}
}

/// Publishes `value` to the awaiter of the enclosing [`SemiDetachedTask`]
/// and lets the body keep running afterwards, now detached.
///
/// `fork_return(value).await` always completes on its first poll: the
/// hand-off is synchronous from the body's perspective.
pub fn fork_return<T>(handle: &ForkHandle<T>, value: T) -> ForkReturn<'_, T> {
	ForkReturn {
		cell: &handle.cell,
		value: Some(value),
	}
}

/// The future returned by [`fork_return`].
#[must_use = "fork_return does nothing unless awaited"]
pub struct ForkReturn<'a, T> {
	cell: &'a SharedCell<T>,
	value: Option<T>,
}

impl<T> Future for ForkReturn<'_, T> {
	type Output = ();

	fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
		let value = self
			.value
			.take()
			.expect("fork_return polled again after it already completed");
		self.cell.borrow_mut().set_value(value);
		Poll::Ready(())
	}
}

impl<T> Future for SemiDetachedTask<T> {
	type Output = T;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
		if !self.cell.borrow().is_empty() {
			return Poll::Ready(self.cell.borrow_mut().take());
		}
		let body = self
			.body
			.as_mut()
			.expect("SemiDetachedTask polled again after it already resolved");
		match catch_unwind(AssertUnwindSafe(|| body.as_mut().poll(cx))) {
			Ok(Poll::Ready(())) => {
				self.body = None;
				assert!(
					!self.cell.borrow().is_empty(),
					"SemiDetachedTask body returned without ever calling fork_return"
				);
				Poll::Ready(self.cell.borrow_mut().take())
			}
			Ok(Poll::Pending) => {
				if self.cell.borrow().is_empty() {
					Poll::Pending
				} else {
					let body = self.body.take().unwrap();
					spawn_remaining_body(body);
					Poll::Ready(self.cell.borrow_mut().take())
				}
			}
			Err(payload) => {
				self.body = None;
				if self.cell.borrow().is_empty() {
					// Panicked before ever forking: same as a plain `Task<T>`.
					self.cell.borrow_mut().set_failure(payload);
					Poll::Ready(self.cell.borrow_mut().take())
				} else {
					// Already forked `v` to the awaiter in this same poll
					// before panicking further down the same synchronous
					// continuation; the awaiter gets `v`, and the panic has
					// no one left to report to.
					drop(payload);
					NoConsumer.unhandled_stopped();
					unreachable!("unhandled_stopped's default aborts the process")
				}
			}
		}
	}
}

/// A forked body has no live consumer once its handle has resolved; it falls
/// back to [`Stoppable`]'s default behaviour on a panic instead of reporting
/// to anyone.
struct NoConsumer;

impl Stoppable for NoConsumer {}

/// Keeps polling a forked body to completion independently of the handle
/// that spawned it.
///
/// A panic here has no live consumer to deliver it to (the awaiter already
/// moved on with its forked value), so it is treated like any other
/// unhandled stop: [`NoConsumer`]'s default `Stoppable::unhandled_stopped`
/// aborts the process.
fn spawn_remaining_body(mut body: Pin<Box<dyn Future<Output = ()>>>) {
	task_core::runtime::spawn_detached(std::future::poll_fn(move |cx| {
		catch_unwind(AssertUnwindSafe(|| body.as_mut().poll(cx))).unwrap_or_else(|_| {
			NoConsumer.unhandled_stopped();
			unreachable!("unhandled_stopped's default aborts the process")
		})
	}));
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn resolves_early_via_fork_return() {
		let task = SemiDetachedTask::new(|cc: ForkHandle<i32>| async move {
			fork_return(&cc, 7).await;
		});
		assert_eq!(task_core::runtime::drive(task), 7);
	}

	#[test]
	#[should_panic(expected = "boom")]
	fn panic_before_fork_propagates_to_awaiter() {
		let task = SemiDetachedTask::new(|_cc: ForkHandle<i32>| async move {
			panic!("boom");
		});
		task_core::runtime::drive(task);
	}

	#[test]
	fn body_keeps_running_after_fork() {
		let ran_after_fork = Rc::new(RefCell::new(false));
		let flag = ran_after_fork.clone();
		let task = SemiDetachedTask::new(move |cc: ForkHandle<i32>| async move {
			fork_return(&cc, 1).await;
			*flag.borrow_mut() = true;
		});
		assert_eq!(task_core::runtime::drive(task), 1);
		task_core::runtime::run_detached();
		assert!(*ran_after_fork.borrow());
	}
}
