//! [`CallccTask`] and its [`Cc`] handle: call-with-current-continuation for
//! a suspendable computation.

use std::{
	cell::RefCell,
	future::Future,
	mem,
	panic::{catch_unwind, AssertUnwindSafe},
	pin::Pin,
	rc::Rc,
	task::{Context, Poll},
};

use task_core::cell::{Failure, ResultCell};

type SharedCell<T> = Rc<RefCell<ResultCell<T>>>;

/// A task whose body is handed its own continuation, [`Cc<T>`], and may
/// resolve the task directly by invoking it, short-circuiting whatever the
/// body was doing, including any nested tasks it had launched.
#[must_use = "a CallccTask does nothing unless awaited"]
pub struct CallccTask<T> {
	body: Option<Pin<Box<dyn Future<Output = std::convert::Infallible>>>>,
	cell: SharedCell<T>,
}

impl<T: 'static> CallccTask<T> {
	/// Constructs a call/cc task from a body that receives its own
	/// continuation handle and never returns normally.
	pub fn new<Fut>(body: impl FnOnce(Cc<T>) -> Fut) -> Self
	where
		Fut: Future<Output = std::convert::Infallible> + 'static,
	{
		let cell: SharedCell<T> = Rc::new(RefCell::new(ResultCell::Empty));
		let cc = Cc { cell: cell.clone() };
		Self {
			body: Some(Box::pin(body(cc))),
			cell,
		}
	}
}

/// A first-class handle to a [`CallccTask`]'s continuation.
///
/// `Clone`, may be stored and passed into nested computations, and invoking
/// it never panics on the caller's side.
pub struct Cc<T> {
	cell: SharedCell<T>,
}

impl<T> Clone for Cc<T> {
	fn clone(&self) -> Self {
		Self {
			cell: self.cell.clone(),
		}
	}
}

impl<T> Cc<T> {
	/// Resolves the owning [`CallccTask`] with `value`.
	pub fn call(&self, value: T) -> CcInvoke<'_, T> {
		CcInvoke {
			cell: &self.cell,
			outcome: Some(Ok(value)),
		}
	}

	/// Resolves the owning [`CallccTask`] by resuming `failure` on the
	/// awaiter's side, as though the body itself had panicked.
	pub fn call_with_failure(&self, failure: Failure) -> CcInvoke<'_, T> {
		CcInvoke {
			cell: &self.cell,
			outcome: Some(Err(failure)),
		}
	}
}

/// The future returned by [`Cc::call`]/[`Cc::call_with_failure`].
///
/// Its first poll publishes the outcome and returns `Poll::Ready`; every
/// poll thereafter returns `Poll::Pending` forever, permanently parking the
/// calling frame, mirroring "leaves every intermediate frame suspended"
/// from the original call/cc contract.
#[must_use = "a Cc invocation does nothing unless awaited"]
pub struct CcInvoke<'a, T> {
	cell: &'a SharedCell<T>,
	outcome: Option<Result<T, Failure>>,
}

impl<T> Future for CcInvoke<'_, T> {
	type Output = std::convert::Infallible;

	fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::convert::Infallible> {
		if let Some(outcome) = self.outcome.take() {
			let mut cell = self.cell.borrow_mut();
			match outcome {
				Ok(value) => cell.set_value(value),
				Err(failure) => cell.set_failure(failure),
			}
		}
		Poll::Pending
	}
}

impl<T> Future for CallccTask<T> {
	type Output = T;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
		if !self.cell.borrow().is_empty() {
			self.body = None;
			return Poll::Ready(self.cell.borrow_mut().take());
		}
		let body = self
			.body
			.as_mut()
			.expect("CallccTask polled again after it already resolved");
		let poll_result = catch_unwind(AssertUnwindSafe(|| body.as_mut().poll(cx)));
		if !self.cell.borrow().is_empty() {
			// The continuation was invoked while the body ran. The body
			// future is now permanently parked (it only ever reaches this
			// point through `CcInvoke`, which never completes); leak it
			// rather than drop it, since dropping would run destructors for
			// a frame the original contract treats as having already
			// transferred control away, irrevocably, to this point.
			if let Some(body) = self.body.take() {
				mem::forget(body);
			}
			return Poll::Ready(self.cell.borrow_mut().take());
		}
		match poll_result {
			Ok(Poll::Pending) => Poll::Pending,
			Ok(Poll::Ready(never)) => match never {},
			Err(payload) => {
				self.body = None;
				self.cell.borrow_mut().set_failure(payload);
				Poll::Ready(self.cell.borrow_mut().take())
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn resolves_via_direct_call() {
		let task = CallccTask::new(|cc: Cc<i32>| async move { cc.call(9).await });
		assert_eq!(task_core::runtime::drive(task), 9);
	}

	#[test]
	fn resolves_via_nested_closure_holding_the_handle() {
		let task = CallccTask::new(|cc: Cc<i32>| async move {
			let nested = cc.clone();
			let go = async move { nested.call(5).await };
			go.await
		});
		assert_eq!(task_core::runtime::drive(task), 5);
	}

	#[test]
	#[should_panic(expected = "callcc boom")]
	fn failure_payload_resumes_on_take() {
		let task = CallccTask::new(|cc: Cc<i32>| async move {
			cc.call_with_failure(Box::new("callcc boom")).await
		});
		task_core::runtime::drive(task);
	}
}
