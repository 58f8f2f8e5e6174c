//! [`Transaction`]: a body wrapped with subject-provided begin/commit/
//! rollback lifecycle futures, with a guaranteed rollback-on-drop fallback.
//!
//! Rust has no stable `AsyncDrop`, so the "spawn a best-effort detached
//! rollback" fallback this primitive is specified to run on an abandoned
//! transaction is realised here as a *synchronous* drive-to-completion
//! inside [`Drop::drop`] (via [`task_core::runtime::drive`]) rather than a
//! true background task: the subject reference cannot outlive the
//! `Transaction` borrowing it, so nothing we spawned could keep running past
//! that point regardless. Any panic from that fallback rollback is swallowed:
//! a transaction's destructor must never itself panic.

use std::{
	cell::{RefCell, RefMut},
	future::Future,
	panic::{catch_unwind, AssertUnwindSafe},
	pin::Pin,
	rc::Rc,
	task::{Context, Poll},
};

use pin_project::pin_project;
use task_core::cell::Failure;

/// Constructs the begin-phase future for a transaction subject.
///
/// `Output` is whatever the body should see through
/// [`TransactionHandle::begin_result`]; for subjects with nothing to hand
/// the body, use `Output = ()`.
pub trait TransactionBegin {
	/// What the body observes through [`TransactionHandle::begin_result`].
	type Output;
	/// The begin-phase future.
	type Fut<'a>: Future<Output = Self::Output>
	where
		Self: 'a;
	/// Starts the transaction against this subject.
	fn transaction_begin(&mut self) -> Self::Fut<'_>;
}

/// Constructs the commit-phase future for a transaction subject.
pub trait TransactionCommit {
	/// The commit-phase future.
	type Fut<'a>: Future<Output = ()>
	where
		Self: 'a;
	/// Commits the transaction against this subject.
	fn transaction_commit(&mut self) -> Self::Fut<'_>;
}

/// Constructs the rollback-phase future for a transaction subject.
pub trait TransactionRollback {
	/// The rollback-phase future.
	type Fut<'a>: Future<Output = ()>
	where
		Self: 'a;
	/// Rolls the transaction back against this subject.
	fn transaction_rollback(&mut self) -> Self::Fut<'_>;
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Status {
	NeedRollback,
	NeedCommit,
	Done,
}

/// A future that catches a panic raised on any single poll of its inner
/// future, rather than letting it unwind through the caller.
///
/// This is the only sound way to "catch a panic across an `.await`": wrap
/// each individual `poll` call, not the `.await` expression itself (a
/// `catch_unwind` closure cannot itself suspend, so it cannot wrap more than
/// one poll at a time).
#[pin_project]
struct CatchUnwind<F> {
	#[pin]
	inner: F,
}

impl<F: Future> Future for CatchUnwind<F> {
	type Output = Result<F::Output, Failure>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let this = self.project();
		match catch_unwind(AssertUnwindSafe(|| this.inner.poll(cx))) {
			Ok(Poll::Ready(v)) => Poll::Ready(Ok(v)),
			Ok(Poll::Pending) => Poll::Pending,
			Err(payload) => Poll::Ready(Err(payload)),
		}
	}
}

/// Handed to a transaction's body, letting it read the begin phase's output
/// and request an eager rollback.
pub struct TransactionHandle<Subj: TransactionBegin + TransactionRollback> {
	subject: Rc<RefCell<&'static mut Subj>>,
	begin_output: Rc<RefCell<Subj::Output>>,
	status: Rc<RefCell<Status>>,
}

impl<Subj: TransactionBegin + TransactionRollback> Clone for TransactionHandle<Subj> {
	fn clone(&self) -> Self {
		Self {
			subject: self.subject.clone(),
			begin_output: self.begin_output.clone(),
			status: self.status.clone(),
		}
	}
}

impl<Subj: TransactionBegin + TransactionRollback> TransactionHandle<Subj> {
	/// Borrows the value the subject's begin phase produced, mutably: a
	/// transaction subject like a lock guard needs exclusive access to be
	/// useful to its body.
	pub fn begin_result(&self) -> RefMut<'_, Subj::Output> {
		self.begin_output.borrow_mut()
	}

	/// Rolls the subject back immediately instead of waiting for the body
	/// to return and the transaction to dispatch on its final status.
	///
	/// Idempotent: calling this more than once, or calling it after the
	/// transaction has already settled, is a no-op.
	pub async fn eager_rollback(&self) {
		if *self.status.borrow() == Status::Done {
			return;
		}
		*self.status.borrow_mut() = Status::Done;
		let mut guard = self.subject.borrow_mut();
		guard.transaction_rollback().await;
	}
}

/// Wraps a body with a subject's begin → commit/rollback lifecycle.
///
/// Borrows the subject for as long as the transaction is being polled;
/// callers must ensure it outlives the awaited transaction, enforced by the
/// borrow checker.
#[must_use = "a Transaction does nothing unless awaited"]
pub struct Transaction<'subj, Subj, T>
where
	Subj: TransactionBegin + TransactionCommit + TransactionRollback,
{
	// SAFETY: the `'static` here is a lie bounded by construction, see
	// `Transaction::new`. The real lifetime is `'subj`, tracked by the
	// `PhantomData` below; `subject` is never exposed, cloned out, or used
	// past `'subj` from outside this module.
	subject: Rc<RefCell<&'static mut Subj>>,
	status: Rc<RefCell<Status>>,
	inner: Option<Pin<Box<dyn Future<Output = T> + 'subj>>>,
	_subj: std::marker::PhantomData<&'subj mut Subj>,
}

impl<'subj, Subj, T> Transaction<'subj, Subj, T>
where
	Subj: TransactionBegin + TransactionCommit + TransactionRollback + 'subj,
	T: 'subj,
{
	/// Constructs a transaction over `subject`. `body` receives a
	/// [`TransactionHandle`] for reading the begin output and requesting an
	/// eager rollback.
	pub fn new<Fut>(
		subject: &'subj mut Subj,
		body: impl FnOnce(TransactionHandle<Subj>) -> Fut + 'subj,
	) -> Self
	where
		Fut: Future<Output = T> + 'subj,
	{
		// SAFETY: erasing `'subj` to `'static` here is sound because every
		// use of `subject_cell` below (in `inner`, in `TransactionHandle`,
		// and in `Drop::drop`) is itself bounded by `'subj`: `inner` is a
		// `dyn Future + 'subj`, `TransactionHandle<Subj>` is only ever
		// handed to `body` (itself `'subj`-bounded), and `Drop::drop` runs
		// no later than the end of `'subj` by construction (this struct
		// borrows `subject` for exactly that long). No access ever escapes
		// past `'subj`.
		let subject_ptr: *mut Subj = subject;
		let subject: &'static mut Subj = unsafe { &mut *subject_ptr };
		let subject_cell: Rc<RefCell<&'static mut Subj>> = Rc::new(RefCell::new(subject));
		let status: Rc<RefCell<Status>> = Rc::new(RefCell::new(Status::NeedRollback));

		let inner_subject = subject_cell.clone();
		let inner_status = status.clone();
		let inner: Pin<Box<dyn Future<Output = T> + 'subj>> = Box::pin(async move {
			let begin_output = {
				let mut guard = inner_subject.borrow_mut();
				guard.transaction_begin().await
			};
			let handle = TransactionHandle {
				subject: inner_subject.clone(),
				begin_output: Rc::new(RefCell::new(begin_output)),
				status: inner_status.clone(),
			};
			match (CatchUnwind { inner: body(handle) }).await {
				Ok(v) => {
					if *inner_status.borrow() == Status::Done {
						// The body called `eager_rollback`; nothing left to do.
						v
					} else {
						*inner_status.borrow_mut() = Status::NeedCommit;
						{
							let mut guard = inner_subject.borrow_mut();
							guard.transaction_commit().await;
						}
						*inner_status.borrow_mut() = Status::Done;
						v
					}
				}
				Err(payload) => {
					if *inner_status.borrow() != Status::Done {
						*inner_status.borrow_mut() = Status::Done;
						let mut guard = inner_subject.borrow_mut();
						guard.transaction_rollback().await;
					}
					std::panic::resume_unwind(payload);
				}
			}
		});

		Self {
			subject: subject_cell,
			status,
			inner: Some(inner),
			_subj: std::marker::PhantomData,
		}
	}
}

impl<'subj, Subj, T> Future for Transaction<'subj, Subj, T>
where
	Subj: TransactionBegin + TransactionCommit + TransactionRollback,
{
	type Output = T;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
		let inner = self
			.inner
			.as_mut()
			.expect("Transaction polled again after it already resolved");
		match inner.as_mut().poll(cx) {
			Poll::Pending => Poll::Pending,
			Poll::Ready(v) => {
				self.inner = None;
				Poll::Ready(v)
			}
		}
	}
}

impl<'subj, Subj, T> Drop for Transaction<'subj, Subj, T>
where
	Subj: TransactionBegin + TransactionCommit + TransactionRollback,
{
	fn drop(&mut self) {
		// Release any borrow `inner` might still hold before we try our own.
		self.inner = None;
		match *self.status.borrow() {
			Status::Done => {}
			Status::NeedCommit => {
				panic!("Transaction dropped in NeedCommit state: an internal invariant was violated")
			}
			Status::NeedRollback => {
				let subject = self.subject.clone();
				let swallowed = catch_unwind(AssertUnwindSafe(|| {
					task_core::runtime::drive(async move {
						let mut guard = subject.borrow_mut();
						guard.transaction_rollback().await;
					});
				}));
				drop(swallowed);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::future::ready;

	struct Counter {
		began: bool,
		committed: bool,
		rolled_back: bool,
	}

	impl TransactionBegin for Counter {
		type Output = ();
		type Fut<'a>
			= std::future::Ready<()>
		where
			Self: 'a;
		fn transaction_begin(&mut self) -> Self::Fut<'_> {
			self.began = true;
			ready(())
		}
	}
	impl TransactionCommit for Counter {
		type Fut<'a>
			= std::future::Ready<()>
		where
			Self: 'a;
		fn transaction_commit(&mut self) -> Self::Fut<'_> {
			self.committed = true;
			ready(())
		}
	}
	impl TransactionRollback for Counter {
		type Fut<'a>
			= std::future::Ready<()>
		where
			Self: 'a;
		fn transaction_rollback(&mut self) -> Self::Fut<'_> {
			self.rolled_back = true;
			ready(())
		}
	}

	#[test]
	fn successful_body_commits() {
		let mut subject = Counter {
			began: false,
			committed: false,
			rolled_back: false,
		};
		let tx = Transaction::new(&mut subject, |_handle| async move { 42 });
		assert_eq!(task_core::runtime::drive(tx), 42);
		assert!(subject.began);
		assert!(subject.committed);
		assert!(!subject.rolled_back);
	}

	#[test]
	#[should_panic(expected = "tx boom")]
	fn panicking_body_rolls_back_then_propagates() {
		let mut subject = Counter {
			began: false,
			committed: false,
			rolled_back: false,
		};
		let tx = Transaction::new(&mut subject, |_handle: TransactionHandle<Counter>| async move {
			panic!("tx boom");
			#[allow(unreachable_code)]
			()
		});
		task_core::runtime::drive(tx);
	}

	#[test]
	fn eager_rollback_skips_commit() {
		let mut subject = Counter {
			began: false,
			committed: false,
			rolled_back: false,
		};
		let tx = Transaction::new(&mut subject, |handle: TransactionHandle<Counter>| async move {
			handle.eager_rollback().await;
			7
		});
		assert_eq!(task_core::runtime::drive(tx), 7);
		assert!(!subject.committed);
		assert!(subject.rolled_back);
	}
}
