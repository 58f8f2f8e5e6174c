#![warn(clippy::pedantic)]
//! Ready-made transaction subjects. [`AsyncLock`] demonstrates `task`'s
//! customization points end-to-end over a real contended resource.

use std::{future::Future, pin::Pin, sync::Arc};

use async_lock::{Mutex, MutexGuardArc};
use task::{TransactionBegin, TransactionCommit, TransactionRollback};

/// A transaction subject wrapping `async_lock::Mutex<T>`.
///
/// `transaction_begin` acquires the lock, handing the body the guard via
/// `begin_result()`; `transaction_commit`/`transaction_rollback` are both
/// no-ops: the guard's own `Drop`, which runs when the enclosing
/// transaction's frame is dropped after commit or rollback, is what
/// actually releases the lock.
pub struct AsyncLock<T> {
	inner: Arc<Mutex<T>>,
}

impl<T> AsyncLock<T> {
	/// Wraps `value` behind a lock usable as a transaction subject.
	pub fn new(value: T) -> Self {
		Self {
			inner: Arc::new(Mutex::new(value)),
		}
	}
}

impl<T: 'static> TransactionBegin for AsyncLock<T> {
	type Output = MutexGuardArc<T>;
	type Fut<'a>
		= Pin<Box<dyn Future<Output = MutexGuardArc<T>> + 'a>>
	where
		Self: 'a;

	fn transaction_begin(&mut self) -> Self::Fut<'_> {
		let inner = self.inner.clone();
		Box::pin(async move { inner.lock_arc().await })
	}
}

impl<T> TransactionCommit for AsyncLock<T> {
	type Fut<'a>
		= std::future::Ready<()>
	where
		Self: 'a;

	fn transaction_commit(&mut self) -> Self::Fut<'_> {
		std::future::ready(())
	}
}

impl<T> TransactionRollback for AsyncLock<T> {
	type Fut<'a>
		= std::future::Ready<()>
	where
		Self: 'a;

	fn transaction_rollback(&mut self) -> Self::Fut<'_> {
		std::future::ready(())
	}
}
