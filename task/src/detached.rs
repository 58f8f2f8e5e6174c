//! [`DetachedTask`], a fire-and-forget body driven to completion by
//! [`DetachedTask::start`].

use std::{
	any::Any,
	error::Error,
	fmt,
	future::Future,
	panic::{catch_unwind, AssertUnwindSafe},
	pin::Pin,
};

/// A non-awaitable task started explicitly and driven to completion.
///
/// Unlike [`Task`](crate::Task), a `DetachedTask` is not `Future`: it has no
/// result to hand an awaiter. Its only operation is [`start`](Self::start),
/// which drives the body to completion and reports a panic, if any, through
/// [`DetachedTaskUnhandledExit`] rather than unwinding the caller's stack.
#[must_use = "a DetachedTask does nothing unless started"]
pub struct DetachedTask {
	body: Pin<Box<dyn Future<Output = ()>>>,
}

impl DetachedTask {
	/// Boxes and pins `future` as a new, not-yet-started detached task.
	pub fn new(future: impl Future<Output = ()> + 'static) -> Self {
		Self {
			body: Box::pin(future),
		}
	}

	/// Drives the body to completion on the current thread.
	///
	/// Catches the panic at this boundary rather than inside the frame's own
	/// `poll`, so that by the time a failure is observed the frame has
	/// already been fully polled (and, being `Ready` or panicked, is safe to
	/// drop); the frame is then wrapped into the returned error rather than
	/// managed through a separate dangling-frame handle.
	pub fn start(self) -> Result<(), DetachedTaskUnhandledExit> {
		let body = self.body;
		let frame_ref = Pin::get_ref(body.as_ref()) as *const dyn Future<Output = ()> as *const ();
		match catch_unwind(AssertUnwindSafe(|| task_core::runtime::drive(body))) {
			Ok(()) => Ok(()),
			Err(payload) => Err(DetachedTaskUnhandledExit {
				payload,
				frame_ref: frame_ref as usize,
			}),
		}
	}
}

/// A detached task's body panicked instead of completing normally.
///
/// Carries the original panic payload, exposed through [`Error::source`]
/// when it can be downcast to `Box<dyn Error + Send>`.
pub struct DetachedTaskUnhandledExit {
	payload: Box<dyn Any + Send>,
	frame_ref: usize,
}

impl DetachedTaskUnhandledExit {
	/// The message every instance displays, fixed regardless of payload.
	pub const MESSAGE: &'static str = "detached task exited with an unhandled panic";

	/// A debug-only identifier of the frame that failed: the address the
	/// boxed body lived at while it was being driven.
	///
	/// Not a stable identity and not meaningful across processes; useful only
	/// for correlating a log line with a specific failed frame within a
	/// single run.
	pub fn detached_task_ref(&self) -> usize {
		self.frame_ref
	}
}

impl fmt::Debug for DetachedTaskUnhandledExit {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DetachedTaskUnhandledExit")
			.field("message", &Self::MESSAGE)
			.field("detached_task_ref", &self.frame_ref)
			.finish()
	}
}

impl fmt::Display for DetachedTaskUnhandledExit {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(Self::MESSAGE)
	}
}

impl Error for DetachedTaskUnhandledExit {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		self.payload
			.downcast_ref::<Box<dyn Error + Send>>()
			.map(|e| e.as_ref() as &(dyn Error + 'static))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn start_runs_body_to_completion() {
		let flag = std::rc::Rc::new(std::cell::Cell::new(false));
		let flag2 = flag.clone();
		let task = DetachedTask::new(async move {
			flag2.set(true);
		});
		assert!(task.start().is_ok());
		assert!(flag.get());
	}

	#[test]
	fn panic_is_reported_as_unhandled_exit() {
		let task = DetachedTask::new(async {
			panic!("detached boom");
		});
		let err = task.start().unwrap_err();
		assert_eq!(err.to_string(), DetachedTaskUnhandledExit::MESSAGE);
		assert_ne!(err.detached_task_ref(), 0);
	}
}
