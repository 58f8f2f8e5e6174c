#![warn(clippy::pedantic)]
//! Ergonomic combinators over [`Task`], added via the [`TaskExt`] extension
//! trait rather than inherent methods, matching the teacher's own pattern
//! of keeping the core crate's surface minimal and layering ergonomics on
//! top through `ext-trait`.

use ext_trait::extension;
use task::{fork_return, DetachedTask, SemiDetachedTask, Task};

#[extension(pub trait TaskExt)]
impl<T: 'static> Task<T> {
	/// Maps the task's eventual result through `f`.
	fn map<U: 'static>(self, f: impl FnOnce(T) -> U + 'static) -> Task<U> {
		Task::new(async move { f(self.await) })
	}

	/// Fires the task and discards its result, wrapping it as a
	/// [`DetachedTask`] ready to [`start`](DetachedTask::start).
	fn detach(self) -> DetachedTask {
		DetachedTask::new(async move {
			let _ = self.await;
		})
	}

	/// Turns the task into a [`SemiDetachedTask`] that forks immediately
	/// with the original task's own eventual result.
	fn fork(self) -> SemiDetachedTask<T> {
		SemiDetachedTask::new(|cc| async move {
			let value = self.await;
			fork_return(&cc, value).await;
		})
	}

	/// Runs this task and `other` to completion, resolving with both
	/// results once both are ready.
	fn join<U: 'static>(self, other: Task<U>) -> Task<(T, U)> {
		Task::new(async move { (self.await, other.await) })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn map_transforms_the_result() {
		let task = Task::new(async { 3 }).map(|v| v * 2);
		assert_eq!(task.sync_await(), 6);
	}

	#[test]
	fn join_waits_for_both() {
		let task = Task::new(async { 1 }).join(Task::new(async { "a" }));
		assert_eq!(task.sync_await(), (1, "a"));
	}

	#[test]
	fn detach_runs_to_completion_via_start() {
		let flag = std::rc::Rc::new(std::cell::Cell::new(false));
		let flag2 = flag.clone();
		let task = Task::new(async move {
			flag2.set(true);
		})
		.detach();
		assert!(task.start().is_ok());
		assert!(flag.get());
	}

	#[test]
	fn fork_resolves_with_the_original_result() {
		let task = Task::new(async { 9 }).fork();
		assert_eq!(task_core::runtime::drive(task), 9);
	}
}
