//! Integration tests grounded on the original command-line walkthrough:
//! nested task composition, a detached task panicking before it ever
//! suspends, and call/cc used both to short-circuit a deeply nested chain
//! of tasks and to forward a failure captured further down.

use task::{callcc::Cc, fork_return, CallccTask, DetachedTask, SemiDetachedTask, Task};

#[test]
fn nested_task_await_and_caught_panic() {
	fn work() -> Task<i32> {
		Task::new(async { 0 })
	}

	fn ex() -> Task<()> {
		Task::new(async {
			let _ = work().await;
			panic!("Exception ex");
		})
	}

	let a_main = Task::new(async {
		let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
			task_core::runtime::drive(ex())
		}));
		assert!(result.is_err());
		0
	});
	assert_eq!(a_main.sync_await(), 0);
}

#[test]
fn detached_task_panic_is_reported_not_unwound_into_caller() {
	let ran = std::rc::Rc::new(std::cell::Cell::new(false));
	let ran2 = ran.clone();
	let task = DetachedTask::new(async move {
		ran2.set(true);
		panic!("Exception test");
	});
	let outcome = task.start();
	assert!(ran.get());
	assert!(outcome.is_err());
	assert_eq!(
		outcome.unwrap_err().to_string(),
		"detached task exited with an unhandled panic"
	);
}

#[test]
fn callcc_short_circuits_nested_task_chain() {
	// Mirrors a closure calling into another closure calling into another,
	// where the innermost one invokes the captured continuation directly;
	// everything between it and the call/cc boundary is left parked and is
	// never polled again.
	let outer = CallccTask::new(|cc: Cc<i32>| async move {
		let cc_for_inner = cc.clone();
		let inner: Task<()> = Task::new(async move {
			cc_for_inner.call(42).await;
		});
		let middle: Task<()> = Task::new(async move {
			inner.await;
		});
		middle.await;
		unreachable!("the call/cc boundary is resolved directly; this is never reached")
	});
	assert_eq!(task_core::runtime::drive(outer), 42);
}

#[test]
#[should_panic(expected = "forwarded failure")]
fn callcc_forwards_a_captured_failure() {
	let outer = CallccTask::new(|cc: Cc<()>| async move {
		let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
			task_core::runtime::drive(Task::new(async { panic!("forwarded failure") }))
		}));
		let payload = caught.unwrap_err();
		cc.call_with_failure(payload).await;
		unreachable!("the call/cc boundary is resolved directly; this is never reached")
	});
	task_core::runtime::drive(outer);
}

#[test]
fn semi_detached_task_forks_and_keeps_running() {
	let ran_after_fork = std::rc::Rc::new(std::cell::Cell::new(false));
	let flag = ran_after_fork.clone();
	let task = SemiDetachedTask::new(move |cc| async move {
		fork_return(&cc, "early").await;
		flag.set(true);
	});
	assert_eq!(task_core::runtime::drive(task), "early");
	task_core::runtime::run_detached();
	assert!(ran_after_fork.get());
}
