#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]
//! Structured asynchronous task primitives built on top of `async`/`await`:
//! a lazy single-shot [`Task`], a self-driving [`DetachedTask`], a
//! [`SemiDetachedTask`] that forks an early result to its awaiter, a
//! call/cc-style [`CallccTask`], and a [`Transaction`] with
//! begin/commit/rollback lifecycle hooks.
//!
//! # Threading notes
//!
//! Every primitive here is `!Send`: they are built on `Rc`/`RefCell`, not
//! `Arc`/`Mutex`, and are meant to be driven on a single logical thread.
//! There is no executor shipped for general use; see
//! [`task_core::runtime`] for the internal pump this crate uses for its own
//! `sync_await`/`start` paths.

pub mod callcc;
pub mod detached;
pub mod semi_detached;
pub mod task;
pub mod transaction;

pub use callcc::{Cc, CallccTask};
pub use detached::{DetachedTask, DetachedTaskUnhandledExit};
pub use semi_detached::{fork_return, SemiDetachedTask};
pub use task::Task;
pub use transaction::{
	Transaction, TransactionBegin, TransactionCommit, TransactionHandle, TransactionRollback,
};
