#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]
//! Low-level substrate for the `task` crate: a result cell (tri-state
//! value/failure holder), a continuation slot (successor waker plus
//! stopped-forwarding), and the minimal single-threaded driver every
//! primitive in `task` uses to actually resume a frame.
//!
//! # Threading notes
//!
//! Nothing here is `Send` or `Sync` by design: this substrate targets a
//! single-threaded, cooperative scheduling model (see the crate-level docs
//! of `task`). There is no work-stealing, no timers and no I/O readiness.

pub mod cell;
pub mod continuation;
pub mod runtime;
