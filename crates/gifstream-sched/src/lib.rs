//! Cooperative schedulers for gifstream sessions.
//!
//! A session is a future wrapped in a [`Task`]. It runs on whichever
//! scheduler thread last resumed it and moves between schedulers only by
//! suspending:
//! - [`NetworkScheduler`] owns the transport engine. It drives the engine and
//!   resumes work whose readiness predicate holds.
//! - [`DeadlineScheduler`] resumes work once its wake time has passed.
//! - [`StreamReader`] gives a session a `read` that suspends on the network
//!   scheduler until enough bytes are buffered or the transfer has ended.
//!
//! Each scheduler is constructed explicitly and driven either by its own
//! thread ([`DeadlineScheduler::spawn_thread`]) or by an external pump.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod deadline;
pub mod error;
pub mod network;
pub mod reader;
pub mod task;
pub mod thread;
pub mod wake;

pub use deadline::DeadlineScheduler;
pub use error::{Result, SchedError};
pub use network::{NetworkConfig, NetworkScheduler};
pub use reader::{Read, StreamReader};
pub use task::{suspend, Continuation, Suspend, Task, TaskHandle};
pub use thread::SchedulerThread;
pub use wake::OnWake;

/// Lock `mutex`, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
