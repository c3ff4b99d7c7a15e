use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Wake, Waker};

use tracing::{error, trace, warn};

use crate::lock;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct TaskSlot {
    future: Option<BoxFuture>,
    /// Set while the future is suspended and waiting for its continuation.
    parked: bool,
    /// Incremented on every poll; a continuation only resumes its own epoch.
    epoch: u64,
}

#[derive(Default)]
struct TaskStats {
    resumes: AtomicU64,
    rejected: AtomicU64,
    finished: AtomicBool,
}

/// A suspendable unit of work.
///
/// The future is polled only when one of its continuations is resumed, on
/// the resuming thread. The slot lock is held for the whole poll, so a resume
/// racing with the poll that produced it waits for that poll to finish.
/// Continuations must therefore never be resumed from inside their own task.
///
/// Continuations hold the only strong references to a parked task: dropping
/// them all (for example on scheduler shutdown) drops the future.
pub struct Task {
    name: String,
    slot: Mutex<TaskSlot>,
    stats: Arc<TaskStats>,
}

impl Task {
    /// Wrap `future`. It does not run until [`Task::continuation`] is resumed.
    pub fn new<F>(name: impl Into<String>, future: F) -> Arc<Self>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Arc::new(Self {
            name: name.into(),
            slot: Mutex::new(TaskSlot {
                future: Some(Box::pin(future)),
                parked: true,
                epoch: 0,
            }),
            stats: Arc::default(),
        })
    }

    /// Observer that does not keep the task alive.
    pub fn handle(&self) -> TaskHandle {
        TaskHandle {
            name: self.name.clone(),
            stats: Arc::clone(&self.stats),
        }
    }

    /// Continuation for the task's current suspension.
    pub fn continuation(self: &Arc<Self>) -> Continuation {
        let epoch = lock(&self.slot).epoch;
        Continuation::for_task(self, epoch)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn run(self: &Arc<Self>, epoch: u64) {
        let mut guard = lock(&self.slot);
        let slot = &mut *guard;

        if !slot.parked || slot.epoch != epoch {
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            warn!(
                task = %self.name,
                epoch,
                current = slot.epoch,
                "stale or duplicate resume ignored"
            );
            return;
        }
        let Some(future) = slot.future.as_mut() else {
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            warn!(task = %self.name, "resume of finished task ignored");
            return;
        };

        slot.parked = false;
        slot.epoch += 1;
        self.stats.resumes.fetch_add(1, Ordering::Relaxed);
        trace!(task = %self.name, epoch = slot.epoch, "task resumed");

        let waker = Continuation::for_task(self, slot.epoch).waker;
        let mut cx = Context::from_waker(&waker);
        match catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(&mut cx))) {
            Ok(Poll::Pending) => slot.parked = true,
            Ok(Poll::Ready(())) => {
                trace!(task = %self.name, "task finished");
                slot.future = None;
                self.stats.finished.store(true, Ordering::Release);
            }
            Err(_) => {
                error!(task = %self.name, "task panicked; dropping it");
                slot.future = None;
                self.stats.finished.store(true, Ordering::Release);
            }
        }
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        self.stats.finished.store(true, Ordering::Release);
    }
}

struct Resumption {
    task: Arc<Task>,
    epoch: u64,
}

impl Wake for Resumption {
    fn wake(self: Arc<Self>) {
        self.task.run(self.epoch);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.task.run(self.epoch);
    }
}

/// A suspended computation that can be resumed once.
///
/// Resuming runs the suspended task on the calling thread. Extra resumes of
/// the same suspension are rejected and counted on the task.
#[derive(Clone)]
pub struct Continuation {
    waker: Waker,
}

impl Continuation {
    /// Continuation for the task currently being polled with `cx`.
    pub fn from_context(cx: &Context<'_>) -> Self {
        Self {
            waker: cx.waker().clone(),
        }
    }

    fn for_task(task: &Arc<Task>, epoch: u64) -> Self {
        Self {
            waker: Waker::from(Arc::new(Resumption {
                task: Arc::clone(task),
                epoch,
            })),
        }
    }

    pub fn resume(self) {
        self.waker.wake();
    }
}

impl std::fmt::Debug for Continuation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Continuation").finish_non_exhaustive()
    }
}

/// Observes a task after it has been handed to a scheduler.
#[derive(Clone)]
pub struct TaskHandle {
    name: String,
    stats: Arc<TaskStats>,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once the future has completed, panicked or been dropped.
    pub fn is_finished(&self) -> bool {
        self.stats.finished.load(Ordering::Acquire)
    }

    /// Number of accepted resumes, including the first run.
    pub fn resumes(&self) -> u64 {
        self.stats.resumes.load(Ordering::Relaxed)
    }

    /// Number of resumes rejected as stale or duplicate.
    pub fn rejected(&self) -> u64 {
        self.stats.rejected.load(Ordering::Relaxed)
    }
}

/// Future returned by [`suspend`].
pub struct Suspend<F> {
    register: Option<F>,
}

impl<F> Unpin for Suspend<F> {}

/// Suspend the current task, handing its continuation to `register`.
///
/// `register` typically enqueues the continuation on a scheduler. The task
/// continues after the `.await` once the continuation is resumed.
pub fn suspend<F>(register: F) -> Suspend<F>
where
    F: FnOnce(Continuation),
{
    Suspend {
        register: Some(register),
    }
}

impl<F> Future for Suspend<F>
where
    F: FnOnce(Continuation),
{
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        match self.get_mut().register.take() {
            Some(register) => {
                register(Continuation::from_context(cx));
                Poll::Pending
            }
            None => Poll::Ready(()),
        }
    }
}
