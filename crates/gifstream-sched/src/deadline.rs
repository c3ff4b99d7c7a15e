use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::future::Future;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::lock;
use crate::task::{suspend, Continuation, Task, TaskHandle};
use crate::thread::SchedulerThread;
use crate::wake::OnWake;

struct TimedWork {
    wake_at: Instant,
    seq: u64,
    continuation: Continuation,
}

impl PartialEq for TimedWork {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TimedWork {}

impl PartialOrd for TimedWork {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimedWork {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.wake_at, self.seq).cmp(&(other.wake_at, other.seq))
    }
}

#[derive(Default)]
struct DeadlineQueue {
    heap: BinaryHeap<Reverse<TimedWork>>,
    next_seq: u64,
    shutdown: bool,
}

impl DeadlineQueue {
    /// Pop every entry due at `now`, soonest first.
    fn take_expired(&mut self, now: Instant) -> Vec<TimedWork> {
        let mut due = Vec::new();
        while self
            .heap
            .peek()
            .is_some_and(|Reverse(work)| work.wake_at <= now)
        {
            if let Some(Reverse(work)) = self.heap.pop() {
                due.push(work);
            }
        }
        due
    }

    fn next_wake(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(work)| work.wake_at)
    }
}

/// Resumes continuations no earlier than their wake time.
///
/// Due entries are popped under the queue lock and resumed after it is
/// released, in ascending wake order (insertion order among equal times), one
/// at a time on the thread running the loop.
pub struct DeadlineScheduler {
    queue: Mutex<DeadlineQueue>,
    cond: Condvar,
    on_wake: OnWake,
}

impl DeadlineScheduler {
    pub fn new() -> Self {
        Self::with_on_wake(OnWake::default())
    }

    pub fn with_on_wake(on_wake: OnWake) -> Self {
        Self {
            queue: Mutex::new(DeadlineQueue::default()),
            cond: Condvar::new(),
            on_wake,
        }
    }

    /// Resume `continuation` once `wake_at` has passed.
    pub fn schedule(&self, continuation: Continuation, wake_at: Instant) {
        let soonest = {
            let mut queue = lock(&self.queue);
            if queue.shutdown {
                drop(queue);
                debug!("deadline scheduler shut down; dropping work");
                drop(continuation);
                return;
            }
            let seq = queue.next_seq;
            queue.next_seq += 1;
            queue.heap.push(Reverse(TimedWork {
                wake_at,
                seq,
                continuation,
            }));
            queue
                .heap
                .peek()
                .is_some_and(|Reverse(work)| work.seq == seq)
        };

        if soonest {
            self.on_wake.wake(&self.cond);
        }
    }

    /// Suspend the current task for `delay`.
    pub fn sleep(&self, delay: Duration) -> impl Future<Output = ()> + Send + '_ {
        self.sleep_until(Instant::now() + delay)
    }

    /// Suspend the current task until `wake_at`.
    pub fn sleep_until(&self, wake_at: Instant) -> impl Future<Output = ()> + Send + '_ {
        suspend(move |continuation| self.schedule(continuation, wake_at))
    }

    /// Move the current task onto this scheduler's thread.
    pub fn hop(&self) -> impl Future<Output = ()> + Send + '_ {
        self.sleep_until(Instant::now())
    }

    /// Start `future` as a task on this scheduler.
    pub fn spawn<F>(&self, name: impl Into<String>, future: F) -> TaskHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = Task::new(name, future);
        let handle = task.handle();
        self.schedule(task.continuation(), Instant::now());
        handle
    }

    /// Resume everything already due and return the next wake time.
    ///
    /// For schedulers driven by an external pump instead of [`run`](Self::run).
    pub fn run_expired(&self) -> Option<Instant> {
        let due = lock(&self.queue).take_expired(Instant::now());
        self.resume_all(due);
        lock(&self.queue).next_wake()
    }

    /// Run the loop on the current thread until [`shutdown`](Self::shutdown).
    pub fn run(&self) {
        debug!("deadline scheduler loop started");
        let mut queue = lock(&self.queue);
        loop {
            if queue.shutdown {
                break;
            }

            let now = Instant::now();
            match queue.next_wake() {
                None => {
                    queue = self
                        .cond
                        .wait(queue)
                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                }
                Some(wake_at) if wake_at > now => {
                    queue = self
                        .cond
                        .wait_timeout(queue, wake_at - now)
                        .unwrap_or_else(std::sync::PoisonError::into_inner)
                        .0;
                }
                Some(_) => {
                    let due = queue.take_expired(now);
                    drop(queue);
                    self.resume_all(due);
                    queue = lock(&self.queue);
                }
            }
        }
        debug!("deadline scheduler loop stopped");
    }

    fn resume_all(&self, due: Vec<TimedWork>) {
        for work in due {
            let late = work.wake_at.elapsed();
            trace!(late_us = late.as_micros() as u64, "deadline work resumed");
            work.continuation.resume();
        }
    }

    /// Run the loop on a new named thread.
    pub fn spawn_thread(self: &Arc<Self>, name: &str) -> Result<SchedulerThread> {
        let scheduler = Arc::clone(self);
        SchedulerThread::spawn(name, move || scheduler.run())
    }

    /// Stop the loop and drop every pending continuation.
    ///
    /// Tasks parked only here are dropped with their continuations.
    pub fn shutdown(&self) {
        let pending = {
            let mut queue = lock(&self.queue);
            queue.shutdown = true;
            std::mem::take(&mut queue.heap)
        };
        if !pending.is_empty() {
            warn!(pending = pending.len(), "deadline scheduler shut down with pending work");
        }
        self.cond.notify_all();
        drop(pending);
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        lock(&self.queue).heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DeadlineScheduler {
    fn default() -> Self {
        Self::new()
    }
}
