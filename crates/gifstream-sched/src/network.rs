use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use gifstream_transport::{ChunkSink, Progress, TransferId, TransportEngine, TransportError};
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::lock;
use crate::task::{suspend, Continuation, Task, TaskHandle};
use crate::thread::SchedulerThread;

/// Default bound on one transport step.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Default idle wait while conditional work is pending.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration for [`NetworkScheduler`].
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Longest time one call into the transport engine may block.
    pub poll_interval: Duration,
    /// Wait between cycles when nothing moved but work is still queued.
    pub idle_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl NetworkConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }
}

type Predicate = Box<dyn FnMut(bool) -> bool + Send>;

enum Readiness {
    Always,
    When {
        transfer: TransferId,
        predicate: Predicate,
    },
}

struct NetworkWork {
    continuation: Continuation,
    readiness: Readiness,
}

impl NetworkWork {
    fn transfer(&self) -> Option<TransferId> {
        match &self.readiness {
            Readiness::Always => None,
            Readiness::When { transfer, .. } => Some(*transfer),
        }
    }
}

#[derive(Default)]
struct NetQueue {
    work: VecDeque<NetworkWork>,
    shutdown: bool,
}

/// Drives a transport engine and resumes work whose readiness holds.
///
/// Each cycle steps the engine once, then scans the queue once under its lock,
/// evaluating every predicate with `done` set when that entry's transfer
/// completed during the step. Ready entries are removed and resumed after the
/// lock is released, in queue order, so resumed work may enqueue again.
pub struct NetworkScheduler {
    engine: Mutex<Box<dyn TransportEngine>>,
    queue: Mutex<NetQueue>,
    cond: Condvar,
    config: NetworkConfig,
}

impl NetworkScheduler {
    pub fn new(engine: impl TransportEngine + 'static, config: NetworkConfig) -> Self {
        Self {
            engine: Mutex::new(Box::new(engine)),
            queue: Mutex::new(NetQueue::default()),
            cond: Condvar::new(),
            config,
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Resume `continuation` on the next cycle.
    pub fn schedule(&self, continuation: Continuation) {
        self.enqueue(NetworkWork {
            continuation,
            readiness: Readiness::Always,
        });
    }

    /// Resume `continuation` once `predicate(done)` returns true.
    ///
    /// `done` is true in the cycle where `transfer` completed. The predicate
    /// runs on the scheduler thread with the queue locked and must not call
    /// back into the scheduler. Only one entry per transfer may be queued.
    pub fn schedule_when<P>(&self, continuation: Continuation, transfer: TransferId, predicate: P)
    where
        P: FnMut(bool) -> bool + Send + 'static,
    {
        self.enqueue(NetworkWork {
            continuation,
            readiness: Readiness::When {
                transfer,
                predicate: Box::new(predicate),
            },
        });
    }

    fn enqueue(&self, work: NetworkWork) {
        {
            let mut queue = lock(&self.queue);
            if queue.shutdown {
                drop(queue);
                debug!("network scheduler shut down; dropping work");
                drop(work);
                return;
            }
            if let Some(transfer) = work.transfer() {
                let duplicate = queue.work.iter().any(|w| w.transfer() == Some(transfer));
                if duplicate {
                    warn!(%transfer, "second pending read queued for one transfer");
                    debug_assert!(!duplicate, "one pending read per transfer");
                }
            }
            queue.work.push_back(work);
        }
        self.cond.notify_all();
    }

    /// Move the current task onto this scheduler's thread.
    pub fn hop(&self) -> impl Future<Output = ()> + Send + '_ {
        suspend(move |continuation| self.schedule(continuation))
    }

    /// Start `future` as a task on this scheduler.
    pub fn spawn<F>(&self, name: impl Into<String>, future: F) -> TaskHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = Task::new(name, future);
        let handle = task.handle();
        self.schedule(task.continuation());
        handle
    }

    /// Submit a transfer to the engine.
    pub fn submit(
        &self,
        source: &str,
        sink: Arc<dyn ChunkSink>,
    ) -> std::result::Result<TransferId, TransportError> {
        let id = lock(&self.engine).submit(source, sink)?;
        self.cond.notify_all();
        Ok(id)
    }

    /// Stop a transfer. Unknown ids are ignored.
    pub fn release(&self, transfer: TransferId) {
        lock(&self.engine).remove(transfer);
    }

    /// Run one cycle. Returns false once the scheduler has been shut down.
    pub fn run_cycle(&self) -> bool {
        let progress = match lock(&self.engine).perform(self.config.poll_interval) {
            Ok(progress) => progress,
            Err(err) => {
                warn!(error = %err, "transport step failed");
                Progress::default()
            }
        };
        let completed: HashSet<TransferId> =
            progress.completed.iter().map(|c| c.id).collect();
        let idle = progress.is_idle() && progress.running == 0;

        let mut queue = lock(&self.queue);
        if queue.shutdown {
            return false;
        }
        if idle && queue.work.is_empty() {
            trace!("network scheduler idle");
            let _queue = self
                .cond
                .wait(queue)
                .unwrap_or_else(PoisonError::into_inner);
            return true;
        }

        let mut ready = Vec::new();
        let mut waiting = VecDeque::with_capacity(queue.work.len());
        for mut work in queue.work.drain(..) {
            let is_ready = match &mut work.readiness {
                Readiness::Always => true,
                Readiness::When {
                    transfer,
                    predicate,
                } => predicate(completed.contains(transfer)),
            };
            if is_ready {
                ready.push(work);
            } else {
                waiting.push_back(work);
            }
        }
        queue.work = waiting;

        if ready.is_empty() && idle {
            let (_queue, _) = self
                .cond
                .wait_timeout(queue, self.config.idle_timeout)
                .unwrap_or_else(PoisonError::into_inner);
            return true;
        }
        drop(queue);

        if !ready.is_empty() {
            trace!(ready = ready.len(), "network work resumed");
        }
        for work in ready {
            work.continuation.resume();
        }
        true
    }

    /// Run cycles on the current thread until [`shutdown`](Self::shutdown).
    pub fn run(&self) {
        debug!(
            engine = lock(&self.engine).name(),
            poll_ms = self.config.poll_interval.as_millis() as u64,
            "network scheduler loop started"
        );
        while self.run_cycle() {}
        debug!("network scheduler loop stopped");
    }

    /// Run the loop on a new named thread.
    pub fn spawn_thread(self: &Arc<Self>, name: &str) -> Result<SchedulerThread> {
        let scheduler = Arc::clone(self);
        SchedulerThread::spawn(name, move || scheduler.run())
    }

    /// Stop the loop and drop every queued continuation.
    pub fn shutdown(&self) {
        let pending = {
            let mut queue = lock(&self.queue);
            queue.shutdown = true;
            std::mem::take(&mut queue.work)
        };
        if !pending.is_empty() {
            warn!(pending = pending.len(), "network scheduler shut down with pending work");
        }
        self.cond.notify_all();
        drop(pending);
    }

    /// Number of queued entries.
    pub fn len(&self) -> usize {
        lock(&self.queue).work.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
