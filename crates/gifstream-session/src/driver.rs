use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use gifstream_sched::{DeadlineScheduler, NetworkScheduler, StreamReader, TaskHandle};
use tracing::{info, warn};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::parser::StreamParser;
use crate::presenter::{Presenter, SessionId, SessionOutcome};

#[derive(Default)]
struct SessionState {
    progress: Mutex<Progress>,
    cond: Condvar,
    stop: AtomicBool,
}

#[derive(Default)]
struct Progress {
    attempts: u64,
    finished: bool,
}

impl SessionState {
    fn lock(&self) -> std::sync::MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_attempt(&self, attempt: u64) {
        self.lock().attempts = attempt;
        self.cond.notify_all();
    }

    fn finish(&self) {
        self.lock().finished = true;
        self.cond.notify_all();
    }
}

/// Marks the session finished however its task ends, including being
/// dropped by a scheduler shutdown.
struct FinishOnDrop(Arc<SessionState>);

impl Drop for FinishOnDrop {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Observes and controls one source's restart loop.
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    source: Arc<str>,
    state: Arc<SessionState>,
    task: TaskHandle,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Attempts that have ended so far.
    pub fn attempts(&self) -> u64 {
        self.state.lock().attempts
    }

    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    /// Ask the loop to stop after the current attempt.
    pub fn stop(&self) {
        self.state.stop.store(true, Ordering::SeqCst);
    }

    /// Block until the loop has finished or `timeout` passes. Returns true
    /// when finished.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut progress = self.state.lock();
        while !progress.finished {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            progress = self
                .state
                .cond
                .wait_timeout(progress, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Block until at least `attempts` attempts have ended or `timeout`
    /// passes. Returns true when reached.
    pub fn wait_for_attempts(&self, attempts: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut progress = self.state.lock();
        while progress.attempts < attempts {
            let now = Instant::now();
            if now >= deadline || progress.finished {
                return progress.attempts >= attempts;
            }
            progress = self
                .state
                .cond
                .wait_timeout(progress, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Scheduler resumes accepted by the session's task.
    pub fn resumes(&self) -> u64 {
        self.task.resumes()
    }

    /// Scheduler resumes rejected as stale or duplicate.
    pub fn rejected_resumes(&self) -> u64 {
        self.task.rejected()
    }
}

/// Starts sessions that share one network and one deadline scheduler.
pub struct SessionDriver {
    net: Arc<NetworkScheduler>,
    deadline: Arc<DeadlineScheduler>,
    presenter: Arc<dyn Presenter>,
    config: SessionConfig,
    next_id: AtomicU64,
}

impl SessionDriver {
    pub fn new(
        net: Arc<NetworkScheduler>,
        deadline: Arc<DeadlineScheduler>,
        presenter: Arc<dyn Presenter>,
        config: SessionConfig,
    ) -> Self {
        Self {
            net,
            deadline,
            presenter,
            config,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Start the restart loop for `source` on the network scheduler.
    pub fn start(&self, source: impl Into<String>) -> SessionHandle {
        let id = SessionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let source: Arc<str> = Arc::from(source.into());
        let state = Arc::new(SessionState::default());

        let task = self.net.spawn(
            id.to_string(),
            run_session(
                id,
                Arc::clone(&source),
                Arc::clone(&self.net),
                Arc::clone(&self.deadline),
                Arc::clone(&self.presenter),
                self.config.clone(),
                Arc::clone(&state),
            ),
        );

        SessionHandle {
            id,
            source,
            state,
            task,
        }
    }
}

async fn run_session(
    id: SessionId,
    source: Arc<str>,
    net: Arc<NetworkScheduler>,
    deadline: Arc<DeadlineScheduler>,
    presenter: Arc<dyn Presenter>,
    config: SessionConfig,
    state: Arc<SessionState>,
) {
    let _finish = FinishOnDrop(Arc::clone(&state));
    let mut attempt = 0u64;

    loop {
        attempt += 1;
        info!(session = %id, attempt, source = %source, "session starting");

        let result = match StreamReader::open(Arc::clone(&net), &source) {
            Ok(reader) => {
                StreamParser::new(
                    reader,
                    Arc::clone(&deadline),
                    Arc::clone(&presenter),
                    id,
                )
                .with_honour_delays(config.honour_delays)
                .run()
                .await
            }
            Err(err) => Err(SessionError::Open(err)),
        };

        let outcome = SessionOutcome::from(result);
        match &outcome {
            SessionOutcome::Completed(summary) => {
                info!(session = %id, attempt, frames = summary.frames, "session completed");
            }
            SessionOutcome::Failed(err) => {
                warn!(session = %id, attempt, kind = err.kind(), error = %err, "session failed");
            }
        }
        presenter.session_ended(id, attempt, &outcome);
        state.record_attempt(attempt);

        if config.is_exhausted(attempt) || state.stop.load(Ordering::SeqCst) {
            info!(session = %id, attempts = attempt, "session loop finished");
            break;
        }
        if !config.restart_delay.is_zero() {
            deadline.sleep(config.restart_delay).await;
        }
        net.hop().await;
    }
}
