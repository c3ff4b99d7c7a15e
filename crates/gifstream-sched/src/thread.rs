use std::thread::JoinHandle;

use tracing::debug;

use crate::error::{Result, SchedError};

/// Handle on the thread that owns a scheduler loop.
#[derive(Debug)]
pub struct SchedulerThread {
    name: String,
    handle: JoinHandle<()>,
}

impl SchedulerThread {
    pub(crate) fn spawn<F>(name: &str, run: F) -> Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(run)
            .map_err(|source| SchedError::Spawn {
                name: name.to_string(),
                source,
            })?;
        debug!(thread = name, "scheduler thread started");
        Ok(Self {
            name: name.to_string(),
            handle,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the loop to exit. Call the scheduler's `shutdown` first.
    pub fn join(self) -> Result<()> {
        self.handle
            .join()
            .map_err(|_| SchedError::ThreadPanicked(self.name.clone()))?;
        debug!(thread = %self.name, "scheduler thread joined");
        Ok(())
    }
}
