use std::time::Duration;

/// Restart policy and pacing for a [`SessionDriver`](crate::SessionDriver).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Stop after this many attempts. `None` restarts forever.
    pub max_sessions: Option<u64>,
    /// Pause between one attempt ending and the next starting.
    pub restart_delay: Duration,
    /// Wait out each frame's graphic-control delay before presenting it.
    pub honour_delays: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: None,
            restart_delay: Duration::ZERO,
            honour_delays: true,
        }
    }
}

impl SessionConfig {
    pub fn with_max_sessions(mut self, max: u64) -> Self {
        self.max_sessions = Some(max);
        self
    }

    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    pub fn with_honour_delays(mut self, honour: bool) -> Self {
        self.honour_delays = honour;
        self
    }

    /// True once `attempts` have used up `max_sessions`.
    pub fn is_exhausted(&self, attempts: u64) -> bool {
        self.max_sessions.is_some_and(|max| attempts >= max)
    }
}
