use std::fmt;
use std::sync::{Arc, Condvar};

/// How a scheduler announces that new work may be due.
///
/// The default wakes the scheduler's own loop through its condition
/// variable. `Callback` additionally runs a hook, for schedulers pumped by an
/// external event loop through `run_expired`.
#[derive(Clone, Default)]
pub enum OnWake {
    #[default]
    Notify,
    Callback(Arc<dyn Fn() + Send + Sync>),
}

impl OnWake {
    pub fn callback(hook: impl Fn() + Send + Sync + 'static) -> Self {
        Self::Callback(Arc::new(hook))
    }

    /// Must be called without holding the scheduler's queue lock.
    pub(crate) fn wake(&self, cond: &Condvar) {
        cond.notify_all();
        if let Self::Callback(hook) = self {
            hook();
        }
    }
}

impl fmt::Debug for OnWake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Notify => f.write_str("Notify"),
            Self::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}
