use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// Identifies one submitted transfer for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransferId(u64);

impl TransferId {
    /// Wrap a raw identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw identifier.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transfer-{}", self.0)
    }
}

/// How a transfer ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// All bytes were delivered.
    Finished,
    /// The transfer stopped early; the string describes why.
    Failed(String),
}

impl TransferOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Receives the bytes of exactly one transfer.
///
/// Engines call these from inside [`TransportEngine::perform`], so
/// implementations must not call back into the engine.
pub trait ChunkSink: Send + Sync {
    /// Append the next received run of bytes.
    fn deliver(&self, chunk: Bytes);

    /// Record that no further bytes will arrive.
    fn complete(&self, outcome: TransferOutcome);
}

/// A transfer that ended during one [`TransportEngine::perform`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub id: TransferId,
    pub outcome: TransferOutcome,
}

/// What one step of the engine achieved.
#[derive(Debug, Default, Clone)]
pub struct Progress {
    /// Transfers still active after this step.
    pub running: usize,
    /// Bytes handed to sinks during this step.
    pub bytes_delivered: usize,
    /// Transfers that ended during this step.
    pub completed: Vec<Completion>,
}

impl Progress {
    /// True when the step neither moved bytes nor finished a transfer.
    pub fn is_idle(&self) -> bool {
        self.bytes_delivered == 0 && self.completed.is_empty()
    }

    /// Fold another step's progress into this one.
    pub fn merge(&mut self, other: Progress) {
        self.running += other.running;
        self.bytes_delivered += other.bytes_delivered;
        self.completed.extend(other.completed);
    }
}

/// A multiplexed transfer engine.
///
/// The engine is driven by a single thread that calls [`perform`](Self::perform)
/// in a loop; submission and removal may come from any thread holding the
/// engine.
pub trait TransportEngine: Send {
    /// Start fetching `source`, delivering its bytes to `sink`.
    fn submit(&mut self, source: &str, sink: Arc<dyn ChunkSink>) -> Result<TransferId>;

    /// Stop a transfer and forget its sink. Unknown ids are ignored.
    fn remove(&mut self, id: TransferId);

    /// Advance every active transfer once.
    ///
    /// May block for at most `timeout` when no transfer can make progress.
    fn perform(&mut self, timeout: Duration) -> Result<Progress>;

    /// Engine name for diagnostics.
    fn name(&self) -> &'static str;
}

impl<T: TransportEngine + ?Sized> TransportEngine for Box<T> {
    fn submit(&mut self, source: &str, sink: Arc<dyn ChunkSink>) -> Result<TransferId> {
        (**self).submit(source, sink)
    }

    fn remove(&mut self, id: TransferId) {
        (**self).remove(id)
    }

    fn perform(&mut self, timeout: Duration) -> Result<Progress> {
        (**self).perform(timeout)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_merge_accumulates() {
        let mut total = Progress::default();
        assert!(total.is_idle());

        total.merge(Progress {
            running: 2,
            bytes_delivered: 10,
            completed: vec![],
        });
        total.merge(Progress {
            running: 1,
            bytes_delivered: 0,
            completed: vec![Completion {
                id: TransferId::new(7),
                outcome: TransferOutcome::Finished,
            }],
        });

        assert_eq!(total.running, 3);
        assert_eq!(total.bytes_delivered, 10);
        assert_eq!(total.completed.len(), 1);
        assert!(!total.is_idle());
    }

    #[test]
    fn transfer_id_display() {
        assert_eq!(TransferId::new(3).to_string(), "transfer-3");
        assert_eq!(TransferId::new(3).get(), 3);
    }

    #[test]
    fn outcome_failure_flag() {
        assert!(!TransferOutcome::Finished.is_failure());
        assert!(TransferOutcome::Failed("reset".into()).is_failure());
    }
}
