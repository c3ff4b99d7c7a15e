use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::traits::{ChunkSink, Completion, Progress, TransferId, TransferOutcome, TransportEngine};

/// The scripted response to one submission.
#[derive(Debug, Clone)]
pub struct Script {
    chunks: Vec<Bytes>,
    outcome: TransferOutcome,
    chunks_per_step: usize,
}

impl Script {
    /// Deliver `chunks` in order, one per engine step, then finish.
    pub fn new<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Bytes>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            outcome: TransferOutcome::Finished,
            chunks_per_step: 1,
        }
    }

    /// Split `data` into `chunk_size` pieces.
    pub fn chunked(data: impl Into<Bytes>, chunk_size: usize) -> Self {
        let mut data: Bytes = data.into();
        let chunk_size = chunk_size.max(1);
        let mut chunks = Vec::with_capacity(data.len() / chunk_size + 1);
        while !data.is_empty() {
            let take = chunk_size.min(data.len());
            chunks.push(data.split_to(take));
        }
        Self::new(chunks)
    }

    /// End the transfer with a failure after the chunks are delivered.
    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.outcome = TransferOutcome::Failed(reason.into());
        self
    }

    /// Deliver up to `n` chunks per engine step.
    pub fn with_chunks_per_step(mut self, n: usize) -> Self {
        self.chunks_per_step = n.max(1);
        self
    }

    /// Total scripted byte count.
    pub fn len(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Record of every source submitted to a [`MemoryTransport`].
///
/// Cloned handles share one log, so a test can keep a handle after the
/// engine has been moved into a scheduler.
#[derive(Debug, Clone, Default)]
pub struct SubmissionLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl SubmissionLog {
    fn push(&self, source: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(source.to_string());
    }

    /// All sources in submission order.
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of submissions of `source`.
    pub fn count(&self, source: &str) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|entry| entry.as_str() == source)
            .count()
    }
}

struct ActiveScript {
    sink: Arc<dyn ChunkSink>,
    chunks: VecDeque<Bytes>,
    outcome: TransferOutcome,
    chunks_per_step: usize,
}

/// In-memory engine that replays scripted chunk arrivals.
///
/// Each source holds a queue of scripts. Every submission consumes the front
/// script; the last script is replayed for all later submissions.
pub struct MemoryTransport {
    scripts: HashMap<String, VecDeque<Script>>,
    active: BTreeMap<TransferId, ActiveScript>,
    next_id: u64,
    log: SubmissionLog,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            active: BTreeMap::new(),
            next_id: 1,
            log: SubmissionLog::default(),
        }
    }

    /// Queue a script for `source`.
    pub fn with_script(mut self, source: impl Into<String>, script: Script) -> Self {
        self.add_script(source, script);
        self
    }

    /// Queue a script for `source`.
    pub fn add_script(&mut self, source: impl Into<String>, script: Script) {
        self.scripts.entry(source.into()).or_default().push_back(script);
    }

    /// Shared handle on the submission log.
    pub fn submission_log(&self) -> SubmissionLog {
        self.log.clone()
    }

    fn next_script(&mut self, source: &str) -> Result<Script> {
        let queue = self
            .scripts
            .get_mut(source)
            .ok_or_else(|| TransportError::UnknownSource(source.to_string()))?;
        let script = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        script.ok_or_else(|| TransportError::UnknownSource(source.to_string()))
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportEngine for MemoryTransport {
    fn submit(&mut self, source: &str, sink: Arc<dyn ChunkSink>) -> Result<TransferId> {
        let script = self.next_script(source)?;
        self.log.push(source);

        let id = TransferId::new(self.next_id);
        self.next_id += 1;
        debug!(%id, source, bytes = script.len(), "memory transfer submitted");

        self.active.insert(
            id,
            ActiveScript {
                sink,
                chunks: script.chunks.into(),
                outcome: script.outcome,
                chunks_per_step: script.chunks_per_step,
            },
        );
        Ok(id)
    }

    fn remove(&mut self, id: TransferId) {
        if self.active.remove(&id).is_some() {
            debug!(%id, "memory transfer removed before completion");
        }
    }

    fn perform(&mut self, _timeout: Duration) -> Result<Progress> {
        let mut progress = Progress::default();

        for (id, transfer) in &mut self.active {
            for _ in 0..transfer.chunks_per_step {
                let Some(chunk) = transfer.chunks.pop_front() else {
                    break;
                };
                trace!(%id, len = chunk.len(), "memory chunk delivered");
                progress.bytes_delivered += chunk.len();
                transfer.sink.deliver(chunk);
            }
            if transfer.chunks.is_empty() {
                transfer.sink.complete(transfer.outcome.clone());
                progress.completed.push(Completion {
                    id: *id,
                    outcome: transfer.outcome.clone(),
                });
            }
        }

        for completion in &progress.completed {
            self.active.remove(&completion.id);
        }
        progress.running = self.active.len();
        Ok(progress)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub chunks: Mutex<Vec<Bytes>>,
        pub outcome: Mutex<Option<TransferOutcome>>,
    }

    impl RecordingSink {
        pub fn bytes(&self) -> Vec<u8> {
            self.chunks
                .lock()
                .unwrap()
                .iter()
                .flat_map(|chunk| chunk.iter().copied())
                .collect()
        }
    }

    impl ChunkSink for RecordingSink {
        fn deliver(&self, chunk: Bytes) {
            self.chunks.lock().unwrap().push(chunk);
        }

        fn complete(&self, outcome: TransferOutcome) {
            *self.outcome.lock().unwrap() = Some(outcome);
        }
    }

    #[test]
    fn delivers_one_chunk_per_step_then_completes() {
        let mut engine = MemoryTransport::new().with_script("a", Script::new(["AB", "CDE"]));
        let sink = Arc::new(RecordingSink::default());
        let id = engine.submit("a", sink.clone()).unwrap();

        let first = engine.perform(Duration::ZERO).unwrap();
        assert_eq!(first.bytes_delivered, 2);
        assert_eq!(first.running, 1);
        assert!(first.completed.is_empty());

        let second = engine.perform(Duration::ZERO).unwrap();
        assert_eq!(second.bytes_delivered, 3);
        assert_eq!(second.running, 0);
        assert_eq!(
            second.completed,
            vec![Completion {
                id,
                outcome: TransferOutcome::Finished
            }]
        );
        assert_eq!(sink.bytes(), b"ABCDE");
        assert_eq!(
            *sink.outcome.lock().unwrap(),
            Some(TransferOutcome::Finished)
        );
    }

    #[test]
    fn scripts_are_consumed_then_last_is_replayed() {
        let mut engine = MemoryTransport::new()
            .with_script("s", Script::new(["bad"]).failing("reset"))
            .with_script("s", Script::new(["good"]));
        let log = engine.submission_log();

        for expected in ["bad", "good", "good"] {
            let sink = Arc::new(RecordingSink::default());
            engine.submit("s", sink.clone()).unwrap();
            while engine.perform(Duration::ZERO).unwrap().running > 0 {}
            assert_eq!(sink.bytes(), expected.as_bytes());
        }
        assert_eq!(log.count("s"), 3);
    }

    #[test]
    fn failing_script_reports_failure() {
        let mut engine =
            MemoryTransport::new().with_script("f", Script::new(["x"]).failing("reset by peer"));
        let sink = Arc::new(RecordingSink::default());
        engine.submit("f", sink.clone()).unwrap();

        let progress = engine.perform(Duration::ZERO).unwrap();
        assert_eq!(
            progress.completed[0].outcome,
            TransferOutcome::Failed("reset by peer".into())
        );
    }

    #[test]
    fn unknown_source_rejected() {
        let mut engine = MemoryTransport::new();
        let sink = Arc::new(RecordingSink::default());
        let err = engine.submit("missing", sink).unwrap_err();
        assert!(matches!(err, TransportError::UnknownSource(_)));
    }

    #[test]
    fn removed_transfer_gets_no_more_chunks() {
        let mut engine = MemoryTransport::new().with_script("a", Script::new(["1", "2"]));
        let sink = Arc::new(RecordingSink::default());
        let id = engine.submit("a", sink.clone()).unwrap();
        engine.perform(Duration::ZERO).unwrap();
        engine.remove(id);

        let progress = engine.perform(Duration::ZERO).unwrap();
        assert!(progress.is_idle());
        assert_eq!(sink.bytes(), b"1");
        assert!(sink.outcome.lock().unwrap().is_none());
    }

    #[test]
    fn chunked_script_splits_evenly() {
        let script = Script::chunked(b"abcdefg".to_vec(), 3);
        assert_eq!(script.len(), 7);
        assert_eq!(script.chunks.len(), 3);
        assert_eq!(script.chunks[2].as_ref(), b"g");
    }

    #[test]
    fn chunks_per_step_batches_delivery() {
        let mut engine = MemoryTransport::new().with_script(
            "a",
            Script::new(["1", "2", "3"]).with_chunks_per_step(2),
        );
        let sink = Arc::new(RecordingSink::default());
        engine.submit("a", sink.clone()).unwrap();

        assert_eq!(engine.perform(Duration::ZERO).unwrap().bytes_delivered, 2);
        let last = engine.perform(Duration::ZERO).unwrap();
        assert_eq!(last.bytes_delivered, 1);
        assert_eq!(last.completed.len(), 1);
    }
}
