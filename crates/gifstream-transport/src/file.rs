use std::collections::BTreeMap;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::traits::{ChunkSink, Completion, Progress, TransferId, TransferOutcome, TransportEngine};

/// Prefix accepted (and stripped) in front of local paths.
pub const FILE_SCHEME: &str = "file://";

/// Default bytes read per transfer per step.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Configuration for [`FileTransport`].
#[derive(Debug, Clone)]
pub struct FileTransportConfig {
    /// Bytes read from each open file per step.
    pub chunk_size: usize,
}

impl Default for FileTransportConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl FileTransportConfig {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

struct OpenFile {
    path: PathBuf,
    file: File,
    sink: Arc<dyn ChunkSink>,
}

/// Streams local files in fixed-size chunks.
///
/// Files are read synchronously; each step reads at most one chunk from every
/// open transfer so several streams progress evenly.
pub struct FileTransport {
    config: FileTransportConfig,
    open: BTreeMap<TransferId, OpenFile>,
    next_id: u64,
}

impl FileTransport {
    pub fn new(config: FileTransportConfig) -> Self {
        Self {
            config,
            open: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Resolve a source string to a filesystem path.
    pub fn resolve(source: &str) -> &Path {
        Path::new(source.strip_prefix(FILE_SCHEME).unwrap_or(source))
    }
}

impl Default for FileTransport {
    fn default() -> Self {
        Self::new(FileTransportConfig::default())
    }
}

impl TransportEngine for FileTransport {
    fn submit(&mut self, source: &str, sink: Arc<dyn ChunkSink>) -> Result<TransferId> {
        let path = Self::resolve(source).to_path_buf();
        let file = File::open(&path).map_err(|source| TransportError::Open {
            path: path.clone(),
            source,
        })?;

        let id = TransferId::new(self.next_id);
        self.next_id += 1;
        debug!(%id, path = %path.display(), "file transfer opened");

        self.open.insert(id, OpenFile { path, file, sink });
        Ok(id)
    }

    fn remove(&mut self, id: TransferId) {
        if let Some(open) = self.open.remove(&id) {
            debug!(%id, path = %open.path.display(), "file transfer closed early");
        }
    }

    fn perform(&mut self, _timeout: Duration) -> Result<Progress> {
        let mut progress = Progress::default();
        let mut buf = vec![0u8; self.config.chunk_size];

        for (id, open) in &mut self.open {
            let outcome = loop {
                match open.file.read(&mut buf) {
                    Ok(0) => break Some(TransferOutcome::Finished),
                    Ok(n) => {
                        progress.bytes_delivered += n;
                        open.sink.deliver(Bytes::copy_from_slice(&buf[..n]));
                        break None;
                    }
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) => {
                        warn!(%id, path = %open.path.display(), error = %err, "file read failed");
                        break Some(TransferOutcome::Failed(err.to_string()));
                    }
                }
            };

            if let Some(outcome) = outcome {
                open.sink.complete(outcome.clone());
                progress.completed.push(Completion { id: *id, outcome });
            }
        }

        for completion in &progress.completed {
            self.open.remove(&completion.id);
        }
        progress.running = self.open.len();
        Ok(progress)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
