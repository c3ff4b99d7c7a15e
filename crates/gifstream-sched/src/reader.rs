use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use bytes::{Buf, Bytes};
use gifstream_transport::{ChunkSink, TransferId, TransferOutcome, TransportError};
use tracing::trace;

use crate::lock;
use crate::network::NetworkScheduler;
use crate::task::Continuation;

/// Received chunks of one transfer, oldest first.
#[derive(Default)]
struct ChunkChain {
    chunks: VecDeque<Bytes>,
    buffered: usize,
    finished: Option<TransferOutcome>,
}

impl ChunkChain {
    /// Copy buffered bytes into `dst`, splitting the last chunk if needed.
    fn drain_into(&mut self, dst: &mut [u8]) -> usize {
        let mut copied = 0;
        while copied < dst.len() {
            let Some(front) = self.chunks.front_mut() else {
                break;
            };
            let n = front.len().min(dst.len() - copied);
            dst[copied..copied + n].copy_from_slice(&front[..n]);
            front.advance(n);
            copied += n;
            if front.is_empty() {
                self.chunks.pop_front();
            }
        }
        self.buffered -= copied;
        copied
    }

    fn is_exhausted(&self) -> bool {
        self.finished.is_some() && self.chunks.is_empty()
    }
}

struct ChainSink(Arc<Mutex<ChunkChain>>);

impl ChunkSink for ChainSink {
    fn deliver(&self, chunk: Bytes) {
        if chunk.is_empty() {
            return;
        }
        let mut chain = lock(&self.0);
        chain.buffered += chunk.len();
        chain.chunks.push_back(chunk);
    }

    fn complete(&self, outcome: TransferOutcome) {
        let mut chain = lock(&self.0);
        if chain.finished.is_none() {
            chain.finished = Some(outcome);
        }
    }
}

/// Pull-style reader over one transfer.
///
/// Bytes arrive on the network scheduler thread and are buffered without
/// limit. [`read`](Self::read) takes what is already buffered and suspends on
/// the network scheduler only when more is needed and the transfer is still
/// running. The transfer is released when the reader is dropped.
pub struct StreamReader {
    net: Arc<NetworkScheduler>,
    chain: Arc<Mutex<ChunkChain>>,
    transfer: TransferId,
    source: String,
}

impl StreamReader {
    /// Submit a transfer for `source` and read from it.
    pub fn open(net: Arc<NetworkScheduler>, source: &str) -> Result<Self, TransportError> {
        let chain = Arc::new(Mutex::new(ChunkChain::default()));
        let transfer = net.submit(source, Arc::new(ChainSink(Arc::clone(&chain))))?;
        trace!(%transfer, source, "stream reader opened");
        Ok(Self {
            net,
            chain,
            transfer,
            source: source.to_string(),
        })
    }

    /// Fill `buf` as far as the stream allows.
    ///
    /// Resolves to `buf.len()` unless the transfer ends first, in which case it
    /// resolves to the number of bytes actually copied (possibly 0).
    pub fn read<'a>(&'a mut self, buf: &'a mut [u8]) -> Read<'a> {
        Read {
            reader: self,
            buf,
            filled: 0,
        }
    }

    /// True once the transfer has ended and every byte has been read.
    pub fn is_exhausted(&self) -> bool {
        lock(&self.chain).is_exhausted()
    }

    /// Bytes received but not yet read.
    pub fn buffered(&self) -> usize {
        lock(&self.chain).buffered
    }

    /// Failure reason, if the transfer ended with one.
    pub fn failure(&self) -> Option<String> {
        match &lock(&self.chain).finished {
            Some(TransferOutcome::Failed(reason)) => Some(reason.clone()),
            _ => None,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn transfer(&self) -> TransferId {
        self.transfer
    }
}

impl Drop for StreamReader {
    fn drop(&mut self) {
        self.net.release(self.transfer);
    }
}

/// Future returned by [`StreamReader::read`].
pub struct Read<'a> {
    reader: &'a mut StreamReader,
    buf: &'a mut [u8],
    filled: usize,
}

impl Future for Read<'_> {
    type Output = usize;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<usize> {
        let this = self.get_mut();
        let remaining = {
            let mut chain = lock(&this.reader.chain);
            let copied = chain.drain_into(&mut this.buf[this.filled..]);
            this.filled += copied;
            if this.filled == this.buf.len() || chain.is_exhausted() {
                trace!(
                    transfer = %this.reader.transfer,
                    requested = this.buf.len(),
                    read = this.filled,
                    "read complete"
                );
                return Poll::Ready(this.filled);
            }
            this.buf.len() - this.filled
        };

        let chain = Arc::clone(&this.reader.chain);
        this.reader.net.schedule_when(
            Continuation::from_context(cx),
            this.reader.transfer,
            move |done| {
                let chain = lock(&chain);
                done || chain.finished.is_some() || chain.buffered >= remaining
            },
        );
        Poll::Pending
    }
}
