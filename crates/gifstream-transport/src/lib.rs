//! Transport engines that fetch a source and push its bytes into a sink.
//!
//! This is the lowest layer of gifstream. An engine accepts submissions,
//! and every call to [`TransportEngine::perform`] advances all active
//! transfers: received bytes go to the transfer's [`ChunkSink`] and finished
//! transfers are reported back in [`Progress`].
//!
//! Engines provided here:
//! - [`MemoryTransport`] : scripted in-memory chunks (tests, demos)
//! - [`FileTransport`] : local files streamed in fixed-size chunks
//! - [`HttpTransport`] : plain `http://` GET over non-blocking TCP
//! - [`RoutingTransport`] : dispatches submissions to one of the above by scheme

pub mod error;
pub mod file;
pub mod http;
pub mod memory;
pub mod routing;
pub mod traits;

pub use error::{Result, TransportError};
pub use file::{FileTransport, FileTransportConfig};
pub use http::{HttpConfig, HttpTransport};
pub use memory::{MemoryTransport, Script, SubmissionLog};
pub use routing::RoutingTransport;
pub use traits::{ChunkSink, Completion, Progress, TransferId, TransferOutcome, TransportEngine};
