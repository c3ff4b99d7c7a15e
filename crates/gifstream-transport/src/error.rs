use std::path::PathBuf;

/// Errors that can occur when submitting or driving transfers.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open a local file source.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to a remote host.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on an active transfer.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The source string could not be interpreted by this engine.
    #[error("invalid source '{source_id}': {reason}")]
    InvalidSource { source_id: String, reason: String },

    /// No scripted response is registered for the source.
    #[error("no script registered for source '{0}'")]
    UnknownSource(String),

    /// No engine accepts the source's scheme.
    #[error("unsupported scheme in source '{0}'")]
    UnsupportedScheme(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
