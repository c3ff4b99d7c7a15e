use gifstream_codec::CodecError;
use gifstream_transport::TransportError;

/// Errors that end one session attempt.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The stream ended before a structure was complete.
    #[error("short read in {context}: expected {expected} bytes, got {actual}")]
    ShortRead {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A fixed-size block had the wrong size or terminator byte.
    #[error("malformed {block} block: {detail}")]
    MalformedEnvelope { block: &'static str, detail: String },

    /// Image data could not be decompressed.
    #[error("image data rejected: {0}")]
    InvalidLzwCode(#[from] CodecError),

    /// A top-level block tag outside image, extension and trailer.
    #[error("unknown block tag 0x{0:02X}")]
    UnknownBlockTag(u8),

    /// The transfer failed before the stream was complete.
    #[error("transfer of {origin} failed: {reason}")]
    TransferFailed { origin: String, reason: String },

    /// The transfer could not be started.
    #[error("failed to open stream: {0}")]
    Open(#[from] TransportError),
}

impl SessionError {
    /// Stable snake_case name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ShortRead { .. } => "short_read",
            Self::MalformedEnvelope { .. } => "malformed_envelope",
            Self::InvalidLzwCode(_) => "invalid_lzw_code",
            Self::UnknownBlockTag(_) => "unknown_block_tag",
            Self::TransferFailed { .. } => "transfer_failed",
            Self::Open(_) => "open_failed",
        }
    }

    /// True for failures of the transport rather than of the stream data.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::TransferFailed { .. } | Self::Open(_))
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_messages() {
        let err = SessionError::UnknownBlockTag(0x42);
        assert_eq!(err.kind(), "unknown_block_tag");
        assert_eq!(err.to_string(), "unknown block tag 0x42");
        assert!(!err.is_transport());

        let err = SessionError::from(CodecError::InvalidCode {
            code: 7,
            next_code: 6,
        });
        assert_eq!(err.kind(), "invalid_lzw_code");
        assert_eq!(
            err.to_string(),
            "image data rejected: invalid LZW code 7 (next code 6)"
        );

        let err = SessionError::TransferFailed {
            origin: "http://h/a.gif".into(),
            reason: "HTTP status 404".into(),
        };
        assert!(err.is_transport());
    }
}
