use std::fmt;
use std::io;

use gifstream::sched::SchedError;
use gifstream::session::SessionError;
use gifstream::transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: &TransportError) -> CliError {
    let code = match err {
        TransportError::InvalidSource { .. } | TransportError::UnsupportedScheme(_) => USAGE,
        TransportError::Open { source, .. } if source.kind() == io::ErrorKind::PermissionDenied => {
            PERMISSION_DENIED
        }
        _ => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

/// Exit code for a session that ended in `err`.
pub fn session_error(context: &str, err: &SessionError) -> CliError {
    match err {
        SessionError::Open(inner) => transport_error(context, inner),
        SessionError::TransferFailed { .. } => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        SessionError::ShortRead { .. }
        | SessionError::MalformedEnvelope { .. }
        | SessionError::InvalidLzwCode(_)
        | SessionError::UnknownBlockTag(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
    }
}

pub fn sched_error(context: &str, err: SchedError) -> CliError {
    match err {
        SchedError::Spawn { source, .. } => io_error(context, source),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gifstream::codec::CodecError;

    #[test]
    fn data_errors_map_to_data_invalid() {
        let err = SessionError::UnknownBlockTag(0x42);
        assert_eq!(session_error("inspect", &err).code, DATA_INVALID);

        let err = SessionError::InvalidLzwCode(CodecError::InvalidCode {
            code: 9,
            next_code: 6,
        });
        assert_eq!(session_error("inspect", &err).code, DATA_INVALID);
    }

    #[test]
    fn transport_errors_map_to_transport_code() {
        let err = SessionError::TransferFailed {
            origin: "http://example.test/a.gif".into(),
            reason: "connection reset".into(),
        };
        assert_eq!(session_error("play", &err).code, TRANSPORT_ERROR);

        let err = SessionError::Open(TransportError::Open {
            path: "missing.gif".into(),
            source: io::Error::from(io::ErrorKind::NotFound),
        });
        let mapped = session_error("play", &err);
        assert_eq!(mapped.code, TRANSPORT_ERROR);
        assert!(mapped.message.starts_with("play: "));
    }

    #[test]
    fn unsupported_scheme_is_a_usage_error() {
        let err = TransportError::UnsupportedScheme("gopher://x".into());
        assert_eq!(transport_error("play", &err).code, USAGE);
    }
}
