use std::fmt;

use serde::Serialize;

use crate::error::SessionError;
use crate::parser::StreamSummary;

/// Identifies one source's restart loop; stable across its attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// How one session attempt ended.
#[derive(Debug)]
pub enum SessionOutcome {
    /// The trailer was reached.
    Completed(StreamSummary),
    /// The attempt stopped early.
    Failed(SessionError),
}

impl SessionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn summary(&self) -> Option<&StreamSummary> {
        match self {
            Self::Completed(summary) => Some(summary),
            Self::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&SessionError> {
        match self {
            Self::Completed(_) => None,
            Self::Failed(err) => Some(err),
        }
    }
}

impl From<crate::Result<StreamSummary>> for SessionOutcome {
    fn from(result: crate::Result<StreamSummary>) -> Self {
        match result {
            Ok(summary) => Self::Completed(summary),
            Err(err) => Self::Failed(err),
        }
    }
}

/// Receives composed frames.
///
/// Called on scheduler threads; implementations must return promptly and
/// must not block waiting on the session.
pub trait Presenter: Send + Sync {
    /// A frame has been composed. `canvas` is row-major ARGB,
    /// `width * height` pixels, valid only for the duration of the call.
    fn deliver_frame(&self, canvas: &[u32], width: u16, height: u16, session: SessionId);

    /// An attempt ended, successfully or not.
    fn session_ended(&self, _session: SessionId, _attempt: u64, _outcome: &SessionOutcome) {}
}

impl<F> Presenter for F
where
    F: Fn(&[u32], u16, u16, SessionId) + Send + Sync,
{
    fn deliver_frame(&self, canvas: &[u32], width: u16, height: u16, session: SessionId) {
        self(canvas, width, height, session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn closure_presenter_receives_frames() {
        let seen = Mutex::new(Vec::new());
        let presenter = |canvas: &[u32], w: u16, h: u16, session: SessionId| {
            seen.lock().unwrap().push((canvas.to_vec(), w, h, session));
        };
        presenter.deliver_frame(&[1, 2], 2, 1, SessionId::new(4));
        presenter.session_ended(
            SessionId::new(4),
            1,
            &SessionOutcome::Failed(SessionError::UnknownBlockTag(0)),
        );
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(vec![1, 2], 2, 1, SessionId::new(4))]
        );
    }

    #[test]
    fn outcome_accessors() {
        let failed = SessionOutcome::from(Err(SessionError::UnknownBlockTag(9)));
        assert!(!failed.is_completed());
        assert!(failed.summary().is_none());
        assert_eq!(failed.error().map(SessionError::kind), Some("unknown_block_tag"));
        assert_eq!(SessionId::new(3).to_string(), "session-3");
    }
}
