//! Stream sessions: parse a GIF as it arrives and present each frame.
//!
//! A [`SessionDriver`] runs one restart loop per source. Every attempt opens a
//! fresh [`StreamReader`](gifstream_sched::StreamReader), runs a
//! [`StreamParser`] over it and reports the outcome to the [`Presenter`].
//! Parse errors, decode errors and transport failures all end the attempt the
//! same way, and the driver starts over with a new canvas.

pub mod config;
pub mod driver;
pub mod error;
pub mod parser;
pub mod presenter;

pub use config::SessionConfig;
pub use driver::{SessionDriver, SessionHandle};
pub use error::{Result, SessionError};
pub use parser::{StreamParser, StreamSummary};
pub use presenter::{Presenter, SessionId, SessionOutcome};
