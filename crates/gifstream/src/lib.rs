//! Stream animated GIFs and decode them frame by frame as bytes arrive.
//!
//! gifstream fetches a GIF over plain HTTP or from a file, parses it while it
//! is still arriving, and hands every composed frame to a [`session::Presenter`].
//! Two cooperative schedulers share the work: one drives the transport and
//! resumes parsers when their bytes are in, the other paces frames by their
//! display delay. A failed stream is restarted from scratch.
//!
//! # Crate Structure
//!
//! - [`transport`]: transfer engines (memory, file, HTTP) and the sink contract
//! - [`codec`]: GIF block layouts, LZW and canvas composition
//! - [`sched`]: network and deadline schedulers, suspending stream reader
//! - [`session`]: stream parser, presenter contract and restart driver
//! - [`Runtime`]: both schedulers on their own threads, ready for sessions

mod runtime;

pub use runtime::Runtime;

/// Re-export transport types.
pub mod transport {
    pub use gifstream_transport::*;
}

/// Re-export codec types.
pub mod codec {
    pub use gifstream_codec::*;
}

/// Re-export scheduler types.
pub mod sched {
    pub use gifstream_sched::*;
}

/// Re-export session types.
pub mod session {
    pub use gifstream_session::*;
}
