/// Errors that can occur when starting or stopping scheduler threads.
#[derive(Debug, thiserror::Error)]
pub enum SchedError {
    /// The OS refused to start the scheduler thread.
    #[error("failed to spawn scheduler thread '{name}': {source}")]
    Spawn {
        name: String,
        source: std::io::Error,
    },

    /// The scheduler thread panicked.
    #[error("scheduler thread '{0}' panicked")]
    ThreadPanicked(String),
}

pub type Result<T> = std::result::Result<T, SchedError>;
