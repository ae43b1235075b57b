use thiserror::Error;

/// Result type for text pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while wiring or running a pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// An input or output endpoint was connected twice
    #[error("{0} already connected")]
    AlreadyConnected(&'static str),

    /// Write to a channel whose consumer has gone away
    #[error("channel closed")]
    Closed,

    /// A stage pattern failed to compile
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// I/O failure in an adapter, or a fault raised by a line hook
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A line transform reported a failure
    #[error("Stage execution failed: {0}")]
    StageError(String),

    /// The OS refused to create a stage thread
    #[error("failed to spawn stage {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Thread join error
    #[error("Thread join error: {0}")]
    ThreadError(String),

    /// Nothing to run
    #[error("Cannot start pipeline with no stages")]
    NoStages,
}

impl PipelineError {
    /// True for the write-after-close error seen during shutdown cascades
    pub fn is_closed(&self) -> bool {
        matches!(self, PipelineError::Closed)
    }
}
