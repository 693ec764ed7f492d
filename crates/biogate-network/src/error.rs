use thiserror::Error;

/// Errors raised inside the device link.
///
/// These never cross the service boundary: public operations fold them into
/// `false` or an empty result after logging.
#[derive(Debug, Error)]
pub enum LinkError {
    /// No live session with the terminal
    #[error("Not connected to terminal")]
    NotConnected,

    /// TCP connect did not complete in time
    #[error("Connection timeout after {0}ms")]
    ConnectionTimeout(u64),

    /// Socket saw no traffic for longer than the idle limit
    #[error("Idle timeout after {0}ms")]
    IdleTimeout(u64),

    /// Write did not complete in time
    #[error("Write timeout after {0}ms")]
    WriteTimeout(u64),

    /// Terminal closed the connection
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Protocol-level error from the frame codec
    #[error("Protocol error: {0}")]
    Protocol(#[from] biogate_core::Error),

    /// Low-level I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LinkError {
    /// Whether the session is unusable after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LinkError::IdleTimeout(_)
                | LinkError::WriteTimeout(_)
                | LinkError::ConnectionLost(_)
                | LinkError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
