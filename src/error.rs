// error definitions
use redis;
use thiserror::Error;

/// Crate-wide error taxonomy.
///
/// Admission denial is not an error; it is the `false` arm of
/// [`allow`](crate::limiter::SlidingWindow::allow). "No live backend" is
/// likewise a `None` from the selector, not an `Err`.
#[derive(Error, Debug)]
pub enum LimiterError {
    /// The caller's cancellation handle fired before the operation finished.
    #[error("operation cancelled")]
    Cancelled,

    /// A fault talking to the storage backend.
    #[error("storage error: {0}")]
    Storage(StorageError),

    /// Invalid configuration. Fatal at startup; cannot occur afterwards.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Connection-level faults reaching the remote store
    #[error("connection error: {0}")]
    Connection(String),

    /// Command or protocol faults reported by the remote store
    #[error("command error: {0}")]
    Command(String),

    /// The process clock reported a time before the Unix epoch
    #[error("clock error: {0}")]
    Clock(String),
}

impl From<redis::RedisError> for LimiterError {
    fn from(err: redis::RedisError) -> Self {
        match err.kind() {
            redis::ErrorKind::IoError | redis::ErrorKind::ClientError => {
                LimiterError::Storage(StorageError::Connection(err.to_string()))
            }
            _ => LimiterError::Storage(StorageError::Command(err.to_string())),
        }
    }
}

// define a Result type alias for convenience
pub type Result<T> = std::result::Result<T, LimiterError>;
