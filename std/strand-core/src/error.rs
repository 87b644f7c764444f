///
/// Error types for the strand primitives.
///
/// Primitives report transient outcomes (timeouts, failed try-locks) through
/// boolean returns. `SyncError` covers the remaining cases: native resource
/// failures that carry a reason, capability gaps between platforms, and
/// configuration loading.
///

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to spawn native thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Thread '{name}' failed to initialize")]
    InitFailed { name: String },

    #[error("Thread has not been started")]
    NotStarted,

    #[error("'{operation}' is not supported on this platform")]
    Unsupported { operation: &'static str },

    #[error("Main thread already declared as thread {id}")]
    MainThreadAlreadyDeclared { id: u64 },

    #[error("Native call '{call}' failed with code {code}")]
    Native { call: &'static str, code: i32 },

    #[error("Invalid config at {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = SyncError::InitFailed {
            name: "loader".to_string(),
        };
        assert!(err.to_string().contains("loader"));
        assert!(err.to_string().contains("failed to initialize"));

        let err = SyncError::Unsupported { operation: "suspend" };
        assert!(err.to_string().contains("suspend"));
        assert!(err.to_string().contains("not supported"));

        let err = SyncError::MainThreadAlreadyDeclared { id: 42 };
        assert!(err.to_string().contains("42"));

        let err = SyncError::Native {
            call: "pthread_cancel",
            code: 3,
        };
        assert!(err.to_string().contains("pthread_cancel"));
        assert!(err.to_string().contains('3'));

        let err = SyncError::Config {
            path: PathBuf::from("/tmp/strand.toml"),
            reason: "spin_limit must be positive".to_string(),
        };
        assert!(err.to_string().contains("/tmp/strand.toml"));
        assert!(err.to_string().contains("spin_limit"));
    }

    #[test]
    fn test_spawn_error_keeps_source() {
        use std::error::Error as _;

        let io = std::io::Error::new(std::io::ErrorKind::OutOfMemory, "no stack");
        let err = SyncError::Spawn(io);
        assert!(err.source().is_some());
        assert!(err.to_string().contains("no stack"));
    }
}
