//! Engine-specific error types

use thiserror::Error;
use std::io;

/// Errors reported while talking to the container engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// No usable connection configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Engine could not be reached
    #[error("Engine connection error: {0}")]
    Connection(String),

    /// Referenced container, exec session or image does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Container is not running (e.g. kill against an exited container)
    #[error("Container {0} is not running")]
    NotRunning(String),

    /// Engine rejected the request
    #[error("Engine returned {status}: {message}")]
    Api {
        /// HTTP status code reported by the engine
        status: u16,
        /// Engine-provided message
        message: String,
    },

    /// Output stream broke while reading
    #[error("Stream error: {0}")]
    Stream(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl EngineError {
    /// Whether the engine could not be reached at all
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl From<bollard::errors::Error> for EngineError {
    fn from(err: bollard::errors::Error) -> Self {
        use bollard::errors::Error as DockerError;

        match err {
            DockerError::DockerResponseServerError { status_code: 404, message } => {
                Self::NotFound(message)
            }
            DockerError::DockerResponseServerError { status_code, message } => Self::Api {
                status: status_code,
                message,
            },
            DockerError::IOError { err } => Self::Io(err),
            other => Self::Connection(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_mapping() {
        let err: EngineError = bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message: "No such container: abc".to_string(),
        }.into();
        assert!(matches!(err, EngineError::NotFound(ref m) if m.contains("abc")));

        let err: EngineError = bollard::errors::Error::DockerResponseServerError {
            status_code: 500,
            message: "boom".to_string(),
        }.into();
        match err {
            EngineError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected mapping: {:?}", other),
        }
    }

    #[test]
    fn test_io_error_mapping() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let err: EngineError = bollard::errors::Error::IOError { err: io_err }.into();
        assert!(matches!(err, EngineError::Io(_)));
        assert!(!err.is_connection());
    }

    #[test]
    fn test_display() {
        let err = EngineError::Api { status: 409, message: "conflict".to_string() };
        assert_eq!(err.to_string(), "Engine returned 409: conflict");

        let err = EngineError::NotRunning("abc".to_string());
        assert_eq!(err.to_string(), "Container abc is not running");
    }
}
