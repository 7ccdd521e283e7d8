//! Error types for mongo-collectd
//!
//! This module defines the error types used throughout the application.

use thiserror::Error;

/// Errors raised while polling MongoDB
#[derive(Error, Debug)]
pub enum CollectorError {
    /// Driver-level failure (connection, auth, server selection, I/O)
    #[error("MongoDB driver error: {0}")]
    Driver(#[from] mongodb::error::Error),

    /// An administrative command returned an error
    #[error("Command '{command}' failed on database '{database}': {source}")]
    Command {
        command: String,
        database: String,
        #[source]
        source: mongodb::error::Error,
    },

    /// A field the sample builders cannot proceed without is absent
    #[error("Missing field '{field}' in {command} response")]
    MissingField { command: String, field: String },

    /// A field has a BSON type the builders cannot interpret
    #[error("Unexpected type for field '{field}': expected {expected}")]
    UnexpectedType { field: String, expected: String },
}

impl CollectorError {
    /// Shorthand for [`CollectorError::MissingField`]
    pub fn missing(command: &str, field: &str) -> Self {
        CollectorError::MissingField {
            command: command.to_string(),
            field: field.to_string(),
        }
    }

    /// Whether the failure is on the connection rather than in a response
    pub fn is_connection(&self) -> bool {
        match self {
            CollectorError::Driver(e) | CollectorError::Command { source: e, .. } => matches!(
                *e.kind,
                mongodb::error::ErrorKind::Io(_)
                    | mongodb::error::ErrorKind::ServerSelection { .. }
                    | mongodb::error::ErrorKind::ConnectionPoolCleared { .. }
            ),
            _ => false,
        }
    }
}

/// Errors raised while submitting samples
#[derive(Error, Debug)]
pub enum SinkError {
    /// Writing to the output stream failed
    #[error("Failed to write samples: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_message() {
        let err = CollectorError::missing("replSetGetStatus", "members");
        assert_eq!(
            err.to_string(),
            "Missing field 'members' in replSetGetStatus response"
        );
        assert!(!err.is_connection());
    }

    #[test]
    fn test_io_failure_is_connection() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = CollectorError::Driver(mongodb::error::Error::from(io));
        assert!(err.is_connection());
        assert!(err.to_string().starts_with("MongoDB driver error"));
    }

    #[test]
    fn test_sink_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        let err = SinkError::from(io);
        assert!(err.to_string().contains("closed"));
    }
}
