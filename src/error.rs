use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

/// Fixed message reported when the database server cannot be reached.
pub const CONNECTION_FAILED_MESSAGE: &str =
    "Connection failed. Make sure that the database server is running.";

#[derive(Debug, ThisError)]
pub enum BootstrapError {
    #[error("Connection failed. Make sure that the database server is running.")]
    ConnectionFailed(#[source] SqlxError),

    #[error("Installer error: {0}")]
    Installer(#[from] InstallerError),

    #[error("Database error while {action}: {source}")]
    Write {
        action: &'static str,
        #[source]
        source: SqlxError,
    },

    #[error("Failed to close database connection: {0}")]
    Close(#[source] SqlxError),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unable to get {file} that matches {expected} (got {actual})")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for BootstrapError {
    fn from(e: figment::Error) -> Self {
        BootstrapError::Config(Box::new(e))
    }
}

pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for BootstrapError {
    fn is_retryable(&self) -> bool {
        match self {
            BootstrapError::Http(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

/// Failures of the delegated install entry point.
#[derive(Debug, ThisError)]
pub enum InstallerError {
    #[error("failed to launch installer: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("installer did not finish within {0} seconds")]
    Timeout(u64),

    #[error("installer exited with status {code:?}: {stderr}")]
    Exited { code: Option<i32>, stderr: String },

    #[error("installer produced malformed output: {0}")]
    MalformedOutput(#[from] serde_json::Error),

    #[error("installer rejected the request: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_failure_keeps_fixed_message() {
        let err = BootstrapError::ConnectionFailed(SqlxError::PoolClosed);
        assert_eq!(err.to_string(), CONNECTION_FAILED_MESSAGE);
    }

    #[test]
    fn write_error_names_the_action() {
        let err = BootstrapError::Write {
            action: "setting option 'home'",
            source: SqlxError::RowNotFound,
        };
        assert!(err.to_string().starts_with("Database error while setting option 'home'"));
        assert!(!err.is_retryable());
    }
}
