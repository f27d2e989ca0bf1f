// ABOUTME: Runtime error types with SNAFU pattern.
// ABOUTME: Unifies detection and connection errors, tagged with the host they concern.

use snafu::Snafu;

use super::detection::DetectionError;
use super::traits::RuntimeInfoError;

/// Unified runtime error for detection and connection failures.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RuntimeError {
    #[snafu(display("runtime detection on {host} failed: {source}"))]
    Detection {
        host: String,
        source: DetectionError,
    },

    #[snafu(display("runtime connection on {host} failed: {source}"))]
    Connection {
        host: String,
        source: RuntimeInfoError,
    },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// No container runtime found on the system.
    NoRuntimeFound,
    /// SSH error during runtime detection.
    SshError,
    /// Failed to connect to runtime socket.
    ConnectionFailed,
    /// Runtime operation error.
    RuntimeOperation,
}

impl RuntimeError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> RuntimeErrorKind {
        match self {
            RuntimeError::Detection { source, .. } => match source {
                DetectionError::NoRuntimeFound => RuntimeErrorKind::NoRuntimeFound,
                DetectionError::Ssh(_) => RuntimeErrorKind::SshError,
            },
            RuntimeError::Connection { source, .. } => match source {
                RuntimeInfoError::ConnectionFailed(_) => RuntimeErrorKind::ConnectionFailed,
                RuntimeInfoError::Runtime(_) => RuntimeErrorKind::RuntimeOperation,
            },
        }
    }

    /// Host the failure happened on (`localhost` for the source side).
    pub fn host(&self) -> &str {
        match self {
            RuntimeError::Detection { host, .. } | RuntimeError::Connection { host, .. } => host,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snafu::ResultExt;

    #[test]
    fn detection_failure_reports_kind_and_host() {
        let result: Result<(), DetectionError> = Err(DetectionError::NoRuntimeFound);
        let err = result.context(DetectionSnafu { host: "db1" }).unwrap_err();
        assert_eq!(err.kind(), RuntimeErrorKind::NoRuntimeFound);
        assert_eq!(err.host(), "db1");
        assert!(err.to_string().contains("on db1"));
    }

    #[test]
    fn connection_failure_kind() {
        let result: Result<(), RuntimeInfoError> =
            Err(RuntimeInfoError::ConnectionFailed("refused".to_string()));
        let err = result
            .context(ConnectionSnafu { host: "localhost" })
            .unwrap_err();
        assert_eq!(err.kind(), RuntimeErrorKind::ConnectionFailed);
    }
}
