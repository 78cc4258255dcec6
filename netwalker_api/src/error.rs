use std::time::Duration;

use strum_macros::IntoStaticStr;

/// NetWalker failed before any device was contacted.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("No device credentials available: {0}")]
    Credentials(String),
}

/// Failure while opening or driving an interactive device session.
///
/// Transport never retries on its own; callers own the retry policy.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("TCP connection failed: {0}")]
    Unreachable(String),
    #[error("Authentication failed: {0}")]
    AuthFailed(String),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("Unexpected protocol response: {0}")]
    Protocol(String),
    #[error("Failed to quiet terminal pager: {0}")]
    Pager(String),
}

/// Command output could not be turned into the expected structured facts.
#[derive(Debug, thiserror::Error)]
#[error("Failed to parse {what}: {detail}")]
pub struct ParseError {
    pub what: &'static str,
    pub detail: String,
}

impl ParseError {
    pub fn new(what: &'static str, detail: impl Into<String>) -> Self {
        Self {
            what,
            detail: detail.into(),
        }
    }
}

/// Coarse per-device failure label, recorded in the seed CSV `error_details`
/// column and grouped in the end-of-run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum FailureKind {
    #[strum(serialize = "unreachable")]
    Unreachable,
    #[strum(serialize = "auth_failed")]
    AuthFailed,
    #[strum(serialize = "timeout")]
    Timeout,
    #[strum(serialize = "protocol")]
    Protocol,
    #[strum(serialize = "pager")]
    Pager,
    #[strum(serialize = "no_ip")]
    NoIp,
    #[strum(serialize = "db")]
    Database,
}

impl FailureKind {
    pub fn label(&self) -> &'static str {
        self.into()
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl From<&TransportError> for FailureKind {
    fn from(err: &TransportError) -> Self {
        match err {
            TransportError::Unreachable(_) => FailureKind::Unreachable,
            TransportError::AuthFailed(_) => FailureKind::AuthFailed,
            TransportError::Timeout(_) => FailureKind::Timeout,
            TransportError::Protocol(_) => FailureKind::Protocol,
            TransportError::Pager(_) => FailureKind::Pager,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_labels() {
        assert_eq!(FailureKind::Unreachable.label(), "unreachable");
        assert_eq!(FailureKind::AuthFailed.label(), "auth_failed");
        assert_eq!(FailureKind::NoIp.label(), "no_ip");
        assert_eq!(FailureKind::Database.label(), "db");
    }

    #[test]
    fn test_transport_error_to_kind() {
        let err = TransportError::Timeout(Duration::from_secs(30));
        assert_eq!(FailureKind::from(&err), FailureKind::Timeout);

        let err = TransportError::AuthFailed("bad password".into());
        assert_eq!(FailureKind::from(&err), FailureKind::AuthFailed);
    }
}
