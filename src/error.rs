use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for all portal client operations.
///
/// The variants mirror the failure classes the UI has to distinguish:
/// transport problems (network, timeout, unexpected status), authentication
/// failures that survived a credential renewal, rejected logins, and local
/// validation failures that never reach the network.
#[derive(Error, Debug, Clone)]
pub enum PortalError {
    /// Network failure or a non-2xx status the transport does not handle
    /// itself. Carries the HTTP status when one was received.
    #[error("transport failure: {message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// The configured request deadline elapsed before a response arrived.
    #[error("request timed out during {operation}")]
    Timeout { operation: String },

    /// A 401 that survived one credential renewal, or the renewal itself
    /// failed. The stored credential has been cleared by the time this is
    /// returned.
    #[error("authentication failed: {reason}")]
    Authentication { reason: String },

    /// Login was rejected. Deliberately covers both "unknown CPF" and
    /// "wrong password" so callers cannot enumerate accounts.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Local input validation failed before any request was made.
    #[error("invalid input: {0}")]
    Validation(String),
}

impl PortalError {
    /// The HTTP status associated with this error, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            PortalError::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// Map this error onto the stable set of user-facing categories.
    ///
    /// Raw backend bodies are never surfaced to the UI; screens branch on
    /// the category and render their own copy.
    pub fn category(&self) -> ErrorCategory {
        match self {
            PortalError::Timeout { .. } => ErrorCategory::Network,
            PortalError::Transport { status: None, .. } => ErrorCategory::Network,
            PortalError::Transport {
                status: Some(status),
                ..
            } if *status >= 500 => ErrorCategory::Server,
            PortalError::Transport { .. } => ErrorCategory::Unknown,
            // A dead session reads the same as a bad password to the user:
            // they have to sign in again.
            PortalError::Authentication { .. } => ErrorCategory::InvalidCredentials,
            PortalError::InvalidCredentials => ErrorCategory::InvalidCredentials,
            PortalError::Validation(_) => ErrorCategory::MalformedInput,
        }
    }
}

/// User-facing error categories for programmatic handling in UI code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    InvalidCredentials,
    MalformedInput,
    Server,
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_carried_for_transport_errors() {
        let err = PortalError::Transport {
            status: Some(503),
            message: "service unavailable".to_string(),
        };
        assert_eq!(err.status(), Some(503));
        assert_eq!(PortalError::InvalidCredentials.status(), None);
    }

    #[test]
    fn categories_are_stable() {
        let cases = [
            (
                PortalError::Timeout {
                    operation: "login".to_string(),
                },
                ErrorCategory::Network,
            ),
            (
                PortalError::Transport {
                    status: None,
                    message: "connection refused".to_string(),
                },
                ErrorCategory::Network,
            ),
            (
                PortalError::Transport {
                    status: Some(500),
                    message: "internal error".to_string(),
                },
                ErrorCategory::Server,
            ),
            (
                PortalError::Transport {
                    status: Some(422),
                    message: "unprocessable".to_string(),
                },
                ErrorCategory::Unknown,
            ),
            (
                PortalError::Authentication {
                    reason: "renewal failed".to_string(),
                },
                ErrorCategory::InvalidCredentials,
            ),
            (
                PortalError::InvalidCredentials,
                ErrorCategory::InvalidCredentials,
            ),
            (
                PortalError::Validation("cpf".to_string()),
                ErrorCategory::MalformedInput,
            ),
        ];
        for (err, category) in cases {
            assert_eq!(err.category(), category, "wrong category for {err}");
        }
    }
}
