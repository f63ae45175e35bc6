use std::fmt;

use serde::{Deserialize, Serialize};

/// An opaque bearer credential issued by the token endpoint.
///
/// The value is never inspected by this crate; it is attached verbatim to
/// outgoing requests and replaced wholesale on renewal. `Debug` output is
/// redacted so credentials do not leak into logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The value of the `Authorization` header for this credential.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(****)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_uses_bearer_scheme() {
        let credential = Credential::new("abc123");
        assert_eq!(credential.authorization_header(), "Bearer abc123");
    }

    #[test]
    fn debug_output_is_redacted() {
        let credential = Credential::new("super-secret-token");
        let debug = format!("{credential:?}");
        assert!(!debug.contains("super-secret-token"));
    }

    #[test]
    fn serializes_as_a_bare_string() {
        let credential = Credential::new("abc123");
        assert_eq!(
            serde_json::to_string(&credential).unwrap(),
            r#""abc123""#
        );
    }
}
