pub mod orchestrator;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::endpoints::{AccountProfileResponse, VerifyCpfResponse};
use crate::error::PortalError;

pub use orchestrator::SessionOrchestrator;

/// An authenticated identity.
///
/// Created by a successful login, dropped on logout. Never persisted across
/// process restarts; only the bearer credential is durable, and the session
/// is re-derived by logging in again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub name: String,
    pub cpf: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Backend handle identifying which contract/session context subsequent
    /// business calls run under. A session without one is not authenticated.
    pub session_code: Option<i64>,
    pub plan_code: String,
    pub contract_number: String,
    pub is_beneficiary: bool,
    /// Profile attributes fetched lazily from the digital-card endpoint.
    #[serde(default)]
    pub card_details: Map<String, Value>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.session_code.is_some()
    }
}

/// Outcome of a CPF lookup: routes the UI to login, registration, or a
/// rejection screen. Transient; never stored beyond the current flow.
#[derive(Debug, Clone, PartialEq)]
pub struct CpfVerification {
    pub exists: bool,
    pub has_account: bool,
    pub has_password: bool,
    pub is_beneficiary: bool,
    pub masked_email: Option<String>,
    pub masked_phone: Option<String>,
}

impl From<VerifyCpfResponse> for CpfVerification {
    fn from(response: VerifyCpfResponse) -> Self {
        Self {
            exists: response.exists,
            has_account: response.has_account,
            has_password: response.has_password,
            is_beneficiary: response.is_beneficiary,
            masked_email: response.masked_email,
            masked_phone: response.masked_phone,
        }
    }
}

/// A (plan, contract) candidate returned by the profile listing.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountProfile {
    pub plan_code: String,
    pub contract_number: String,
    pub holder_name: Option<String>,
}

impl From<AccountProfileResponse> for AccountProfile {
    fn from(response: AccountProfileResponse) -> Self {
        Self {
            plan_code: response.plan_code,
            contract_number: response.contract_number,
            holder_name: response.name,
        }
    }
}

/// Normalize a CPF to its eleven digits, stripping the usual punctuation.
///
/// Purely local; a malformed CPF never reaches the transport.
pub fn normalize_cpf(cpf: &str) -> Result<String, PortalError> {
    let digits: String = cpf
        .chars()
        .filter(|c| !matches!(c, '.' | '-' | ' '))
        .collect();
    if digits.len() != 11 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(PortalError::Validation(
            "CPF must contain exactly eleven digits".to_string(),
        ));
    }
    Ok(digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpf_punctuation_is_stripped() {
        assert_eq!(normalize_cpf("529.982.247-25").unwrap(), "52998224725");
        assert_eq!(normalize_cpf("52998224725").unwrap(), "52998224725");
    }

    #[test]
    fn short_or_non_numeric_cpf_is_rejected() {
        assert!(normalize_cpf("12345").is_err());
        assert!(normalize_cpf("5299822472X").is_err());
        assert!(normalize_cpf("").is_err());
    }

    #[test]
    fn session_requires_a_session_code_to_be_authenticated() {
        let mut session = Session {
            user_id: "u-1".to_string(),
            name: "Maria".to_string(),
            cpf: "52998224725".to_string(),
            email: None,
            phone: None,
            session_code: Some(42),
            plan_code: "12".to_string(),
            contract_number: "777".to_string(),
            is_beneficiary: true,
            card_details: Map::new(),
        };
        assert!(session.is_authenticated());

        session.session_code = None;
        assert!(!session.is_authenticated());
    }
}
