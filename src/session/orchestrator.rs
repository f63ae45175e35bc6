use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::endpoints;
use crate::endpoints::{
    AuthenticateRequest, AuthenticateResponse, ChangePasswordRequest, ConfirmContactRequest,
    CreateAccountRequest, ListProfilesRequest, OutcomeResponse, RecoverPasswordRequest,
    RegisterContactRequest, ResendSmsRequest, SetPasswordRequest, ValidateRecoveryCodeRequest,
    VerifyCpfRequest, VerifyCpfResponse,
};
use crate::error::{ErrorCategory, PortalError};
use crate::http::Transport;
use crate::session::{normalize_cpf, AccountProfile, CpfVerification, Session};

/// CPF-driven identity resolution and login/registration flows.
///
/// Owns the current [`Session`] and uses the [`Transport`] as its sole means
/// of talking to the backend. The UI owns wizard state (contact →
/// verification → password); this type only orchestrates the calls.
pub struct SessionOrchestrator {
    transport: Arc<Transport>,
    session: RwLock<Option<Session>>,
}

impl SessionOrchestrator {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self {
            transport,
            session: RwLock::new(None),
        }
    }

    /// Prepare the client at process start: hydrate the stored credential or
    /// renew proactively so the first business call does not pay a failed
    /// round-trip.
    pub async fn initialize(&self) -> Result<(), PortalError> {
        self.transport.ensure_credential().await
    }

    /// The current session, if any.
    pub async fn current_session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    /// Whether an authenticated session is active.
    pub async fn is_authenticated(&self) -> bool {
        self.session
            .read()
            .await
            .as_ref()
            .is_some_and(Session::is_authenticated)
    }

    /// Map an error onto the stable user-facing categories.
    pub fn classify(&self, error: &PortalError) -> ErrorCategory {
        error.category()
    }

    /// Look up a CPF and decide where the UI goes next.
    ///
    /// Never fails to its caller: a malformed CPF, a network problem or a
    /// backend error all come back as `None`.
    pub async fn verify_cpf(&self, cpf: &str) -> Option<CpfVerification> {
        let cpf = match normalize_cpf(cpf) {
            Ok(cpf) => cpf,
            Err(e) => {
                debug!(error = %e, "CPF rejected locally");
                return None;
            }
        };
        self.verify_normalized_cpf(&cpf).await
    }

    async fn verify_normalized_cpf(&self, cpf: &str) -> Option<CpfVerification> {
        let result: Result<VerifyCpfResponse, PortalError> = self
            .transport
            .post_json(
                endpoints::VERIFY_CPF,
                &VerifyCpfRequest {
                    cpf: cpf.to_string(),
                },
            )
            .await;
        match result {
            Ok(response) => Some(response.into()),
            Err(e) => {
                warn!(error = %e, "CPF verification failed");
                None
            }
        }
    }

    /// Authenticate and populate a [`Session`].
    ///
    /// An empty or malformed profile list reads as invalid credentials;
    /// "unknown CPF" and "wrong password" are intentionally the same answer.
    /// Multi-profile accounts are not disambiguated: the first profile wins.
    /// On any failure the current session is left untouched.
    pub async fn login(&self, cpf: &str, password: &str) -> Result<Session, PortalError> {
        let cpf = normalize_cpf(cpf)?;
        if password.is_empty() {
            return Err(PortalError::Validation(
                "password must not be empty".to_string(),
            ));
        }

        let raw: Value = self
            .transport
            .post_json(
                endpoints::LIST_PROFILES,
                &ListProfilesRequest {
                    cpf: cpf.clone(),
                    senha: password.to_string(),
                },
            )
            .await?;
        let profiles: Vec<AccountProfile> =
            match serde_json::from_value::<Vec<crate::endpoints::AccountProfileResponse>>(raw) {
                Ok(profiles) => profiles.into_iter().map(Into::into).collect(),
                Err(e) => {
                    debug!(error = %e, "profile listing was not a profile array");
                    return Err(PortalError::InvalidCredentials);
                }
            };
        let Some(profile) = profiles.into_iter().next() else {
            return Err(PortalError::InvalidCredentials);
        };

        let auth: AuthenticateResponse = self
            .transport
            .post_json(
                endpoints::AUTHENTICATE,
                &AuthenticateRequest {
                    cpf: cpf.clone(),
                    senha: password.to_string(),
                    plan_code: profile.plan_code.clone(),
                    contract_number: profile.contract_number.clone(),
                },
            )
            .await?;
        if !authentication_succeeded(&auth) {
            return Err(PortalError::InvalidCredentials);
        }

        // Re-run the lookup for the beneficiary flag. The flag defaults to
        // false when the lookup cannot be completed.
        let verification = self.verify_normalized_cpf(&cpf).await;
        if verification.is_none() {
            warn!("could not re-verify CPF after login, beneficiary flag unset");
        }
        let is_beneficiary = verification.map(|v| v.is_beneficiary).unwrap_or(false);

        let session = Session {
            user_id: auth.user_id.clone().unwrap_or_else(|| cpf.clone()),
            name: auth
                .name
                .clone()
                .or_else(|| profile.holder_name.clone())
                .unwrap_or_default(),
            cpf,
            email: auth.email.clone(),
            phone: auth.phone.clone(),
            session_code: auth.session_code,
            plan_code: profile.plan_code,
            contract_number: profile.contract_number,
            is_beneficiary,
            card_details: Map::new(),
        };

        *self.session.write().await = Some(session.clone());
        info!(user_id = %session.user_id, "login completed");
        Ok(session)
    }

    /// Drop the session and credential, then renew proactively so the app is
    /// left unauthenticated but ready. A failed renewal here is logged, not
    /// raised; the next call re-triggers one from a clean slate.
    pub async fn logout(&self) {
        info!("logging out");
        *self.session.write().await = None;
        self.transport.clear_credential().await;
        if let Err(e) = self.transport.ensure_credential().await {
            warn!(error = %e, "proactive renewal after logout failed");
        }
    }

    /// Fetch the digital-card profile attributes and merge them into the
    /// current session. Requires an authenticated session.
    pub async fn fetch_card_details(&self) -> Result<Map<String, Value>, PortalError> {
        if !self.is_authenticated().await {
            return Err(PortalError::Authentication {
                reason: "no authenticated session".to_string(),
            });
        }

        let details: Map<String, Value> =
            self.transport.get_json(endpoints::CARD_DETAILS).await?;
        if let Some(session) = self.session.write().await.as_mut() {
            for (key, value) in &details {
                session.card_details.insert(key.clone(), value.clone());
            }
        }
        Ok(details)
    }

    // Registration flow. Each operation is a pass-through: the backend
    // answers success/failure, the UI tracks the wizard steps.

    pub async fn create_account(
        &self,
        cpf: &str,
        name: &str,
        email: &str,
        phone: &str,
    ) -> Result<bool, PortalError> {
        let cpf = normalize_cpf(cpf)?;
        self.post_outcome(
            endpoints::CREATE_ACCOUNT,
            &CreateAccountRequest {
                cpf,
                nome: name.to_string(),
                email: email.to_string(),
                celular: phone.to_string(),
            },
        )
        .await
    }

    pub async fn register_contact(
        &self,
        cpf: &str,
        email: &str,
        phone: &str,
    ) -> Result<bool, PortalError> {
        let cpf = normalize_cpf(cpf)?;
        self.post_outcome(
            endpoints::REGISTER_CONTACT,
            &RegisterContactRequest {
                cpf,
                email: email.to_string(),
                celular: phone.to_string(),
            },
        )
        .await
    }

    pub async fn confirm_contact(&self, cpf: &str, code: &str) -> Result<bool, PortalError> {
        let cpf = normalize_cpf(cpf)?;
        self.post_outcome(
            endpoints::CONFIRM_CONTACT,
            &ConfirmContactRequest {
                cpf,
                code: code.to_string(),
            },
        )
        .await
    }

    pub async fn resend_sms(&self, cpf: &str) -> Result<bool, PortalError> {
        let cpf = normalize_cpf(cpf)?;
        self.post_outcome(endpoints::RESEND_SMS, &ResendSmsRequest { cpf })
            .await
    }

    pub async fn set_password(&self, cpf: &str, password: &str) -> Result<bool, PortalError> {
        let cpf = normalize_cpf(cpf)?;
        self.post_outcome(
            endpoints::SET_PASSWORD,
            &SetPasswordRequest {
                cpf,
                senha: password.to_string(),
            },
        )
        .await
    }

    // Password recovery, independent of the login flow.

    pub async fn recover_password(&self, cpf: &str) -> Result<bool, PortalError> {
        let cpf = normalize_cpf(cpf)?;
        self.post_outcome(endpoints::RECOVER_PASSWORD, &RecoverPasswordRequest { cpf })
            .await
    }

    pub async fn validate_recovery_code(
        &self,
        cpf: &str,
        code: &str,
    ) -> Result<bool, PortalError> {
        let cpf = normalize_cpf(cpf)?;
        self.post_outcome(
            endpoints::VALIDATE_RECOVERY_CODE,
            &ValidateRecoveryCodeRequest {
                cpf,
                code: code.to_string(),
            },
        )
        .await
    }

    pub async fn change_password(
        &self,
        cpf: &str,
        code: &str,
        new_password: &str,
    ) -> Result<bool, PortalError> {
        let cpf = normalize_cpf(cpf)?;
        self.post_outcome(
            endpoints::CHANGE_PASSWORD,
            &ChangePasswordRequest {
                cpf,
                code: code.to_string(),
                new_password: new_password.to_string(),
            },
        )
        .await
    }

    async fn post_outcome<B: Serialize>(&self, path: &str, body: &B) -> Result<bool, PortalError> {
        let outcome: OutcomeResponse = self.transport.post_json(path, body).await?;
        if let Some(message) = &outcome.message {
            debug!(%message, path, "backend outcome message");
        }
        Ok(outcome.success)
    }
}

/// Decide whether an authenticate response means success.
///
/// The backend's success signaling is inconsistent: some responses carry
/// `sucesso: true`, others omit or even contradict the flag while still
/// returning the session code and user name. A response with both of those
/// is accepted as a successful login.
fn authentication_succeeded(response: &AuthenticateResponse) -> bool {
    if response.success == Some(true) {
        return true;
    }
    response.session_code.is_some()
        && response.name.as_deref().is_some_and(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use serde_json::json;

    use crate::auth::{Credential, CredentialStore};
    use crate::config::PortalConfig;
    use crate::http::client::{HttpClient, HttpResponse};

    const BASE: &str = "https://backend.test";

    /// Fake sender answering from a table of scripted responses keyed by
    /// full URL. Unscripted URLs fail the request, which surfaces as a
    /// transport error, so failure paths need no extra setup.
    #[derive(Default)]
    struct ScriptedClient {
        responses: Mutex<HashMap<String, HttpResponse>>,
        requests: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn mock(&self, path: &str, status: u16, body: &str) {
            self.responses
                .lock()
                .unwrap()
                .insert(format!("{BASE}{path}"), HttpResponse::new(status, body));
        }

        fn requested_paths(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }

        fn respond(&self, url: &str) -> Result<HttpResponse, PortalError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.responses
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .ok_or_else(|| PortalError::Transport {
                    status: None,
                    message: format!("no scripted response for {url}"),
                })
        }
    }

    #[async_trait::async_trait]
    impl HttpClient for ScriptedClient {
        async fn get(
            &self,
            url: &str,
            _headers: HashMap<String, String>,
        ) -> Result<HttpResponse, PortalError> {
            self.respond(url)
        }

        async fn post(
            &self,
            url: &str,
            _headers: HashMap<String, String>,
            _body: String,
        ) -> Result<HttpResponse, PortalError> {
            self.respond(url)
        }
    }

    struct Harness {
        client: Arc<ScriptedClient>,
        store: CredentialStore,
        orchestrator: SessionOrchestrator,
    }

    fn harness() -> Harness {
        let client = Arc::new(ScriptedClient::default());
        let store = CredentialStore::in_memory();
        let config = PortalConfig::new(BASE, "app", "secret");
        let transport = Arc::new(Transport::new(client.clone(), store.clone(), config));
        Harness {
            client,
            store,
            orchestrator: SessionOrchestrator::new(transport),
        }
    }

    fn mock_login_backend(client: &ScriptedClient, authenticate_body: &str) {
        client.mock(
            endpoints::LIST_PROFILES,
            200,
            r#"[{"codigoPlano": "12", "numeroContrato": "777", "nome": "Maria Souza"}]"#,
        );
        client.mock(endpoints::AUTHENTICATE, 200, authenticate_body);
        client.mock(
            endpoints::VERIFY_CPF,
            200,
            r#"{"existe": true, "possuiConta": true, "possuiSenha": true, "beneficiario": true}"#,
        );
    }

    const CPF: &str = "529.982.247-25";

    #[tokio::test]
    async fn verify_cpf_rejects_malformed_input_locally() {
        let h = harness();
        assert!(h.orchestrator.verify_cpf("123").await.is_none());
        // Nothing reached the network.
        assert!(h.client.requested_paths().is_empty());
    }

    #[tokio::test]
    async fn verify_cpf_translates_transport_failure_to_none() {
        let h = harness();
        // No scripted response: the call fails at the transport.
        assert!(h.orchestrator.verify_cpf(CPF).await.is_none());
        assert_eq!(h.client.requested_paths().len(), 1);
    }

    #[tokio::test]
    async fn verify_cpf_returns_masked_contact_info() {
        let h = harness();
        h.client.mock(
            endpoints::VERIFY_CPF,
            200,
            r#"{"existe": true, "possuiConta": false, "possuiSenha": false,
                "emailMascarado": "m****@example.com", "celularMascarado": "(11) 9****-**99"}"#,
        );

        let verification = h.orchestrator.verify_cpf(CPF).await.unwrap();
        assert!(verification.exists);
        assert!(!verification.has_account);
        assert_eq!(
            verification.masked_email.as_deref(),
            Some("m****@example.com")
        );
        assert_eq!(
            verification.masked_phone.as_deref(),
            Some("(11) 9****-**99")
        );
    }

    #[tokio::test]
    async fn login_rejects_empty_profile_list() {
        let h = harness();
        h.client.mock(endpoints::LIST_PROFILES, 200, "[]");

        let err = h.orchestrator.login(CPF, "senha123").await.unwrap_err();
        assert!(matches!(err, PortalError::InvalidCredentials));
        assert!(h.orchestrator.current_session().await.is_none());
        // The flow stopped before the authenticate endpoint.
        assert!(!h
            .client
            .requested_paths()
            .iter()
            .any(|url| url.ends_with(endpoints::AUTHENTICATE)));
    }

    #[tokio::test]
    async fn login_rejects_malformed_profile_list() {
        let h = harness();
        h.client
            .mock(endpoints::LIST_PROFILES, 200, r#"{"erro": "formato"}"#);

        let err = h.orchestrator.login(CPF, "senha123").await.unwrap_err();
        assert!(matches!(err, PortalError::InvalidCredentials));
        assert!(h.orchestrator.current_session().await.is_none());
    }

    #[tokio::test]
    async fn login_accepts_the_session_code_plus_name_fallback() {
        let h = harness();
        mock_login_backend(
            &h.client,
            r#"{"sucesso": false, "codigoSessao": 555, "nome": "X"}"#,
        );

        let session = h.orchestrator.login(CPF, "senha123").await.unwrap();
        assert_eq!(session.name, "X");
        assert_eq!(session.session_code, Some(555));
        assert!(session.is_authenticated());
        assert!(h.orchestrator.is_authenticated().await);
    }

    #[tokio::test]
    async fn login_rejects_when_no_success_signal_is_present() {
        let h = harness();
        mock_login_backend(&h.client, r#"{"sucesso": false}"#);

        let err = h.orchestrator.login(CPF, "senha123").await.unwrap_err();
        assert!(matches!(err, PortalError::InvalidCredentials));
        assert!(h.orchestrator.current_session().await.is_none());
    }

    #[tokio::test]
    async fn login_merges_authenticate_response_over_profile() {
        let h = harness();
        mock_login_backend(
            &h.client,
            r#"{"sucesso": true, "codigoSessao": 42, "idUsuario": "u-9",
                "nome": "Maria", "email": "maria@example.com", "celular": "11999990000"}"#,
        );

        let session = h.orchestrator.login(CPF, "senha123").await.unwrap();
        assert_eq!(session.user_id, "u-9");
        assert_eq!(session.name, "Maria");
        assert_eq!(session.cpf, "52998224725");
        assert_eq!(session.email.as_deref(), Some("maria@example.com"));
        assert_eq!(session.phone.as_deref(), Some("11999990000"));
        assert_eq!(session.plan_code, "12");
        assert_eq!(session.contract_number, "777");
        assert!(session.is_beneficiary);
        assert_eq!(h.orchestrator.current_session().await, Some(session));
    }

    #[tokio::test]
    async fn login_falls_back_to_profile_name_and_cpf_user_id() {
        let h = harness();
        // Authenticate succeeds but carries no name or user id.
        mock_login_backend(&h.client, r#"{"sucesso": true, "codigoSessao": 7}"#);

        let session = h.orchestrator.login(CPF, "senha123").await.unwrap();
        assert_eq!(session.name, "Maria Souza");
        assert_eq!(session.user_id, "52998224725");
    }

    #[tokio::test]
    async fn login_transport_failures_propagate_unchanged() {
        let h = harness();
        h.client.mock(endpoints::LIST_PROFILES, 500, "{}");

        let err = h.orchestrator.login(CPF, "senha123").await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(h.orchestrator.current_session().await.is_none());
    }

    #[tokio::test]
    async fn login_validates_input_before_the_network() {
        let h = harness();
        assert!(matches!(
            h.orchestrator.login("12", "senha").await.unwrap_err(),
            PortalError::Validation(_)
        ));
        assert!(matches!(
            h.orchestrator.login(CPF, "").await.unwrap_err(),
            PortalError::Validation(_)
        ));
        assert!(h.client.requested_paths().is_empty());
    }

    #[tokio::test]
    async fn logout_clears_session_and_credential_and_renews() {
        let h = harness();
        mock_login_backend(&h.client, r#"{"sucesso": true, "codigoSessao": 1, "nome": "M"}"#);
        h.client
            .mock(endpoints::TOKEN, 200, r#"{"accessToken": "renewed"}"#);
        h.store.set(Credential::new("session-era-token")).await;

        h.orchestrator.login(CPF, "senha123").await.unwrap();
        h.orchestrator.logout().await;

        assert!(h.orchestrator.current_session().await.is_none());
        assert!(!h.orchestrator.is_authenticated().await);
        // The old credential is gone and the proactive renewal installed a
        // fresh one.
        assert_eq!(h.store.read().await.unwrap().as_str(), "renewed");
    }

    #[tokio::test]
    async fn card_details_require_an_authenticated_session() {
        let h = harness();
        let err = h.orchestrator.fetch_card_details().await.unwrap_err();
        assert!(matches!(err, PortalError::Authentication { .. }));
    }

    #[tokio::test]
    async fn card_details_merge_into_the_session() {
        let h = harness();
        mock_login_backend(&h.client, r#"{"sucesso": true, "codigoSessao": 1, "nome": "M"}"#);
        h.client.mock(
            endpoints::CARD_DETAILS,
            200,
            r#"{"numeroCarteirinha": "0099", "acomodacao": "apartamento"}"#,
        );

        h.orchestrator.login(CPF, "senha123").await.unwrap();
        let details = h.orchestrator.fetch_card_details().await.unwrap();
        assert_eq!(details["numeroCarteirinha"], json!("0099"));

        let session = h.orchestrator.current_session().await.unwrap();
        assert_eq!(session.card_details["acomodacao"], json!("apartamento"));
    }

    #[tokio::test]
    async fn registration_operations_surface_the_backend_outcome() {
        let h = harness();
        h.client.mock(
            endpoints::CREATE_ACCOUNT,
            200,
            r#"{"sucesso": true, "mensagem": "conta criada"}"#,
        );
        h.client
            .mock(endpoints::CONFIRM_CONTACT, 200, r#"{"sucesso": false}"#);

        assert!(h
            .orchestrator
            .create_account(CPF, "Maria", "maria@example.com", "11999990000")
            .await
            .unwrap());
        assert!(!h.orchestrator.confirm_contact(CPF, "0000").await.unwrap());
    }

    #[tokio::test]
    async fn recovery_operations_are_independent_of_login() {
        let h = harness();
        h.client
            .mock(endpoints::RECOVER_PASSWORD, 200, r#"{"sucesso": true}"#);
        h.client
            .mock(endpoints::VALIDATE_RECOVERY_CODE, 200, r#"{"sucesso": true}"#);
        h.client
            .mock(endpoints::CHANGE_PASSWORD, 200, r#"{"sucesso": true}"#);

        assert!(h.orchestrator.recover_password(CPF).await.unwrap());
        assert!(h
            .orchestrator
            .validate_recovery_code(CPF, "123456")
            .await
            .unwrap());
        assert!(h
            .orchestrator
            .change_password(CPF, "123456", "nova-senha")
            .await
            .unwrap());
        assert!(h.orchestrator.current_session().await.is_none());
    }

    #[tokio::test]
    async fn registration_rejects_malformed_cpf_locally() {
        let h = harness();
        let err = h.orchestrator.resend_sms("not-a-cpf").await.unwrap_err();
        assert!(matches!(err, PortalError::Validation(_)));
        assert!(h.client.requested_paths().is_empty());
    }
}
