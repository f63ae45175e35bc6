//! Backend endpoint paths and the wire shapes they exchange.
//!
//! Field names follow the backend's Portuguese JSON contract; the structs
//! expose them under the crate's own names via serde renames. Responses are
//! lenient: the backend omits fields freely, so almost everything is
//! `Option` or defaulted.

use serde::{Deserialize, Serialize};

// Endpoint paths, joined onto the configured base URL.
pub const TOKEN: &str = "/api/token";
pub const VERIFY_CPF: &str = "/api/usuario/verificar-cpf";
pub const LIST_PROFILES: &str = "/api/usuario/perfis";
pub const AUTHENTICATE: &str = "/api/usuario/autenticar";
pub const CARD_DETAILS: &str = "/api/usuario/cartao-digital";
pub const CREATE_ACCOUNT: &str = "/api/cadastro/conta";
pub const REGISTER_CONTACT: &str = "/api/cadastro/contato";
pub const CONFIRM_CONTACT: &str = "/api/cadastro/confirmar-contato";
pub const RESEND_SMS: &str = "/api/cadastro/reenviar-sms";
pub const SET_PASSWORD: &str = "/api/cadastro/senha";
pub const RECOVER_PASSWORD: &str = "/api/recuperacao/solicitar";
pub const VALIDATE_RECOVERY_CODE: &str = "/api/recuperacao/validar";
pub const CHANGE_PASSWORD: &str = "/api/recuperacao/alterar-senha";

// Request sent to the token-issuance endpoint. This is the only
// unauthenticated call in the crate.
#[derive(Debug, Serialize)]
pub struct TokenRequest {
    #[serde(rename = "clientId")]
    pub client_id: String,
    #[serde(rename = "clientSecret")]
    pub client_secret: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenGrant {
    #[serde(rename = "accessToken")]
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyCpfRequest {
    pub cpf: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyCpfResponse {
    #[serde(rename = "existe", default)]
    pub exists: bool,
    #[serde(rename = "possuiConta", default)]
    pub has_account: bool,
    #[serde(rename = "possuiSenha", default)]
    pub has_password: bool,
    #[serde(rename = "beneficiario", default)]
    pub is_beneficiary: bool,
    #[serde(rename = "emailMascarado")]
    pub masked_email: Option<String>,
    #[serde(rename = "celularMascarado")]
    pub masked_phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListProfilesRequest {
    pub cpf: String,
    pub senha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountProfileResponse {
    #[serde(rename = "codigoPlano")]
    pub plan_code: String,
    #[serde(rename = "numeroContrato")]
    pub contract_number: String,
    #[serde(rename = "nome")]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthenticateRequest {
    pub cpf: String,
    pub senha: String,
    #[serde(rename = "codigoPlano")]
    pub plan_code: String,
    #[serde(rename = "numeroContrato")]
    pub contract_number: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticateResponse {
    #[serde(rename = "sucesso")]
    pub success: Option<bool>,
    #[serde(rename = "codigoSessao")]
    pub session_code: Option<i64>,
    #[serde(rename = "idUsuario")]
    pub user_id: Option<String>,
    #[serde(rename = "nome")]
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "celular")]
    pub phone: Option<String>,
}

// Registration and recovery endpoints all answer with this envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct OutcomeResponse {
    #[serde(rename = "sucesso", default)]
    pub success: bool,
    #[serde(rename = "mensagem")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateAccountRequest {
    pub cpf: String,
    pub nome: String,
    pub email: String,
    pub celular: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterContactRequest {
    pub cpf: String,
    pub email: String,
    pub celular: String,
}

#[derive(Debug, Serialize)]
pub struct ConfirmContactRequest {
    pub cpf: String,
    #[serde(rename = "codigo")]
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct ResendSmsRequest {
    pub cpf: String,
}

#[derive(Debug, Serialize)]
pub struct SetPasswordRequest {
    pub cpf: String,
    pub senha: String,
}

#[derive(Debug, Serialize)]
pub struct RecoverPasswordRequest {
    pub cpf: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateRecoveryCodeRequest {
    pub cpf: String,
    #[serde(rename = "codigo")]
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct ChangePasswordRequest {
    pub cpf: String,
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "novaSenha")]
    pub new_password: String,
}
