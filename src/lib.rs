//! Client library for the beneficiary web portal.
//!
//! This crate is the authentication, session and token-refresh layer the
//! portal UI sits on. It establishes identity (CPF lookup, login or
//! registration), acquires a bearer credential from the backend's token
//! endpoint, and renews that credential transparently: when concurrent
//! requests race an expired credential, exactly one renewal round-trip is
//! made and every failed request is replayed once with the fresh credential.
//!
//! The pieces compose leaves-first:
//!
//! - [`CredentialStore`]: the single source of truth for the bearer
//!   credential, mirrored to durable storage.
//! - [`Transport`]: a shared HTTP client that attaches the credential,
//!   detects 401s and coordinates the single-flight renewal.
//! - [`SessionOrchestrator`]: CPF verification, login/logout, registration
//!   and recovery flows, built solely on the transport.
//!
//! ```no_run
//! use portal_auth::{PortalConfig, SessionOrchestrator};
//!
//! # async fn run() -> Result<(), portal_auth::PortalError> {
//! let config = PortalConfig::from_env()?;
//! let portal = SessionOrchestrator::from_config(config)?;
//! portal.initialize().await?;
//!
//! if let Some(verification) = portal.verify_cpf("529.982.247-25").await {
//!     if verification.has_password {
//!         let session = portal.login("529.982.247-25", "senha123").await?;
//!         println!("welcome, {}", session.name);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod http;
pub mod session;

use std::sync::Arc;

pub use auth::{Credential, CredentialStore};
pub use config::PortalConfig;
pub use error::{ErrorCategory, PortalError};
pub use http::{HttpClient, HttpResponse, ReqwestHttpClient, Transport};
pub use session::{AccountProfile, CpfVerification, Session, SessionOrchestrator};

impl SessionOrchestrator {
    /// Wire up the full stack (reqwest client, file-backed credential
    /// store, transport) from a configuration.
    pub fn from_config(config: PortalConfig) -> Result<Self, PortalError> {
        let transport = Arc::new(Transport::from_config(config)?);
        Ok(Self::new(transport))
    }
}
