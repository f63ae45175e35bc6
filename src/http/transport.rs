use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::{Credential, CredentialStore};
use crate::config::PortalConfig;
use crate::endpoints;
use crate::endpoints::{TokenGrant, TokenRequest};
use crate::error::PortalError;
use crate::http::client::{HttpClient, HttpMethod, HttpResponse, ReqwestHttpClient};

const UNAUTHORIZED: u16 = 401;

type RenewalWaiter = oneshot::Sender<Result<Credential, PortalError>>;

/// Coordinator state. The in-flight flag and the waiter queue live under a
/// single lock so "is a renewal running, and if so enqueue me" is one atomic
/// step; without that, two calls racing a 401 could both start a renewal.
#[derive(Default)]
struct RenewalState {
    in_flight: bool,
    waiters: Vec<RenewalWaiter>,
}

/// HTTP transport with transparent credential renewal.
///
/// Every outgoing call gets the current bearer credential attached. When the
/// backend answers 401, the transport renews the credential and replays the
/// failed call once with the new one. Any number of concurrently failing
/// calls share exactly one renewal request. A call is never retried more
/// than once.
pub struct Transport {
    http: Arc<dyn HttpClient>,
    store: CredentialStore,
    config: PortalConfig,
    renewal: Arc<Mutex<RenewalState>>,
}

impl Transport {
    /// Create a transport over an injected HTTP sender and credential store.
    pub fn new(http: Arc<dyn HttpClient>, store: CredentialStore, config: PortalConfig) -> Self {
        Self {
            http,
            store,
            config,
            renewal: Arc::new(Mutex::new(RenewalState::default())),
        }
    }

    /// Create a transport wired to a real reqwest client and a file-backed
    /// credential store, per the configuration.
    pub fn from_config(config: PortalConfig) -> Result<Self, PortalError> {
        let http = Arc::new(ReqwestHttpClient::new(config.request_timeout())?);
        let store = CredentialStore::new(&config.storage_path);
        Ok(Self::new(http, store, config))
    }

    /// Execute a GET and deserialize the JSON response body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, PortalError> {
        let response = self.execute(HttpMethod::Get, path, None).await?;
        response.json()
    }

    /// Execute a POST with a JSON body and deserialize the JSON response.
    pub async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T, PortalError>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let body = serde_json::to_string(body).map_err(|e| {
            PortalError::Validation(format!("failed to encode request body: {e}"))
        })?;
        let response = self.execute(HttpMethod::Post, path, Some(body)).await?;
        response.json()
    }

    /// Renew the credential proactively when none is stored.
    ///
    /// Called at process start and after logout, so the first business call
    /// does not have to pay a failed round-trip.
    pub async fn ensure_credential(&self) -> Result<(), PortalError> {
        if self.store.read().await.is_some() {
            return Ok(());
        }
        debug!("no stored credential, renewing proactively");
        self.renew_credential().await.map(|_| ())
    }

    /// Drop the stored credential. The credential store is owned by the
    /// transport; this is the only way other components clear it.
    pub async fn clear_credential(&self) {
        self.store.clear().await;
    }

    /// Whether a credential is currently held.
    pub async fn has_credential(&self) -> bool {
        self.store.read().await.is_some()
    }

    async fn execute(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<String>,
    ) -> Result<HttpResponse, PortalError> {
        let url = self.config.url(path);
        let request_id = Uuid::new_v4();

        let credential = self.store.read().await;
        let response = self
            .send(method, &url, body.clone(), credential, &request_id)
            .await?;

        if response.status() != UNAUTHORIZED {
            return Self::check_status(response, &url);
        }

        // The call is marked as retried from here on: whatever the renewal
        // produces, it will not come back around.
        warn!(%request_id, url = %url, "credential rejected, coordinating renewal");
        let credential = self.renew_credential().await?;

        let response = self
            .send(method, &url, body, Some(credential), &request_id)
            .await?;
        if response.status() == UNAUTHORIZED {
            error!(%request_id, url = %url, "request rejected again after credential renewal");
            self.store.clear().await;
            return Err(PortalError::Authentication {
                reason: "request was rejected again after credential renewal".to_string(),
            });
        }
        Self::check_status(response, &url)
    }

    async fn send(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<String>,
        credential: Option<Credential>,
        request_id: &Uuid,
    ) -> Result<HttpResponse, PortalError> {
        let mut headers = HashMap::new();
        if let Some(credential) = &credential {
            headers.insert(
                "Authorization".to_string(),
                credential.authorization_header(),
            );
        }

        let result = match method {
            HttpMethod::Get => self.http.get(url, headers).await,
            HttpMethod::Post => {
                self.http
                    .post(url, headers, body.unwrap_or_default())
                    .await
            }
        };

        match &result {
            Ok(response) => {
                debug!(%request_id, %method, %url, status = response.status(), "request completed");
            }
            Err(e) => {
                warn!(%request_id, %method, %url, error = %e, "request failed");
            }
        }
        result
    }

    fn check_status(response: HttpResponse, url: &str) -> Result<HttpResponse, PortalError> {
        if response.is_success() {
            Ok(response)
        } else {
            Err(PortalError::Transport {
                status: Some(response.status()),
                message: format!("{url} returned HTTP {}", response.status()),
            })
        }
    }

    /// Obtain a fresh credential, sharing one in-flight renewal among all
    /// concurrent callers.
    ///
    /// Every caller parks on a oneshot in FIFO order; the first one also
    /// kicks off the token-endpoint round-trip on a detached task, so a
    /// caller that is dropped mid-wait cannot strand the queue. When the
    /// renewal settles the queue is fully drained, on success and on
    /// failure alike.
    async fn renew_credential(&self) -> Result<Credential, PortalError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut renewal = self.renewal.lock().await;
            renewal.waiters.push(tx);
            if renewal.in_flight {
                debug!(queued = renewal.waiters.len(), "renewal already in flight, queueing");
            } else {
                renewal.in_flight = true;
                let http = Arc::clone(&self.http);
                let store = self.store.clone();
                let config = self.config.clone();
                let state = Arc::clone(&self.renewal);
                tokio::spawn(async move {
                    let outcome = issue_credential(http.as_ref(), &config).await;
                    match &outcome {
                        Ok(credential) => store.set(credential.clone()).await,
                        Err(e) => {
                            error!(error = %e, "credential renewal failed, clearing stored credential");
                            store.clear().await;
                        }
                    }

                    let waiters = {
                        let mut renewal = state.lock().await;
                        renewal.in_flight = false;
                        std::mem::take(&mut renewal.waiters)
                    };
                    debug!(waiters = waiters.len(), "settling queued requests");
                    for waiter in waiters {
                        // A caller that lost interest has dropped its
                        // receiver.
                        let _ = waiter.send(outcome.clone());
                    }
                });
            }
        }

        match rx.await {
            Ok(outcome) => outcome,
            // Only reachable if the renewal task itself died.
            Err(_) => Err(PortalError::Authentication {
                reason: "credential renewal was abandoned".to_string(),
            }),
        }
    }

    #[cfg(test)]
    async fn pending_waiters(&self) -> usize {
        self.renewal.lock().await.waiters.len()
    }
}

/// One unauthenticated round-trip to the token endpoint. Every failure mode
/// maps to an authentication error; renewal is never retried.
async fn issue_credential(
    http: &dyn HttpClient,
    config: &PortalConfig,
) -> Result<Credential, PortalError> {
    info!("requesting new credential from token endpoint");
    let request = TokenRequest {
        client_id: config.client_id.clone(),
        client_secret: config.client_secret.clone(),
    };
    let body = serde_json::to_string(&request).map_err(|e| PortalError::Authentication {
        reason: format!("failed to encode token request: {e}"),
    })?;

    let url = config.url(endpoints::TOKEN);
    let response = http
        .post(&url, HashMap::new(), body)
        .await
        .map_err(|e| PortalError::Authentication {
            reason: format!("token endpoint unreachable: {e}"),
        })?;

    if !response.is_success() {
        return Err(PortalError::Authentication {
            reason: format!("token endpoint returned HTTP {}", response.status()),
        });
    }

    let grant: TokenGrant = response.json().map_err(|e| PortalError::Authentication {
        reason: format!("token endpoint returned an invalid grant: {e}"),
    })?;
    info!("credential renewed");
    Ok(Credential::new(grant.access_token))
}
