use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::auth::credential::Credential;

/// Durable payload written alongside the credential.
///
/// The hash lets a fresh process detect a tampered or half-written file and
/// fall back to renewal instead of sending garbage to the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredCredential {
    credential: Credential,
    stored_at: DateTime<Utc>,
    integrity_hash: String,
}

impl StoredCredential {
    fn new(credential: Credential) -> Self {
        let stored_at = Utc::now();
        let integrity_hash = integrity_hash(&credential, &stored_at);
        Self {
            credential,
            stored_at,
            integrity_hash,
        }
    }

    fn verify(&self) -> bool {
        integrity_hash(&self.credential, &self.stored_at) == self.integrity_hash
    }
}

fn integrity_hash(credential: &Credential, stored_at: &DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(credential.as_str().as_bytes());
    hasher.update(stored_at.to_rfc3339().as_bytes());
    format!("{:x}", hasher.finalize())
}

struct StoreState {
    current: Option<Credential>,
    // Hydration from disk happens at most once; set/clear make the
    // in-memory value authoritative from then on.
    hydrated: bool,
}

/// Single source of truth for the current bearer credential.
///
/// Holds the credential in memory and mirrors it to a JSON file so a
/// restarted process can pick up where it left off. Durable-storage failures
/// are logged and swallowed: persistence is an optimization, never a
/// correctness requirement.
#[derive(Clone)]
pub struct CredentialStore {
    state: Arc<RwLock<StoreState>>,
    storage_path: Option<PathBuf>,
}

impl CredentialStore {
    /// Create a store backed by the given file.
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState {
                current: None,
                hydrated: false,
            })),
            storage_path: Some(storage_path.into()),
        }
    }

    /// Create a store with no durable backing. Used by tests and by
    /// embedders that manage persistence themselves.
    pub fn in_memory() -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState {
                current: None,
                hydrated: true,
            })),
            storage_path: None,
        }
    }

    /// The current credential, hydrating from durable storage on first use.
    pub async fn read(&self) -> Option<Credential> {
        {
            let state = self.state.read().await;
            if let Some(credential) = &state.current {
                return Some(credential.clone());
            }
            if state.hydrated {
                return None;
            }
        }

        let mut state = self.state.write().await;
        // Another task may have hydrated or set while we upgraded the lock.
        if state.hydrated || state.current.is_some() {
            return state.current.clone();
        }
        state.hydrated = true;
        if let Some(credential) = self.load_from_disk() {
            debug!("credential hydrated from durable storage");
            state.current = Some(credential.clone());
            return Some(credential);
        }
        None
    }

    /// Replace the credential, in memory and on disk.
    pub async fn set(&self, credential: Credential) {
        {
            let mut state = self.state.write().await;
            state.current = Some(credential.clone());
            state.hydrated = true;
        }
        self.persist(&credential);
    }

    /// Remove the credential from memory and from durable storage.
    pub async fn clear(&self) {
        {
            let mut state = self.state.write().await;
            state.current = None;
            state.hydrated = true;
        }
        if let Some(path) = &self.storage_path {
            match fs::remove_file(path) {
                Ok(()) => info!("stored credential removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(error = %e, "failed to remove stored credential"),
            }
        }
    }

    fn load_from_disk(&self) -> Option<Credential> {
        let path = self.storage_path.as_ref()?;
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(error = %e, "failed to read stored credential");
                }
                return None;
            }
        };
        let stored: StoredCredential = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "stored credential is not valid JSON, ignoring");
                return None;
            }
        };
        if !stored.verify() {
            warn!("stored credential failed its integrity check, ignoring");
            return None;
        }
        Some(stored.credential)
    }

    fn persist(&self, credential: &Credential) {
        let Some(path) = &self.storage_path else {
            return;
        };
        let payload = StoredCredential::new(credential.clone());
        let json = match serde_json::to_string_pretty(&payload) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to serialize credential for storage");
                return;
            }
        };
        if let Err(e) = fs::write(path, json) {
            warn!(error = %e, path = %path.display(), "failed to persist credential");
        } else {
            debug!("credential persisted to durable storage");
        }
    }
}
