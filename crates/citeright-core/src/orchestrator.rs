//! Façade composing the session manager, the remote client and the cache.
//!
//! Every operation that needs the backend starts with
//! [`SessionManager::authenticate`] and fails with
//! [`CoreError::AuthRequired`] before any network traffic when that fails.
//! Local cache updates happen only after the remote effect is confirmed.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::api::{AuthApi, HttpApi, ReferenceApi};
use crate::cache::{DEFAULT_CAPACITY, ReferenceCache, ReferenceFilter};
use crate::citation::format_local;
use crate::error::{CoreError, Result};
use crate::model::{Credentials, Reference, ReferenceDraft, ReferenceId, Session, User};
use crate::session::{AuthStatus, LoginOutcome, SessionManager, SessionState, Validation};
use crate::settings::{Settings, load_settings, save_settings};
use crate::store::CredentialStore;
use crate::{Config, open_store};

/// Construction options that are not collaborators.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub server_url: String,
    pub cache_capacity: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            server_url: crate::DEFAULT_BASE_URL.to_string(),
            cache_capacity: DEFAULT_CAPACITY,
        }
    }
}

pub struct Orchestrator {
    session: SessionManager,
    references: Arc<dyn ReferenceApi>,
    cache: ReferenceCache,
    store: Arc<dyn CredentialStore>,
    server_url: String,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        auth: Arc<dyn AuthApi>,
        references: Arc<dyn ReferenceApi>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            session: SessionManager::new(store.clone(), auth),
            references,
            cache: ReferenceCache::new(store.clone(), options.cache_capacity),
            store,
            server_url: options.server_url,
        }
    }

    /// Wire up the HTTP client and the configured store.
    ///
    /// Fails with [`CoreError::Config`] when the base URL is unusable.
    pub fn from_config(config: &Config, cancel: CancellationToken) -> Result<Self> {
        let base_url = config.parsed_base_url()?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("citeright/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CoreError::Config(format!("cannot build HTTP client: {e}")))?;
        let http = Arc::new(
            HttpApi::new(client, base_url.clone())
                .with_timeout(config.request_timeout())
                .with_cancellation(cancel),
        );
        let store = open_store(config.store_path.as_deref());
        tracing::debug!(base_url = %base_url, "orchestrator ready");
        Ok(Self::new(
            store,
            http.clone(),
            http,
            OrchestratorOptions {
                server_url: base_url.as_str().trim_end_matches('/').to_string(),
                cache_capacity: config.cache_capacity,
            },
        ))
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn cache(&self) -> &ReferenceCache {
        &self.cache
    }

    // ── Session ─────────────────────────────────────────────────────────

    pub async fn check_auth(&self) -> AuthStatus {
        self.session.authenticate().await
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome> {
        self.session.login(credentials).await
    }

    pub fn logout(&self) -> Result<()> {
        self.session.logout()
    }

    pub async fn validate_token(&self, token: &str, user_id: &str) -> Validation {
        self.session.validate(token, user_id).await
    }

    pub async fn refresh_token(&self, token: &str, user_id: &str) -> Result<Session> {
        self.session.refresh(token, user_id).await
    }

    /// `(token, user_id)` of a valid session, or [`CoreError::AuthRequired`].
    async fn require_auth(&self) -> Result<(String, String)> {
        let status = self.session.authenticate().await;
        match status.credentials() {
            Some((token, user_id)) => Ok((token.to_string(), user_id.to_string())),
            None => Err(CoreError::AuthRequired),
        }
    }

    // ── Citations ───────────────────────────────────────────────────────

    /// Format `reference`, preferring the server and falling back to the
    /// local formatter on any failure. Always returns a citation.
    pub async fn format_citation(&self, reference: &ReferenceDraft) -> String {
        let status = self.session.authenticate().await;
        match status.credentials() {
            Some((token, _)) => self.format_with_token(reference, token).await,
            None => format_local(reference),
        }
    }

    async fn format_with_token(&self, reference: &ReferenceDraft, token: &str) -> String {
        match self.references.format_remote(reference, token).await {
            Ok(citation) => citation,
            Err(e) => {
                tracing::debug!(error = %e, kind = %reference.kind, "remote formatter unavailable, formatting locally");
                format_local(reference)
            }
        }
    }

    // ── References ──────────────────────────────────────────────────────

    /// Format, save remotely, then mirror into the cache.
    ///
    /// The remote write is authoritative: a failed cache write is logged and
    /// the saved reference is still returned.
    pub async fn save_reference(&self, draft: ReferenceDraft) -> Result<Reference> {
        let (token, user_id) = self.require_auth().await?;
        let citation = self.format_with_token(&draft, &token).await;
        let payload = ReferenceDraft {
            formatted_citation: Some(citation),
            ..draft
        };

        let saved = self.references.create(&payload, &token).await?;
        tracing::info!(user_id = %user_id, reference_id = %saved.id, kind = %saved.kind, "reference saved");

        if let Err(e) = self.cache.insert_front(saved.clone()).await {
            tracing::warn!(reference_id = %saved.id, error = %e, "saved reference not cached");
        }
        Ok(saved)
    }

    pub async fn get_references(&self) -> Result<Vec<Reference>> {
        self.require_auth().await?;
        Ok(self.cache.get_all().await?)
    }

    pub async fn search_references(&self, filter: &ReferenceFilter) -> Result<Vec<Reference>> {
        self.require_auth().await?;
        Ok(self.cache.search(filter).await?)
    }

    /// Replace the cache with the server's list (last writer wins).
    pub async fn sync_references(&self) -> Result<Vec<Reference>> {
        let (token, user_id) = self.require_auth().await?;
        let references = self.references.list(&token).await?;
        self.cache.replace_all(references.clone()).await?;
        tracing::info!(user_id = %user_id, count = references.len(), "references synced");
        Ok(references)
    }

    /// Delete remotely, then locally. The cache is untouched if the remote
    /// delete fails.
    pub async fn delete_reference(&self, id: &ReferenceId) -> Result<()> {
        let (token, user_id) = self.require_auth().await?;
        self.references.delete(id, &token).await?;
        let removed = self.cache.remove_where(id).await?;
        tracing::info!(user_id = %user_id, reference_id = %id, was_cached = removed, "reference deleted");
        Ok(())
    }

    /// Profile of the signed-in user, via token validation.
    pub async fn get_user_info(&self) -> Result<User> {
        let (token, user_id) = self.require_auth().await?;
        let validation = self.session.validate(&token, &user_id).await;
        if !validation.valid {
            return Err(CoreError::SessionRejected);
        }
        Ok(validation.user.unwrap_or_default())
    }

    // ── Settings ────────────────────────────────────────────────────────

    pub fn settings(&self) -> Result<Settings> {
        Ok(load_settings(self.store.as_ref())?)
    }

    pub fn update_settings(&self, settings: &Settings) -> Result<()> {
        save_settings(self.store.as_ref(), settings)?;
        tracing::debug!("settings updated");
        Ok(())
    }
}
