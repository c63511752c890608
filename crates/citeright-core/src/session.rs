//! Authentication state machine.
//!
//! States: `Unauthenticated`, `Authenticated`, `Expired`, `Refreshing`.
//! There is no timer: expiry is evaluated lazily each time
//! [`SessionManager::authenticate`] or [`SessionManager::state`] runs.
//!
//! ```text
//! Unauthenticated --login--> Authenticated --expiresAt reached--> Expired
//! Expired --authenticate()--> Refreshing --ok--> Authenticated
//!                                        --err--> Unauthenticated (store left stale)
//! Authenticated | Expired --logout--> Unauthenticated
//! ```
//!
//! A failed refresh does not delete the stored session; the next login
//! overwrites it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::api::AuthApi;
use crate::error::{ApiError, CoreError, Result};
use crate::model::{Credentials, Session, User, now_ms};
use crate::store::{AUTH_KEY, CredentialStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
    Expired,
    Refreshing,
}

/// Outcome of [`SessionManager::authenticate`]. Never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl AuthStatus {
    pub fn unauthenticated() -> Self {
        Self::default()
    }

    fn from_session(session: Session) -> Self {
        Self {
            authenticated: true,
            token: Some(session.token),
            user_id: Some(session.user_id),
        }
    }

    /// `(token, user_id)` when authenticated.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.authenticated, &self.token, &self.user_id) {
            (true, Some(t), Some(u)) => Some((t.as_str(), u.as_str())),
            _ => None,
        }
    }
}

/// Result of a remote token validation. Never an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Validation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub session: Session,
    pub user: Option<User>,
}

/// Clears the `Refreshing` flag when the refresh future completes or is dropped.
struct RefreshingGuard<'a>(&'a AtomicBool);

impl<'a> RefreshingGuard<'a> {
    fn set(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for RefreshingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    api: Arc<dyn AuthApi>,
    /// Serializes refresh round trips so concurrent callers that all see an
    /// expired session share one refresh.
    refresh_lock: tokio::sync::Mutex<()>,
    refreshing: AtomicBool,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>, api: Arc<dyn AuthApi>) -> Self {
        Self {
            store,
            api,
            refresh_lock: tokio::sync::Mutex::new(()),
            refreshing: AtomicBool::new(false),
        }
    }

    /// The stored session, if present and usable. Unreadable entries count as absent.
    pub fn current_session(&self) -> Option<Session> {
        match self.store.load::<Session>(AUTH_KEY) {
            Ok(Some(session)) if session.is_usable() => Some(session),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "stored session unreadable, treating as signed out");
                None
            }
        }
    }

    pub fn state(&self) -> SessionState {
        if self.refreshing.load(Ordering::SeqCst) {
            return SessionState::Refreshing;
        }
        match self.current_session() {
            None => SessionState::Unauthenticated,
            Some(s) if s.is_fresh_at(now_ms()) => SessionState::Authenticated,
            Some(_) => SessionState::Expired,
        }
    }

    /// Return a usable token, refreshing an expired one if needed.
    ///
    /// A fresh session is returned without any network traffic. An expired
    /// one triggers at most one refresh; refresh failure yields
    /// `authenticated: false` and leaves the store untouched.
    pub async fn authenticate(&self) -> AuthStatus {
        let Some(session) = self.current_session() else {
            return AuthStatus::unauthenticated();
        };
        if session.is_fresh_at(now_ms()) {
            return AuthStatus::from_session(session);
        }

        let _serialized = self.refresh_lock.lock().await;
        // Another caller may have refreshed (or logged in) while we waited.
        let Some(session) = self.current_session() else {
            return AuthStatus::unauthenticated();
        };
        if session.is_fresh_at(now_ms()) {
            return AuthStatus::from_session(session);
        }

        tracing::debug!(user_id = %session.user_id, "session expired, refreshing");
        match self.refresh_locked(&session.token, &session.user_id).await {
            Ok(renewed) => AuthStatus::from_session(renewed),
            Err(e) => {
                tracing::info!(user_id = %session.user_id, error = %e, "token refresh failed");
                AuthStatus::unauthenticated()
            }
        }
    }

    /// Exchange `token` for a new one and persist it.
    ///
    /// The email of the stored session is carried over when it belongs to
    /// the same user.
    pub async fn refresh(&self, token: &str, user_id: &str) -> Result<Session> {
        if token.trim().is_empty() || user_id.trim().is_empty() {
            return Err(CoreError::Validation(
                "token and user id are required".into(),
            ));
        }
        let _serialized = self.refresh_lock.lock().await;
        self.refresh_locked(token, user_id).await
    }

    /// Refresh round trip. Callers must hold `refresh_lock`.
    async fn refresh_locked(&self, token: &str, user_id: &str) -> Result<Session> {
        let reply = {
            let _flag = RefreshingGuard::set(&self.refreshing);
            self.api.refresh_token(token, user_id).await?
        };
        if reply.token.is_empty() {
            return Err(ApiError::Decode("refresh reply is missing token".into()).into());
        }

        let email = self
            .current_session()
            .filter(|s| s.user_id == user_id)
            .and_then(|s| s.email);
        let renewed = Session {
            token: reply.token,
            user_id: user_id.to_string(),
            expires_at: reply.expires_at,
            email,
        };
        self.store.save(AUTH_KEY, &renewed)?;
        tracing::info!(user_id = %user_id, expires_at = ?renewed.expires_at, "session refreshed");
        Ok(renewed)
    }

    /// Sign in and persist a full session.
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome> {
        if credentials.email.trim().is_empty() || credentials.password.is_empty() {
            return Err(CoreError::Validation(
                "Email and password are required".into(),
            ));
        }

        let reply = self.api.login(credentials).await?;
        let session = Session {
            token: reply.token,
            user_id: reply.user_id,
            expires_at: reply.expires_at,
            email: Some(credentials.email.trim().to_string()),
        };
        if !session.is_usable() {
            return Err(ApiError::Decode("login reply is missing token or userId".into()).into());
        }
        self.store.save(AUTH_KEY, &session)?;
        tracing::info!(user_id = %session.user_id, "logged in");
        Ok(LoginOutcome {
            session,
            user: reply.user,
        })
    }

    /// Remove the stored session. In-flight requests keep their old token.
    pub fn logout(&self) -> Result<()> {
        self.store.remove(AUTH_KEY)?;
        tracing::info!("logged out");
        Ok(())
    }

    /// Ask the backend whether `token` is valid. Does not touch the store.
    pub async fn validate(&self, token: &str, user_id: &str) -> Validation {
        if token.trim().is_empty() || user_id.trim().is_empty() {
            return Validation::default();
        }
        match self.api.validate_token(token, user_id).await {
            Ok(reply) if reply.valid => Validation {
                valid: true,
                user: reply.user,
            },
            Ok(_) => Validation::default(),
            Err(e) => {
                tracing::debug!(error = %e, "token validation failed");
                Validation::default()
            }
        }
    }
}
