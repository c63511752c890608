//! Remote surface consumed by the core.
//!
//! [`AuthApi`] covers the three session endpoints and is used only by the
//! [`SessionManager`](crate::session::SessionManager). [`ReferenceApi`] covers
//! the bearer-authenticated reference endpoints. [`HttpApi`] implements both
//! against the real backend; tests substitute [`mock::MockApi`].

pub mod http;
#[cfg(test)]
pub(crate) mod mock;

use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;

use crate::error::ApiError;
use crate::model::{Credentials, Reference, ReferenceDraft, ReferenceId, User, epoch_ms};

pub use http::HttpApi;

/// Boxed future returned by every remote call.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Body of a successful `extension-login` reply.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginReply {
    #[serde(default)]
    pub token: String,
    #[serde(default, deserialize_with = "crate::model::deserialize_id_string")]
    pub user_id: String,
    #[serde(default, deserialize_with = "epoch_ms::deserialize_opt")]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub user: Option<User>,
}

/// Body of a `validate-token` reply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidateReply {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub user: Option<User>,
}

/// Body of a successful `refresh-token` reply.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReply {
    #[serde(default)]
    pub token: String,
    #[serde(default, deserialize_with = "epoch_ms::deserialize_opt")]
    pub expires_at: Option<i64>,
}

/// Session endpoints. None of these take a bearer token.
pub trait AuthApi: Send + Sync {
    fn login<'a>(&'a self, credentials: &'a Credentials) -> ApiFuture<'a, LoginReply>;

    fn validate_token<'a>(&'a self, token: &'a str, user_id: &'a str)
    -> ApiFuture<'a, ValidateReply>;

    fn refresh_token<'a>(&'a self, token: &'a str, user_id: &'a str)
    -> ApiFuture<'a, RefreshReply>;
}

/// Reference endpoints. Every call carries a caller-supplied bearer token and
/// makes exactly one round trip; nothing is retried here.
pub trait ReferenceApi: Send + Sync {
    fn create<'a>(&'a self, reference: &'a ReferenceDraft, token: &'a str)
    -> ApiFuture<'a, Reference>;

    fn list<'a>(&'a self, token: &'a str) -> ApiFuture<'a, Vec<Reference>>;

    fn delete<'a>(&'a self, id: &'a ReferenceId, token: &'a str) -> ApiFuture<'a, ()>;

    /// Server-side citation formatting.
    fn format_remote<'a>(
        &'a self,
        reference: &'a ReferenceDraft,
        token: &'a str,
    ) -> ApiFuture<'a, String>;
}
