//! Mock backend for testing.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{ApiFuture, AuthApi, LoginReply, RefreshReply, ReferenceApi, ValidateReply};
use crate::error::ApiError;
use crate::model::{Credentials, Reference, ReferenceDraft, ReferenceId, User};

/// Scripted responses for one endpoint: queued responses are used first,
/// then `fallback` forever.
struct Script<T> {
    queued: Mutex<Vec<Result<T, ApiError>>>,
    fallback: Mutex<Result<T, ApiError>>,
    calls: AtomicUsize,
}

impl<T: Clone> Script<T> {
    fn new(fallback: Result<T, ApiError>) -> Self {
        Self {
            queued: Mutex::new(Vec::new()),
            fallback: Mutex::new(fallback),
            calls: AtomicUsize::new(0),
        }
    }

    fn next(&self) -> Result<T, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut queued = self.queued.lock().unwrap();
        if queued.is_empty() {
            self.fallback.lock().unwrap().clone()
        } else {
            queued.remove(0)
        }
    }

    fn set(&self, response: Result<T, ApiError>) {
        *self.fallback.lock().unwrap() = response;
    }

    fn push(&self, response: Result<T, ApiError>) {
        self.queued.lock().unwrap().push(response);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub(crate) fn network_down() -> ApiError {
    ApiError::Network("connection refused".into())
}

/// Hand-rolled backend implementing both [`AuthApi`] and [`ReferenceApi`].
///
/// By default every endpoint fails with a network error except `create`,
/// which echoes the draft back with a sequential id (`ref-1`, `ref-2`, ...).
pub(crate) struct MockApi {
    login: Script<LoginReply>,
    validate: Script<ValidateReply>,
    refresh: Script<RefreshReply>,
    create: Script<()>,
    list: Script<Vec<Reference>>,
    delete: Script<()>,
    format: Script<String>,
    created: Mutex<Vec<ReferenceDraft>>,
    tokens: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl MockApi {
    pub fn offline() -> Self {
        Self {
            login: Script::new(Err(network_down())),
            validate: Script::new(Err(network_down())),
            refresh: Script::new(Err(network_down())),
            create: Script::new(Ok(())),
            list: Script::new(Err(network_down())),
            delete: Script::new(Err(network_down())),
            format: Script::new(Err(network_down())),
            created: Mutex::new(Vec::new()),
            tokens: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Simulate network latency on every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn login_ok(self, token: &str, user_id: &str, expires_at: i64) -> Self {
        self.login.set(Ok(LoginReply {
            token: token.into(),
            user_id: user_id.into(),
            expires_at: Some(expires_at),
            user: Some(User {
                email: Some("user@example.com".into()),
                ..Default::default()
            }),
        }));
        self
    }

    pub fn login_err(self, err: ApiError) -> Self {
        self.login.set(Err(err));
        self
    }

    pub fn validate_ok(self, user: User) -> Self {
        self.validate.set(Ok(ValidateReply {
            valid: true,
            user: Some(user),
        }));
        self
    }

    pub fn validate_rejects(self) -> Self {
        self.validate.set(Ok(ValidateReply {
            valid: false,
            user: None,
        }));
        self
    }

    pub fn refresh_ok(self, token: &str, expires_at: i64) -> Self {
        self.refresh.set(Ok(RefreshReply {
            token: token.into(),
            expires_at: Some(expires_at),
        }));
        self
    }

    /// Succeed on the next refresh only; later refreshes fail.
    pub fn refresh_once(self, token: &str, expires_at: i64) -> Self {
        self.refresh.push(Ok(RefreshReply {
            token: token.into(),
            expires_at: Some(expires_at),
        }));
        self
    }

    pub fn refresh_err(self, err: ApiError) -> Self {
        self.refresh.set(Err(err));
        self
    }

    pub fn create_err(self, err: ApiError) -> Self {
        self.create.set(Err(err));
        self
    }

    pub fn list_ok(self, refs: Vec<Reference>) -> Self {
        self.list.set(Ok(refs));
        self
    }

    pub fn list_err(self, err: ApiError) -> Self {
        self.list.set(Err(err));
        self
    }

    pub fn delete_ok(self) -> Self {
        self.delete.set(Ok(()));
        self
    }

    pub fn format_ok(self, citation: &str) -> Self {
        self.format.set(Ok(citation.into()));
        self
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh.calls()
    }

    pub fn create_calls(&self) -> usize {
        self.create.calls()
    }

    pub fn format_calls(&self) -> usize {
        self.format.calls()
    }

    pub fn delete_calls(&self) -> usize {
        self.delete.calls()
    }

    /// Total round trips across every endpoint.
    pub fn network_calls(&self) -> usize {
        self.login.calls()
            + self.validate.calls()
            + self.refresh.calls()
            + self.create.calls()
            + self.list.calls()
            + self.delete.calls()
            + self.format.calls()
    }

    /// Drafts received by `create`, in call order.
    pub fn created(&self) -> Vec<ReferenceDraft> {
        self.created.lock().unwrap().clone()
    }

    /// Bearer tokens seen by the reference endpoints, in call order.
    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }

    fn record_token(&self, token: &str) {
        self.tokens.lock().unwrap().push(token.to_string());
    }

    fn respond<'a, T: Send + 'a>(&self, result: Result<T, ApiError>) -> ApiFuture<'a, T> {
        let delay = self.delay;
        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            result
        })
    }
}

/// Reference echoing `draft` back the way the backend would store it.
pub(crate) fn stored(id: &str, draft: &ReferenceDraft) -> Reference {
    Reference {
        id: ReferenceId::new(id),
        kind: draft.kind.clone(),
        title: draft.title.clone(),
        source_url: draft.source_url.clone(),
        notes: draft.notes.clone(),
        metadata: draft.metadata.clone(),
        formatted_citation: draft.formatted_citation.clone().unwrap_or_default(),
        created_at: Some("2024-03-01T12:00:00Z".into()),
        extra: Default::default(),
    }
}

impl AuthApi for MockApi {
    fn login<'a>(&'a self, _credentials: &'a Credentials) -> ApiFuture<'a, LoginReply> {
        self.respond(self.login.next())
    }

    fn validate_token<'a>(
        &'a self,
        _token: &'a str,
        _user_id: &'a str,
    ) -> ApiFuture<'a, ValidateReply> {
        self.respond(self.validate.next())
    }

    fn refresh_token<'a>(
        &'a self,
        _token: &'a str,
        _user_id: &'a str,
    ) -> ApiFuture<'a, RefreshReply> {
        self.respond(self.refresh.next())
    }
}

impl ReferenceApi for MockApi {
    fn create<'a>(
        &'a self,
        reference: &'a ReferenceDraft,
        token: &'a str,
    ) -> ApiFuture<'a, Reference> {
        self.record_token(token);
        let result = self.create.next().map(|()| {
            let mut created = self.created.lock().unwrap();
            created.push(reference.clone());
            stored(&format!("ref-{}", created.len()), reference)
        });
        self.respond(result)
    }

    fn list<'a>(&'a self, token: &'a str) -> ApiFuture<'a, Vec<Reference>> {
        self.record_token(token);
        self.respond(self.list.next())
    }

    fn delete<'a>(&'a self, _id: &'a ReferenceId, token: &'a str) -> ApiFuture<'a, ()> {
        self.record_token(token);
        self.respond(self.delete.next())
    }

    fn format_remote<'a>(
        &'a self,
        _reference: &'a ReferenceDraft,
        token: &'a str,
    ) -> ApiFuture<'a, String> {
        self.record_token(token);
        self.respond(self.format.next())
    }
}
