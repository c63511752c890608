//! Request/response contract between UI surfaces and the orchestrator.
//!
//! Requests are a tagged union on `action`; an unknown action is a decode
//! error, not a runtime fallback. [`Orchestrator::handle`] turns every
//! failure into `{success: false, message}` (or `authenticated`/`valid:
//! false`), so UI surfaces never see a raised error.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{Credentials, Reference, ReferenceDraft, ReferenceId, User};
use crate::orchestrator::Orchestrator;
use crate::session::{AuthStatus, Validation};
use crate::settings::Settings;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    CheckAuth,
    Login {
        credentials: Credentials,
    },
    Logout,
    #[serde(rename_all = "camelCase")]
    ValidateToken {
        #[serde(default)]
        token: String,
        #[serde(default)]
        user_id: String,
    },
    #[serde(rename_all = "camelCase")]
    RefreshToken {
        #[serde(default)]
        token: String,
        #[serde(default)]
        user_id: String,
    },
    SaveReference {
        reference: ReferenceDraft,
    },
    GetReferences,
    SyncReferences,
    #[serde(rename_all = "camelCase")]
    DeleteReference {
        reference_id: ReferenceId,
    },
    GetUserInfo,
    FormatCitation {
        reference: ReferenceDraft,
    },
    GetServerUrl,
    SettingsUpdated {
        settings: Settings,
    },
    GetSettings,
}

impl Request {
    /// Wire name of the action, for logging.
    pub fn action(&self) -> &'static str {
        match self {
            Request::CheckAuth => "checkAuth",
            Request::Login { .. } => "login",
            Request::Logout => "logout",
            Request::ValidateToken { .. } => "validateToken",
            Request::RefreshToken { .. } => "refreshToken",
            Request::SaveReference { .. } => "saveReference",
            Request::GetReferences => "getReferences",
            Request::SyncReferences => "syncReferences",
            Request::DeleteReference { .. } => "deleteReference",
            Request::GetUserInfo => "getUserInfo",
            Request::FormatCitation { .. } => "formatCitation",
            Request::GetServerUrl => "getServerUrl",
            Request::SettingsUpdated { .. } => "settingsUpdated",
            Request::GetSettings => "getSettings",
        }
    }
}

// ── Response shapes ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AckResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReferenceResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReferencesResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<Vec<Reference>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserInfoResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `formatCitation` reply. `success` is always true.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CitationResponse {
    pub success: bool,
    pub citation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerUrlResponse {
    pub success: bool,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SettingsResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Auth(AuthStatus),
    Login(LoginResponse),
    Ack(AckResponse),
    Validation(Validation),
    Refresh(RefreshResponse),
    Reference(ReferenceResponse),
    References(ReferencesResponse),
    UserInfo(UserInfoResponse),
    Citation(CitationResponse),
    ServerUrl(ServerUrlResponse),
    Settings(SettingsResponse),
}

impl Response {
    /// Whether the request succeeded, for callers that only need a verdict.
    pub fn is_success(&self) -> bool {
        match self {
            Response::Auth(r) => r.authenticated,
            Response::Validation(r) => r.valid,
            Response::Login(r) => r.success,
            Response::Ack(r) => r.success,
            Response::Refresh(r) => r.success,
            Response::Reference(r) => r.success,
            Response::References(r) => r.success,
            Response::UserInfo(r) => r.success,
            Response::Citation(r) => r.success,
            Response::ServerUrl(r) => r.success,
            Response::Settings(r) => r.success,
        }
    }

    /// The failure message, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Response::Login(r) => r.message.as_deref(),
            Response::Ack(r) => r.message.as_deref(),
            Response::Refresh(r) => r.message.as_deref(),
            Response::Reference(r) => r.message.as_deref(),
            Response::References(r) => r.message.as_deref(),
            Response::UserInfo(r) => r.message.as_deref(),
            Response::Settings(r) => r.message.as_deref(),
            _ => None,
        }
    }
}

// ── Failure messages ────────────────────────────────────────────────────

/// User-facing wording for one operation's failure modes.
struct Wording {
    auth: &'static str,
    failed: &'static str,
    network: &'static str,
    /// Prefer the server's own message for non-2xx replies.
    server_message: bool,
}

const LOGIN: Wording = Wording {
    auth: "Login failed",
    failed: "Login failed",
    network: "Network error during login",
    server_message: true,
};

const REFRESH: Wording = Wording {
    auth: "Token refresh failed",
    failed: "Token refresh failed",
    network: "Network error during token refresh",
    server_message: true,
};

const SAVE: Wording = Wording {
    auth: "You must be logged in to save references",
    failed: "Failed to save reference",
    network: "Network error while saving reference",
    server_message: true,
};

const LIST: Wording = Wording {
    auth: "You must be logged in to view references",
    failed: "Error retrieving references",
    network: "Error retrieving references",
    server_message: false,
};

const SYNC: Wording = Wording {
    auth: "You must be logged in to sync references",
    failed: "Failed to sync references",
    network: "Network error while syncing references",
    server_message: false,
};

const DELETE: Wording = Wording {
    auth: "You must be logged in to delete references",
    failed: "Failed to delete reference",
    network: "Network error while deleting reference",
    server_message: true,
};

const USER_INFO: Wording = Wording {
    auth: "Not authenticated",
    failed: "Error retrieving user information",
    network: "Error retrieving user information",
    server_message: false,
};

fn failure_message(err: &CoreError, wording: &Wording) -> String {
    match err {
        CoreError::AuthRequired => wording.auth.to_string(),
        CoreError::SessionRejected => "Invalid authentication".to_string(),
        CoreError::Validation(msg) => msg.clone(),
        e if e.is_transport() => wording.network.to_string(),
        e => match e.server_message() {
            Some(msg) if wording.server_message => msg.to_string(),
            _ => wording.failed.to_string(),
        },
    }
}

impl Orchestrator {
    /// Dispatch one request. Never fails; errors become failure responses.
    pub async fn handle(&self, request: Request) -> Response {
        let action = request.action();
        tracing::debug!(action, "handling request");
        let response = match request {
            Request::CheckAuth => Response::Auth(self.check_auth().await),

            Request::Login { credentials } => Response::Login(match self.login(&credentials).await {
                Ok(outcome) => LoginResponse {
                    success: true,
                    token: Some(outcome.session.token),
                    user_id: Some(outcome.session.user_id),
                    user: outcome.user,
                    message: None,
                },
                Err(e) => LoginResponse {
                    message: Some(failure_message(&e, &LOGIN)),
                    ..Default::default()
                },
            }),

            Request::Logout => Response::Ack(match self.logout() {
                Ok(()) => AckResponse {
                    success: true,
                    message: Some("Logged out successfully".into()),
                },
                Err(_) => AckResponse {
                    success: false,
                    message: Some("Error during logout".into()),
                },
            }),

            Request::ValidateToken { token, user_id } => {
                Response::Validation(self.validate_token(&token, &user_id).await)
            }

            Request::RefreshToken { token, user_id } => {
                Response::Refresh(match self.refresh_token(&token, &user_id).await {
                    Ok(session) => RefreshResponse {
                        success: true,
                        token: Some(session.token),
                        message: None,
                    },
                    Err(e) => RefreshResponse {
                        message: Some(failure_message(&e, &REFRESH)),
                        ..Default::default()
                    },
                })
            }

            Request::SaveReference { reference } => {
                Response::Reference(match self.save_reference(reference).await {
                    Ok(saved) => ReferenceResponse {
                        success: true,
                        reference: Some(saved),
                        message: None,
                    },
                    Err(e) => ReferenceResponse {
                        message: Some(failure_message(&e, &SAVE)),
                        ..Default::default()
                    },
                })
            }

            Request::GetReferences => {
                Response::References(references_response(self.get_references().await, &LIST))
            }

            Request::SyncReferences => {
                Response::References(references_response(self.sync_references().await, &SYNC))
            }

            Request::DeleteReference { reference_id } => {
                Response::Ack(match self.delete_reference(&reference_id).await {
                    Ok(()) => AckResponse {
                        success: true,
                        message: None,
                    },
                    Err(e) => AckResponse {
                        success: false,
                        message: Some(failure_message(&e, &DELETE)),
                    },
                })
            }

            Request::GetUserInfo => Response::UserInfo(match self.get_user_info().await {
                Ok(user) => UserInfoResponse {
                    success: true,
                    user: Some(user),
                    message: None,
                },
                Err(e) => UserInfoResponse {
                    message: Some(failure_message(&e, &USER_INFO)),
                    ..Default::default()
                },
            }),

            Request::FormatCitation { reference } => Response::Citation(CitationResponse {
                success: true,
                citation: self.format_citation(&reference).await,
            }),

            Request::GetServerUrl => Response::ServerUrl(ServerUrlResponse {
                success: true,
                url: self.server_url().to_string(),
            }),

            Request::SettingsUpdated { settings } => {
                Response::Ack(match self.update_settings(&settings) {
                    Ok(()) => AckResponse {
                        success: true,
                        message: None,
                    },
                    Err(_) => AckResponse {
                        success: false,
                        message: Some("Error saving settings".into()),
                    },
                })
            }

            Request::GetSettings => Response::Settings(match self.settings() {
                Ok(settings) => SettingsResponse {
                    success: true,
                    settings: Some(settings),
                    message: None,
                },
                Err(_) => SettingsResponse {
                    message: Some("Error loading settings".into()),
                    ..Default::default()
                },
            }),
        };
        if !response.is_success() {
            tracing::debug!(action, message = ?response.message(), "request did not succeed");
        }
        response
    }

    /// Decode a raw JSON request, dispatch it and encode the reply.
    ///
    /// Malformed or unknown requests get `{success: false, message}`.
    pub async fn handle_json(&self, raw: &str) -> serde_json::Value {
        match serde_json::from_str::<Request>(raw) {
            Ok(request) => {
                let response = self.handle(request).await;
                serde_json::to_value(&response).unwrap_or_else(|e| {
                    serde_json::json!({"success": false, "message": format!("Could not encode response: {e}")})
                })
            }
            Err(e) => {
                tracing::debug!(error = %e, "rejected malformed request");
                serde_json::json!({"success": false, "message": format!("Invalid request: {e}")})
            }
        }
    }
}

fn references_response(
    result: Result<Vec<Reference>, CoreError>,
    wording: &Wording,
) -> ReferencesResponse {
    match result {
        Ok(references) => ReferencesResponse {
            success: true,
            references: Some(references),
            message: None,
        },
        Err(e) => ReferencesResponse {
            message: Some(failure_message(&e, wording)),
            ..Default::default()
        },
    }
}
