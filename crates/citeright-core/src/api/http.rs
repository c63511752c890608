use std::future::Future;
use std::time::Duration;

use reqwest::{RequestBuilder, Response, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::{ApiFuture, AuthApi, LoginReply, RefreshReply, ReferenceApi, ValidateReply};
use crate::error::ApiError;
use crate::model::{Credentials, Reference, ReferenceDraft, ReferenceId};

/// reqwest-backed client for the CiteRight backend.
///
/// The base URL is fixed at construction. Each call gets the optional
/// per-request deadline and is abandoned when the cancellation token fires.
#[derive(Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: Url,
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for HttpApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApi")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpApi {
    pub fn new(client: reqwest::Client, base_url: Url) -> Self {
        Self {
            client,
            base_url,
            timeout: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL with `segments` appended as percent-encoded path segments.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Network(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// One full round trip: send, check the status, then `read` the body.
    ///
    /// The deadline and the cancellation token both cover the body read.
    async fn call<T, F, Fut>(&self, request: RequestBuilder, read: F) -> Result<T, ApiError>
    where
        F: FnOnce(Response) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let request = match self.timeout {
            Some(t) => request.timeout(t),
            None => request,
        };
        let round_trip = async move {
            let response = check_status(request.send().await?).await?;
            read(response).await
        };
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ApiError::Cancelled),
            r = round_trip => r,
        }
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &serde_json::Value,
        token: Option<&str>,
    ) -> Result<T, ApiError> {
        let mut request = self.client.post(self.endpoint(segments)?).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        self.call(request, decode_json).await
    }
}

/// Pass 2xx responses through; turn anything else into [`ApiError::Server`]
/// carrying the body's `message` field when there is one.
pub async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|body| body.get("message")?.as_str().map(str::to_string));
    tracing::debug!(status = status.as_u16(), message = ?message, "backend returned an error status");
    Err(ApiError::Server {
        status: status.as_u16(),
        message,
    })
}

/// Read the body of a 2xx response as `T`.
pub async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

#[derive(Deserialize)]
struct CreateReply {
    reference: Reference,
}

#[derive(Deserialize)]
struct FormatReply {
    #[serde(default)]
    citation: String,
}

impl AuthApi for HttpApi {
    fn login<'a>(&'a self, credentials: &'a Credentials) -> ApiFuture<'a, LoginReply> {
        Box::pin(async move {
            let body = json!({ "email": credentials.email, "password": credentials.password });
            let reply: LoginReply = self
                .post_json(&["api", "auth", "extension-login"], &body, None)
                .await?;
            if reply.token.is_empty() || reply.user_id.is_empty() {
                return Err(ApiError::Decode(
                    "login reply is missing token or userId".into(),
                ));
            }
            Ok(reply)
        })
    }

    fn validate_token<'a>(
        &'a self,
        token: &'a str,
        user_id: &'a str,
    ) -> ApiFuture<'a, ValidateReply> {
        Box::pin(async move {
            let body = json!({ "token": token, "userId": user_id });
            self.post_json(&["api", "auth", "validate-token"], &body, None)
                .await
        })
    }

    fn refresh_token<'a>(
        &'a self,
        token: &'a str,
        user_id: &'a str,
    ) -> ApiFuture<'a, RefreshReply> {
        Box::pin(async move {
            let body = json!({ "token": token, "userId": user_id });
            let reply: RefreshReply = self
                .post_json(&["api", "auth", "refresh-token"], &body, None)
                .await?;
            if reply.token.is_empty() {
                return Err(ApiError::Decode("refresh reply is missing token".into()));
            }
            Ok(reply)
        })
    }
}

impl ReferenceApi for HttpApi {
    fn create<'a>(
        &'a self,
        reference: &'a ReferenceDraft,
        token: &'a str,
    ) -> ApiFuture<'a, Reference> {
        Box::pin(async move {
            let body =
                serde_json::to_value(reference).map_err(|e| ApiError::Decode(e.to_string()))?;
            let reply: CreateReply = self
                .post_json(&["api", "references", "extension"], &body, Some(token))
                .await?;
            Ok(reply.reference)
        })
    }

    fn list<'a>(&'a self, token: &'a str) -> ApiFuture<'a, Vec<Reference>> {
        Box::pin(async move {
            let request = self
                .client
                .get(self.endpoint(&["api", "references"])?)
                .bearer_auth(token);
            self.call(request, decode_json).await
        })
    }

    fn delete<'a>(&'a self, id: &'a ReferenceId, token: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let request = self
                .client
                .delete(self.endpoint(&["api", "references", id.as_str()])?)
                .bearer_auth(token);
            self.call(request, |_| std::future::ready(Ok(()))).await
        })
    }

    fn format_remote<'a>(
        &'a self,
        reference: &'a ReferenceDraft,
        token: &'a str,
    ) -> ApiFuture<'a, String> {
        Box::pin(async move {
            let body =
                serde_json::to_value(reference).map_err(|e| ApiError::Decode(e.to_string()))?;
            let reply: FormatReply = self
                .post_json(&["api", "format-citation"], &body, Some(token))
                .await?;
            if reply.citation.trim().is_empty() {
                return Err(ApiError::Decode("empty citation".into()));
            }
            Ok(reply.citation)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base: &str) -> HttpApi {
        HttpApi::new(reqwest::Client::new(), Url::parse(base).unwrap())
    }

    fn response(status: u16, body: &str) -> Response {
        let http_resp = ::http::Response::builder()
            .status(status)
            .body(body.to_string())
            .unwrap();
        Response::from(http_resp)
    }

    #[test]
    fn endpoint_appends_to_bare_origin() {
        let url = api("https://cite.example").endpoint(&["api", "references"]).unwrap();
        assert_eq!(url.as_str(), "https://cite.example/api/references");
    }

    #[test]
    fn endpoint_keeps_base_path_and_trailing_slash() {
        let url = api("https://cite.example/app/")
            .endpoint(&["api", "format-citation"])
            .unwrap();
        assert_eq!(url.as_str(), "https://cite.example/app/api/format-citation");
    }

    #[test]
    fn endpoint_encodes_reference_ids() {
        let url = api("https://cite.example")
            .endpoint(&["api", "references", "a/b c"])
            .unwrap();
        assert_eq!(url.as_str(), "https://cite.example/api/references/a%2Fb%20c");
    }

    #[tokio::test]
    async fn success_passes_through() {
        assert!(check_status(response(200, "{}")).await.is_ok());
        assert!(check_status(response(204, "")).await.is_ok());
    }

    #[tokio::test]
    async fn error_status_carries_server_message() {
        let err = check_status(response(401, r#"{"message":"Token expired"}"#))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Server {
                status: 401,
                message: Some("Token expired".into())
            }
        );
    }

    #[tokio::test]
    async fn error_status_without_json_body() {
        let err = check_status(response(502, "<html>Bad gateway</html>"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Server {
                status: 502,
                message: None
            }
        );
    }

    #[tokio::test]
    async fn reference_list_decodes() {
        let refs: Vec<Reference> = decode_json(response(
            200,
            r#"[{"id":1,"type":"case","title":"R v X","formattedCitation":"R v X [2001]"}]"#,
        ))
        .await
        .unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].id.as_str(), "1");
    }

    #[tokio::test]
    async fn wrong_shape_is_a_decode_error() {
        let err = decode_json::<Vec<Reference>>(response(200, r#"{"references":"nope"}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_network_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let api = api("http://127.0.0.1:9").with_timeout(Some(Duration::from_secs(5)));
        let err = api.list("token").await.unwrap_err();
        assert!(err.is_transport(), "expected transport failure, got {err:?}");
    }

    /// Local server that accepts connections and then sends `head`
    /// (possibly nothing) and stalls without closing the socket.
    async fn stalling_server(head: &'static [u8]) -> String {
        use tokio::io::AsyncWriteExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((mut socket, _)) = listener.accept().await {
                let _ = socket.write_all(head).await;
                held.push(socket);
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn slow_backend_hits_the_deadline() {
        let base = stalling_server(b"").await;
        let api = api(&base).with_timeout(Some(Duration::from_millis(100)));
        let err = api.list("token").await.unwrap_err();
        assert_eq!(err, ApiError::Timeout);
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_slow_body() {
        let base = stalling_server(
            b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 100\r\n\r\n[",
        )
        .await;
        let cancel = CancellationToken::new();
        let api = api(&base).with_cancellation(cancel.clone());
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });
        let err = tokio::time::timeout(Duration::from_secs(5), api.list("token"))
            .await
            .expect("cancellation did not interrupt the body read")
            .unwrap_err();
        assert_eq!(err, ApiError::Cancelled);
    }

    #[tokio::test]
    async fn cancelled_client_fails_fast() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let api = api("http://127.0.0.1:9").with_cancellation(cancel);
        let err = api.list("token").await.unwrap_err();
        assert!(err.is_transport());
    }
}
