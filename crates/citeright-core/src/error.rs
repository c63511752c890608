use thiserror::Error;

/// Failure of a single remote round trip.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No response was received (connection refused, DNS, TLS, ...).
    #[error("network error: {0}")]
    Network(String),
    /// The configured request deadline elapsed.
    #[error("request timed out")]
    Timeout,
    /// The request was cancelled before a response arrived.
    #[error("request cancelled")]
    Cancelled,
    /// Non-2xx response. `message` is the server's `message` field, if any.
    #[error("server returned HTTP {status}")]
    Server { status: u16, message: Option<String> },
    /// 2xx response whose body did not have the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Server-supplied message, when the failure carried one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Server {
                message: Some(m), ..
            } if !m.trim().is_empty() => Some(m.as_str()),
            _ => None,
        }
    }

    /// True for failures where no server response was seen.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ApiError::Network(_) | ApiError::Timeout | ApiError::Cancelled
        )
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

/// Local persistence failure.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("could not encode/decode stored value: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("not authenticated")]
    AuthRequired,
    /// A locally valid session was rejected by the backend's validation.
    #[error("session rejected by server")]
    SessionRejected,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl CoreError {
    /// Server-supplied message, if this error came from a non-2xx response.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            CoreError::Api(e) => e.server_message(),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, CoreError::Api(e) if e.is_transport())
    }
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;
