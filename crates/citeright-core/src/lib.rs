use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;

pub mod api;
pub mod cache;
pub mod citation;
pub mod config_file;
pub mod error;
pub mod message;
pub mod model;
pub mod orchestrator;
pub mod session;
pub mod settings;
pub mod store;

// Re-export for convenience
pub use cache::{DEFAULT_CAPACITY, ReferenceCache, ReferenceFilter};
pub use citation::format_local;
pub use error::{ApiError, CoreError, StorageError};
pub use message::{Request, Response};
pub use model::{Credentials, Reference, ReferenceDraft, ReferenceId, ReferenceType, Session, User};
pub use orchestrator::{Orchestrator, OrchestratorOptions};
pub use session::{AuthStatus, SessionManager, SessionState, Validation};
pub use settings::Settings;
pub use store::{CredentialStore, MemoryStore, SqliteStore};

/// Origin used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "https://citeright.repl.co";

/// Resolved runtime configuration.
#[derive(Clone, PartialEq)]
pub struct Config {
    pub base_url: String,
    /// Path to the SQLite store. `None` keeps everything in memory.
    pub store_path: Option<PathBuf>,
    /// Per-request deadline. `None` means no client-side deadline.
    pub request_timeout_secs: Option<u64>,
    pub cache_capacity: usize,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // base_url may carry userinfo; never print it verbatim.
        let base_url = match Url::parse(&self.base_url) {
            Ok(mut url) if !url.username().is_empty() || url.password().is_some() => {
                let _ = url.set_username("***");
                let _ = url.set_password(None);
                url.to_string()
            }
            _ => self.base_url.clone(),
        };
        f.debug_struct("Config")
            .field("base_url", &base_url)
            .field("store_path", &self.store_path)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("cache_capacity", &self.cache_capacity)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            store_path: default_store_path(),
            request_timeout_secs: None,
            cache_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl Config {
    /// Defaults overlaid with whatever the config file sets.
    pub fn from_file(file: &config_file::ConfigFile) -> Self {
        let mut config = Self::default();
        if let Some(server) = &file.server {
            if let Some(url) = &server.base_url {
                config.base_url = url.clone();
            }
            if server.request_timeout_secs.is_some() {
                config.request_timeout_secs = server.request_timeout_secs;
            }
        }
        if let Some(path) = file.storage.as_ref().and_then(|s| s.path.as_ref()) {
            config.store_path = Some(PathBuf::from(path));
        }
        if let Some(capacity) = file.cache.as_ref().and_then(|c| c.capacity) {
            config.cache_capacity = capacity;
        }
        config
    }

    /// The base URL, checked to be an absolute http(s) URL.
    pub fn parsed_base_url(&self) -> Result<Url, CoreError> {
        let url = Url::parse(self.base_url.trim())
            .map_err(|e| CoreError::Config(format!("invalid base URL {:?}: {e}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(CoreError::Config(format!(
                "base URL must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        Ok(url)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
    }
}

/// Platform data directory path: `<data_dir>/citeright/store.db`.
pub fn default_store_path() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("citeright").join("store.db"))
}

/// Open the durable store.
///
/// If `path` is set, opens a SQLite store there; if that fails, or no path
/// is given, returns an in-memory store.
pub fn open_store(path: Option<&Path>) -> Arc<dyn CredentialStore> {
    if let Some(path) = path {
        match SqliteStore::open(path) {
            Ok(store) => {
                tracing::info!(path = %path.display(), "opened persistent store");
                return Arc::new(store);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to open store, falling back to in-memory");
            }
        }
    }
    Arc::new(MemoryStore::new())
}
