use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub server: Option<ServerConfig>,
    pub storage: Option<StorageConfig>,
    pub cache: Option<CacheConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub base_url: Option<String>,
    /// Per-request deadline. Absent means no client-side deadline.
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub capacity: Option<usize>,
}

/// Platform config directory path: `<config_dir>/citeright/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("citeright").join("config.toml"))
}

/// Load config by cascading CWD `.citeright.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".citeright.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable config file");
            None
        }
    }
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        server: Some(ServerConfig {
            base_url: overlay
                .server
                .as_ref()
                .and_then(|s| s.base_url.clone())
                .or_else(|| base.server.as_ref().and_then(|s| s.base_url.clone())),
            request_timeout_secs: overlay
                .server
                .as_ref()
                .and_then(|s| s.request_timeout_secs)
                .or_else(|| base.server.as_ref().and_then(|s| s.request_timeout_secs)),
        }),
        storage: Some(StorageConfig {
            path: overlay
                .storage
                .as_ref()
                .and_then(|s| s.path.clone())
                .or_else(|| base.storage.as_ref().and_then(|s| s.path.clone())),
        }),
        cache: Some(CacheConfig {
            capacity: overlay
                .cache
                .as_ref()
                .and_then(|c| c.capacity)
                .or_else(|| base.cache.as_ref().and_then(|c| c.capacity)),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file() {
        let toml_str = "[server]\nbase_url = \"https://cite.example\"\n";
        let parsed: ConfigFile = toml::from_str(toml_str).unwrap();
        let server = parsed.server.unwrap();
        assert_eq!(server.base_url.as_deref(), Some("https://cite.example"));
        assert!(server.request_timeout_secs.is_none());
        assert!(parsed.cache.is_none());
    }

    #[test]
    fn merge_overlay_wins_per_field() {
        let base = ConfigFile {
            server: Some(ServerConfig {
                base_url: Some("https://base.example".into()),
                request_timeout_secs: Some(30),
            }),
            cache: Some(CacheConfig { capacity: Some(50) }),
            ..Default::default()
        };
        let overlay = ConfigFile {
            server: Some(ServerConfig {
                base_url: Some("https://overlay.example".into()),
                request_timeout_secs: None,
            }),
            ..Default::default()
        };
        let merged = merge(base, overlay);
        let server = merged.server.unwrap();
        assert_eq!(server.base_url.as_deref(), Some("https://overlay.example"));
        assert_eq!(server.request_timeout_secs, Some(30));
        assert_eq!(merged.cache.unwrap().capacity, Some(50));
    }

    #[test]
    fn written_file_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");
        let config = ConfigFile {
            storage: Some(StorageConfig {
                path: Some("/tmp/citeright.db".into()),
            }),
            ..Default::default()
        };
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();
        assert_eq!(load_from_path(&path), Some(config));
    }

    #[test]
    fn unparsable_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nbase_url = ").unwrap();
        assert_eq!(load_from_path(&path), None);
    }
}
