//! User preferences. The core only stores and returns them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StorageError;
use crate::store::{CredentialStore, SETTINGS_KEY};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub citation_format: String,
    pub default_collection: String,
    pub auto_classify: bool,
    pub auto_save: bool,
    pub sync_frequency: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            citation_format: "nzlsg".to_string(),
            default_collection: "none".to_string(),
            auto_classify: true,
            auto_save: false,
            sync_frequency: "immediate".to_string(),
            extra: Map::new(),
        }
    }
}

/// Stored settings, or the defaults when none were saved yet.
pub fn load_settings(store: &dyn CredentialStore) -> Result<Settings, StorageError> {
    Ok(store.load(SETTINGS_KEY)?.unwrap_or_default())
}

pub fn save_settings(store: &dyn CredentialStore, settings: &Settings) -> Result<(), StorageError> {
    store.save(SETTINGS_KEY, settings)
}
