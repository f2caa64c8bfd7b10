use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const PREFS_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// The persisted search state: the last query (if any) and the last page
/// requested for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryPreferences {
    pub query: Option<String>,
    pub page: u32,
}

impl Default for QueryPreferences {
    fn default() -> Self {
        Self { query: None, page: 1 }
    }
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PreferencesEnvelope {
    version: u32,
    preferences: QueryPreferences,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("dev", "PhotoGallery", "PhotoGallery")
            .ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load_preferences(&self) -> Result<QueryPreferences, StorageError> {
        let path = self.preferences_path();
        if !path.exists() {
            return Ok(QueryPreferences::default());
        }

        let bytes = fs::read(path)?;
        let envelope: PreferencesEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version != PREFS_SCHEMA_VERSION {
            tracing::warn!(version = envelope.version, "unexpected preferences schema version");
        }

        Ok(envelope.preferences)
    }

    pub fn save_preferences(&self, preferences: &QueryPreferences) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let envelope =
            PreferencesEnvelope { version: PREFS_SCHEMA_VERSION, preferences: preferences.clone() };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(self.preferences_path(), bytes)?;
        Ok(())
    }

    /// The stored search query, or `None` for the recent-photos feed.
    pub fn stored_query(&self) -> Result<Option<String>, StorageError> {
        Ok(self.load_preferences()?.query)
    }

    /// Store `query`; `None` (or blank text) removes the stored query.
    pub fn set_stored_query(&self, query: Option<&str>) -> Result<(), StorageError> {
        let mut preferences = self.load_preferences()?;
        preferences.query = query.map(str::trim).filter(|q| !q.is_empty()).map(str::to_string);
        self.save_preferences(&preferences)
    }

    pub fn stored_page(&self) -> Result<u32, StorageError> {
        Ok(self.load_preferences()?.page)
    }

    pub fn set_stored_page(&self, page: u32) -> Result<(), StorageError> {
        let mut preferences = self.load_preferences()?;
        preferences.page = page;
        self.save_preferences(&preferences)
    }

    fn preferences_path(&self) -> PathBuf {
        self.root.join("preferences.json")
    }
}
