// SPDX-License-Identifier: MPL-2.0

use crate::config::{
    APP_ID, DEFAULT_EAGER_COMMENT_PREFIX, DEFAULT_MUTATION_TIMEOUT_SECS, PROJECT_ID_ENV,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Persistent application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Firestore project; the environment variable wins when set
    #[serde(default)]
    pub project_id: Option<String>,
    /// How many top-of-feed items get their comment count computed eagerly
    #[serde(default = "default_eager_comment_prefix")]
    pub eager_comment_prefix: usize,
    #[serde(default = "default_mutation_timeout_secs")]
    pub mutation_timeout_secs: u64,
    #[serde(default = "default_use_snapshot_cache")]
    pub use_snapshot_cache: bool,
}

fn default_eager_comment_prefix() -> usize {
    DEFAULT_EAGER_COMMENT_PREFIX
}

fn default_mutation_timeout_secs() -> u64 {
    DEFAULT_MUTATION_TIMEOUT_SECS
}

fn default_use_snapshot_cache() -> bool {
    true
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            project_id: None,
            eager_comment_prefix: DEFAULT_EAGER_COMMENT_PREFIX,
            mutation_timeout_secs: DEFAULT_MUTATION_TIMEOUT_SECS,
            use_snapshot_cache: default_use_snapshot_cache(),
        }
    }
}

impl AppSettings {
    /// Get the settings file path (~/.config/kr.tapgol.Talk/settings.json)
    fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push(APP_ID);
            p.push("settings.json");
            p
        })
    }

    /// Load settings from disk. A missing file is written out with the
    /// defaults so there is something to edit.
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_or_create(&path),
            None => Self::default(),
        }
    }

    fn load_or_create(path: &Path) -> Self {
        if path.exists() {
            return Self::load_from(path);
        }
        let settings = Self::default();
        if let Err(e) = settings.save_to(path) {
            tracing::warn!(path = %path.display(), error = %e, "could not write default settings");
        }
        settings
    }

    fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "ignoring malformed settings");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {e}"))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {e}"))?;

        std::fs::write(path, json).map_err(|e| format!("Failed to write settings: {e}"))?;

        Ok(())
    }

    /// The Firestore project to talk to, if any is configured
    pub fn project_id(&self) -> Option<String> {
        Self::pick_project_id(std::env::var(PROJECT_ID_ENV).ok(), self.project_id.as_deref())
    }

    fn pick_project_id(env: Option<String>, stored: Option<&str>) -> Option<String> {
        env.filter(|v| !v.trim().is_empty())
            .or_else(|| stored.map(str::to_string))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}
