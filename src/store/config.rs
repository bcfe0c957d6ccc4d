//! Store configuration.

use std::path::PathBuf;

use super::settings::DEFAULT_DISPLAY_PATH;

/// Configuration for a tenant store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root directory; each tenant gets a subdirectory named by its ID.
    pub data_dir: PathBuf,

    /// Display path given to tenants created from scratch.
    pub default_display_path: String,

    /// Validate structured files before they reach the canonical slot.
    ///
    /// Off by default: updates write the canonical file first and validate
    /// afterwards, leaving invalid content in place until it is archived.
    pub staged_updates: bool,
}

impl StoreConfig {
    /// Create a new config rooted at `data_dir`.
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            default_display_path: DEFAULT_DISPLAY_PATH.to_string(),
            staged_updates: false,
        }
    }

    /// Set the display path used for new tenants.
    pub fn with_default_display_path(mut self, path: impl Into<String>) -> Self {
        self.default_display_path = path.into();
        self
    }

    /// Enable staged (validate-then-rename) updates.
    pub fn with_staged_updates(mut self, staged: bool) -> Self {
        self.staged_updates = staged;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        let data_dir = directories::ProjectDirs::from("org", "pelagius", "pelagius")
            .map(|d| d.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("./data"));

        Self::new(data_dir)
    }
}
