//! Tenant settings and their line-oriented `settings.dat` encoding.
//!
//! ```text
//! true                                  <- enabled, exact literal "true"
//! MO2/profiles/[profile]/loadorder.txt  <- display path, verbatim
//! plugins,plugins.txt                   <- one custom file type per line
//! ```

use serde::{Serialize, Serializer};
use tracing::warn;

use super::tenant::is_plain_component;
use super::{Result, StoreError};

/// Built-in file type holding the tenant's master load order.
pub const LOADORDER: &str = "loadorder";

/// Built-in file type mapping lines to explanations.
pub const REASONS: &str = "reasons";

/// Built-in file type listing lines excluded from reconciliation.
pub const SKIPS: &str = "skips";

/// Built-in file types. Never overridable by a tenant.
pub const BUILTIN_FILE_TYPES: [(&str, &str); 3] = [
    (LOADORDER, "loadorder.txt"),
    (REASONS, "reasons.json"),
    (SKIPS, "skips.txt"),
];

/// Default hint shown to users for where their load order lives.
pub const DEFAULT_DISPLAY_PATH: &str = "MO2/profiles/[profile]/loadorder.txt";

/// Look up a built-in file type.
pub fn builtin_file_name(file_type: &str) -> Option<&'static str> {
    BUILTIN_FILE_TYPES
        .iter()
        .find(|(name, _)| *name == file_type)
        .map(|(_, file)| *file)
}

/// Tenant-declared file types, kept in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTypes(Vec<(String, String)>);

impl FileTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a mapping. Replacing keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, file_name: impl Into<String>) {
        let name = name.into();
        let file_name = file_name.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = file_name,
            None => self.0.push((name, file_name)),
        }
    }

    /// Remove a mapping, returning its file name if it existed.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.0.iter().position(|(existing, _)| existing == name)?;
        Some(self.0.remove(index).1)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, file)| file.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, file)| (name.as_str(), file.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for FileTypes {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

/// Per-tenant settings record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    /// Whether reconciliation is currently active.
    pub enabled: bool,

    /// Where users find the file they must submit. Free text.
    pub display_path: String,

    /// Custom file types extending the built-in ones.
    pub file_types: FileTypes,
}

impl Settings {
    /// Settings synthesized for a tenant with nothing on disk.
    pub fn with_path(display_path: impl Into<String>) -> Self {
        Self {
            enabled: true,
            display_path: display_path.into(),
            file_types: FileTypes::new(),
        }
    }

    /// Resolve a file type name to its file name. Built-ins always win.
    pub fn resolve_file_name(&self, file_type: &str) -> Option<&str> {
        builtin_file_name(file_type).or_else(|| self.file_types.get(file_type))
    }

    /// Validate and record a custom file type.
    pub fn declare_file_type(&mut self, name: &str, file_name: &str) -> Result<()> {
        if builtin_file_name(name).is_some() {
            return Err(StoreError::BuiltinFileType(name.to_string()));
        }
        if !is_plain_component(name) || name.contains(',') {
            return Err(StoreError::InvalidFileName(name.to_string()));
        }
        if !is_plain_component(file_name) || file_name.contains(['\r', '\n']) {
            return Err(StoreError::InvalidFileName(file_name.to_string()));
        }
        self.file_types.insert(name, file_name);
        Ok(())
    }

    /// Encode as `settings.dat` text.
    pub fn encode(&self) -> String {
        let mut lines = vec![self.enabled.to_string(), self.display_path.clone()];
        lines.extend(
            self.file_types
                .iter()
                .map(|(name, file)| format!("{},{}", name, file)),
        );
        lines.join("\n")
    }

    /// Decode `settings.dat` text.
    ///
    /// Only the exact literal `true` enables. Custom type lines are split
    /// on their first comma; lines without one are skipped with a warning.
    pub fn decode(text: &str) -> Result<Self> {
        let lines: Vec<&str> = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .collect();

        if lines.len() < 2 {
            return Err(StoreError::Parse(format!(
                "settings need at least 2 lines, found {}",
                lines.len()
            )));
        }

        let mut file_types = FileTypes::new();
        for line in &lines[2..] {
            match line.split_once(',') {
                Some((name, file)) => file_types.insert(name, file),
                None if line.is_empty() => {}
                None => warn!(line = %line, "Skipping custom file type line without a comma"),
            }
        }

        Ok(Self {
            enabled: lines[0] == "true",
            display_path: lines[1].to_string(),
            file_types,
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_path(DEFAULT_DISPLAY_PATH)
    }
}
