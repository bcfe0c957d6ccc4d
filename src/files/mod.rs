//! Managed files: canonical copies, their archive history, updates and
//! reconciliation against the canonical load order.
//!
//! Each (tenant, file type) has at most one canonical file in the tenant
//! directory. Superseded copies move to
//! `archive/<type>/<type>_<Www_Mon_DD_YYYY><ext>`, dated by the canonical
//! file's modification time. Two archivals of one type on the same day
//! share a name, and the later one replaces the earlier.

pub mod compare;
pub mod fetch;
pub mod update;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::store::{Result, StoreError, TenantId, TenantStore, ARCHIVE_DIR, LOADORDER, REASONS, SKIPS};

pub use compare::{compare, ReasonsMap, SkipSet};
pub use update::{UpdateOutcome, UpdatePipeline};

/// Extension of a file name: everything from the first `.` on.
///
/// `loadorder.txt` gives `.txt`, `mods.tar.gz` gives `.tar.gz`.
pub fn extension_of(file_name: &str) -> Option<&str> {
    file_name.find('.').map(|index| &file_name[index..])
}

/// Calendar date used in archive names, e.g. `Sun_Oct_18_2026`.
pub fn archive_date(modified: SystemTime) -> String {
    DateTime::<Local>::from(modified)
        .format("%a %b %d %Y")
        .to_string()
        .replace(' ', "_")
}

/// Name given to an archived copy of `file_type`.
pub fn archive_name(file_type: &str, modified: SystemTime, extension: &str) -> String {
    format!("{}_{}{}", file_type, archive_date(modified), extension)
}

/// Moves canonical files into the archive and reads them back.
#[derive(Clone)]
pub struct FileArchiver {
    store: Arc<TenantStore>,
}

impl FileArchiver {
    pub fn new(store: Arc<TenantStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<TenantStore> {
        &self.store
    }

    /// Path of the canonical file for a file type.
    pub async fn canonical_path(&self, tenant: &TenantId, file_type: &str) -> Result<PathBuf> {
        let file_name = self.store.resolve_file_name(tenant, file_type).await?;
        Ok(self.store.tenant_dir(tenant).join(file_name))
    }

    /// Directory holding the archived copies of a file type.
    pub fn archive_dir(&self, tenant: &TenantId, file_type: &str) -> PathBuf {
        self.store
            .tenant_dir(tenant)
            .join(ARCHIVE_DIR)
            .join(file_type)
    }

    /// Archive the canonical file if there is one.
    ///
    /// Returns the archive path, or `None` when there was nothing to move;
    /// in that case nothing on disk is touched.
    pub async fn archive_if_present(&self, tenant: &TenantId, file_type: &str) -> Result<Option<PathBuf>> {
        let file_name = self.store.resolve_file_name(tenant, file_type).await?;
        let _files = self.store.lock_files(tenant).await?;
        self.archive_locked(tenant, file_type, &file_name).await
    }

    /// Archive while the caller holds the tenant's file lock.
    pub(crate) async fn archive_locked(
        &self,
        tenant: &TenantId,
        file_type: &str,
        file_name: &str,
    ) -> Result<Option<PathBuf>> {
        let canonical = self.store.tenant_dir(tenant).join(file_name);

        let metadata = match fs::metadata(&canonical).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(tenant = %tenant, file_type = %file_type, "Nothing to archive");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let extension = extension_of(file_name)
            .ok_or_else(|| StoreError::EmptyExtension(file_name.to_string()))?;

        let folder = self.archive_dir(tenant, file_type);
        fs::create_dir_all(&folder).await?;

        let target = folder.join(archive_name(file_type, metadata.modified()?, extension));
        if fs::try_exists(&target).await? {
            warn!(
                tenant = %tenant,
                file_type = %file_type,
                path = %target.display(),
                "Archive for this date exists, overwriting"
            );
            fs::remove_file(&target).await?;
        }
        fs::rename(&canonical, &target).await?;

        info!(
            tenant = %tenant,
            file_type = %file_type,
            path = %target.display(),
            "Archived file"
        );

        Ok(Some(target))
    }

    /// Current contents of a canonical file.
    pub async fn retrieve(&self, tenant: &TenantId, file_type: &str) -> Result<Vec<u8>> {
        let path = self.canonical_path(tenant, file_type).await?;
        Ok(fs::read(&path).await?)
    }

    /// Archived copies of a file type, oldest name first.
    pub async fn archives(&self, tenant: &TenantId, file_type: &str) -> Result<Vec<PathBuf>> {
        self.store.resolve_file_name(tenant, file_type).await?;

        let mut entries = match fs::read_dir(self.archive_dir(tenant, file_type)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            paths.push(entry.path());
        }
        paths.sort();
        Ok(paths)
    }
}

/// Read a text file, replacing invalid UTF-8. `None` if it does not exist.
async fn read_lossy(path: &Path) -> Result<Option<String>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Everything needed to reconcile a submission for one tenant.
#[derive(Debug, Clone)]
pub struct ReconcileInputs {
    /// Canonical load order text.
    pub master: String,
    pub skips: SkipSet,
    pub reasons: ReasonsMap,
}

impl ReconcileInputs {
    /// Read the tenant's master list, skip set and reasons map.
    ///
    /// A missing master list is an error. Missing skips or reasons, or
    /// reasons that do not parse, count as empty.
    pub async fn load(archiver: &FileArchiver, tenant: &TenantId) -> Result<Self> {
        let store = archiver.store();
        let dir = store.tenant_dir(tenant);
        let _files = store.lock_files(tenant).await?;

        let master = read_lossy(&dir.join(store.resolve_file_name(tenant, LOADORDER).await?))
            .await?
            .ok_or_else(|| StoreError::MasterListMissing(tenant.clone()))?;

        let skips = match read_lossy(&dir.join(store.resolve_file_name(tenant, SKIPS).await?)).await? {
            Some(text) => SkipSet::parse(&text),
            None => {
                debug!(tenant = %tenant, "No skips file, skipping nothing");
                SkipSet::default()
            }
        };

        let reasons = match read_lossy(&dir.join(store.resolve_file_name(tenant, REASONS).await?)).await? {
            Some(text) => ReasonsMap::parse(&text).unwrap_or_else(|e| {
                warn!(tenant = %tenant, error = %e, "Reasons file is not valid JSON, ignoring it");
                ReasonsMap::default()
            }),
            None => {
                debug!(tenant = %tenant, "No reasons file");
                ReasonsMap::default()
            }
        };

        Ok(Self { master, skips, reasons })
    }

    /// Diff report for a submission; empty when it matches.
    pub fn compare(&self, submitted: &str) -> String {
        compare(&self.master, submitted, &self.skips, &self.reasons)
    }
}
