//! Per-tenant state store.
//!
//! Every tenant owns a directory under the data root holding:
//! - `staff.dat` - comma-joined staff identities
//! - `channels.dat` - comma-joined approved channel IDs
//! - `settings.dat` - see [`settings`]
//! - its managed files and their `archive/` history (see [`crate::files`])
//!
//! State is loaded lazily. Any component that cannot be read is replaced by
//! a default which is written back immediately, so loading never fails.
//! Each tenant's state sits behind its own lock, held across the whole
//! mutate-then-persist sequence. Tenants never contend with each other.

pub mod config;
pub mod settings;
pub mod tenant;

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::fs;
use tokio::sync::{Mutex, MutexGuard, OnceCell, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};

pub use config::StoreConfig;
pub use settings::{FileTypes, Settings, BUILTIN_FILE_TYPES, LOADORDER, REASONS, SKIPS};
pub use tenant::{validate_member, TenantId};

use tenant::{decode_members, encode_members};

/// Errors that can occur in store and file operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation failed for {file_type}: {source}")]
    Validation {
        file_type: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} is already staff")]
    AlreadyStaff(String),

    #[error("{0} is not staff")]
    NotStaff(String),

    #[error("Channel {0} is already approved")]
    AlreadyApproved(String),

    #[error("Channel {0} is not approved")]
    NotApproved(String),

    #[error("{0} owns the tenant and cannot be removed from staff")]
    OwnerImmutable(String),

    #[error("{0} cannot remove themselves from staff")]
    SelfRemoval(String),

    #[error("Unknown file type: {0}")]
    UnknownFileType(String),

    #[error("File type {0} is built in")]
    BuiltinFileType(String),

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error("File {0} has no extension")]
    EmptyExtension(String),

    #[error("Invalid identity: {0:?}")]
    InvalidIdentity(String),

    #[error("Display path must be a single line")]
    InvalidDisplayPath,

    #[error("Invalid tenant ID: {0:?}")]
    InvalidTenantId(String),

    #[error("Tenant not loaded: {0}")]
    NotLoaded(TenantId),

    #[error("Master load order does not exist for tenant {0}")]
    MasterListMissing(TenantId),

    #[error("Byte source failed: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

const STAFF_FILE: &str = "staff.dat";
const CHANNELS_FILE: &str = "channels.dat";
const SETTINGS_FILE: &str = "settings.dat";

/// Directory under a tenant root holding archived managed files.
pub const ARCHIVE_DIR: &str = "archive";

/// Persisted pieces of a tenant's state.
#[derive(Debug, Clone, Copy)]
enum Component {
    Staff,
    Channels,
    Settings,
}

impl Component {
    fn file_name(self) -> &'static str {
        match self {
            Self::Staff => STAFF_FILE,
            Self::Channels => CHANNELS_FILE,
            Self::Settings => SETTINGS_FILE,
        }
    }

    fn encode(self, state: &TenantState) -> String {
        match self {
            Self::Staff => encode_members(&state.staff),
            Self::Channels => encode_members(&state.channels),
            Self::Settings => state.settings.encode(),
        }
    }
}

/// In-memory state of one tenant.
#[derive(Debug, Clone)]
struct TenantState {
    owner: String,
    staff: BTreeSet<String>,
    channels: BTreeSet<String>,
    settings: Settings,
}

/// Point-in-time copy of a tenant's state.
#[derive(Debug, Clone, Serialize)]
pub struct TenantSnapshot {
    pub tenant: TenantId,
    pub owner: String,
    pub settings: Settings,
    pub staff: Vec<String>,
    pub channels: Vec<String>,
}

impl TenantSnapshot {
    fn new(tenant: &TenantId, state: &TenantState) -> Self {
        Self {
            tenant: tenant.clone(),
            owner: state.owner.clone(),
            settings: state.settings.clone(),
            staff: state.staff.iter().cloned().collect(),
            channels: state.channels.iter().cloned().collect(),
        }
    }
}

/// Locks for one tenant.
///
/// `state` is filled exactly once by the first `load`; concurrent loaders
/// wait on it instead of racing to synthesize defaults. `files` serializes
/// archive and update of the tenant's managed files.
#[derive(Default)]
struct TenantSlot {
    state: OnceCell<Mutex<TenantState>>,
    files: Arc<Mutex<()>>,
}

/// Registry of tenant state backed by a directory per tenant.
pub struct TenantStore {
    config: StoreConfig,
    tenants: RwLock<HashMap<TenantId, Arc<TenantSlot>>>,
}

impl TenantStore {
    /// Create a store rooted at `config.data_dir`. Nothing is read yet.
    pub fn new(config: StoreConfig) -> Self {
        info!(data_dir = %config.data_dir.display(), "Tenant store initialized");
        Self {
            config,
            tenants: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Directory holding everything a tenant owns.
    pub fn tenant_dir(&self, tenant: &TenantId) -> PathBuf {
        self.config.data_dir.join(tenant.as_str())
    }

    /// Tenants loaded so far.
    pub async fn tenants(&self) -> Vec<TenantId> {
        let mut ids: Vec<_> = self.tenants.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    // === Lifecycle ===

    /// Load a tenant, synthesizing and persisting defaults for anything
    /// missing or unreadable. Loading an already loaded tenant returns its
    /// current state without touching disk.
    pub async fn load(&self, tenant: &TenantId, owner: &str) -> TenantSnapshot {
        let slot = {
            let mut tenants = self.tenants.write().await;
            Arc::clone(tenants.entry(tenant.clone()).or_default())
        };

        let state = slot
            .state
            .get_or_init(|| async { Mutex::new(self.read_state(tenant, owner).await) })
            .await;

        let state = state.lock().await;
        TenantSnapshot::new(tenant, &state)
    }

    async fn read_state(&self, tenant: &TenantId, owner: &str) -> TenantState {
        let dir = self.tenant_dir(tenant);
        if let Err(e) = fs::create_dir_all(&dir).await {
            warn!(tenant = %tenant, dir = %dir.display(), error = %e, "Failed to create tenant directory");
        }

        let mut state = TenantState {
            owner: owner.to_string(),
            staff: BTreeSet::from([owner.to_string()]),
            channels: BTreeSet::new(),
            settings: Settings::with_path(self.config.default_display_path.clone()),
        };

        match fs::read_to_string(dir.join(STAFF_FILE)).await {
            Ok(text) => {
                state.staff = decode_members(&text);
                info!(tenant = %tenant, count = state.staff.len(), "Loaded staff");
                if state.staff.insert(owner.to_string()) {
                    warn!(tenant = %tenant, owner = %owner, "Owner missing from staff, restoring");
                    self.persist_default(tenant, Component::Staff, &state).await;
                }
            }
            Err(e) => {
                debug!(tenant = %tenant, error = %e, "No staff on disk");
                self.persist_default(tenant, Component::Staff, &state).await;
            }
        }

        match fs::read_to_string(dir.join(CHANNELS_FILE)).await {
            Ok(text) => {
                state.channels = decode_members(&text);
                info!(tenant = %tenant, count = state.channels.len(), "Loaded approved channels");
            }
            Err(e) => {
                debug!(tenant = %tenant, error = %e, "No approved channels on disk");
                self.persist_default(tenant, Component::Channels, &state).await;
            }
        }

        let settings = fs::read_to_string(dir.join(SETTINGS_FILE))
            .await
            .map_err(StoreError::from)
            .and_then(|text| Settings::decode(&text));
        match settings {
            Ok(settings) => {
                state.settings = settings;
                info!(tenant = %tenant, enabled = state.settings.enabled, "Loaded settings");
            }
            Err(e) => {
                debug!(tenant = %tenant, error = %e, "No usable settings on disk");
                self.persist_default(tenant, Component::Settings, &state).await;
            }
        }

        state
    }

    async fn persist_default(&self, tenant: &TenantId, component: Component, state: &TenantState) {
        match self.persist(tenant, component, state).await {
            Ok(()) => info!(tenant = %tenant, file = component.file_name(), "Created default"),
            Err(e) => warn!(
                tenant = %tenant,
                file = component.file_name(),
                error = %e,
                "Failed to save default, continuing with it in memory"
            ),
        }
    }

    async fn persist(&self, tenant: &TenantId, component: Component, state: &TenantState) -> Result<()> {
        let path = self.tenant_dir(tenant).join(component.file_name());
        fs::write(&path, component.encode(state)).await.map_err(|e| {
            warn!(tenant = %tenant, path = %path.display(), error = %e, "Failed to persist");
            StoreError::Io(e)
        })
    }

    async fn slot(&self, tenant: &TenantId) -> Result<Arc<TenantSlot>> {
        self.tenants
            .read()
            .await
            .get(tenant)
            .cloned()
            .ok_or_else(|| StoreError::NotLoaded(tenant.clone()))
    }

    /// Run `f` against the tenant's state while holding its lock.
    async fn with_state<T>(
        &self,
        tenant: &TenantId,
        f: impl FnOnce(&TenantState) -> T,
    ) -> Result<T> {
        let slot = self.slot(tenant).await?;
        let state = lock_state(&slot, tenant).await?;
        Ok(f(&state))
    }

    /// Apply `mutate` under the tenant's lock, then persist `component`.
    ///
    /// A persist failure is returned but the in-memory change stays.
    async fn mutate<T>(
        &self,
        tenant: &TenantId,
        component: Component,
        mutate: impl FnOnce(&mut TenantState) -> Result<T>,
    ) -> Result<T> {
        let slot = self.slot(tenant).await?;
        let mut state = lock_state(&slot, tenant).await?;
        let value = mutate(&mut state)?;
        self.persist(tenant, component, &state).await?;
        Ok(value)
    }

    /// Lock the tenant's managed files for an archive or update.
    pub async fn lock_files(&self, tenant: &TenantId) -> Result<OwnedMutexGuard<()>> {
        let slot = self.slot(tenant).await?;
        if slot.state.get().is_none() {
            return Err(StoreError::NotLoaded(tenant.clone()));
        }
        Ok(Arc::clone(&slot.files).lock_owned().await)
    }

    // === Queries ===

    pub async fn snapshot(&self, tenant: &TenantId) -> Result<TenantSnapshot> {
        self.with_state(tenant, |state| TenantSnapshot::new(tenant, state)).await
    }

    pub async fn get_settings(&self, tenant: &TenantId) -> Result<Settings> {
        self.with_state(tenant, |state| state.settings.clone()).await
    }

    pub async fn get_staff(&self, tenant: &TenantId) -> Result<BTreeSet<String>> {
        self.with_state(tenant, |state| state.staff.clone()).await
    }

    pub async fn get_channels(&self, tenant: &TenantId) -> Result<BTreeSet<String>> {
        self.with_state(tenant, |state| state.channels.clone()).await
    }

    pub async fn is_staff(&self, tenant: &TenantId, identity: &str) -> Result<bool> {
        self.with_state(tenant, |state| state.staff.contains(identity)).await
    }

    pub async fn is_approved_channel(&self, tenant: &TenantId, channel: &str) -> Result<bool> {
        self.with_state(tenant, |state| state.channels.contains(channel)).await
    }

    /// Resolve a file type to its file name. Built-in types always win.
    pub async fn resolve_file_name(&self, tenant: &TenantId, file_type: &str) -> Result<String> {
        self.with_state(tenant, |state| {
            state.settings.resolve_file_name(file_type).map(str::to_string)
        })
        .await?
        .ok_or_else(|| StoreError::UnknownFileType(file_type.to_string()))
    }

    /// Known file types: built-ins first, then the tenant's own.
    pub async fn file_types(&self, tenant: &TenantId) -> Result<Vec<(String, String)>> {
        self.with_state(tenant, |state| {
            let builtins = BUILTIN_FILE_TYPES
                .iter()
                .map(|(name, file)| (name.to_string(), file.to_string()));
            let custom = state
                .settings
                .file_types
                .iter()
                .filter(|(name, _)| !name.is_empty() && settings::builtin_file_name(name).is_none())
                .map(|(name, file)| (name.to_string(), file.to_string()));
            builtins.chain(custom).collect()
        })
        .await
    }

    // === Settings ===

    pub async fn set_enabled(&self, tenant: &TenantId, enabled: bool) -> Result<()> {
        self.mutate(tenant, Component::Settings, |state| {
            state.settings.enabled = enabled;
            Ok(())
        })
        .await?;
        info!(tenant = %tenant, enabled, "Validation {}", if enabled { "resumed" } else { "paused" });
        Ok(())
    }

    pub async fn set_path(&self, tenant: &TenantId, path: &str) -> Result<()> {
        if path.contains(['\r', '\n']) {
            return Err(StoreError::InvalidDisplayPath);
        }
        self.mutate(tenant, Component::Settings, |state| {
            state.settings.display_path = path.to_string();
            Ok(())
        })
        .await?;
        info!(tenant = %tenant, path = %path, "Updated display path");
        Ok(())
    }

    /// Declare (or redirect) a custom file type for the tenant.
    pub async fn declare_file_type(&self, tenant: &TenantId, name: &str, file_name: &str) -> Result<()> {
        self.mutate(tenant, Component::Settings, |state| {
            state.settings.declare_file_type(name, file_name)
        })
        .await?;
        info!(tenant = %tenant, file_type = %name, file = %file_name, "Declared file type");
        Ok(())
    }

    /// Drop a custom file type. Its files on disk are left alone.
    pub async fn forget_file_type(&self, tenant: &TenantId, name: &str) -> Result<()> {
        if settings::builtin_file_name(name).is_some() {
            return Err(StoreError::BuiltinFileType(name.to_string()));
        }
        self.mutate(tenant, Component::Settings, |state| {
            state
                .settings
                .file_types
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| StoreError::UnknownFileType(name.to_string()))
        })
        .await?;
        info!(tenant = %tenant, file_type = %name, "Forgot file type");
        Ok(())
    }

    // === Staff ===

    pub async fn add_staff(&self, tenant: &TenantId, identity: &str) -> Result<()> {
        validate_member(identity)?;
        self.mutate(tenant, Component::Staff, |state| {
            if !state.staff.insert(identity.to_string()) {
                return Err(StoreError::AlreadyStaff(identity.to_string()));
            }
            Ok(())
        })
        .await?;
        info!(tenant = %tenant, identity = %identity, "Added staff member");
        Ok(())
    }

    /// Remove `identity` from staff on behalf of `actor`.
    ///
    /// The owner can never be removed and nobody can remove themselves.
    pub async fn remove_staff(&self, tenant: &TenantId, identity: &str, actor: &str) -> Result<()> {
        self.mutate(tenant, Component::Staff, |state| {
            if identity == state.owner {
                return Err(StoreError::OwnerImmutable(identity.to_string()));
            }
            if identity == actor {
                return Err(StoreError::SelfRemoval(identity.to_string()));
            }
            if !state.staff.remove(identity) {
                return Err(StoreError::NotStaff(identity.to_string()));
            }
            Ok(())
        })
        .await?;
        info!(tenant = %tenant, identity = %identity, actor = %actor, "Removed staff member");
        Ok(())
    }

    // === Channels ===

    pub async fn add_channel(&self, tenant: &TenantId, channel: &str) -> Result<()> {
        validate_member(channel)?;
        self.mutate(tenant, Component::Channels, |state| {
            if !state.channels.insert(channel.to_string()) {
                return Err(StoreError::AlreadyApproved(channel.to_string()));
            }
            Ok(())
        })
        .await?;
        info!(tenant = %tenant, channel = %channel, "Added approved channel");
        Ok(())
    }

    pub async fn remove_channel(&self, tenant: &TenantId, channel: &str) -> Result<()> {
        self.mutate(tenant, Component::Channels, |state| {
            if !state.channels.remove(channel) {
                return Err(StoreError::NotApproved(channel.to_string()));
            }
            Ok(())
        })
        .await?;
        info!(tenant = %tenant, channel = %channel, "Removed approved channel");
        Ok(())
    }
}

async fn lock_state<'a>(slot: &'a TenantSlot, tenant: &TenantId) -> Result<MutexGuard<'a, TenantState>> {
    match slot.state.get() {
        Some(state) => Ok(state.lock().await),
        None => Err(StoreError::NotLoaded(tenant.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const OWNER: &str = "owner-1";

    fn test_store() -> (TempDir, TenantStore) {
        let dir = TempDir::new().unwrap();
        let store = TenantStore::new(StoreConfig::new(dir.path().to_path_buf()));
        (dir, store)
    }

    fn tenant() -> TenantId {
        TenantId::new("guild-1").unwrap()
    }

    #[tokio::test]
    async fn test_load_synthesizes_and_persists_defaults() {
        let (dir, store) = test_store();
        let snapshot = store.load(&tenant(), OWNER).await;

        assert_eq!(snapshot.staff, vec![OWNER.to_string()]);
        assert!(snapshot.channels.is_empty());
        assert!(snapshot.settings.enabled);
        assert_eq!(snapshot.settings.display_path, settings::DEFAULT_DISPLAY_PATH);

        let root = dir.path().join("guild-1");
        assert_eq!(std::fs::read_to_string(root.join(STAFF_FILE)).unwrap(), OWNER);
        assert_eq!(std::fs::read_to_string(root.join(CHANNELS_FILE)).unwrap(), "");
        assert_eq!(
            std::fs::read_to_string(root.join(SETTINGS_FILE)).unwrap(),
            "true\nMO2/profiles/[profile]/loadorder.txt"
        );
    }

    #[tokio::test]
    async fn test_load_reads_existing_state() {
        let (dir, store) = test_store();
        let root = dir.path().join("guild-1");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join(STAFF_FILE), "owner-1,mod-2").unwrap();
        std::fs::write(root.join(CHANNELS_FILE), "c1,c2").unwrap();
        std::fs::write(root.join(SETTINGS_FILE), "false\nsomewhere\nini,skyrim.ini").unwrap();

        let snapshot = store.load(&tenant(), OWNER).await;
        assert_eq!(snapshot.staff.len(), 2);
        assert_eq!(snapshot.channels, vec!["c1".to_string(), "c2".to_string()]);
        assert!(!snapshot.settings.enabled);
        assert_eq!(snapshot.settings.display_path, "somewhere");
        assert_eq!(
            store.resolve_file_name(&tenant(), "ini").await.unwrap(),
            "skyrim.ini"
        );
    }

    #[tokio::test]
    async fn test_load_replaces_malformed_settings() {
        let (dir, store) = test_store();
        let root = dir.path().join("guild-1");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join(SETTINGS_FILE), "true").unwrap();

        let snapshot = store.load(&tenant(), OWNER).await;
        assert_eq!(snapshot.settings, Settings::default());
        assert_eq!(
            std::fs::read_to_string(root.join(SETTINGS_FILE)).unwrap(),
            Settings::default().encode()
        );
    }

    #[tokio::test]
    async fn test_load_restores_missing_owner() {
        let (dir, store) = test_store();
        let root = dir.path().join("guild-1");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join(STAFF_FILE), "mod-2").unwrap();

        let snapshot = store.load(&tenant(), OWNER).await;
        assert!(snapshot.staff.contains(&OWNER.to_string()));
        assert!(store.is_staff(&tenant(), "mod-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_operations_require_load() {
        let (_dir, store) = test_store();
        assert!(matches!(
            store.get_settings(&tenant()).await,
            Err(StoreError::NotLoaded(_))
        ));
        assert!(matches!(
            store.add_staff(&tenant(), "x").await,
            Err(StoreError::NotLoaded(_))
        ));
    }

    #[tokio::test]
    async fn test_add_staff_twice() {
        let (_dir, store) = test_store();
        store.load(&tenant(), OWNER).await;

        store.add_staff(&tenant(), "mod-2").await.unwrap();
        let result = store.add_staff(&tenant(), "mod-2").await;
        assert!(matches!(result, Err(StoreError::AlreadyStaff(_))));
        assert_eq!(store.get_staff(&tenant()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_remove_staff_rules() {
        let (dir, store) = test_store();
        store.load(&tenant(), OWNER).await;
        store.add_staff(&tenant(), "mod-2").await.unwrap();
        store.add_staff(&tenant(), "mod-3").await.unwrap();

        assert!(matches!(
            store.remove_staff(&tenant(), OWNER, "mod-2").await,
            Err(StoreError::OwnerImmutable(_))
        ));
        assert!(matches!(
            store.remove_staff(&tenant(), OWNER, OWNER).await,
            Err(StoreError::OwnerImmutable(_))
        ));
        assert!(matches!(
            store.remove_staff(&tenant(), "mod-2", "mod-2").await,
            Err(StoreError::SelfRemoval(_))
        ));
        assert!(matches!(
            store.remove_staff(&tenant(), "stranger", "mod-2").await,
            Err(StoreError::NotStaff(_))
        ));

        store.remove_staff(&tenant(), "mod-3", "mod-2").await.unwrap();
        let staff = std::fs::read_to_string(dir.path().join("guild-1").join(STAFF_FILE)).unwrap();
        assert_eq!(staff, "mod-2,owner-1");
    }

    #[tokio::test]
    async fn test_channel_membership() {
        let (dir, store) = test_store();
        store.load(&tenant(), OWNER).await;

        store.add_channel(&tenant(), "c1").await.unwrap();
        assert!(matches!(
            store.add_channel(&tenant(), "c1").await,
            Err(StoreError::AlreadyApproved(_))
        ));
        assert!(store.is_approved_channel(&tenant(), "c1").await.unwrap());

        store.remove_channel(&tenant(), "c1").await.unwrap();
        assert!(matches!(
            store.remove_channel(&tenant(), "c1").await,
            Err(StoreError::NotApproved(_))
        ));
        let channels = std::fs::read_to_string(dir.path().join("guild-1").join(CHANNELS_FILE)).unwrap();
        assert_eq!(channels, "");
    }

    #[tokio::test]
    async fn test_settings_mutations_persist() {
        let (dir, store) = test_store();
        store.load(&tenant(), OWNER).await;

        store.set_enabled(&tenant(), false).await.unwrap();
        store.set_path(&tenant(), "Documents/My Games/plugins.txt").await.unwrap();
        assert!(matches!(
            store.set_path(&tenant(), "two\nlines").await,
            Err(StoreError::InvalidDisplayPath)
        ));

        let text = std::fs::read_to_string(dir.path().join("guild-1").join(SETTINGS_FILE)).unwrap();
        assert_eq!(text, "false\nDocuments/My Games/plugins.txt");

        let reloaded = TenantStore::new(StoreConfig::new(dir.path().to_path_buf()));
        let snapshot = reloaded.load(&tenant(), OWNER).await;
        assert!(!snapshot.settings.enabled);
        assert_eq!(snapshot.settings.display_path, "Documents/My Games/plugins.txt");
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_mutation() {
        let (dir, store) = test_store();
        store.load(&tenant(), OWNER).await;
        std::fs::remove_dir_all(dir.path().join("guild-1")).unwrap();

        let result = store.add_channel(&tenant(), "c9").await;
        assert!(matches!(result, Err(StoreError::Io(_))));
        assert!(store.is_approved_channel(&tenant(), "c9").await.unwrap());
    }

    #[tokio::test]
    async fn test_file_type_resolution() {
        let (_dir, store) = test_store();
        store.load(&tenant(), OWNER).await;

        assert_eq!(store.resolve_file_name(&tenant(), LOADORDER).await.unwrap(), "loadorder.txt");
        assert!(matches!(
            store.resolve_file_name(&tenant(), "ini").await,
            Err(StoreError::UnknownFileType(_))
        ));

        store.declare_file_type(&tenant(), "ini", "skyrim.ini").await.unwrap();
        let names: Vec<_> = store
            .file_types(&tenant())
            .await
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["loadorder", "reasons", "skips", "ini"]);

        store.forget_file_type(&tenant(), "ini").await.unwrap();
        assert!(matches!(
            store.forget_file_type(&tenant(), "ini").await,
            Err(StoreError::UnknownFileType(_))
        ));
        assert!(matches!(
            store.forget_file_type(&tenant(), REASONS).await,
            Err(StoreError::BuiltinFileType(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_mutations_are_not_lost() {
        let (_dir, store) = test_store();
        let store = Arc::new(store);
        store.load(&tenant(), OWNER).await;

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.add_staff(&tenant(), &format!("mod-{}", i)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.get_staff(&tenant()).await.unwrap().len(), 17);

        let reloaded = TenantStore::new(store.config().clone());
        assert_eq!(reloaded.load(&tenant(), OWNER).await.staff.len(), 17);
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_state() {
        let (_dir, store) = test_store();
        let id = tenant();
        let (a, b) = tokio::join!(store.load(&id, OWNER), store.load(&id, OWNER));
        assert_eq!(a.staff, b.staff);
        assert_eq!(store.tenants().await, vec![id]);
    }

    #[tokio::test]
    async fn test_members_must_survive_reload() {
        let (dir, store) = test_store();
        store.load(&tenant(), OWNER).await;

        for bad in ["mallory,admin", "", "two\nlines", "cr\r"] {
            assert!(matches!(
                store.add_staff(&tenant(), bad).await,
                Err(StoreError::InvalidIdentity(_))
            ));
            assert!(matches!(
                store.add_channel(&tenant(), bad).await,
                Err(StoreError::InvalidIdentity(_))
            ));
        }
        store.add_staff(&tenant(), "mod-2").await.unwrap();
        store.add_channel(&tenant(), "c1").await.unwrap();

        let before = store.snapshot(&tenant()).await.unwrap();
        let reloaded = TenantStore::new(StoreConfig::new(dir.path().to_path_buf()));
        let after = reloaded.load(&tenant(), OWNER).await;
        assert_eq!(after.staff, before.staff);
        assert_eq!(after.channels, before.channels);
        assert_eq!(after.staff, vec!["mod-2".to_string(), OWNER.to_string()]);
    }
}
