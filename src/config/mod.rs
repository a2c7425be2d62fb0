//! Configuration Management
//!
//! This module handles the named connection registry and its persisted form.
//!
//! # Configuration Location
//! `~/.fmodata/config.json`, or `$FMODATA_CONFIG_DIR/config.json` when set.
//!
//! # File Format
//! ```json
//! {
//!   "server": { "transport": "stdio", "port": 3000, "host": "localhost" },
//!   "remote": { "server": "", "database": "", "user": "", "verify_ssl": true, "timeout_ms": 30000 },
//!   "connections": {
//!     "prod": { "server": "https://fms.example.com", "database": "Sales", "user": "api", "password": "..." }
//!   },
//!   "default": "prod"
//! }
//! ```
//!
//! # Write-Through
//! Every mutation is applied to a copy, saved through the [`ConnectionStore`], and only then
//! committed in memory. A failed save leaves the registry exactly as it was.

pub mod settings;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{FmodataError, Result};

pub use settings::{RemoteDefaults, ServerSettings, Settings, TransportKind};

/// Fixed mask printed in place of any password
pub const PASSWORD_MASK: &str = "******";

/// Config file name inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Credentials identifying one remote database
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// Server URL (e.g. `https://fms.example.com`)
    pub server: String,

    /// Database name
    pub database: String,

    /// Account name
    pub user: String,

    /// Account password
    pub password: String,
}

impl std::fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &PASSWORD_MASK)
            .finish()
    }
}

impl ConnectionParams {
    /// Reject credential sets with an empty field
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("Server", &self.server),
            ("Database", &self.database),
            ("User", &self.user),
            ("Password", &self.password),
        ];

        for (label, value) in fields {
            if value.trim().is_empty() {
                return Err(FmodataError::config_error(format!("{label} is required")));
            }
        }

        Ok(())
    }
}

/// A registered connection: a unique name plus its credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Registry key
    pub name: String,

    /// Credentials
    pub params: ConnectionParams,
}

/// On-disk configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Outer server settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Baseline remote defaults (no password)
    #[serde(default)]
    pub remote: RemoteDefaults,

    /// Named connections
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionParams>,

    /// Name of the default connection (must exist in connections map)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// Persistence capability behind the registry
pub trait ConnectionStore: Send + Sync {
    /// Read the stored document (an absent store reads as empty)
    fn load(&self) -> Result<ConfigFile>;

    /// Replace the stored document
    fn save(&self, file: &ConfigFile) -> Result<()>;
}

/// JSON file store
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<config dir>/config.json`
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(config_dir()?.join(CONFIG_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConnectionStore for FileStore {
    fn load(&self) -> Result<ConfigFile> {
        if !self.path.exists() {
            return Ok(ConfigFile::default());
        }

        let contents = fs::read_to_string(&self.path)
            .map_err(|e| FmodataError::config_error(format!("Could not read config file: {e}")))?;

        serde_json::from_str(&contents)
            .map_err(|e| FmodataError::config_error(format!("Invalid config file format: {e}")))
    }

    fn save(&self, file: &ConfigFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                FmodataError::config_error(format!("Could not create config directory: {e}"))
            })?;
        }

        let contents = serde_json::to_string_pretty(file)
            .map_err(|e| FmodataError::config_error(format!("Could not serialize config: {e}")))?;

        fs::write(&self.path, contents)
            .map_err(|e| FmodataError::config_error(format!("Could not write config file: {e}")))?;

        // The file holds passwords
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600)).map_err(|e| {
                FmodataError::config_error(format!("Could not restrict config file: {e}"))
            })?;
        }

        Ok(())
    }
}

/// In-process store, used by tests and when no config directory is available
#[derive(Debug, Default)]
pub struct MemoryStore {
    file: Mutex<ConfigFile>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(file: ConfigFile) -> Self {
        Self { file: Mutex::new(file) }
    }
}

impl ConnectionStore for MemoryStore {
    fn load(&self) -> Result<ConfigFile> {
        Ok(self.file.lock().clone())
    }

    fn save(&self, file: &ConfigFile) -> Result<()> {
        *self.file.lock() = file.clone();
        Ok(())
    }
}

/// Named connection registry with write-through persistence
pub struct ConnectionRegistry {
    store: Box<dyn ConnectionStore>,
    file: RwLock<ConfigFile>,
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let file = self.file.read();
        f.debug_struct("ConnectionRegistry")
            .field("connections", &file.connections.keys().collect::<Vec<_>>())
            .field("default", &file.default)
            .finish_non_exhaustive()
    }
}

impl ConnectionRegistry {
    /// Load the registry from a store
    pub fn open(store: impl ConnectionStore + 'static) -> Result<Self> {
        let file = store.load()?;
        Ok(Self { store: Box::new(store), file: RwLock::new(file) })
    }

    /// Empty registry backed by a [`MemoryStore`]
    pub fn in_memory() -> Self {
        Self { store: Box::new(MemoryStore::new()), file: RwLock::new(ConfigFile::default()) }
    }

    /// Register a new connection
    pub fn add(&self, name: &str, params: ConnectionParams) -> Result<()> {
        if name.trim().is_empty() {
            return Err(FmodataError::config_error("Connection name is required"));
        }
        params.validate()?;

        self.update(|file| {
            if file.connections.contains_key(name) {
                return Err(FmodataError::config_error(format!(
                    "Connection \"{name}\" already exists"
                )));
            }
            file.connections.insert(name.to_string(), params);
            Ok(())
        })?;

        tracing::info!(connection = name, "Connection added");
        Ok(())
    }

    /// Remove a connection, clearing the default if it pointed at it
    pub fn remove(&self, name: &str) -> Result<()> {
        self.update(|file| {
            if file.connections.remove(name).is_none() {
                return Err(not_found(name));
            }
            if file.default.as_deref() == Some(name) {
                file.default = None;
            }
            Ok(())
        })?;

        tracing::info!(connection = name, "Connection removed");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Connection> {
        self.file
            .read()
            .connections
            .get(name)
            .map(|params| Connection { name: name.to_string(), params: params.clone() })
    }

    /// All connections, sorted by name
    pub fn list(&self) -> Vec<Connection> {
        self.file
            .read()
            .connections
            .iter()
            .map(|(name, params)| Connection { name: name.clone(), params: params.clone() })
            .collect()
    }

    pub fn set_default(&self, name: &str) -> Result<()> {
        self.update(|file| {
            if !file.connections.contains_key(name) {
                return Err(not_found(name));
            }
            file.default = Some(name.to_string());
            Ok(())
        })?;

        tracing::info!(connection = name, "Default connection set");
        Ok(())
    }

    pub fn get_default(&self) -> Option<Connection> {
        let file = self.file.read();
        let name = file.default.as_ref()?;
        file.connections
            .get(name)
            .map(|params| Connection { name: name.clone(), params: params.clone() })
    }

    pub fn default_name(&self) -> Option<String> {
        self.file.read().default.clone()
    }

    /// Settings stored alongside the connections (environment not applied)
    pub fn stored_settings(&self) -> Settings {
        let file = self.file.read();
        Settings { server: file.server.clone(), remote: file.remote.clone(), log_file: false }
    }

    fn update(&self, apply: impl FnOnce(&mut ConfigFile) -> Result<()>) -> Result<()> {
        let mut current = self.file.write();
        let mut next = current.clone();
        apply(&mut next)?;
        self.store.save(&next)?;
        *current = next;
        Ok(())
    }
}

fn not_found(name: &str) -> FmodataError {
    FmodataError::config_error(format!("Connection \"{name}\" not found"))
}

/// Configuration directory (`$FMODATA_CONFIG_DIR`, else `~/.fmodata`)
pub fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("FMODATA_CONFIG_DIR").filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    let home = dirs::home_dir()
        .ok_or_else(|| FmodataError::config_error("Could not determine home directory"))?;

    Ok(home.join(".fmodata"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(server: &str) -> ConnectionParams {
        ConnectionParams {
            server: server.to_string(),
            database: "Sales".to_string(),
            user: "api".to_string(),
            password: "s3cret".to_string(),
        }
    }

    struct FailingStore;

    impl ConnectionStore for FailingStore {
        fn load(&self) -> Result<ConfigFile> {
            Ok(ConfigFile::default())
        }

        fn save(&self, _file: &ConfigFile) -> Result<()> {
            Err(FmodataError::config_error("disk full"))
        }
    }

    #[test]
    fn test_add_and_get() {
        let registry = ConnectionRegistry::in_memory();
        registry.add("prod", params("https://prod")).unwrap();

        let conn = registry.get("prod").unwrap();
        assert_eq!(conn.name, "prod");
        assert_eq!(conn.params.server, "https://prod");
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_add_duplicate_name() {
        let registry = ConnectionRegistry::in_memory();
        registry.add("prod", params("https://a")).unwrap();

        let err = registry.add("prod", params("https://b")).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
        assert!(err.message().contains("already exists"));
        assert_eq!(registry.get("prod").unwrap().params.server, "https://a");
    }

    #[test]
    fn test_add_rejects_empty_fields() {
        let registry = ConnectionRegistry::in_memory();

        assert!(registry.add("", params("https://a")).is_err());

        let mut missing_password = params("https://a");
        missing_password.password = String::new();
        let err = registry.add("x", missing_password).unwrap_err();
        assert!(err.message().contains("Password is required"));

        assert!(registry.add("y", params("  ")).is_err());
        assert!(registry.list().is_empty());
    }

    #[test]
    fn test_remove_clears_default() {
        let registry = ConnectionRegistry::in_memory();
        registry.add("a", params("https://a")).unwrap();
        registry.add("b", params("https://b")).unwrap();
        registry.set_default("a").unwrap();

        registry.remove("a").unwrap();
        assert!(registry.get_default().is_none());
        assert!(registry.default_name().is_none());
        assert!(registry.get("b").is_some());
    }

    #[test]
    fn test_remove_other_keeps_default() {
        let registry = ConnectionRegistry::in_memory();
        registry.add("a", params("https://a")).unwrap();
        registry.add("b", params("https://b")).unwrap();
        registry.set_default("a").unwrap();

        registry.remove("b").unwrap();
        assert_eq!(registry.get_default().unwrap().name, "a");
    }

    #[test]
    fn test_remove_and_set_default_missing() {
        let registry = ConnectionRegistry::in_memory();
        assert!(registry.remove("ghost").unwrap_err().message().contains("not found"));
        assert!(registry.set_default("ghost").unwrap_err().message().contains("not found"));
    }

    #[test]
    fn test_list_sorted_by_name() {
        let registry = ConnectionRegistry::in_memory();
        registry.add("zeta", params("https://z")).unwrap();
        registry.add("alpha", params("https://a")).unwrap();
        registry.add("mid", params("https://m")).unwrap();

        let names: Vec<_> = registry.list().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_failed_save_leaves_registry_unchanged() {
        let registry = ConnectionRegistry::open(FailingStore).unwrap();

        let err = registry.add("prod", params("https://prod")).unwrap_err();
        assert!(err.message().contains("disk full"));
        assert!(registry.get("prod").is_none());
        assert!(registry.list().is_empty());
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        {
            let registry = ConnectionRegistry::open(FileStore::new(&path)).unwrap();
            registry.add("prod", params("https://prod")).unwrap();
            registry.set_default("prod").unwrap();
        }

        let reopened = ConnectionRegistry::open(FileStore::new(&path)).unwrap();
        assert_eq!(reopened.get_default().unwrap().params.server, "https://prod");
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join(CONFIG_FILE_NAME));

        assert_eq!(store.load().unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_file_store_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "{ not json").unwrap();

        let err = FileStore::new(&path).load().unwrap_err();
        assert!(err.message().contains("Invalid config file format"));
    }

    #[test]
    fn test_default_omitted_when_none() {
        let json = serde_json::to_string(&ConfigFile::default()).unwrap();
        assert!(!json.contains("\"default\""));
    }

    #[test]
    fn test_debug_masks_password() {
        let debug = format!("{:?}", params("https://prod"));
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains(PASSWORD_MASK));
    }

    #[test]
    fn test_stored_settings_come_from_file() {
        let mut file = ConfigFile::default();
        file.remote.database = "FromFile".to_string();
        file.server.port = 4000;

        let registry = ConnectionRegistry::open(MemoryStore::with_file(file)).unwrap();
        let settings = registry.stored_settings();
        assert_eq!(settings.remote.database, "FromFile");
        assert_eq!(settings.server.port, 4000);
    }

    #[test]
    fn test_default_location_is_in_config_dir() {
        let (Ok(store), Ok(dir)) = (FileStore::default_location(), config_dir()) else {
            return;
        };
        assert_eq!(store.path(), dir.join(CONFIG_FILE_NAME));
    }
}
