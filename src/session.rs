//! Session Manager
//!
//! Process-local state: one cached client per connection key plus an optional current key.
//!
//! # Invariants
//! - At most one client exists per key; it is reused until evicted
//! - The current key, when set, always has a cached client
//! - An ad-hoc client is dropped as soon as another key becomes current
//! - The state lock is never held across an `.await`

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::client::{ClientOptions, ODataClient};
use crate::config::{ConnectionParams, ConnectionRegistry};
use crate::error::{FmodataError, Result};

/// Shared handle to a constructed client
pub type ClientHandle = Arc<ODataClient>;

/// Key of a cached client
///
/// Ad-hoc keys come from a counter and can never equal a registered name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConnectionKey {
    /// A connection registered by name
    Named(String),
    /// An inline-credential session
    AdHoc(u64),
}

impl ConnectionKey {
    pub fn is_ad_hoc(&self) -> bool {
        matches!(self, Self::AdHoc(_))
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::AdHoc(id) => write!(f, "inline_{id}"),
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    clients: HashMap<ConnectionKey, ClientHandle>,
    current: Option<ConnectionKey>,
}

impl SessionState {
    /// Make `key` current; a replaced ad-hoc client can never be selected again, so drop it
    fn select(&mut self, key: ConnectionKey) {
        if let Some(previous) = self.current.replace(key) {
            if previous.is_ad_hoc() && self.current.as_ref() != Some(&previous) {
                self.clients.remove(&previous);
                tracing::debug!(connection = %previous, "Ad-hoc client released");
            }
        }
    }
}

/// Tracks cached clients and the current selection
#[derive(Debug)]
pub struct SessionManager {
    registry: Arc<ConnectionRegistry>,
    defaults: ClientOptions,
    state: Mutex<SessionState>,
    next_ad_hoc: AtomicU64,
}

impl SessionManager {
    pub fn new(registry: Arc<ConnectionRegistry>, defaults: ClientOptions) -> Self {
        Self {
            registry,
            defaults,
            state: Mutex::new(SessionState::default()),
            next_ad_hoc: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Cached client for `name`, or a new one built from the registry and made current
    ///
    /// `options` only apply when a client is constructed.
    pub fn get_or_create_client(&self, name: &str, options: Option<ClientOptions>) -> Result<ClientHandle> {
        let key = ConnectionKey::Named(name.to_string());
        let mut state = self.state.lock();

        if let Some(client) = state.clients.get(&key) {
            return Ok(Arc::clone(client));
        }

        let connection = self
            .registry
            .get(name)
            .ok_or_else(|| FmodataError::config_error(format!("Connection \"{name}\" not found")))?;
        let client = Arc::new(ODataClient::new(&connection.params, options.unwrap_or(self.defaults))?);

        state.clients.insert(key.clone(), Arc::clone(&client));
        state.select(key);
        tracing::info!(connection = name, base_url = %client.base_url(), "Client created");

        Ok(client)
    }

    /// New client from inline credentials, made current; the registry is untouched
    pub fn create_ad_hoc_client(
        &self,
        params: &ConnectionParams,
        options: Option<ClientOptions>,
    ) -> Result<ClientHandle> {
        let client = Arc::new(ODataClient::new(params, options.unwrap_or(self.defaults))?);
        let key = ConnectionKey::AdHoc(self.next_ad_hoc.fetch_add(1, Ordering::Relaxed) + 1);

        let mut state = self.state.lock();
        state.clients.insert(key.clone(), Arc::clone(&client));
        state.select(key.clone());
        tracing::info!(connection = %key, base_url = %client.base_url(), "Ad-hoc client created");

        Ok(client)
    }

    /// Current client, falling back to the registry default
    pub fn get_current_client(&self) -> Result<Option<ClientHandle>> {
        if let Some(client) = self.current().map(|(_, client)| client) {
            return Ok(Some(client));
        }

        let Some(default) = self.registry.get_default() else {
            return Ok(None);
        };

        let client = self.get_or_create_client(&default.name, None)?;
        let mut state = self.state.lock();
        if state.current.is_none() {
            state.select(ConnectionKey::Named(default.name));
        }

        Ok(Some(client))
    }

    /// Make a registered connection current
    pub fn set_current(&self, name: &str) -> Result<ClientHandle> {
        if self.registry.get(name).is_none() {
            return Err(FmodataError::config_error(format!("Connection \"{name}\" not found")));
        }

        let client = self.get_or_create_client(name, None)?;
        self.state.lock().select(ConnectionKey::Named(name.to_string()));
        tracing::info!(connection = name, "Switched connection");

        Ok(client)
    }

    /// Whether a registered connection answers; errors are logged, never returned
    pub async fn test_connection(&self, name: &str) -> bool {
        match self.get_or_create_client(name, None) {
            Ok(client) => client.test_connection().await,
            Err(e) => {
                tracing::error!(connection = name, error = %e, "Connection test failed");
                false
            }
        }
    }

    /// The current key and its client
    pub fn current(&self) -> Option<(ConnectionKey, ClientHandle)> {
        let state = self.state.lock();
        let key = state.current.clone()?;
        let client = state.clients.get(&key).cloned()?;
        Some((key, client))
    }

    pub fn current_key(&self) -> Option<ConnectionKey> {
        self.state.lock().current.clone()
    }

    /// Drop the cached client for `name`, clearing current if it was selected
    pub fn evict(&self, name: &str) {
        let key = ConnectionKey::Named(name.to_string());
        let mut state = self.state.lock();

        if state.clients.remove(&key).is_some() {
            tracing::debug!(connection = name, "Client evicted");
        }
        if state.current.as_ref() == Some(&key) {
            state.current = None;
        }
    }

    pub fn clear_all(&self) {
        let mut state = self.state.lock();
        state.clients.clear();
        state.current = None;
    }
}
