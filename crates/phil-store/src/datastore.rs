//! Datastore — process-wide connection handle for the load-record store.
//!
//! Holds an explicit connection state instead of a lazily-set global.
//! `connect()` is idempotent: the first call opens the database on the
//! blocking pool, later calls return the already-open store. Queries on a
//! handle that never connected fail with [`StateError::NotConnected`].

use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use phil_core::{BoxError, LoadRecord, LoadStore, WorkerIdentity};

use crate::error::{StateError, StateResult};
use crate::store::StateStore;

/// Where the database lives.
#[derive(Debug, Clone)]
enum Backend {
    File(PathBuf),
    InMemory,
}

impl Backend {
    fn open(&self) -> StateResult<StateStore> {
        match self {
            Backend::File(path) => StateStore::open(path),
            Backend::InMemory => StateStore::open_in_memory(),
        }
    }
}

enum ConnectionState {
    Disconnected,
    Connecting,
    Connected(StateStore),
}

/// Observable view of the connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

pub struct Datastore {
    backend: Backend,
    conn: Mutex<ConnectionState>,
}

impl Datastore {
    /// A handle for an on-disk database. Nothing is opened until `connect()`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: Backend::File(path.into()),
            conn: Mutex::new(ConnectionState::Disconnected),
        }
    }

    /// A handle for an ephemeral database (for testing).
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::InMemory,
            conn: Mutex::new(ConnectionState::Disconnected),
        }
    }

    /// Open the database unless already connected.
    ///
    /// Concurrent callers serialize on the connection lock, so the
    /// database is opened at most once.
    pub async fn connect(&self) -> StateResult<StateStore> {
        let mut conn = self.conn.lock().await;
        if let ConnectionState::Connected(store) = &*conn {
            debug!("datastore already connected");
            return Ok(store.clone());
        }

        *conn = ConnectionState::Connecting;
        let backend = self.backend.clone();
        let opened = tokio::task::spawn_blocking(move || backend.open())
            .await
            .map_err(|e| StateError::Open(e.to_string()))
            .and_then(|r| r);

        match opened {
            Ok(store) => {
                *conn = ConnectionState::Connected(store.clone());
                info!(backend = ?self.backend, "datastore connected");
                Ok(store)
            }
            Err(e) => {
                *conn = ConnectionState::Disconnected;
                warn!(error = %e, "datastore connection failed");
                Err(e)
            }
        }
    }

    pub async fn status(&self) -> ConnectionStatus {
        match &*self.conn.lock().await {
            ConnectionState::Disconnected => ConnectionStatus::Disconnected,
            ConnectionState::Connecting => ConnectionStatus::Connecting,
            ConnectionState::Connected(_) => ConnectionStatus::Connected,
        }
    }

    /// The open store, or `NotConnected`.
    pub async fn store(&self) -> StateResult<StateStore> {
        match &*self.conn.lock().await {
            ConnectionState::Connected(store) => Ok(store.clone()),
            _ => Err(StateError::NotConnected),
        }
    }
}

#[async_trait]
impl LoadStore for Datastore {
    async fn fetch_load_records(
        &self,
        identities: &[WorkerIdentity],
    ) -> Result<Vec<LoadRecord>, BoxError> {
        let store = self.store().await?;
        Ok(store.fetch_load_records(identities)?)
    }

    async fn list_record_keys(&self) -> Result<Vec<WorkerIdentity>, BoxError> {
        let store = self.store().await?;
        Ok(store.list_record_keys()?)
    }

    async fn delete_load_records(&self, keys: &[WorkerIdentity]) -> Result<usize, BoxError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let store = self.store().await?;
        let unique: Vec<WorkerIdentity> = keys
            .iter()
            .collect::<HashSet<_>>()
            .into_iter()
            .cloned()
            .collect();
        Ok(store.delete_load_records(&unique)?)
    }
}
