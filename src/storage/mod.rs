//! Log entry storage.
//!
//! The storage collaborator is an explicit handle (`Arc<dyn LogStore>`) built
//! by each process's `main` and injected into every server and handler.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

pub mod memory;

#[cfg(feature = "mongodb")]
pub mod mongodb;

pub use memory::MemoryLogStore;

#[cfg(feature = "mongodb")]
pub use self::mongodb::MongoLogStore;

/// Default per-call storage timeout.
pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(15);

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Log entry not found: {0}")]
    NotFound(String),

    #[error("Invalid log entry id: {0}")]
    InvalidId(String),

    #[error("Storage operation timed out after {0:?}")]
    Timeout(Duration),

    #[cfg(feature = "mongodb")]
    #[error("MongoDB error: {0}")]
    Mongo(#[from] ::mongodb::error::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// A persisted log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub name: String,
    pub data: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when writing a new entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLogEntry {
    pub name: String,
    pub data: String,
}

impl NewLogEntry {
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// Outcome of an update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
}

/// Interface for log entry persistence.
///
/// Implementations:
/// - `MemoryLogStore`: in-process storage
/// - `MongoLogStore`: MongoDB storage (feature `mongodb`)
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Store a new entry, stamping `created_at`/`updated_at`. Returns its id.
    async fn insert(&self, entry: NewLogEntry) -> Result<String>;

    /// All entries, newest first.
    async fn all(&self) -> Result<Vec<LogEntry>>;

    /// One entry by id.
    async fn get_one(&self, id: &str) -> Result<LogEntry>;

    /// Overwrite `name` and `data` of the entry with `entry.id`, refreshing `updated_at`.
    async fn update(&self, entry: &LogEntry) -> Result<UpdateOutcome>;

    /// Remove every entry.
    async fn drop_collection(&self) -> Result<()>;
}

/// Run a storage call under a fixed timeout.
pub async fn with_timeout<T, F>(timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| StorageError::Timeout(timeout))?
}

// ============================================================================
// Configuration
// ============================================================================

/// Storage type discriminator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// In-process storage, lost on restart.
    #[default]
    Memory,
    /// MongoDB document storage.
    Mongodb,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage type discriminator.
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    /// Connection URI (MongoDB).
    pub uri: String,
    /// Database name.
    pub database: String,
    /// Collection name.
    pub collection: String,
    /// Username for authenticated deployments.
    pub username: Option<String>,
    /// Password for authenticated deployments.
    pub password: Option<String>,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::Memory,
            uri: "mongodb://mongo:27017".to_string(),
            database: "logs".to_string(),
            collection: "logs".to_string(),
            username: None,
            password: None,
            timeout_secs: DEFAULT_STORAGE_TIMEOUT.as_secs(),
        }
    }
}

impl StorageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Initialize storage based on configuration.
pub async fn init_storage(config: &StorageConfig) -> Result<Arc<dyn LogStore>> {
    info!(storage_type = ?config.storage_type, "Initializing log storage");

    match config.storage_type {
        StorageType::Memory => Ok(Arc::new(MemoryLogStore::new())),
        #[cfg(feature = "mongodb")]
        StorageType::Mongodb => Ok(Arc::new(MongoLogStore::connect(config).await?)),
        #[cfg(not(feature = "mongodb"))]
        StorageType::Mongodb => {
            tracing::error!("MongoDB storage requested but 'mongodb' feature is not enabled");
            Err(StorageError::Backend(
                "MongoDB feature not enabled".to_string(),
            ))
        }
    }
}
