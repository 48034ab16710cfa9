//! ==============================================================================
//! storage - where readings go
//! ==============================================================================
//!
//! purpose:
//!     one async trait, `ReadingStore`, with two backends and one decorator:
//!
//!     ┌──────────────────────────────────────────────┐
//!     │ FallbackStore (decorator)                    │
//!     │   insert: TableStore, on error -> memory     │
//!     │   list:   TableStore                         │
//!     │  ┌──────────────┐      ┌──────────────────┐  │
//!     │  │ TableStore   │      │ MemoryStore      │  │
//!     │  │ (azure rest) │      │ (Vec in RwLock)  │  │
//!     │  └──────────────┘      └──────────────────┘  │
//!     └──────────────────────────────────────────────┘
//!
//!     without credentials the api gets a bare MemoryStore.
//!     the choice is made once in `open_store` and never revisited.
//!
//! relationships:
//!     - used by: main.rs (open_store + ensure_ready at startup)
//!     - used by: api.rs (insert / list per request)
//!
//! ==============================================================================

pub mod fallback;
pub mod memory;
pub mod table;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::config::StorageConfig;
use crate::domain::Reading;
use crate::error::StorageResult;

pub use fallback::FallbackStore;
pub use memory::MemoryStore;
pub use table::TableStore;

/// which backend is live, reported by /health
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Cloud,
    Memory,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Cloud => f.write_str("connected"),
            Backend::Memory => f.write_str("using in-memory"),
        }
    }
}

#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// create the backing table if needed; safe to call more than once
    async fn ensure_ready(&self) -> StorageResult<()>;

    async fn insert(&self, reading: &Reading) -> StorageResult<()>;

    /// every reading, or only those in one sensor type partition
    async fn list(&self, sensor_type: Option<&str>) -> StorageResult<Vec<Reading>>;

    fn backend(&self) -> Backend;
}

/// pick the backend for the lifetime of the process
///
/// credentials present -> table store wrapped in the memory fallback.
/// absent or unusable -> plain memory store.
pub fn open_store(config: &StorageConfig) -> Arc<dyn ReadingStore> {
    let Some(credentials) = config.credentials() else {
        tracing::warn!("Azure Storage credentials not found. Using in-memory storage.");
        return Arc::new(MemoryStore::new());
    };

    match TableStore::connect(&credentials, config) {
        Ok(table) => {
            tracing::info!(
                "Using Azure Table Storage: {} (table '{}')",
                table.endpoint(),
                config.table_name
            );
            Arc::new(FallbackStore::new(table, MemoryStore::new()))
        }
        Err(e) => {
            tracing::error!("Azure Storage unusable ({}). Using in-memory storage.", e);
            Arc::new(MemoryStore::new())
        }
    }
}
