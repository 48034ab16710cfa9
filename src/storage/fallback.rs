use async_trait::async_trait;

use super::{Backend, MemoryStore, ReadingStore};
use crate::domain::Reading;
use crate::error::StorageResult;

/// wraps the cloud store; a failed write lands in memory instead
///
/// reads and table setup go to the primary only, so readings parked in
/// the fallback are not visible through `list` while the primary is up.
pub struct FallbackStore<P> {
    primary: P,
    fallback: MemoryStore,
}

impl<P: ReadingStore> FallbackStore<P> {
    pub fn new(primary: P, fallback: MemoryStore) -> Self {
        Self { primary, fallback }
    }

    #[cfg(test)]
    pub fn fallback(&self) -> &MemoryStore {
        &self.fallback
    }
}

#[async_trait]
impl<P: ReadingStore> ReadingStore for FallbackStore<P> {
    async fn ensure_ready(&self) -> StorageResult<()> {
        self.primary.ensure_ready().await
    }

    async fn insert(&self, reading: &Reading) -> StorageResult<()> {
        match self.primary.insert(reading).await {
            Ok(()) => {
                tracing::debug!("Data stored in Azure Table Storage: {}", reading.id);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to store {} in Azure ({}), keeping it in memory",
                    reading.id,
                    e
                );
                self.fallback.insert(reading).await?;
                tracing::debug!("{} readings parked in memory", self.fallback.len().await);
                Ok(())
            }
        }
    }

    async fn list(&self, sensor_type: Option<&str>) -> StorageResult<Vec<Reading>> {
        self.primary.list(sensor_type).await
    }

    fn backend(&self) -> Backend {
        self.primary.backend()
    }
}
