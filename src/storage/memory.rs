use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Backend, ReadingStore};
use crate::domain::Reading;
use crate::error::StorageResult;

/// process-local readings, kept in insertion order
/// cleared only by restarting the process
#[derive(Default)]
pub struct MemoryStore {
    readings: RwLock<Vec<Reading>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.readings.read().await.len()
    }
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn ensure_ready(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn insert(&self, reading: &Reading) -> StorageResult<()> {
        self.readings.write().await.push(reading.clone());
        Ok(())
    }

    async fn list(&self, sensor_type: Option<&str>) -> StorageResult<Vec<Reading>> {
        let readings = self.readings.read().await;
        Ok(match sensor_type {
            Some(t) => readings.iter().filter(|r| r.sensor_type == t).cloned().collect(),
            None => readings.clone(),
        })
    }

    fn backend(&self) -> Backend {
        Backend::Memory
    }
}
