// SPDX-FileCopyrightText: 2026 Alter Ego Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store wrapper with switchable write failures.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use alterego_core::{
    AdapterType, AlterEgoError, HealthStatus, MemoryRecord, NewRecord, PersistentStore,
    PluginAdapter, Turn,
};

/// Forwards to an inner store; while `fail_writes` is set, every append
/// fails with a storage error before reaching it.
pub struct FlakyStore {
    inner: Arc<dyn PersistentStore>,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn PersistentStore>) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_write(&self) -> Result<(), AlterEgoError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AlterEgoError::storage(std::io::Error::other(
                "disk full (injected)",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for FlakyStore {
    fn name(&self) -> &str {
        "flaky-store"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, AlterEgoError> {
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), AlterEgoError> {
        self.inner.shutdown().await
    }
}

#[async_trait]
impl PersistentStore for FlakyStore {
    async fn initialize(&self, persona: &str) -> Result<(), AlterEgoError> {
        self.inner.initialize(persona).await
    }

    async fn append(&self, persona: &str, record: NewRecord) -> Result<MemoryRecord, AlterEgoError> {
        self.check_write()?;
        self.inner.append(persona, record).await
    }

    async fn append_batch(
        &self,
        persona: &str,
        records: Vec<NewRecord>,
    ) -> Result<Vec<MemoryRecord>, AlterEgoError> {
        self.check_write()?;
        self.inner.append_batch(persona, records).await
    }

    async fn read_transcript(
        &self,
        persona: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Turn>, AlterEgoError> {
        self.inner.read_transcript(persona, limit).await
    }

    async fn read_all_embedded(&self, persona: &str) -> Result<Vec<MemoryRecord>, AlterEgoError> {
        self.inner.read_all_embedded(persona).await
    }

    async fn latest_summary(&self, persona: &str) -> Result<Option<MemoryRecord>, AlterEgoError> {
        self.inner.latest_summary(persona).await
    }

    async fn clear(&self, persona: &str) -> Result<(), AlterEgoError> {
        self.inner.clear(persona).await
    }
}
