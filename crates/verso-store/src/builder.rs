//! Staged adapter construction.
//!
//! An adapter needs three parts: an [`AdapterConfig`], a backend connector,
//! and an [`AdapterEventConsumer`]. The builder validates that all three are
//! present before `build` hands out an adapter; a missing part fails with a
//! configuration error naming it, never a null-style panic later on.

use std::sync::Arc;

use crate::config::AdapterConfig;
use crate::error::{StoreError, StoreResult};
use crate::events::AdapterEventConsumer;
use crate::kv::{KvBackend, NonTransactionalAdapter};
use crate::tx::{TransactionalAdapter, TxBackend};

/// Builder shared by both adapter families; the backend type decides which
/// `build_*` method applies.
pub struct AdapterBuilder<B> {
    config: Option<AdapterConfig>,
    backend: Option<B>,
    events: Option<Arc<dyn AdapterEventConsumer>>,
}

impl<B> AdapterBuilder<B> {
    pub fn new() -> Self {
        Self {
            config: None,
            backend: None,
            events: None,
        }
    }

    pub fn config(mut self, config: AdapterConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn backend(mut self, backend: B) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn event_consumer(mut self, events: Arc<dyn AdapterEventConsumer>) -> Self {
        self.events = Some(events);
        self
    }

    fn take_parts(self) -> StoreResult<(AdapterConfig, B, Arc<dyn AdapterEventConsumer>)> {
        let config = self
            .config
            .ok_or_else(|| StoreError::Config("adapter config not provided".into()))?;
        let backend = self
            .backend
            .ok_or_else(|| StoreError::Config("backend connector not provided".into()))?;
        let events = self
            .events
            .ok_or_else(|| StoreError::Config("event consumer not provided".into()))?;
        Ok((config, backend, events))
    }
}

impl<B> Default for AdapterBuilder<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: KvBackend> AdapterBuilder<B> {
    pub fn build_non_transactional(self) -> StoreResult<NonTransactionalAdapter<B>> {
        let (config, backend, events) = self.take_parts()?;
        Ok(NonTransactionalAdapter::new(config, backend, events))
    }
}

impl<B: TxBackend> AdapterBuilder<B> {
    pub fn build_transactional(self) -> StoreResult<TransactionalAdapter<B>> {
        let (config, backend, events) = self.take_parts()?;
        Ok(TransactionalAdapter::new(config, backend, events))
    }
}
