//! Kiosk session - the store, clock and config shared by one kiosk
//!
//! Passed explicitly to the coordinator and its background tasks; nothing in
//! the crate reaches for process-wide state, so tests can run many sessions
//! side by side.

use crate::infra::clock::{Clock, SystemClock};
use crate::infra::config::Config;
use crate::store::{StoreError, StoreGateway};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub struct Session {
    store: Arc<dyn StoreGateway>,
    clock: Arc<dyn Clock>,
    config: Config,
}

impl Session {
    pub fn new(config: Config, store: Arc<dyn StoreGateway>) -> Self {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    pub fn with_clock(config: Config, store: Arc<dyn StoreGateway>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock, config }
    }

    pub fn store(&self) -> &dyn StoreGateway {
        self.store.as_ref()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.config.store_timeout_ms())
    }

    /// Run a store call under the session's timeout
    pub async fn bounded<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.store_timeout(), call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.config.store_timeout_ms())),
        }
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}
