//! A thread-safe in-memory storage for the currently active configuration. [`ConfigurationStore`]
//! provides concurrent access for readers (e.g., flag evaluation) and writers (e.g., periodic
//! configuration fetcher).

use std::sync::{Arc, RwLock};

use crate::configuration::Configuration;

/// `ConfigurationStore` provides a thread-safe (`Sync`) storage for Eppo configuration that
/// allows concurrent access for readers and writers.
///
/// `Configuration` itself is always immutable and can only be replaced fully: readers clone a
/// cheap `Arc` handle and never observe a partially updated document.
#[derive(Default)]
pub struct ConfigurationStore {
    configuration: RwLock<Option<Arc<Configuration>>>,
}

impl ConfigurationStore {
    pub fn new() -> Self {
        ConfigurationStore::default()
    }

    /// Returns the currently active configuration, or `None` if none has been installed yet.
    pub fn get_configuration(&self) -> Option<Arc<Configuration>> {
        // self.configuration.read() should always return Ok(). Err() is possible only if the
        // lock is poisoned (writer panicked while holding the lock), which should never happen.
        let configuration = self
            .configuration
            .read()
            .expect("thread holding configuration lock should not panic");

        configuration.clone()
    }

    /// Set new configuration.
    pub fn set_configuration(&self, config: Arc<Configuration>) {
        let mut configuration_slot = self
            .configuration
            .write()
            .expect("thread holding configuration lock should not panic");

        *configuration_slot = Some(config);
    }
}
