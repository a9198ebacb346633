//! A thread-safe in-memory storage for the currently active project
//! configuration. [`ConfigStore`] provides concurrent access for readers
//! (decision calls) and writers (whatever refreshes the datafile).
use std::sync::{Arc, RwLock};

use crate::config::ProjectConfig;

/// `ConfigStore` holds the active [`ProjectConfig`] snapshot.
///
/// The snapshot itself is immutable and can only be replaced fully. Readers
/// clone the `Arc` out and keep using their pinned snapshot even if a writer
/// swaps in a newer one mid-call.
#[derive(Default)]
pub struct ConfigStore {
    config: RwLock<Arc<ProjectConfig>>,
}

impl ConfigStore {
    pub fn new(config: ProjectConfig) -> ConfigStore {
        ConfigStore {
            config: RwLock::new(Arc::new(config)),
        }
    }

    /// Return the active snapshot.
    pub fn config(&self) -> Arc<ProjectConfig> {
        // Err() is possible only if the lock is poisoned (a writer panicked
        // while holding it), which should never happen.
        let config = self
            .config
            .read()
            .expect("thread holding configuration lock should not panic");

        config.clone()
    }

    /// Atomically replace the active snapshot.
    pub fn set_config(&self, config: ProjectConfig) {
        let mut slot = self
            .config
            .write()
            .expect("thread holding configuration lock should not panic");

        *slot = Arc::new(config);
    }
}
