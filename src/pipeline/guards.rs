// ABOUTME: Named mutual-exclusion regions shared by all pipelines of a run.
// ABOUTME: Config init, config read-back, and registry login are each serialized separately.

use std::collections::HashSet;
use tokio::sync::{Mutex, MutexGuard};

/// Registry state protected by the registry-login guard.
#[derive(Debug, Default)]
pub struct RegistrySessions {
    logged_in: HashSet<String>,
    synced_bases: HashSet<String>,
}

impl RegistrySessions {
    pub fn is_logged_in(&self, registry: &str) -> bool {
        self.logged_in.contains(registry)
    }

    pub fn mark_logged_in(&mut self, registry: &str) {
        self.logged_in.insert(registry.to_string());
    }

    pub fn is_base_synced(&self, base: &str) -> bool {
        self.synced_bases.contains(base)
    }

    pub fn mark_base_synced(&mut self, base: &str) {
        self.synced_bases.insert(base.to_string());
    }
}

/// The guards of one run.
///
/// Config guards are optional: pipelines get explicit working directories,
/// so only stores with directory-scoped state need them.
#[derive(Debug)]
pub struct Guards {
    config_init: Option<Mutex<()>>,
    config_read: Option<Mutex<()>>,
    registry_login: Mutex<RegistrySessions>,
}

impl Guards {
    pub fn new(serialize_config: bool) -> Self {
        Self {
            config_init: serialize_config.then(|| Mutex::new(())),
            config_read: serialize_config.then(|| Mutex::new(())),
            registry_login: Mutex::new(RegistrySessions::default()),
        }
    }

    /// Hold while initializing or materializing configuration.
    pub async fn config_init(&self) -> Option<MutexGuard<'_, ()>> {
        match &self.config_init {
            Some(lock) => Some(lock.lock().await),
            None => None,
        }
    }

    /// Hold while reading back deployed configuration.
    pub async fn config_read(&self) -> Option<MutexGuard<'_, ()>> {
        match &self.config_read {
            Some(lock) => Some(lock.lock().await),
            None => None,
        }
    }

    /// Hold while exchanging registry credentials or mirroring base images.
    pub async fn registry_login(&self) -> MutexGuard<'_, RegistrySessions> {
        self.registry_login.lock().await
    }
}
