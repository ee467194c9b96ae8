//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::application::services::{ProbeOptions, PruneService, TreeStore};
use crate::config::Settings;
use crate::infrastructure::http::ReqwestHttpClient;
use crate::infrastructure::traits::{FileSystem, HttpClient, RealFileSystem};
use crate::infrastructure::InfraResult;

/// Container holding the I/O boundaries and shared run state.
///
/// The HTTP client is built on demand, read-only commands never create one.
pub struct ServiceContainer {
    /// Application settings (config file + env + CLI overrides)
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Set by the Ctrl-C handler
    pub cancel: Arc<AtomicBool>,

    http: Option<Arc<dyn HttpClient>>,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings, cancel: Arc<AtomicBool>) -> Self {
        Self::with_deps(settings, Arc::new(RealFileSystem), None, cancel)
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(
        settings: Settings,
        fs: Arc<dyn FileSystem>,
        http: Option<Arc<dyn HttpClient>>,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            fs,
            cancel,
            http,
        }
    }

    pub fn tree_store(&self) -> TreeStore {
        TreeStore::new(self.fs.clone())
    }

    pub fn probe_options(&self) -> ProbeOptions {
        self.settings.probe.probe_options()
    }

    /// The injected client, or a reqwest client configured from settings.
    pub fn http_client(&self) -> InfraResult<Arc<dyn HttpClient>> {
        if let Some(http) = &self.http {
            return Ok(http.clone());
        }
        let client = ReqwestHttpClient::new(&self.probe_options().http_config())?;
        Ok(Arc::new(client))
    }

    pub fn prune_service(&self) -> InfraResult<PruneService> {
        Ok(PruneService::new(
            self.fs.clone(),
            self.http_client()?,
            self.probe_options(),
            self.cancel.clone(),
        )?)
    }
}
