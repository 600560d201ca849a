//! The registry service entry point.

use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};

use crate::config::{IndexInfo, RegistryConfig, ServiceConfig};
use crate::endpoint::EndpointCandidate;
use crate::error::ResolveResult;
use crate::lookup::EndpointResolver;
use crate::trust::{TrustPolicy, TrustResolver};

/// Resolves endpoints and transport trust against a swappable configuration.
///
/// Each call works from a single configuration snapshot, so [`Service::reload`]
/// from another thread never mixes two configurations into one result.
#[derive(Debug)]
pub struct Service<C = ServiceConfig> {
    config: Arc<ArcSwap<C>>,
}

impl<C> Clone for Service<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
        }
    }
}

impl Default for Service {
    fn default() -> Self {
        Self::new(ServiceConfig::default())
    }
}

impl<C> Service<C>
where
    C: RegistryConfig,
{
    /// Create a service from a configuration
    pub fn new(config: C) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    /// Replace the configuration. Calls already in flight finish with the old one.
    pub fn reload(&self, config: C) {
        tracing::debug!("registry configuration reloaded");
        self.config.store(Arc::new(config));
    }

    /// The current configuration snapshot
    pub fn config(&self) -> Guard<Arc<C>> {
        self.config.load()
    }

    /// Endpoints to try when pulling `repo_name`, in order of preference.
    ///
    /// Prefers mirrors over the registry itself, v2 over v1, and HTTPS over
    /// plain HTTP.
    #[tracing::instrument(skip(self))]
    pub fn lookup_pull_endpoints(
        &self,
        repo_name: &str,
    ) -> ResolveResult<Vec<EndpointCandidate>> {
        let config = self.config.load();
        let endpoints = EndpointResolver::new(&**config).pull_endpoints(repo_name)?;
        tracing::debug!(count = endpoints.len(), "resolved pull endpoints");
        Ok(endpoints)
    }

    /// Endpoints to try when pushing `repo_name`, in order of preference.
    ///
    /// Prefers v2 over v1 and HTTPS over plain HTTP. Mirrors are not included.
    #[tracing::instrument(skip(self))]
    pub fn lookup_push_endpoints(
        &self,
        repo_name: &str,
    ) -> ResolveResult<Vec<EndpointCandidate>> {
        let config = self.config.load();
        let endpoints = EndpointResolver::new(&**config).push_endpoints(repo_name)?;
        tracing::debug!(count = endpoints.len(), "resolved push endpoints");
        Ok(endpoints)
    }

    /// Transport trust for `hostname` (`host[:port]`)
    #[tracing::instrument(skip(self))]
    pub fn resolve_trust(&self, hostname: &str) -> ResolveResult<Arc<TrustPolicy>> {
        let config = self.config.load();
        TrustResolver::new(&**config).resolve(hostname)
    }
}

impl Service<ServiceConfig> {
    /// Index metadata for `name`
    pub fn resolve_index(&self, name: &str) -> ResolveResult<IndexInfo> {
        self.config.load().index_info(name)
    }
}
