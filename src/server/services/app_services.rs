use std::sync::Arc;

use tracing::info;

use crate::catalog::{DynCatalogRepository, JsonCatalog};
use crate::config::AppConfig;

use super::{
    discovery_services::{DiscoveryService, DynDiscoveryService},
    proxy_services::{DynProxyService, ProxyService},
    resolver_services::{DynResolverService, ResolverService},
};

/// everything a handler can reach, cloned into each request through the extension layer
#[derive(Clone)]
pub struct AppServices {
    pub resolver: DynResolverService,
    pub discovery: DynDiscoveryService,
    pub catalog: DynCatalogRepository,
    pub proxy: DynProxyService,
    pub config: Arc<AppConfig>,
}

impl AppServices {
    pub fn new(config: Arc<AppConfig>) -> Self {
        info!("starting services (stateless, nothing to connect to)...");

        let resolver = Arc::new(ResolverService::new(&config)) as DynResolverService;
        let discovery = Arc::new(DiscoveryService::new(&config)) as DynDiscoveryService;
        let catalog = Arc::new(JsonCatalog::new(&config.catalog_dir)) as DynCatalogRepository;
        let proxy = Arc::new(ProxyService::new(&config));

        info!(
            "resolver, discovery, proxy ok, catalog reads from {}",
            config.catalog_dir
        );

        Self {
            resolver,
            discovery,
            catalog,
            proxy,
            config,
        }
    }

    /// swaps single collaborators, the rest stays as built from the config
    pub fn with_resolver(mut self, resolver: DynResolverService) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_discovery(mut self, discovery: DynDiscoveryService) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn with_catalog(mut self, catalog: DynCatalogRepository) -> Self {
        self.catalog = catalog;
        self
    }
}
