pub mod app_services;
pub mod discovery_services;
pub mod providers;
pub mod proxy_services;
pub mod resolver_services;

pub use app_services::AppServices;
pub use discovery_services::DynDiscoveryService;
pub use proxy_services::DynProxyService;
pub use resolver_services::DynResolverService;
