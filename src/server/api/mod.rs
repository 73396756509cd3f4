pub mod health_controller;
pub mod proxy_controller;
pub mod resolve_controller;
