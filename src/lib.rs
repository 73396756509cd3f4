pub mod catalog;
pub mod config;
pub mod logger;
pub mod server;

pub use catalog::*;
pub use config::*;
pub use logger::*;
pub use server::ApplicationServer;
pub use server::*;
