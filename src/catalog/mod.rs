pub mod json_catalog;
pub mod model;

pub use json_catalog::JsonCatalog;
pub use model::*;
