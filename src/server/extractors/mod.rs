mod public_base_url_extractor;
mod query_extractor;

pub use public_base_url_extractor::*;
pub use query_extractor::*;
