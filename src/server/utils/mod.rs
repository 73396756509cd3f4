pub mod manifest_extractor;
pub mod manifest_rewriter;
pub mod packer;
pub mod playback_crypto;
pub mod upstream_identity;
pub mod url_utils;
