use std::collections::BTreeMap;

use serde::Serialize;

use crate::server::services::resolver_services::ResolvedSource;
use crate::server::utils::manifest_rewriter::build_proxy_url;

#[derive(Debug, Serialize)]
pub struct StreamData {
    pub stream_url: String,
    pub proxy_url: String,
    pub headers: BTreeMap<String, String>,
    pub original_url: String,
}

impl StreamData {
    /// the proxy url carries the resolved referer, or the embed url when the provider gave none
    pub fn new(source: ResolvedSource, original_url: &str, proxy_base: &str) -> Self {
        let referer = source.referer().unwrap_or(original_url);
        let proxy_url = build_proxy_url(proxy_base, &source.stream_url, referer);

        Self {
            proxy_url,
            stream_url: source.stream_url,
            headers: source.headers,
            original_url: original_url.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub status: &'static str,
    pub data: StreamData,
}

#[derive(Debug, Serialize)]
pub struct CatalogStreamResponse {
    pub status: &'static str,
    pub tmdb_id: String,
    pub title: Option<String>,
    pub data: StreamData,
}

#[derive(Debug, Serialize)]
pub struct RubystreamData {
    pub original: String,
    pub hls: String,
    pub proxied: String,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct EpisodeSources {
    pub rubystream: RubystreamData,
}

#[derive(Debug, Serialize)]
pub struct EpisodeStreamResponse {
    pub status: &'static str,
    #[serde(rename = "toonUrl")]
    pub toon_url: String,
    pub data: EpisodeSources,
}

impl RubystreamData {
    pub fn new(source: ResolvedSource, embed_url: &str, proxy_base: &str) -> Self {
        let stream = StreamData::new(source, embed_url, proxy_base);
        Self {
            original: stream.original_url,
            hls: stream.stream_url,
            proxied: stream.proxy_url,
            headers: stream.headers,
        }
    }
}
