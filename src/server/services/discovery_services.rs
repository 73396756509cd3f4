// finds the rubystm embed on a toonstream page, the page itself is just a lookup table for us
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::server::utils::url_utils::normalize_escapes;

pub type DynDiscoveryService = Arc<dyn DiscoveryServiceTrait + Send + Sync>;

const PAGE_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const PAGE_TIMEOUT: Duration = Duration::from_secs(8);

static EMBED_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https://rubystm\.com/(?:e|embed|d|v)/[a-zA-Z0-9]+[^\s"'<>]*"#)
        .expect("embed regex should compile")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaKind {
    Movie,
    Episode { season: String, episode: String },
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("catalog page unavailable: {0}")]
    PageUnavailable(String),
}

/// `<base>/episode/<id>-<season>x<episode>/` or `<base>/movies/<id>/`
pub fn build_page_url(base: &str, id: &str, kind: &MediaKind) -> String {
    let base = base.trim_end_matches('/');
    match kind {
        MediaKind::Movie => format!("{}/movies/{}/", base, id),
        MediaKind::Episode { season, episode } => {
            format!("{}/episode/{}-{}x{}/", base, id, season, episode)
        }
    }
}

/// first embed url on the page, after undoing the usual escaping
pub fn find_embed_url(html: &str) -> Option<String> {
    let normalized = normalize_escapes(html);
    EMBED_REGEX
        .find(&normalized)
        .map(|m| m.as_str().to_string())
}

#[automock]
#[async_trait]
pub trait DiscoveryServiceTrait {
    fn page_url(&self, id: &str, kind: &MediaKind) -> String;

    /// Ok(None) when the page loaded but carries no embed
    async fn find_embed(&self, page_url: &str) -> Result<Option<String>, DiscoveryError>;
}

pub struct DiscoveryService {
    http: reqwest::Client,
    base_url: String,
}

impl DiscoveryService {
    pub fn new(config: &AppConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(PAGE_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url: config.toonstream_base_url.clone(),
        }
    }
}

#[async_trait]
impl DiscoveryServiceTrait for DiscoveryService {
    fn page_url(&self, id: &str, kind: &MediaKind) -> String {
        build_page_url(&self.base_url, id, kind)
    }

    async fn find_embed(&self, page_url: &str) -> Result<Option<String>, DiscoveryError> {
        debug!("fetching catalog page {}", page_url);

        let response = self
            .http
            .get(page_url)
            .header("User-Agent", PAGE_USER_AGENT)
            .send()
            .await
            .map_err(|e| DiscoveryError::PageUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!("catalog page {} returned {}", page_url, status);
            return Err(DiscoveryError::PageUnavailable(format!(
                "{} returned {}",
                page_url, status
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| DiscoveryError::PageUnavailable(e.to_string()))?;

        Ok(find_embed_url(&html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn episode_page_url() {
        let kind = MediaKind::Episode {
            season: "1".to_string(),
            episode: "2".to_string(),
        };
        assert_eq!(
            build_page_url("https://toon.example/", "show-117933", &kind),
            "https://toon.example/episode/show-117933-1x2/"
        );
    }

    #[test]
    fn escaped_embed_is_found() {
        let html = r#"<iframe data-src="https:\/\/rubystm.com\/e\/abc123?x=1&amp;y=2"></iframe>"#;
        assert_eq!(
            find_embed_url(html).as_deref(),
            Some("https://rubystm.com/e/abc123?x=1&y=2")
        );
    }
}
