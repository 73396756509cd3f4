// the relay behind /api/proxy: one upstream GET per request, playlists get rewritten so every
// nested fetch comes back through here, everything else is streamed through untouched
use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::{
    ACCEPT, ACCEPT_RANGES, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, HeaderMap,
    HeaderValue, ORIGIN, RANGE, REFERER, USER_AGENT,
};
use tracing::{debug, error, info};
use url::Url;

use crate::config::AppConfig;
use crate::server::error::{AppResult, Error};
use crate::server::utils::manifest_extractor::MANIFEST_EXTENSION;
use crate::server::utils::manifest_rewriter;
use crate::server::utils::upstream_identity::UpstreamIdentity;
use crate::server::utils::url_utils::{
    decode_repeatedly, is_http, promote_protocol_relative, sanitize,
};

pub type DynProxyService = Arc<ProxyService>;

const MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
const OPAQUE_CONTENT_TYPE: &str = "application/octet-stream";
const SEGMENT_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";
const SEGMENT_EXTENSIONS: &[&str] = &[".ts", ".m4s"];

/// one inbound proxy request after decoding, never changes afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequestSpec {
    pub target: Url,
    pub referer: Option<String>,
    pub range: Option<String>,
}

fn clean_input(raw: &str) -> String {
    promote_protocol_relative(&sanitize(&decode_repeatedly(raw)))
}

impl ProxyRequestSpec {
    /// chained proxies double and triple encode, so decoding happens up to three times before
    /// anything gets parsed
    pub fn parse(
        url_raw: Option<&str>,
        referer_raw: Option<&str>,
        range: Option<&str>,
    ) -> AppResult<Self> {
        let target = url_raw.map(clean_input).unwrap_or_default();
        if target.is_empty() {
            return Err(Error::BadRequest("URL is required".to_string()));
        }

        let target = Url::parse(&target)
            .ok()
            .filter(is_http)
            .ok_or_else(|| Error::BadRequest("Invalid URL".to_string()))?;

        let referer = referer_raw
            .map(|r| sanitize(&decode_repeatedly(r)))
            .filter(|r| !r.is_empty());

        Ok(Self {
            target,
            referer,
            range: range.map(str::to_string),
        })
    }

    pub fn identity(&self) -> UpstreamIdentity {
        UpstreamIdentity::for_target(&self.target, self.referer.as_deref())
    }

    fn has_extension(&self, extension: &str) -> bool {
        self.target.path().ends_with(extension)
    }

    pub fn is_segment(&self) -> bool {
        SEGMENT_EXTENSIONS.iter().any(|ext| self.has_extension(ext))
    }

    pub fn is_manifest_path(&self) -> bool {
        self.has_extension(MANIFEST_EXTENSION)
    }
}

pub enum ProxyBody {
    /// a playlist that already went through the rewriter
    Manifest(String),
    /// anything else, read lazily so a client hanging up drops the upstream fetch too
    Upstream(reqwest::Response),
}

pub struct ProxyReply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ProxyBody,
}

impl std::fmt::Debug for ProxyReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyReply")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

pub struct ProxyService {
    http: reqwest::Client,
}

impl ProxyService {
    pub fn new(config: &AppConfig) -> Self {
        // read timeout instead of a total one, a long segment stream is fine as long as it moves
        let http = reqwest::Client::builder()
            .connect_timeout(config.resolve_timeout())
            .read_timeout(config.proxy_timeout())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { http }
    }

    fn upstream_headers(spec: &ProxyRequestSpec, identity: &UpstreamIdentity) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(identity.user_agent));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

        if let Ok(referer) = HeaderValue::from_str(&identity.referer) {
            headers.insert(REFERER, referer);
        }
        if let Some(origin) = identity
            .origin
            .as_deref()
            .and_then(|o| HeaderValue::from_str(o).ok())
        {
            headers.insert(ORIGIN, origin);
        }
        if let Some(range) = spec
            .range
            .as_deref()
            .and_then(|r| HeaderValue::from_str(r).ok())
        {
            headers.insert(RANGE, range);
        }

        headers
    }

    fn cache_control(spec: &ProxyRequestSpec) -> Option<&'static str> {
        if spec.is_segment() {
            Some(SEGMENT_CACHE_CONTROL)
        } else if spec.is_manifest_path() {
            Some("no-cache")
        } else {
            None
        }
    }

    /// fetches the target with the right upstream identity and shapes the reply
    ///
    /// 5xx from upstream comes back as [`Error::Upstream`], a failed send as
    /// [`Error::ProxyFailure`]; anything below 500 is relayed with its own status
    pub async fn serve(&self, spec: &ProxyRequestSpec, proxy_base: &str) -> AppResult<ProxyReply> {
        let identity = spec.identity();
        debug!(
            "proxying {} with referer {} (range: {:?})",
            spec.target, identity.referer, spec.range
        );

        let response = self
            .http
            .get(spec.target.as_str())
            .headers(Self::upstream_headers(spec, &identity))
            .send()
            .await
            .map_err(|e| {
                error!("upstream request to {} failed: {}", spec.target, e);
                Error::ProxyFailure(e.to_string())
            })?;

        let upstream_status = response.status();
        if upstream_status.is_server_error() {
            return Err(Error::Upstream(upstream_status));
        }

        let upstream_headers = response.headers();
        let upstream_type = upstream_headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let is_manifest = upstream_type
            .as_deref()
            .is_some_and(|t| t.to_ascii_lowercase().contains("mpegurl"))
            || spec.is_manifest_path();

        let mut headers = HeaderMap::new();
        let content_type = match &upstream_type {
            Some(t) => HeaderValue::from_str(t)
                .unwrap_or_else(|_| HeaderValue::from_static(OPAQUE_CONTENT_TYPE)),
            None if is_manifest => HeaderValue::from_static(MANIFEST_CONTENT_TYPE),
            None => HeaderValue::from_static(OPAQUE_CONTENT_TYPE),
        };
        headers.insert(CONTENT_TYPE, content_type);

        if let Some(range) = upstream_headers.get(CONTENT_RANGE) {
            headers.insert(CONTENT_RANGE, range.clone());
        }
        headers.insert(
            ACCEPT_RANGES,
            upstream_headers
                .get(ACCEPT_RANGES)
                .cloned()
                .unwrap_or_else(|| HeaderValue::from_static("bytes")),
        );
        if let Some(cache_control) = Self::cache_control(spec) {
            headers.insert(CACHE_CONTROL, HeaderValue::from_static(cache_control));
        }

        if is_manifest {
            // the rewritten body has a different length, so the upstream one is not forwarded
            let final_url = response.url().clone();
            let text = response.text().await.map_err(|e| {
                error!("reading playlist {} failed: {}", spec.target, e);
                Error::ProxyFailure(e.to_string())
            })?;

            let rewritten =
                manifest_rewriter::rewrite(&text, &final_url, &identity.referer, proxy_base);
            info!(
                "rewrote playlist {} ({} -> {} bytes)",
                spec.target,
                text.len(),
                rewritten.len()
            );

            return Ok(ProxyReply {
                status: upstream_status,
                headers,
                body: ProxyBody::Manifest(rewritten),
            });
        }

        if let Some(length) = upstream_headers.get(CONTENT_LENGTH) {
            headers.insert(CONTENT_LENGTH, length.clone());
        }

        let status = if upstream_status == StatusCode::PARTIAL_CONTENT
            || headers.contains_key(CONTENT_RANGE)
        {
            StatusCode::PARTIAL_CONTENT
        } else {
            upstream_status
        };

        Ok(ProxyReply {
            status,
            headers,
            body: ProxyBody::Upstream(response),
        })
    }
}
