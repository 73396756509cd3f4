// embed url -> real stream url + the headers the stream host wants to see
//
// every provider is the same short walk (parse id, primary fetch, try to extract, maybe a
// secondary fetch, extract again), the walk lives here and the providers only fill the steps in
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use reqwest::header::{COOKIE, HeaderMap, LOCATION, SET_COOKIE};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::AppConfig;
use crate::server::utils::manifest_extractor::{find_manifest_urls, pick_stream_url};
use crate::server::utils::packer::unpack_script;
use crate::server::utils::url_utils::origin_of;

use super::providers::{filemoon::FilemoonProvider, rubystm::RubystmProvider};

pub type DynResolverService = Arc<dyn ResolverServiceTrait + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSource {
    pub stream_url: String,
    pub headers: BTreeMap<String, String>,
}

impl ResolvedSource {
    pub fn referer(&self) -> Option<&str> {
        self.headers.get("Referer").map(String::as_str)
    }
}

/// why a resolution came back empty, the http layer treats all of these but `InvalidUrl` the same
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveFailure {
    #[error("invalid embed url: {0}")]
    InvalidUrl(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("malformed upstream response: {0}")]
    MalformedUpstream(String),

    #[error("no stream sources found")]
    NoSources,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// json playback api, optionally encrypted
    PlaybackApi,
    /// html embed page with a download endpoint behind it
    EmbedPage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ParseIdentity,
    PrimaryFetch,
    DirectExtract,
    SecondaryFetch,
    SecondaryExtract,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ParseIdentity => "parse_identity",
            Stage::PrimaryFetch => "primary_fetch",
            Stage::DirectExtract => "direct_extract",
            Stage::SecondaryFetch => "secondary_fetch",
            Stage::SecondaryExtract => "secondary_extract",
        };
        f.write_str(name)
    }
}

/// a fetched upstream body plus what the response told us about the session
#[derive(Debug, Clone)]
pub struct Fetched {
    pub body: String,
    pub final_url: Url,
    pub cookies: Option<String>,
}

/// per-resolution state, starts from the input url and picks up redirects and cookies as the
/// pipeline moves along
#[derive(Debug, Clone)]
pub struct ResolveContext {
    pub input: Url,
    pub media_id: String,
    pub user_agent: &'static str,
    pub effective_url: Url,
    pub origin: String,
    pub cookies: Option<String>,
}

impl ResolveContext {
    pub fn new(input: Url, media_id: String, user_agent: &'static str) -> Self {
        let origin = origin_of(&input).unwrap_or_default();
        Self {
            effective_url: input.clone(),
            input,
            media_id,
            user_agent,
            origin,
            cookies: None,
        }
    }

    fn absorb(&mut self, fetched: &Fetched) {
        if let Some(origin) = origin_of(&fetched.final_url) {
            self.origin = origin;
        }
        self.effective_url = fetched.final_url.clone();
        if fetched.cookies.is_some() {
            self.cookies = fetched.cookies.clone();
        }
    }
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> ProviderKind;

    /// whether this provider recognises the host of an embed url
    fn handles(&self, url: &Url) -> bool;

    fn media_id(&self, url: &Url) -> Option<String>;

    fn begin(&self, input: Url, media_id: String) -> ResolveContext;

    async fn primary_fetch(
        &self,
        http: &ResolveHttp,
        ctx: &ResolveContext,
    ) -> Result<Fetched, ResolveFailure>;

    /// Ok(None) means nothing usable but the pipeline may carry on
    fn direct_extract(
        &self,
        ctx: &ResolveContext,
        fetched: &Fetched,
    ) -> Result<Option<String>, ResolveFailure>;

    /// None when the provider has no secondary endpoint
    async fn secondary_fetch(
        &self,
        _http: &ResolveHttp,
        _ctx: &ResolveContext,
    ) -> Option<Result<Fetched, ResolveFailure>> {
        None
    }

    fn secondary_extract(&self, ctx: &ResolveContext, fetched: &Fetched) -> Option<String> {
        let candidates = find_manifest_urls(&fetched.body, &ctx.origin);
        if let Some(url) = pick_stream_url(&candidates) {
            return Some(url.clone());
        }

        debug!("{}: nothing in the secondary body, trying the packer", self.name());
        let unpacked = unpack_script(&fetched.body)?;
        pick_stream_url(&find_manifest_urls(&unpacked, &ctx.origin)).cloned()
    }

    fn identity_headers(&self, ctx: &ResolveContext) -> BTreeMap<String, String>;
}

enum Step {
    ParseIdentity,
    PrimaryFetch(ResolveContext),
    DirectExtract(ResolveContext, Fetched),
    SecondaryFetch(ResolveContext),
    SecondaryExtract(ResolveContext, Fetched),
}

impl Step {
    fn stage(&self) -> Stage {
        match self {
            Step::ParseIdentity => Stage::ParseIdentity,
            Step::PrimaryFetch(_) => Stage::PrimaryFetch,
            Step::DirectExtract(..) => Stage::DirectExtract,
            Step::SecondaryFetch(_) => Stage::SecondaryFetch,
            Step::SecondaryExtract(..) => Stage::SecondaryExtract,
        }
    }
}

enum Transition {
    Next(Step),
    Done(ResolvedSource),
}

fn finish(provider: &dyn Provider, ctx: &ResolveContext, stream_url: String) -> Transition {
    Transition::Done(ResolvedSource {
        stream_url,
        headers: provider.identity_headers(ctx),
    })
}

async fn advance(
    provider: &dyn Provider,
    http: &ResolveHttp,
    input: &str,
    step: Step,
) -> Result<Transition, ResolveFailure> {
    match step {
        Step::ParseIdentity => {
            let url = Url::parse(input.trim())
                .map_err(|e| ResolveFailure::InvalidUrl(format!("{}: {}", input, e)))?;
            let media_id = provider
                .media_id(&url)
                .ok_or_else(|| ResolveFailure::InvalidUrl(format!("no media id in {}", input)))?;
            Ok(Transition::Next(Step::PrimaryFetch(provider.begin(url, media_id))))
        }
        Step::PrimaryFetch(mut ctx) => {
            let fetched = provider.primary_fetch(http, &ctx).await?;
            ctx.absorb(&fetched);
            Ok(Transition::Next(Step::DirectExtract(ctx, fetched)))
        }
        Step::DirectExtract(ctx, fetched) => match provider.direct_extract(&ctx, &fetched)? {
            Some(stream_url) => Ok(finish(provider, &ctx, stream_url)),
            None => Ok(Transition::Next(Step::SecondaryFetch(ctx))),
        },
        Step::SecondaryFetch(mut ctx) => match provider.secondary_fetch(http, &ctx).await {
            None => Err(ResolveFailure::NoSources),
            Some(result) => {
                let fetched = result?;
                // the download endpoint never hands back a new origin worth switching to
                if fetched.cookies.is_some() {
                    ctx.cookies = fetched.cookies.clone();
                }
                Ok(Transition::Next(Step::SecondaryExtract(ctx, fetched)))
            }
        },
        Step::SecondaryExtract(ctx, fetched) => provider
            .secondary_extract(&ctx, &fetched)
            .map(|stream_url| finish(provider, &ctx, stream_url))
            .ok_or(ResolveFailure::NoSources),
    }
}

/// walks one provider's pipeline to completion, logging the stage it stopped at on failure
pub async fn run_pipeline(
    provider: &dyn Provider,
    http: &ResolveHttp,
    input: &str,
) -> Result<ResolvedSource, ResolveFailure> {
    let mut step = Step::ParseIdentity;

    loop {
        let stage = step.stage();
        match advance(provider, http, input, step).await {
            Ok(Transition::Next(next)) => {
                debug!("{}: {} -> {}", provider.name(), stage, next.stage());
                step = next;
            }
            Ok(Transition::Done(source)) => {
                info!(
                    "{}: resolved {} at {} -> {}",
                    provider.name(),
                    input,
                    stage,
                    source.stream_url
                );
                return Ok(source);
            }
            Err(failure) => {
                warn!(
                    "{}: resolution of {} stopped at {}: {}",
                    provider.name(),
                    input,
                    stage,
                    failure
                );
                return Err(failure);
            }
        }
    }
}

/// `name=value` pairs from every Set-Cookie header, ready to go back out as a Cookie header
pub fn session_cookies(headers: &HeaderMap) -> Option<String> {
    let pairs: Vec<&str> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .map(str::trim)
        .filter(|pair| pair.contains('='))
        .collect();

    (!pairs.is_empty()).then(|| pairs.join("; "))
}

/// merges two Cookie header values, a later pair replaces an earlier one with the same name
pub fn merge_cookies(earlier: Option<String>, later: Option<String>) -> Option<String> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for pair in earlier.iter().chain(later.iter()).flat_map(|c| c.split(';')) {
        let Some((name, value)) = pair.trim().split_once('=') else {
            continue;
        };
        match pairs.iter_mut().find(|(n, _)| n == name) {
            Some(existing) => existing.1 = value.to_string(),
            None => pairs.push((name.to_string(), value.to_string())),
        }
    }

    (!pairs.is_empty()).then(|| {
        pairs
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    })
}

/// sends a request and reads it as text, anything but a 2xx counts as the upstream being gone
pub async fn fetch_text(request: reqwest::RequestBuilder) -> Result<Fetched, ResolveFailure> {
    let response = request
        .send()
        .await
        .map_err(|e| ResolveFailure::UpstreamUnavailable(e.to_string()))?;

    read_fetched(response).await
}

async fn read_fetched(response: reqwest::Response) -> Result<Fetched, ResolveFailure> {
    let status = response.status();
    let final_url = response.url().clone();
    if !status.is_success() {
        return Err(ResolveFailure::UpstreamUnavailable(format!(
            "{} returned {}",
            final_url, status
        )));
    }

    let cookies = session_cookies(response.headers());
    let body = response
        .text()
        .await
        .map_err(|e| ResolveFailure::UpstreamUnavailable(e.to_string()))?;

    Ok(Fetched {
        body,
        final_url,
        cookies,
    })
}

/// http clients for one resolver, the second one never follows redirects so hops can be walked
/// by hand
#[derive(Debug, Clone)]
pub struct ResolveHttp {
    client: reqwest::Client,
    no_redirect: reqwest::Client,
    max_redirects: usize,
}

impl ResolveHttp {
    pub fn new(config: &AppConfig) -> Self {
        let builder = || reqwest::Client::builder().timeout(config.resolve_timeout());

        Self {
            client: builder()
                .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            no_redirect: builder()
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            max_redirects: config.max_redirects,
        }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// GET that follows redirects itself and keeps the Set-Cookie of every hop, not just the
    /// last one; cookies picked up so far go out with the next hop
    pub async fn get_following(
        &self,
        start: &Url,
        headers: HeaderMap,
    ) -> Result<Fetched, ResolveFailure> {
        let mut current = start.clone();
        let mut cookies: Option<String> = None;

        for _ in 0..=self.max_redirects {
            let mut request = self
                .no_redirect
                .get(current.as_str())
                .headers(headers.clone());
            if let Some(cookies) = &cookies {
                request = request.header(COOKIE, cookies);
            }

            let response = request
                .send()
                .await
                .map_err(|e| ResolveFailure::UpstreamUnavailable(e.to_string()))?;

            if !response.status().is_redirection() {
                let mut fetched = read_fetched(response).await?;
                fetched.cookies = merge_cookies(cookies, fetched.cookies.take());
                return Ok(fetched);
            }

            cookies = merge_cookies(cookies, session_cookies(response.headers()));
            let next = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|location| current.join(location).ok())
                .ok_or_else(|| {
                    ResolveFailure::UpstreamUnavailable(format!(
                        "{} redirected without a usable location",
                        current
                    ))
                })?;

            debug!("following redirect {} -> {}", current, next);
            current = next;
        }

        Err(ResolveFailure::UpstreamUnavailable(format!(
            "more than {} redirects from {}",
            self.max_redirects, start
        )))
    }
}

#[automock]
#[async_trait]
pub trait ResolverServiceTrait {
    /// picks a provider from the embed url's host
    async fn resolve(&self, embed_url: &str) -> Result<ResolvedSource, ResolveFailure>;

    /// skips the host check, for callers that already know which site the url belongs to
    async fn resolve_with(
        &self,
        kind: ProviderKind,
        embed_url: &str,
    ) -> Result<ResolvedSource, ResolveFailure>;
}

pub struct ResolverService {
    http: ResolveHttp,
    providers: Vec<Arc<dyn Provider>>,
}

impl ResolverService {
    pub fn new(config: &AppConfig) -> Self {
        // the embed page provider goes last, it's also the fallback for unknown hosts
        Self::with_providers(
            ResolveHttp::new(config),
            vec![Arc::new(FilemoonProvider), Arc::new(RubystmProvider)],
        )
    }

    pub fn with_providers(http: ResolveHttp, providers: Vec<Arc<dyn Provider>>) -> Self {
        Self { http, providers }
    }

    fn provider_for(&self, embed_url: &str) -> Option<&Arc<dyn Provider>> {
        let by_host = Url::parse(embed_url.trim())
            .ok()
            .and_then(|url| self.providers.iter().find(|p| p.handles(&url)));

        by_host.or_else(|| {
            self.providers
                .iter()
                .rev()
                .find(|p| p.kind() == ProviderKind::EmbedPage)
        })
    }
}

#[async_trait]
impl ResolverServiceTrait for ResolverService {
    async fn resolve(&self, embed_url: &str) -> Result<ResolvedSource, ResolveFailure> {
        let provider = self
            .provider_for(embed_url)
            .ok_or_else(|| ResolveFailure::InvalidUrl(format!("no provider for {}", embed_url)))?;

        run_pipeline(provider.as_ref(), &self.http, embed_url).await
    }

    async fn resolve_with(
        &self,
        kind: ProviderKind,
        embed_url: &str,
    ) -> Result<ResolvedSource, ResolveFailure> {
        let provider = self
            .providers
            .iter()
            .find(|p| p.kind() == kind)
            .ok_or_else(|| ResolveFailure::InvalidUrl(format!("no {:?} provider", kind)))?;

        run_pipeline(provider.as_ref(), &self.http, embed_url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routed_kind(url: &str) -> Option<ProviderKind> {
        ResolverService::new(&AppConfig::default())
            .provider_for(url)
            .map(|p| p.kind())
    }

    #[test]
    fn routes_by_host_with_the_embed_page_as_fallback() {
        assert_eq!(
            routed_kind("https://filemoon.to/e/abc123"),
            Some(ProviderKind::PlaybackApi)
        );
        assert_eq!(
            routed_kind("https://rubystm.com/e/abc123"),
            Some(ProviderKind::EmbedPage)
        );
        assert_eq!(
            routed_kind("https://unknown.example/e/abc123"),
            Some(ProviderKind::EmbedPage)
        );
        assert_eq!(routed_kind("not a url"), Some(ProviderKind::EmbedPage));
    }

    #[test]
    fn later_cookies_replace_earlier_ones_by_name() {
        assert_eq!(
            merge_cookies(Some("a=1; b=2".to_string()), Some("b=3; c=4".to_string())).as_deref(),
            Some("a=1; b=3; c=4")
        );
        assert_eq!(merge_cookies(None, None), None);
    }
}
