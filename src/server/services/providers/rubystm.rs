// embed page family: the player page sometimes has the playlist in it, otherwise the `/dl`
// endpoint returns a page with a packed player script
use std::collections::BTreeMap;

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use reqwest::header::{HeaderMap, HeaderValue, REFERER, USER_AGENT};
use tracing::debug;
use url::Url;
use url::form_urlencoded;

use crate::server::services::resolver_services::{
    Fetched, Provider, ProviderKind, ResolveContext, ResolveFailure, ResolveHttp, fetch_text,
};
use crate::server::utils::manifest_extractor::{find_manifest_urls, pick_stream_url};

use super::{host_matches, media_id_from_path};

const HOST_HINTS: &[&str] = &["rubystm", "rubyvid"];

// rotating between a couple of real looking agents is enough to dodge the dumbest bot checks
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

const ID_SEGMENTS: &[&str] = &["e", "d", "v", "embed"];

pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

pub struct RubystmProvider;

impl RubystmProvider {
    /// the player redirects between mirrors, the code on the final url is the one `/dl` accepts
    fn file_code(&self, ctx: &ResolveContext) -> String {
        self.media_id(&ctx.effective_url)
            .unwrap_or_else(|| ctx.media_id.clone())
    }
}

#[async_trait]
impl Provider for RubystmProvider {
    fn name(&self) -> &'static str {
        "rubystm"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::EmbedPage
    }

    fn handles(&self, url: &Url) -> bool {
        host_matches(url, HOST_HINTS)
    }

    fn media_id(&self, url: &Url) -> Option<String> {
        media_id_from_path(url, ID_SEGMENTS)
    }

    fn begin(&self, input: Url, media_id: String) -> ResolveContext {
        ResolveContext::new(input, media_id, random_user_agent())
    }

    async fn primary_fetch(
        &self,
        http: &ResolveHttp,
        ctx: &ResolveContext,
    ) -> Result<Fetched, ResolveFailure> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(ctx.user_agent));
        if let Ok(referer) = HeaderValue::from_str(ctx.input.as_str()) {
            headers.insert(REFERER, referer);
        }

        // the session cookie is often set on one of the mirror redirects
        http.get_following(&ctx.input, headers).await
    }

    fn direct_extract(
        &self,
        ctx: &ResolveContext,
        fetched: &Fetched,
    ) -> Result<Option<String>, ResolveFailure> {
        let candidates = find_manifest_urls(&fetched.body, &ctx.origin);
        debug!(
            "rubystm: {} candidate(s) on the player page",
            candidates.len()
        );
        Ok(pick_stream_url(&candidates).cloned())
    }

    async fn secondary_fetch(
        &self,
        http: &ResolveHttp,
        ctx: &ResolveContext,
    ) -> Option<Result<Fetched, ResolveFailure>> {
        let code = self.file_code(ctx);
        let form = form_urlencoded::Serializer::new(String::new())
            .append_pair("op", "embed")
            .append_pair("file_code", &code)
            .append_pair("auto", "1")
            .append_pair("referer", "")
            .finish();

        let mut request = http
            .client()
            .post(format!("{}/dl", ctx.origin))
            .header("User-Agent", ctx.user_agent)
            .header("Referer", ctx.input.as_str())
            .header("Origin", &ctx.origin)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(form);

        if let Some(cookies) = &ctx.cookies {
            request = request.header("Cookie", cookies);
        }

        debug!("rubystm: posting file code {} to {}/dl", code, ctx.origin);
        Some(fetch_text(request).await)
    }

    fn identity_headers(&self, ctx: &ResolveContext) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("User-Agent".to_string(), ctx.user_agent.to_string()),
            ("Referer".to_string(), format!("{}/", ctx.origin)),
            ("Origin".to_string(), ctx.origin.clone()),
        ])
    }
}
