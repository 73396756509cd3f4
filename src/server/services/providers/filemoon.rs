// playback api family: the embed page is skipped entirely, its json api hands back either a
// plain source list or an aes-gcm sealed one
use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::server::services::resolver_services::{
    Fetched, Provider, ProviderKind, ResolveContext, ResolveFailure, ResolveHttp, fetch_text,
};
use crate::server::utils::manifest_extractor::MANIFEST_EXTENSION;
use crate::server::utils::playback_crypto::EncryptedPlayback;
use crate::server::utils::url_utils::{is_http, origin_of};

use super::{host_matches, media_id_from_path};

const HOST_HINTS: &[&str] = &["filemoon"];

const API_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackSource {
    pub file: Option<String>,
    pub url: Option<String>,
}

impl PlaybackSource {
    pub fn location(&self) -> Option<&str> {
        self.file
            .as_deref()
            .or(self.url.as_deref())
            .filter(|l| !l.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct PlaybackResponse {
    #[serde(default)]
    sources: Vec<PlaybackSource>,
    playback: Option<EncryptedPlayback>,
}

#[derive(Debug, Deserialize)]
struct DecryptedPlayback {
    #[serde(default)]
    sources: Vec<PlaybackSource>,
}

/// first source pointing at a playlist, else whatever came first
pub fn pick_source(sources: &[PlaybackSource]) -> Option<&str> {
    sources
        .iter()
        .find(|s| s.location().is_some_and(|l| l.contains(MANIFEST_EXTENSION)))
        .or_else(|| sources.first())
        .and_then(PlaybackSource::location)
}

pub struct FilemoonProvider;

impl FilemoonProvider {
    fn input_origin(ctx: &ResolveContext) -> String {
        origin_of(&ctx.input).unwrap_or_else(|| ctx.origin.clone())
    }

    /// sources may be root-relative to the embed host, only http(s) results count
    fn absolute_location(ctx: &ResolveContext, location: &str) -> Option<String> {
        Url::parse(&Self::input_origin(ctx))
            .and_then(|base| base.join(location))
            .ok()
            .filter(is_http)
            .map(String::from)
    }

    fn sealed_sources(playback: &EncryptedPlayback) -> Vec<PlaybackSource> {
        // a bad tag and a missing feature look the same from here, both end up as no sources
        match playback
            .decrypt()
            .and_then(|json| Ok(serde_json::from_value::<DecryptedPlayback>(json)?))
        {
            Ok(decrypted) => decrypted.sources,
            Err(e) => {
                debug!("filemoon: playback envelope unusable: {}", e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Provider for FilemoonProvider {
    fn name(&self) -> &'static str {
        "filemoon"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::PlaybackApi
    }

    fn handles(&self, url: &Url) -> bool {
        host_matches(url, HOST_HINTS)
    }

    fn media_id(&self, url: &Url) -> Option<String> {
        media_id_from_path(url, &["e", "d"])
    }

    fn begin(&self, input: Url, media_id: String) -> ResolveContext {
        ResolveContext::new(input, media_id, API_USER_AGENT)
    }

    async fn primary_fetch(
        &self,
        http: &ResolveHttp,
        ctx: &ResolveContext,
    ) -> Result<Fetched, ResolveFailure> {
        let api_url = format!(
            "{}/api/videos/{}/embed/playback",
            Self::input_origin(ctx),
            ctx.media_id
        );
        debug!("filemoon: calling playback api {}", api_url);

        fetch_text(
            http.client()
                .get(&api_url)
                .header("User-Agent", ctx.user_agent)
                .header("Referer", ctx.input.as_str())
                .header("X-Requested-With", "XMLHttpRequest"),
        )
        .await
    }

    fn direct_extract(
        &self,
        ctx: &ResolveContext,
        fetched: &Fetched,
    ) -> Result<Option<String>, ResolveFailure> {
        let response: PlaybackResponse = serde_json::from_str(&fetched.body)
            .map_err(|e| ResolveFailure::MalformedUpstream(format!("playback json: {}", e)))?;

        let sources = if !response.sources.is_empty() {
            response.sources
        } else if let Some(playback) = &response.playback {
            Self::sealed_sources(playback)
        } else {
            Vec::new()
        };

        Ok(pick_source(&sources).and_then(|location| Self::absolute_location(ctx, location)))
    }

    fn identity_headers(&self, ctx: &ResolveContext) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("User-Agent".to_string(), ctx.user_agent.to_string()),
            (
                "Referer".to_string(),
                format!("{}/", Self::input_origin(ctx)),
            ),
        ])
    }
}
