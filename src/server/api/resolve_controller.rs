use axum::{
    Extension, Json, Router,
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::{error, info, warn};

use crate::server::{
    dtos::resolve_dto::{
        CatalogStreamResponse, EpisodeSources, EpisodeStreamResponse, ResolveResponse,
        RubystreamData, StreamData,
    },
    error::{AppResult, Error},
    extractors::{FirstQuery, PublicBaseUrl},
    services::{
        AppServices,
        discovery_services::MediaKind,
        resolver_services::{ProviderKind, ResolveFailure},
    },
};

const CATALOG_CACHE_CONTROL: &str = "s-maxage=300, stale-while-revalidate";

/// a caller supplied url that doesn't parse stays a 400, every other failure is a 502
fn resolve_error(failure: ResolveFailure, message: &str) -> Error {
    match failure {
        ResolveFailure::InvalidUrl(reason) => Error::BadRequest(reason),
        other => upstream_error(other, message),
    }
}

// embed urls we found ourselves (catalog, scraped page) are never the caller's fault
fn upstream_error(failure: ResolveFailure, message: &str) -> Error {
    warn!("{}: {}", message, failure);
    Error::BadGateway(message.to_string())
}

pub struct ResolveController;

impl ResolveController {
    pub fn app() -> Router {
        Router::new()
            .route("/api/resolve", get(Self::resolve))
            .route("/api4", get(Self::catalog_stream))
            .route("/api5", get(Self::episode_stream))
    }

    async fn resolve(
        Extension(services): Extension<AppServices>,
        PublicBaseUrl(proxy_base): PublicBaseUrl,
        query: FirstQuery,
    ) -> AppResult<Json<ResolveResponse>> {
        let embed_url = query
            .get("url")
            .ok_or_else(|| Error::BadRequest("Missing required parameter: url".to_string()))?;

        let source = services
            .resolver
            .resolve(embed_url)
            .await
            .map_err(|f| resolve_error(f, "Failed to extract stream from provider"))?;

        Ok(Json(ResolveResponse {
            status: "success",
            data: StreamData::new(source, embed_url, &proxy_base),
        }))
    }

    async fn catalog_stream(
        Extension(services): Extension<AppServices>,
        PublicBaseUrl(proxy_base): PublicBaseUrl,
        query: FirstQuery,
    ) -> AppResult<Response> {
        let id = query
            .get("id")
            .ok_or_else(|| Error::BadRequest("Missing required parameter: id (TMDB ID)".to_string()))?;

        let entry = services
            .catalog
            .find_by_tmdb_id(id)
            .await
            .map_err(|e| {
                error!("catalog lookup for {} failed: {:#}", id, e);
                Error::InternalServerErrorWithContext("Internal server error".to_string())
            })?
            .ok_or_else(|| Error::NotFound("Movie not found in database".to_string()))?;

        let provider_url = entry
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                Error::InternalServerErrorWithContext("Movie entry missing provider URL".to_string())
            })?;

        let source = services
            .resolver
            .resolve_with(ProviderKind::PlaybackApi, provider_url)
            .await
            .map_err(|f| upstream_error(f, "Failed to extract stream from provider"))?;

        info!("catalog id {} resolved through {}", id, provider_url);

        let body = CatalogStreamResponse {
            status: "success",
            tmdb_id: id.to_string(),
            title: entry.title.clone(),
            data: StreamData::new(source, provider_url, &proxy_base),
        };

        let mut response = Json(body).into_response();
        response.headers_mut().insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(CATALOG_CACHE_CONTROL),
        );
        Ok(response)
    }

    async fn episode_stream(
        Extension(services): Extension<AppServices>,
        PublicBaseUrl(proxy_base): PublicBaseUrl,
        query: FirstQuery,
    ) -> AppResult<Json<EpisodeStreamResponse>> {
        let (Some(id), Some(kind)) = (query.get("id"), query.get("type")) else {
            return Err(Error::BadRequest(
                "Missing required parameters: id and type".to_string(),
            ));
        };

        let kind = match kind {
            "movie" => MediaKind::Movie,
            "tv" => match (query.get("season"), query.get("episode")) {
                (Some(season), Some(episode)) => MediaKind::Episode {
                    season: season.to_string(),
                    episode: episode.to_string(),
                },
                _ => {
                    return Err(Error::BadRequest(
                        "TV episodes require season and episode parameters".to_string(),
                    ));
                }
            },
            _ => return Err(Error::BadRequest("Type must be 'tv' or 'movie'".to_string())),
        };

        let toon_url = services.discovery.page_url(id, &kind);
        let embed_url = services
            .discovery
            .find_embed(&toon_url)
            .await
            .map_err(|e| {
                warn!("{}", e);
                Error::BadGateway("Catalog page unavailable".to_string())
            })?
            .ok_or_else(|| Error::NotFound("No rubystream source found on the page".to_string()))?;

        let source = services
            .resolver
            .resolve_with(ProviderKind::EmbedPage, &embed_url)
            .await
            .map_err(|f| {
                upstream_error(f, "Failed to extract HLS stream from rubystream source")
            })?;

        Ok(Json(EpisodeStreamResponse {
            status: "success",
            toon_url,
            data: EpisodeSources {
                rubystream: RubystreamData::new(source, &embed_url, &proxy_base),
            },
        }))
    }
}
