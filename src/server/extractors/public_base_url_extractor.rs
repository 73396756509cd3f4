use axum::Extension;
use axum::extract::FromRequestParts;
use axum::http::header::HOST;
use axum::http::request::Parts;
use tracing::debug;

use crate::server::error::Error;
use crate::server::services::AppServices;

/// where this server is reachable from the outside, rewritten playlists and proxy urls hang off it
pub struct PublicBaseUrl(pub String);

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        // proxies chain these as comma separated lists, the first hop is the client facing one
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// configured base url wins, otherwise `<x-forwarded-proto or https>://<x-forwarded-host or host>`
impl<S> FromRequestParts<S> for PublicBaseUrl
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(services): Extension<AppServices> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|err| Error::InternalServerErrorWithContext(err.to_string()))?;

        if let Some(configured) = services.config.public_base_url.as_deref() {
            return Ok(PublicBaseUrl(configured.trim_end_matches('/').to_string()));
        }

        let proto = header_value(parts, "x-forwarded-proto").unwrap_or("https");
        let host = header_value(parts, "x-forwarded-host")
            .or_else(|| header_value(parts, HOST.as_str()))
            .unwrap_or("localhost");

        let base = format!("{}://{}", proto, host);
        debug!("derived public base url {}", base);
        Ok(PublicBaseUrl(base))
    }
}
