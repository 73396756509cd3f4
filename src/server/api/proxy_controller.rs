// thin adapter, all the decoding and header policy lives in ProxyService
use axum::{
    Extension, Router,
    body::Body,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::debug;

use crate::server::{
    error::AppResult,
    extractors::{FirstQuery, PublicBaseUrl},
    services::{
        AppServices,
        proxy_services::{ProxyBody, ProxyReply, ProxyRequestSpec},
    },
};

pub struct ProxyController;

impl ProxyController {
    pub fn app() -> Router {
        Router::new().route("/", get(Self::proxy_get).options(Self::proxy_options))
    }

    async fn proxy_get(
        Extension(services): Extension<AppServices>,
        PublicBaseUrl(proxy_base): PublicBaseUrl,
        query: FirstQuery,
        headers: HeaderMap,
    ) -> AppResult<Response> {
        let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
        let spec = ProxyRequestSpec::parse(query.get("url"), query.get("referer"), range)?;

        let reply = services.proxy.serve(&spec, &proxy_base).await?;
        debug!("relaying {} with status {}", spec.target, reply.status);

        Ok(Self::into_response(reply))
    }

    fn into_response(reply: ProxyReply) -> Response {
        let body = match reply.body {
            ProxyBody::Manifest(text) => Body::from(text),
            ProxyBody::Upstream(upstream) => Body::from_stream(upstream.bytes_stream()),
        };

        let mut response = Response::new(body);
        *response.status_mut() = reply.status;
        *response.headers_mut() = reply.headers;
        response
    }

    // the cors layer fills in the allow headers
    async fn proxy_options() -> impl IntoResponse {
        StatusCode::OK
    }
}
