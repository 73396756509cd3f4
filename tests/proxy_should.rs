use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use streamrelay::config::AppConfig;
use streamrelay::server::build_router;
use streamrelay::server::services::AppServices;
use streamrelay::server::services::proxy_services::ProxyRequestSpec;
use tower::ServiceExt;
use wiremock::matchers::{header as header_is, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn app() -> Router {
    let config = AppConfig {
        public_base_url: Some("https://proxy".to_string()),
        ..AppConfig::default()
    };
    build_router(AppServices::new(Arc::new(config)))
}

fn proxy_uri(target: &str) -> String {
    format!("/api/proxy?url={}", urlencoding::encode(target))
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn forward_ranges_and_answer_with_partial_content() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/video.mp4"))
        .and(header_is("range", "bytes=0-99"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("Content-Range", "bytes 0-99/1000")
                .insert_header("Content-Type", "video/mp4")
                .set_body_bytes(vec![7u8; 100]),
        )
        .expect(1)
        .mount(&server)
        .await;

    let request = Request::builder()
        .uri(proxy_uri(&format!("{}/video.mp4", server.uri())))
        .header(header::RANGE, "bytes=0-99")
        .body(Body::empty())
        .unwrap();

    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 0-99/1000");
    assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.len(), 100);
}

#[tokio::test]
async fn rewrite_playlists_with_the_target_origin_as_referer() {
    let server = MockServer::start().await;
    let referer = format!("{}/", server.uri());

    Mock::given(method("GET"))
        .and(path("/hls/master.m3u8"))
        .and(header_is("referer", referer.as_str()))
        .and(header_is("origin", server.uri().as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/vnd.apple.mpegurl")
                .set_body_string("#EXTM3U\n#EXTINF:4.0,\nseg1.ts\n"),
        )
        .mount(&server)
        .await;

    let target = format!("{}/hls/master.m3u8", server.uri());
    let request = Request::builder()
        .uri(proxy_uri(&target))
        .body(Body::empty())
        .unwrap();

    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
    assert!(response.headers().get(header::CONTENT_LENGTH).is_none());

    let expected_segment = format!(
        "https://proxy/api/proxy?url={}&referer={}",
        urlencoding::encode(&format!("{}/hls/seg1.ts", server.uri())),
        urlencoding::encode(&referer)
    );
    assert_eq!(
        body_string(response).await,
        format!("#EXTM3U\n#EXTINF:4.0,\n{}\n", expected_segment)
    );
}

#[tokio::test]
async fn relay_segments_as_opaque_bytes_with_long_caching() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hls/seg1.ts"))
        .and(header_is("referer", "https://embed.example/"))
        .and(header_is("origin", "https://embed.example"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "video/mp2t")
                .set_body_bytes(b"segment-bytes".to_vec()),
        )
        .mount(&server)
        .await;

    let uri = format!(
        "{}&referer={}",
        proxy_uri(&format!("{}/hls/seg1.ts", server.uri())),
        urlencoding::encode("https://embed.example/")
    );
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();

    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "public, max-age=31536000, immutable"
    );
    assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
    assert_eq!(body_string(response).await, "segment-bytes");
}

#[tokio::test]
async fn surface_upstream_server_errors_as_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.ts"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let request = Request::builder()
        .uri(proxy_uri(&format!("{}/gone.ts", server.uri())))
        .body(Body::empty())
        .unwrap();

    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_string(response).await, "Upstream error: 503");
}

#[tokio::test]
async fn relay_upstream_client_errors_with_their_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.ts"))
        .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
        .mount(&server)
        .await;

    let request = Request::builder()
        .uri(proxy_uri(&format!("{}/missing.ts", server.uri())))
        .body(Body::empty())
        .unwrap();

    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(response).await, "nope");
}

#[tokio::test]
async fn reject_requests_without_a_url() {
    let request = Request::builder()
        .uri("/api/proxy")
        .body(Body::empty())
        .unwrap();

    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["status"], "error");
    assert_eq!(json["message"], "URL is required");
}

#[tokio::test]
async fn reject_urls_that_do_not_parse() {
    let request = Request::builder()
        .uri("/api/proxy?url=not%20a%20url")
        .body(Body::empty())
        .unwrap();

    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn answer_options_with_open_cors() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/proxy")
        .header(header::ORIGIN, "https://player.example")
        .body(Body::empty())
        .unwrap();

    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[test]
fn treat_triple_encoded_targets_like_single_encoded_ones() {
    let target = "https://cdn.example/hls/master.m3u8?token=a b";
    let once = urlencoding::encode(target).into_owned();
    let thrice = urlencoding::encode(&urlencoding::encode(&once)).into_owned();

    let from_once = ProxyRequestSpec::parse(Some(&once), None, None).unwrap();
    let from_thrice = ProxyRequestSpec::parse(Some(&thrice), None, None).unwrap();

    assert_eq!(from_once.target, from_thrice.target);
    assert_eq!(from_once.target.host_str(), Some("cdn.example"));
}

#[test]
fn strip_stray_quotes_around_the_target() {
    let spec = ProxyRequestSpec::parse(Some("`\"https://cdn.example/a.ts\"`"), None, None).unwrap();
    assert_eq!(spec.target.as_str(), "https://cdn.example/a.ts");
}

#[test]
fn always_use_the_fixed_referer_for_override_hosts() {
    let spec = ProxyRequestSpec::parse(
        Some("https://cdn.play.zephyrflick.top/hls/index.m3u8"),
        Some("https://somewhere.else/page"),
        None,
    )
    .unwrap();

    let identity = spec.identity();
    assert_eq!(identity.referer, "https://play.zephyrflick.top/");
    assert_eq!(identity.origin, None);
}

#[test]
fn derive_origin_from_the_caller_referer() {
    let spec = ProxyRequestSpec::parse(
        Some("https://cdn.example/a.ts"),
        Some("https%3A%2F%2Fembed.example%2Fe%2Fabc"),
        None,
    )
    .unwrap();

    let identity = spec.identity();
    assert_eq!(identity.referer, "https://embed.example/e/abc");
    assert_eq!(identity.origin.as_deref(), Some("https://embed.example"));
}
