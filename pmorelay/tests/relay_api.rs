//! Integration tests for the relay HTTP API

#![cfg(feature = "pmoserver")]

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use pmorelay::{PreviewResolver, RelayExt, StreamRelay};
use pmoserver::ServerBuilder;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{header as header_eq, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Router with the relay mounted, the catalog pointing at `catalog_base`
async fn relay_router(catalog_base: &str) -> axum::Router {
    let mut server = ServerBuilder::new("Test", "localhost", 0).build();
    let relay = StreamRelay::builder().build().unwrap();
    let resolver = PreviewResolver::new(catalog_base, "test_app_id", "test_token").unwrap();
    server.init_stream_relay_with(relay, resolver).await.unwrap();
    server.router().await
}

async fn get(router: axum::Router, uri: &str) -> axum::response::Response {
    router
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_missing_url_is_rejected() {
    let router = relay_router("http://127.0.0.1:1").await;

    let response = get(router, "/api/relay/stream").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await, json!({"error": "URL is required"}));
}

#[tokio::test]
async fn test_invalid_url_is_rejected() {
    let router = relay_router("http://127.0.0.1:1").await;

    let response = get(router, "/api/relay/stream?url=not-a-url").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await, json!({"error": "Invalid URL"}));
}

#[tokio::test]
async fn test_body_is_relayed_verbatim() {
    let mock_server = MockServer::start().await;
    let payload: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();

    Mock::given(method("GET"))
        .and(path("/track.flac"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/octet-stream")
                .set_body_bytes(payload.clone()),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let router = relay_router("http://127.0.0.1:1").await;
    let uri = format!("/api/relay/stream?url={}/track.flac", mock_server.uri());
    let response = get(router, &uri).await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    // the relay sets its own content type regardless of the origin's
    assert_eq!(headers[header::CONTENT_TYPE], "audio/flac");
    assert_eq!(headers[header::CONTENT_LENGTH], "10000");
    assert_eq!(headers[header::ACCEPT_RANGES], "bytes");

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.as_ref(), payload.as_slice());
}

#[tokio::test]
async fn test_upstream_status_is_passed_through() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/404.flac"))
        .respond_with(ResponseTemplate::new(404).set_body_string("secret upstream page"))
        .mount(&mock_server)
        .await;

    let router = relay_router("http://127.0.0.1:1").await;
    let uri = format!("/api/relay/stream?url={}/404.flac", mock_server.uri());
    let response = get(router, &uri).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Failed to fetch audio"})
    );
}

#[tokio::test]
async fn test_server_error_upstream_is_passed_through() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let router = relay_router("http://127.0.0.1:1").await;
    let uri = format!("/api/relay/stream?url={}/busy.flac", mock_server.uri());
    let response = get(router, &uri).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_transport_failure_is_500() {
    let router = relay_router("http://127.0.0.1:1").await;

    // nothing listens on port 1
    let response = get(router, "/api/relay/stream?url=http://127.0.0.1:1/track.flac").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Failed to stream audio"})
    );
}

#[tokio::test]
async fn test_preview_resolution() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/track/getFileUrl"))
        .and(query_param("track_id", "12345"))
        .and(query_param("format_id", "5"))
        .and(header_eq("X-App-Id", "test_app_id"))
        .and(header_eq("X-User-Auth-Token", "test_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "track_id": 12345,
            "url": "https://streaming.example/12345.mp3",
            "mime_type": "audio/mpeg"
        })))
        .mount(&mock_server)
        .await;

    let router = relay_router(&mock_server.uri()).await;
    let response = get(router, "/api/relay/preview?trackId=12345").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"previewUrl": "https://streaming.example/12345.mp3"})
    );
}

#[tokio::test]
async fn test_preview_without_track_id() {
    let router = relay_router("http://127.0.0.1:1").await;

    let response = get(router, "/api/relay/preview").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Track ID is required"})
    );
}

#[tokio::test]
async fn test_preview_catalog_refusal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/track/getFileUrl"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "status": "error",
            "code": 401,
            "message": "User authentication is required."
        })))
        .mount(&mock_server)
        .await;

    let router = relay_router(&mock_server.uri()).await;
    let response = get(router, "/api/relay/preview?trackId=1").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Failed to get preview URL"})
    );
}

#[tokio::test]
async fn test_preview_without_url_field() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/track/getFileUrl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"track_id": 1})))
        .mount(&mock_server)
        .await;

    let router = relay_router(&mock_server.uri()).await;
    let response = get(router, "/api/relay/preview?trackId=1").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let router = relay_router("http://127.0.0.1:1").await;

    let response = get(router, "/api-docs/relay.json").await;

    assert_eq!(response.status(), StatusCode::OK);
    let doc = json_body(response).await;
    assert!(doc["paths"].get("/stream").is_some());
    assert!(doc["paths"].get("/preview").is_some());
}
