use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use http_body_util::BodyExt;
use newsroom::{app, config::Config, memory::MemoryStore, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &str = "open sesame";
const BOUNDARY: &str = "newsroom-test-boundary";

fn test_app(uploads: &std::path::Path) -> Router {
    let config = Config::for_tests(SECRET, uploads);
    app(AppState::new(config, Arc::new(MemoryStore::new())))
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, bytes.to_vec())
}

fn json_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

fn login_request(path: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn session_from(headers: &HeaderMap) -> String {
    let cookie = headers[header::SET_COOKIE].to_str().unwrap();
    cookie.split(';').next().unwrap().to_string()
}

fn multipart_request(field: &str, filename: &str, data: &[u8], auth: Option<&str>) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(token) = auth {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

#[tokio::test]
async fn login_trims_edges_and_sets_http_only_cookie() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_app(dir.path());

    let (status, headers, body) = send(&router, login_request("/api/auth", json!({ "secret": "  open sesame \n" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), json!({ "success": true }));
    let cookie = headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("newsroom_session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(!cookie.contains(SECRET));

    let (status, _, body) = send(&router, login_request("/api/auth", json!({ "secret": "open  sesame" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(&body), json!({ "error": "Invalid admin secret" }));

    let (status, _, _) = send(&router, login_request("/api/auth", json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_login_alias_accepts_password_field() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_app(dir.path());
    let (status, headers, _) = send(&router, login_request("/api/admin/login", json!({ "password": SECRET }))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.contains_key(header::SET_COOKIE));
}

#[tokio::test]
async fn session_cookie_and_session_bearer_authorize_mutations() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_app(dir.path());

    let (_, headers, _) = send(&router, login_request("/api/auth", json!({ "secret": SECRET }))).await;
    let session = session_from(&headers);
    let token = session.trim_start_matches("newsroom_session=").to_string();

    let article = json!({
        "title": "Cookie Story", "content": "C", "excerpt": "E",
        "image": "/uploads/a.png", "category": "Politics", "author": "A"
    });
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/articles")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, &session)
        .body(Body::from(article.to_string()))
        .unwrap();
    let (status, _, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["slug"], json!("cookie-story"));

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/api/articles/cookie-story")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn forged_cookie_is_rejected_and_logout_clears_it() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_app(dir.path());

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/api/articles/anything")
        .header(header::COOKIE, "newsroom_session=forged.token.value")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(&body), json!({ "error": "Invalid authorization token" }));

    let (status, headers, _) = send(&router, login_request("/api/auth/logout", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let cookie = headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("newsroom_session=;"));
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn missing_admin_secret_fails_closed() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::for_tests(SECRET, dir.path());
    config.admin_secret = None;
    let router = app(AppState::new(config, Arc::new(MemoryStore::new())));

    let (status, _, _) = send(&router, login_request("/api/auth", json!({ "secret": SECRET }))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/api/articles/x")
        .header(header::AUTHORIZATION, format!("Bearer {}", SECRET))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn multipart_upload_is_stored_and_served() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_app(dir.path());

    let (status, _, body) = send(&router, multipart_request("file", "cover.png", b"png-bytes", Some(SECRET))).await;
    assert_eq!(status, StatusCode::OK);
    let url = json_body(&body)["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/uploads/"));
    assert!(url.ends_with(".png"));

    let name = url.trim_start_matches("/uploads/");
    assert_eq!(std::fs::read(dir.path().join(name)).unwrap(), b"png-bytes");

    let request = Request::builder().uri(&url).body(Body::empty()).unwrap();
    let (status, _, served) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(served, b"png-bytes");
}

#[tokio::test]
async fn upload_creates_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("public").join("uploads");
    let router = test_app(&nested);

    let (status, _, _) = send(&router, multipart_request("file", "a.jpg", b"jpg", Some(SECRET))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(nested.is_dir());
}

#[tokio::test]
async fn upload_without_file_field_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_app(dir.path());

    let (status, _, body) = send(&router, multipart_request("avatar", "a.png", b"x", Some(SECRET))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body), json!({ "error": "No file uploaded" }));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/upload")
        .header(header::AUTHORIZATION, format!("Bearer {}", SECRET))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, _, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json_body(&body)["error"].is_string());
}

#[tokio::test]
async fn upload_requires_admin() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_app(dir.path());
    let (status, _, _) = send(&router, multipart_request("file", "a.png", b"x", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn base64_upload_accepts_data_urls() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_app(dir.path());

    let payload = json!({
        "filename": "photo.webp",
        "base64": format!("data:image/webp;base64,{}", STANDARD.encode(b"webp-bytes"))
    });
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/upload/base64")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", SECRET))
        .body(Body::from(payload.to_string()))
        .unwrap();
    let (status, _, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK);
    let url = json_body(&body)["url"].as_str().unwrap().to_string();
    assert!(url.ends_with(".webp"));
    let name = url.trim_start_matches("/uploads/");
    assert_eq!(std::fs::read(dir.path().join(name)).unwrap(), b"webp-bytes");

    let bad = json!({ "filename": "x.png", "base64": "%%%" });
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/upload/base64")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", SECRET))
        .body(Body::from(bad.to_string()))
        .unwrap();
    let (status, _, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
