//! The end-session endpoint driven through the axum router.

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use std::sync::Arc;
use tower::ServiceExt;
use url::Url;

use end_session::cache::InMemoryCache;
use end_session::config::ServiceConfig;
use end_session::http::EndSessionServer;
use end_session::service::EndSessionService;

const POST_LOGOUT: &str = "https://app.example.com/signed-out";

fn router() -> Router {
    let mut config = ServiceConfig::default();
    config.end_session.post_logout_redirect_uris = vec![POST_LOGOUT.to_string()];

    let service = EndSessionService::new(
        common::options(),
        Arc::new(InMemoryCache::new()),
        Arc::new(common::token_service()),
    )
    .unwrap();
    EndSessionServer::new(&config, service).unwrap().router()
}

fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, "id.example.com")
        .header("x-forwarded-proto", "https")
        .body(Body::empty())
        .unwrap()
}

fn location(response: &Response<Body>) -> Url {
    let value = response.headers()[header::LOCATION].to_str().unwrap();
    Url::parse(value).unwrap()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_full_logout_round_trip() {
    let app = router();
    let query = format!("post_logout_redirect_uri={POST_LOGOUT}&state=xyz");

    let response = app
        .clone()
        .oneshot(request(Method::GET, &format!("/connect/endsession?{query}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    let compacted = location(&response);
    let request_id = common::request_id_of(&compacted);

    let response = app
        .oneshot(request(
            Method::GET,
            &format!("/connect/endsession?request_id={request_id}"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        location(&response).as_str(),
        "https://app.example.com/signed-out?state=xyz"
    );
}

#[tokio::test]
async fn test_request_id_cannot_be_replayed() {
    let app = router();

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/connect/endsession?state=once"))
        .await
        .unwrap();
    let request_id = common::request_id_of(&location(&response));
    let uri = format!("/connect/endsession?request_id={request_id}");

    let response = app.clone().oneshot(request(Method::GET, &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(request(Method::GET, &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("request_id"));
}

#[tokio::test]
async fn test_unregistered_post_logout_uri_renders_error() {
    let app = router();
    let response = app
        .clone()
        .oneshot(request(
            Method::GET,
            "/connect/endsession?post_logout_redirect_uri=https://evil.example.com/",
        ))
        .await
        .unwrap();
    let request_id = common::request_id_of(&location(&response));

    let response = app
        .oneshot(request(
            Method::GET,
            &format!("/connect/endsession?request_id={request_id}"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response)
        .await
        .contains("post_logout_redirect_uri"));
}

#[tokio::test]
async fn test_post_form_is_accepted() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/connect/endsession")
        .header(header::HOST, "id.example.com")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("state=posted"))
        .unwrap();

    let response = router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        location(&response).path(),
        "/connect/endsession"
    );
}

#[tokio::test]
async fn test_unsupported_method_is_bad_request() {
    let response = router()
        .oneshot(request(Method::DELETE, "/connect/endsession"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response)
        .await
        .contains("The specified HTTP method is not valid."));
}

#[tokio::test]
async fn test_empty_request_signs_out() {
    let response = router()
        .oneshot(request(Method::GET, "/connect/endsession"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
