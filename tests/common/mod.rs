//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::http::Method;
use std::sync::Arc;
use url::Url;

use end_session::cache::InMemoryCache;
use end_session::config::EndSessionOptions;
use end_session::protocol::HttpRequestData;
use end_session::service::EndSessionService;
use end_session::token::LocalTokenService;

pub const ISSUER: &str = "https://id.example.com/";
pub const ENDPOINT: &str = "https://id.example.com/connect/endsession";

/// Fixed keys so tokens from one service validate in another.
pub fn token_service() -> LocalTokenService {
    LocalTokenService::new(&[7u8; 32], &[9u8; 32]).unwrap()
}

pub fn options() -> EndSessionOptions {
    EndSessionOptions {
        issuer: Some(Url::parse(ISSUER).unwrap()),
        ..Default::default()
    }
}

/// Service, cache and tokens wired together with the built-in pipeline.
pub struct Harness {
    pub service: EndSessionService,
    pub cache: Arc<InMemoryCache>,
    pub tokens: Arc<LocalTokenService>,
}

pub fn harness_with(options: EndSessionOptions) -> Harness {
    let cache = Arc::new(InMemoryCache::new());
    let tokens = Arc::new(token_service());
    let service = EndSessionService::new(options, cache.clone(), tokens.clone()).unwrap();
    Harness {
        service,
        cache,
        tokens,
    }
}

pub fn harness() -> Harness {
    harness_with(options())
}

/// A GET request to the endpoint with the given query pairs.
pub fn get(pairs: &[(&str, &str)]) -> HttpRequestData {
    let mut uri = Url::parse(ENDPOINT).unwrap();
    if !pairs.is_empty() {
        uri.query_pairs_mut().extend_pairs(pairs.iter().copied());
    }
    HttpRequestData::new(Method::GET).with_request_uri(uri)
}

/// A POST request to the endpoint with the given form pairs.
pub fn post(pairs: &[(&str, &str)]) -> HttpRequestData {
    let form = pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    HttpRequestData::new(Method::POST)
        .with_request_uri(Url::parse(ENDPOINT).unwrap())
        .with_form(form)
}

/// The `request_id` carried by a compacted redirect location.
pub fn request_id_of(location: &Url) -> String {
    location
        .query_pairs()
        .find(|(name, _)| name == "request_id")
        .map(|(_, value)| value.into_owned())
        .expect("redirect carries a request_id")
}
