//! Conversion from axum requests to [`HttpRequestData`].
//!
//! # Responsibilities
//! - Rebuild the absolute request URI from the scheme and `Host` header
//! - Read `application/x-www-form-urlencoded` bodies of POST requests
//!
//! # Design Decisions
//! - `X-Forwarded-Proto` is trusted for the scheme; TLS terminates upstream
//! - Bodies are capped at [`MAX_FORM_BYTES`]

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request};
use thiserror::Error;
use url::Url;

use crate::protocol::HttpRequestData;

/// Largest form body accepted on the end-session endpoint.
pub const MAX_FORM_BYTES: usize = 64 * 1024;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("request has no host")]
    MissingHost,

    #[error("invalid request URI: {0}")]
    InvalidUri(#[from] url::ParseError),

    #[error("failed to read request body: {0}")]
    Body(String),
}

fn header_str<'a>(headers: &'a HeaderMap, name: impl header::AsHeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Absolute URI of the request as seen by the client.
pub fn absolute_uri<B>(request: &Request<B>) -> Result<Url, AdapterError> {
    let headers = request.headers();
    let scheme = header_str(headers, X_FORWARDED_PROTO)
        .and_then(|proto| proto.split(',').next())
        .map(str::trim)
        .filter(|proto| !proto.is_empty())
        .or_else(|| request.uri().scheme_str())
        .unwrap_or("http");

    let host = header_str(headers, header::HOST)
        .or_else(|| request.uri().authority().map(|authority| authority.as_str()))
        .ok_or(AdapterError::MissingHost)?;

    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    Ok(Url::parse(&format!("{scheme}://{host}{path}"))?)
}

fn is_form(headers: &HeaderMap) -> bool {
    header_str(headers, header::CONTENT_TYPE)
        .map(|value| value.split(';').next().unwrap_or_default().trim())
        .is_some_and(|mime| mime.eq_ignore_ascii_case(FORM_CONTENT_TYPE))
}

/// Build the transport-neutral view of an inbound request.
pub async fn to_request_data(request: Request<Body>) -> Result<HttpRequestData, AdapterError> {
    let uri = absolute_uri(&request)?;
    let method = request.method().clone();
    let read_form = method == Method::POST && is_form(request.headers());

    let mut data = HttpRequestData::new(method).with_request_uri(uri);
    if read_form {
        let bytes = axum::body::to_bytes(request.into_body(), MAX_FORM_BYTES)
            .await
            .map_err(|err| AdapterError::Body(err.to_string()))?;
        let form = url::form_urlencoded::parse(&bytes)
            .map(|(name, value)| (name.into_owned(), value.into_owned()))
            .collect();
        data = data.with_form(form);
    }

    Ok(data)
}
