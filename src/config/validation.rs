//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate URIs (absolute issuer, absolute post-logout redirect URIs)
//! - Validate value ranges (TTL in 1..=MAX_REQUEST_CACHE_TTL_SECS, key sizes)
//! - Validate addresses before the listener binds
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;
use url::Url;

use crate::config::schema::ServiceConfig;
use crate::token::local::{decode_key, ENCRYPTION_KEY_LEN, MIN_SIGNING_KEY_LEN};

/// Upper bound for cached request lifetimes (30 days).
pub const MAX_REQUEST_CACHE_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// A single semantic configuration error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check the configuration, collecting every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("`{}` is not a socket address", config.listener.bind_address),
        ));
    }

    if let Some(issuer) = &config.server.issuer {
        match Url::parse(issuer) {
            Ok(url) if url.query().is_some() || url.fragment().is_some() => {
                errors.push(ValidationError::new(
                    "server.issuer",
                    "must not contain a query or fragment",
                ));
            }
            Ok(_) => {}
            Err(_) => errors.push(ValidationError::new("server.issuer", "must be an absolute URI")),
        }
    }

    let end_session = &config.end_session;
    if !end_session.endpoint_path.starts_with('/') {
        errors.push(ValidationError::new(
            "end_session.endpoint_path",
            "must start with '/'",
        ));
    }
    if end_session.request_cache_ttl_secs == 0 {
        errors.push(ValidationError::new(
            "end_session.request_cache_ttl_secs",
            "must be greater than zero",
        ));
    } else if end_session.request_cache_ttl_secs > MAX_REQUEST_CACHE_TTL_SECS {
        errors.push(ValidationError::new(
            "end_session.request_cache_ttl_secs",
            format!("must not exceed {MAX_REQUEST_CACHE_TTL_SECS}"),
        ));
    }
    for uri in &end_session.post_logout_redirect_uris {
        match Url::parse(uri) {
            Ok(url) if url.fragment().is_some() => errors.push(ValidationError::new(
                "end_session.post_logout_redirect_uris",
                format!("`{uri}` must not contain a fragment"),
            )),
            Ok(_) => {}
            Err(_) => errors.push(ValidationError::new(
                "end_session.post_logout_redirect_uris",
                format!("`{uri}` is not an absolute URI"),
            )),
        }
    }

    let credentials = &config.credentials;
    match (&credentials.signing_key, &credentials.encryption_key) {
        (Some(signing_key), Some(encryption_key)) => {
            match decode_key("signing_key", signing_key) {
                Ok(key) if key.len() < MIN_SIGNING_KEY_LEN => errors.push(ValidationError::new(
                    "credentials.signing_key",
                    format!("must decode to at least {MIN_SIGNING_KEY_LEN} bytes"),
                )),
                Ok(_) => {}
                Err(err) => errors.push(ValidationError::new("credentials.signing_key", err.to_string())),
            }
            match decode_key("encryption_key", encryption_key) {
                Ok(key) if key.len() != ENCRYPTION_KEY_LEN => errors.push(ValidationError::new(
                    "credentials.encryption_key",
                    format!("must decode to exactly {ENCRYPTION_KEY_LEN} bytes"),
                )),
                Ok(_) => {}
                Err(err) => errors.push(ValidationError::new("credentials.encryption_key", err.to_string())),
            }
        }
        (None, None) => {}
        _ => errors.push(ValidationError::new(
            "credentials",
            "signing_key and encryption_key must be configured together",
        )),
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
