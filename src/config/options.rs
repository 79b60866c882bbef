//! Runtime options derived from the configuration.

use std::time::Duration;
use url::Url;

use crate::config::schema::ServiceConfig;
use crate::error::{EndSessionError, EndSessionResult};

/// End-session options consulted by the pipeline handlers.
#[derive(Debug, Clone)]
pub struct EndSessionOptions {
    /// Configured issuer; `None` means "use the request base URI".
    pub issuer: Option<Url>,
    pub enable_request_caching: bool,
    pub request_cache_ttl: Duration,
    pub enable_passthrough: bool,
}

impl Default for EndSessionOptions {
    fn default() -> Self {
        Self {
            issuer: None,
            enable_request_caching: true,
            request_cache_ttl: Duration::from_secs(3600),
            enable_passthrough: false,
        }
    }
}

impl EndSessionOptions {
    pub fn from_config(config: &ServiceConfig) -> EndSessionResult<Self> {
        let issuer = config
            .server
            .issuer
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|err| EndSessionError::configuration(format!("invalid issuer: {err}")))?;

        Ok(Self {
            issuer,
            enable_request_caching: config.end_session.enable_request_caching,
            request_cache_ttl: Duration::from_secs(config.end_session.request_cache_ttl_secs),
            enable_passthrough: config.end_session.enable_passthrough,
        })
    }
}
