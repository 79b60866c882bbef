//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! end-session service. All types derive Serde traits for deserialization
//! from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the end-session service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Server identity.
    pub server: ServerConfig,

    /// End-session endpoint behaviour.
    pub end_session: EndSessionConfig,

    /// Token signing and encryption keys.
    pub credentials: CredentialsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Server identity.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Absolute issuer URI. Falls back to the request base URI when unset.
    pub issuer: Option<String>,
}

/// End-session endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EndSessionConfig {
    /// Path the endpoint is served on.
    pub endpoint_path: String,

    /// Cache request parameters server-side and redirect with `request_id`.
    pub enable_request_caching: bool,

    /// Lifetime of a cached request, in seconds.
    pub request_cache_ttl_secs: u64,

    /// Let the host application write the response itself.
    pub enable_passthrough: bool,

    /// Post-logout redirect URIs the demo host application accepts.
    pub post_logout_redirect_uris: Vec<String>,
}

impl Default for EndSessionConfig {
    fn default() -> Self {
        Self {
            endpoint_path: "/connect/endsession".to_string(),
            enable_request_caching: true,
            request_cache_ttl_secs: 3600,
            enable_passthrough: false,
            post_logout_redirect_uris: Vec::new(),
        }
    }
}

/// Symmetric keys, base64 encoded. Both absent means ephemeral keys.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CredentialsConfig {
    /// HMAC signing key (at least 32 bytes).
    pub signing_key: Option<String>,

    /// XChaCha20-Poly1305 encryption key (exactly 32 bytes).
    pub encryption_key: Option<String>,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
