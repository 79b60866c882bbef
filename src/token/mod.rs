//! Token service collaborator.
//!
//! # Data Flow
//! ```text
//! ClaimSet + TokenDescriptor
//!     → sign (JWS) → encrypt → opaque token string
//!
//! opaque token string + TokenValidationParameters
//!     → decrypt → verify signature, issuer, audience, expiry → check type
//!     → ClaimSet
//! ```
//!
//! # Design Decisions
//! - The token type is a private claim, so a token issued for another
//!   purpose (e.g. an access token) never validates as a cached request
//! - Validation failures and backend failures are distinct error kinds

use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;
use thiserror::Error;

pub mod claims;
pub mod local;

pub use claims::{Claim, ClaimSet};
pub use local::LocalTokenService;

/// Private token type markers.
pub mod token_types {
    /// Cached end-session request.
    pub const END_SESSION_REQUEST: &str = "end_session_request";
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const ID_TOKEN: &str = "id_token";
}

/// What to put around the claims when creating a token.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenDescriptor {
    pub issuer: String,
    pub audience: String,
    pub token_type: String,
    pub lifetime: Duration,
}

/// What a token must match to be accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenValidationParameters {
    pub issuer: String,
    pub audience: String,
    pub token_type: String,
}

/// Errors raised by a token service.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is malformed: {0}")]
    Malformed(String),

    #[error("token could not be decrypted")]
    Decryption,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token issuer is invalid")]
    InvalidIssuer,

    #[error("token audience is invalid")]
    InvalidAudience,

    #[error("token has expired")]
    Expired,

    #[error("token type mismatch: expected {expected}, got {actual}")]
    InvalidType { expected: String, actual: String },

    #[error("token claims are invalid: {0}")]
    InvalidClaims(String),

    /// The signing/encryption backend itself failed.
    #[error("token backend error: {0}")]
    Backend(String),
}

impl TokenError {
    /// True if the failure says nothing about the token itself.
    pub fn is_backend(&self) -> bool {
        matches!(self, TokenError::Backend(_))
    }
}

/// Signs and encrypts claim sets, and validates the resulting tokens.
#[async_trait]
pub trait TokenService: Send + Sync + Debug {
    async fn sign_and_encrypt(
        &self,
        claims: &ClaimSet,
        descriptor: &TokenDescriptor,
    ) -> Result<String, TokenError>;

    async fn validate(
        &self,
        token: &str,
        parameters: &TokenValidationParameters,
    ) -> Result<ClaimSet, TokenError>;
}
