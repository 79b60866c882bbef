//! Fatal error type for an end-session exchange.
//!
//! Protocol rejections (`invalid_request` and friends) are *not* errors at
//! this level: they are recorded on the pipeline context as a
//! [`ProtocolError`](crate::protocol::ProtocolError) and rendered as a
//! response. Everything here aborts the exchange.

use thiserror::Error;

use crate::cache::CacheError;
use crate::token::TokenError;

/// Errors that abort an end-session exchange.
#[derive(Debug, Error)]
pub enum EndSessionError {
    /// The host is misconfigured (missing issuer, non-absolute URI, ...).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The cache backend failed.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// The token backend failed to sign, encrypt or decrypt.
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// The response pipeline finished without choosing a directive.
    #[error("no response directive was selected for the exchange")]
    NoDirective,

    /// A second response directive was selected for the same exchange.
    #[error("response directive `{existing}` was already selected, refusing `{attempted}`")]
    DirectiveConflict {
        existing: &'static str,
        attempted: &'static str,
    },
}

impl EndSessionError {
    /// Shorthand for a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Result type for end-session operations.
pub type EndSessionResult<T> = Result<T, EndSessionError>;
