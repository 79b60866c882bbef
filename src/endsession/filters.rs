//! Filters shared by the end-session handlers.

use crate::endsession::events::{ApplyEndSessionResponseContext, TransactionContext};
use crate::pipeline::Filter;

/// Accepts contexts whose exchange came in over HTTP.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireHttpRequest;

impl<C: TransactionContext> Filter<C> for RequireHttpRequest {
    fn accepts(&self, context: &C) -> bool {
        context.transaction().http.is_some()
    }
}

/// Accepts contexts when request caching is enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireRequestCachingEnabled;

impl<C: TransactionContext> Filter<C> for RequireRequestCachingEnabled {
    fn accepts(&self, context: &C) -> bool {
        context.transaction().options.enable_request_caching
    }
}

/// Accepts contexts when response passthrough is enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequirePassthroughEnabled;

impl<C: TransactionContext> Filter<C> for RequirePassthroughEnabled {
    fn accepts(&self, context: &C) -> bool {
        context.transaction().options.enable_passthrough
    }
}

/// Accepts responses that resolved a post-logout redirect URI.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequirePostLogoutRedirectUri;

impl Filter<ApplyEndSessionResponseContext> for RequirePostLogoutRedirectUri {
    fn accepts(&self, context: &ApplyEndSessionResponseContext) -> bool {
        context.post_logout_redirect_uri.is_some()
    }
}
