//! Request caching handler.
//!
//! # Responsibilities
//! - Persist the full parameter set of a fresh request in the cache
//! - Replace the inbound request with a compact redirect carrying only
//!   `request_id`
//!
//! # Design Decisions
//! - The cached value is an encrypted, signed token, never plain parameters
//! - A request that already has a `request_id` is never cached again

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;
use url::Url;

use crate::cache::{request_cache_key, DistributedCache};
use crate::endsession::events::ExtractEndSessionRequestContext;
use crate::endsession::filters::{RequireHttpRequest, RequireRequestCachingEnabled};
use crate::endsession::order;
use crate::error::{EndSessionError, EndSessionResult};
use crate::observability::metrics;
use crate::pipeline::{EventContext, Handler, HandlerDescriptor, HandlerKind};
use crate::protocol::{names, EndSessionRequest, ResponseDirective};
use crate::token::{token_types, ClaimSet, TokenDescriptor, TokenService};

const REQUEST_ID_BYTES: usize = 32;

/// A fresh 256-bit identifier, URL-safe base64 without padding.
pub fn generate_request_id() -> String {
    let mut bytes = [0u8; REQUEST_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// The request URI with its query and fragment replaced by `request_id`.
pub fn compacted_redirect_uri(request_uri: &Url, request_id: &str) -> Url {
    let mut location = request_uri.clone();
    location.set_fragment(None);
    location.set_query(None);
    location
        .query_pairs_mut()
        .append_pair(names::REQUEST_ID, request_id);
    location
}

/// Caches the request parameters and redirects to a compacted URI.
#[derive(Debug)]
pub struct CacheRequestParameters {
    cache: Arc<dyn DistributedCache>,
    tokens: Arc<dyn TokenService>,
}

impl CacheRequestParameters {
    pub fn new(cache: Arc<dyn DistributedCache>, tokens: Arc<dyn TokenService>) -> Self {
        Self { cache, tokens }
    }

    pub fn descriptor(
        cache: Arc<dyn DistributedCache>,
        tokens: Arc<dyn TokenService>,
    ) -> EndSessionResult<HandlerDescriptor<ExtractEndSessionRequestContext>> {
        HandlerDescriptor::builder("CacheRequestParameters")
            .add_filter(RequireHttpRequest)
            .add_filter(RequireRequestCachingEnabled)
            .set_order(order::CACHE_REQUEST_PARAMETERS)
            .set_kind(HandlerKind::BuiltIn)
            .use_singleton_handler(Self::new(cache, tokens))
            .build()
    }
}

#[async_trait]
impl Handler<ExtractEndSessionRequestContext> for CacheRequestParameters {
    async fn handle(&self, context: &mut ExtractEndSessionRequestContext) -> EndSessionResult<()> {
        let Some(request) = context.request() else {
            return Ok(());
        };
        if request.is_empty() || request.has_request_id() {
            return Ok(());
        }

        let issuer = context.transaction.issuer().ok_or_else(|| {
            EndSessionError::configuration(
                "an issuer or an absolute base URI is required to cache requests",
            )
        })?;
        let request_uri = context
            .transaction
            .http
            .as_ref()
            .and_then(|http| http.request_uri.clone())
            .ok_or_else(|| {
                EndSessionError::configuration(
                    "the request URI must be absolute to redirect to a cached request",
                )
            })?;

        let claims = ClaimSet::from_request(request);
        let ttl = context.transaction.options.request_cache_ttl;
        let descriptor = TokenDescriptor {
            issuer: issuer.to_string(),
            audience: issuer.to_string(),
            token_type: token_types::END_SESSION_REQUEST.to_string(),
            lifetime: ttl,
        };
        let token = self.tokens.sign_and_encrypt(&claims, &descriptor).await?;

        let request_id = generate_request_id();
        self.cache
            .set(&request_cache_key(&request_id), token, ttl)
            .await?;

        metrics::record_request_cached();
        tracing::debug!(
            transaction_id = %context.transaction.id,
            parameters = claims.len(),
            ttl_secs = ttl.as_secs(),
            "End-session request cached"
        );

        let location = compacted_redirect_uri(&request_uri, &request_id);
        let mut compacted = EndSessionRequest::new();
        compacted.set(names::REQUEST_ID, request_id);
        context.transaction.request = Some(compacted);
        context
            .transaction
            .set_directive(ResponseDirective::Redirect { location })?;
        context.handle_request();
        Ok(())
    }
}
