//! Request extraction and restoration handlers.
//!
//! # Responsibilities
//! - Build the [`EndSessionRequest`] from the HTTP query or form body
//! - Resolve a `request_id` into the parameters cached by an earlier exchange
//!
//! # Design Decisions
//! - Restored parameters never overwrite parameters already on the request
//! - Restoration only reads the cache; the entry is removed when the
//!   response is applied
//! - An unknown, expired or tampered `request_id` is a protocol rejection,
//!   a failing backend is a fatal error

use async_trait::async_trait;
use axum::http::Method;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cache::{request_cache_key, DistributedCache};
use crate::endsession::events::ExtractEndSessionRequestContext;
use crate::endsession::filters::{RequireHttpRequest, RequireRequestCachingEnabled};
use crate::endsession::order;
use crate::error::{EndSessionError, EndSessionResult};
use crate::observability::metrics;
use crate::pipeline::{EventContext, Handler, HandlerDescriptor, HandlerKind};
use crate::protocol::{names, EndSessionRequest, ParameterValue, Parameters, ProtocolError};
use crate::token::{token_types, TokenService, TokenValidationParameters};

/// Group name/value pairs; repeated names become a string array.
pub fn parameters_from_pairs(pairs: &[(String, String)]) -> Parameters {
    let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (name, value) in pairs {
        grouped.entry(name.as_str()).or_default().push(value.as_str());
    }

    grouped
        .into_iter()
        .map(|(name, mut values)| {
            let value = if values.len() == 1 {
                ParameterValue::from(values.remove(0))
            } else {
                ParameterValue::Array(values.into_iter().map(Into::into).collect())
            };
            (name, value)
        })
        .collect()
}

/// Extracts the request parameters from the HTTP request.
#[derive(Debug, Default)]
pub struct ExtractHttpParameters;

impl ExtractHttpParameters {
    pub fn descriptor() -> EndSessionResult<HandlerDescriptor<ExtractEndSessionRequestContext>> {
        HandlerDescriptor::builder("ExtractHttpParameters")
            .add_filter(RequireHttpRequest)
            .set_order(order::EXTRACT_HTTP_PARAMETERS)
            .set_kind(HandlerKind::BuiltIn)
            .use_scoped_handler(|| ExtractHttpParameters)
            .build()
    }
}

#[async_trait]
impl Handler<ExtractEndSessionRequestContext> for ExtractHttpParameters {
    async fn handle(&self, context: &mut ExtractEndSessionRequestContext) -> EndSessionResult<()> {
        if context.request().is_some() {
            return Ok(());
        }

        let Some(http) = context.transaction.http.as_ref() else {
            return Err(EndSessionError::configuration(
                "the end-session request cannot be extracted without an HTTP request",
            ));
        };

        let parameters = if http.method == Method::GET {
            parameters_from_pairs(&http.query)
        } else if http.method == Method::POST {
            parameters_from_pairs(&http.form)
        } else {
            tracing::debug!(method = %http.method, "Unsupported end-session method");
            metrics::record_request_rejected("invalid_method");
            context.reject(ProtocolError::invalid_request(
                "The specified HTTP method is not valid.",
            ));
            return Ok(());
        };

        tracing::debug!(
            transaction_id = %context.transaction.id,
            parameters = parameters.len(),
            "End-session request extracted"
        );
        context.transaction.request = Some(EndSessionRequest::from_parameters(parameters));
        Ok(())
    }
}

/// Restores the parameters of a cached request referenced by `request_id`.
#[derive(Debug)]
pub struct RestoreCachedRequestParameters {
    cache: Arc<dyn DistributedCache>,
    tokens: Arc<dyn TokenService>,
}

impl RestoreCachedRequestParameters {
    pub fn new(cache: Arc<dyn DistributedCache>, tokens: Arc<dyn TokenService>) -> Self {
        Self { cache, tokens }
    }

    pub fn descriptor(
        cache: Arc<dyn DistributedCache>,
        tokens: Arc<dyn TokenService>,
    ) -> EndSessionResult<HandlerDescriptor<ExtractEndSessionRequestContext>> {
        HandlerDescriptor::builder("RestoreCachedRequestParameters")
            .add_filter(RequireHttpRequest)
            .add_filter(RequireRequestCachingEnabled)
            .set_order(order::RESTORE_CACHED_REQUEST_PARAMETERS)
            .set_kind(HandlerKind::BuiltIn)
            .use_singleton_handler(Self::new(cache, tokens))
            .build()
    }

    fn reject(context: &mut ExtractEndSessionRequestContext, reason: &'static str) {
        metrics::record_request_rejected(reason);
        context.reject(ProtocolError::invalid_parameter(names::REQUEST_ID));
    }
}

#[async_trait]
impl Handler<ExtractEndSessionRequestContext> for RestoreCachedRequestParameters {
    async fn handle(&self, context: &mut ExtractEndSessionRequestContext) -> EndSessionResult<()> {
        if context
            .request()
            .is_some_and(EndSessionRequest::has_repeated_request_id)
        {
            tracing::warn!(
                transaction_id = %context.transaction.id,
                "request_id was supplied more than once"
            );
            Self::reject(context, "repeated_request_id");
            return Ok(());
        }

        let Some(request_id) = context
            .request()
            .and_then(EndSessionRequest::request_id)
            .map(str::to_string)
        else {
            return Ok(());
        };

        let issuer = context.transaction.issuer().ok_or_else(|| {
            EndSessionError::configuration(
                "an issuer or an absolute base URI is required to restore cached requests",
            )
        })?;

        let Some(token) = self.cache.get(&request_cache_key(&request_id)).await? else {
            tracing::warn!(
                transaction_id = %context.transaction.id,
                "No cached end-session request matches the request_id"
            );
            Self::reject(context, "unknown_request_id");
            return Ok(());
        };

        let parameters = TokenValidationParameters {
            issuer: issuer.to_string(),
            audience: issuer.to_string(),
            token_type: token_types::END_SESSION_REQUEST.to_string(),
        };

        let restored = match self.tokens.validate(&token, &parameters).await {
            Ok(claims) => claims.to_parameters(),
            Err(err) if err.is_backend() => return Err(err.into()),
            Err(err) => Err(err),
        };

        let restored = match restored {
            Ok(restored) => restored,
            Err(err) => {
                tracing::warn!(
                    transaction_id = %context.transaction.id,
                    error = %err,
                    "Cached end-session request token is invalid"
                );
                Self::reject(context, "invalid_request_token");
                return Ok(());
            }
        };

        let Some(request) = context.request_mut() else {
            return Ok(());
        };

        let mut merged = 0;
        for (name, value) in restored.iter() {
            if request
                .parameters_mut()
                .add_if_absent(name, value.clone())
            {
                merged += 1;
            }
        }

        metrics::record_request_restored();
        tracing::debug!(
            transaction_id = %context.transaction.id,
            merged,
            "End-session request restored from cache"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_repeated_names_become_arrays() {
        let pairs = vec![
            ("ui_locales".to_string(), "fr".to_string()),
            ("state".to_string(), "abc".to_string()),
            ("ui_locales".to_string(), "en".to_string()),
        ];

        let parameters = parameters_from_pairs(&pairs);
        assert_eq!(parameters.get_str("state"), Some("abc"));
        assert_eq!(
            parameters.get("ui_locales"),
            Some(&ParameterValue::Array(vec![json!("fr"), json!("en")]))
        );
    }
}
