//! Response composition handlers.
//!
//! # Responsibilities
//! - Remove the cached request once the exchange completes
//! - Select exactly one [`ResponseDirective`] for the exchange
//!
//! # Design Decisions
//! - Directive handlers run from most to least specific; the first one to
//!   apply marks the context handled
//! - Cache cleanup is best-effort and never changes the directive

use async_trait::async_trait;
use axum::http::StatusCode;
use std::sync::Arc;

use crate::cache::{request_cache_key, DistributedCache};
use crate::endsession::events::ApplyEndSessionResponseContext;
use crate::endsession::filters::{
    RequireHttpRequest, RequirePassthroughEnabled, RequirePostLogoutRedirectUri,
    RequireRequestCachingEnabled,
};
use crate::endsession::order;
use crate::error::EndSessionResult;
use crate::observability::metrics;
use crate::pipeline::{EventContext, Handler, HandlerDescriptor, HandlerKind};
use crate::protocol::{EndSessionRequest, ErrorCode, ResponseDirective};

type Descriptor = EndSessionResult<HandlerDescriptor<ApplyEndSessionResponseContext>>;

/// Deletes the cache entry referenced by the original `request_id`.
#[derive(Debug)]
pub struct RemoveCachedRequest {
    cache: Arc<dyn DistributedCache>,
}

impl RemoveCachedRequest {
    pub fn new(cache: Arc<dyn DistributedCache>) -> Self {
        Self { cache }
    }

    pub fn descriptor(cache: Arc<dyn DistributedCache>) -> Descriptor {
        HandlerDescriptor::builder("RemoveCachedRequest")
            .add_filter(RequireRequestCachingEnabled)
            .set_order(order::REMOVE_CACHED_REQUEST)
            .set_kind(HandlerKind::BuiltIn)
            .use_singleton_handler(Self::new(cache))
            .build()
    }
}

#[async_trait]
impl Handler<ApplyEndSessionResponseContext> for RemoveCachedRequest {
    async fn handle(&self, context: &mut ApplyEndSessionResponseContext) -> EndSessionResult<()> {
        let Some(request_id) = context
            .request()
            .and_then(EndSessionRequest::request_id)
            .map(str::to_string)
        else {
            return Ok(());
        };

        if !context.transaction.begin_cache_cleanup() {
            return Ok(());
        }

        if let Err(err) = self.cache.delete(&request_cache_key(&request_id)).await {
            metrics::record_cleanup_failure();
            tracing::warn!(
                transaction_id = %context.transaction.id,
                error = %err,
                "Failed to remove cached end-session request"
            );
        }
        Ok(())
    }
}

/// Redirects to the post-logout redirect URI with the response parameters
/// appended to its query.
#[derive(Debug, Default)]
pub struct ProcessQueryResponse;

impl ProcessQueryResponse {
    pub fn descriptor() -> Descriptor {
        HandlerDescriptor::builder("ProcessQueryResponse")
            .add_filter(RequirePostLogoutRedirectUri)
            .set_order(order::PROCESS_QUERY_RESPONSE)
            .set_kind(HandlerKind::BuiltIn)
            .use_singleton_handler(ProcessQueryResponse)
            .build()
    }
}

#[async_trait]
impl Handler<ApplyEndSessionResponseContext> for ProcessQueryResponse {
    async fn handle(&self, context: &mut ApplyEndSessionResponseContext) -> EndSessionResult<()> {
        let Some(mut location) = context.post_logout_redirect_uri.clone() else {
            return Ok(());
        };

        let pairs: Vec<(String, String)> = context
            .response()
            .map(|response| {
                response
                    .parameters()
                    .iter()
                    .flat_map(|(name, value)| {
                        value
                            .query_values()
                            .into_iter()
                            .map(move |value| (name.to_string(), value))
                    })
                    .collect()
            })
            .unwrap_or_default();

        if !pairs.is_empty() {
            location.query_pairs_mut().extend_pairs(pairs);
        }

        context
            .transaction
            .set_directive(ResponseDirective::Redirect { location })?;
        context.handle_request();
        Ok(())
    }
}

/// Redirects to a target supplied by the host application when nothing
/// more specific applies.
#[derive(Debug, Default)]
pub struct ProcessHostRedirectionResponse;

impl ProcessHostRedirectionResponse {
    pub fn descriptor() -> Descriptor {
        HandlerDescriptor::builder("ProcessHostRedirectionResponse")
            .add_filter(RequireHttpRequest)
            .set_order(order::PROCESS_HOST_REDIRECTION_RESPONSE)
            .set_kind(HandlerKind::BuiltIn)
            .use_singleton_handler(ProcessHostRedirectionResponse)
            .build()
    }
}

#[async_trait]
impl Handler<ApplyEndSessionResponseContext> for ProcessHostRedirectionResponse {
    async fn handle(&self, context: &mut ApplyEndSessionResponseContext) -> EndSessionResult<()> {
        if context.post_logout_redirect_uri.is_some() || context.has_error() {
            return Ok(());
        }

        let Some(location) = context
            .transaction
            .properties
            .host_redirect_uri
            .clone()
            .filter(|location| !location.is_empty())
        else {
            return Ok(());
        };

        context
            .transaction
            .set_directive(ResponseDirective::HostRedirect { location })?;
        context.handle_request();
        Ok(())
    }
}

/// Leaves the response to the host application.
#[derive(Debug, Default)]
pub struct ProcessPassthroughResponse;

impl ProcessPassthroughResponse {
    pub fn descriptor() -> Descriptor {
        HandlerDescriptor::builder("ProcessPassthroughResponse")
            .add_filter(RequireHttpRequest)
            .add_filter(RequirePassthroughEnabled)
            .set_order(order::PROCESS_PASSTHROUGH_RESPONSE)
            .set_kind(HandlerKind::BuiltIn)
            .use_singleton_handler(ProcessPassthroughResponse)
            .build()
    }
}

#[async_trait]
impl Handler<ApplyEndSessionResponseContext> for ProcessPassthroughResponse {
    async fn handle(&self, context: &mut ApplyEndSessionResponseContext) -> EndSessionResult<()> {
        context
            .transaction
            .set_directive(ResponseDirective::Passthrough)?;
        context.handle_request();
        Ok(())
    }
}

/// Renders the protocol error locally.
#[derive(Debug, Default)]
pub struct ProcessLocalErrorResponse;

impl ProcessLocalErrorResponse {
    pub fn descriptor() -> Descriptor {
        HandlerDescriptor::builder("ProcessLocalErrorResponse")
            .set_order(order::PROCESS_LOCAL_ERROR_RESPONSE)
            .set_kind(HandlerKind::BuiltIn)
            .use_singleton_handler(ProcessLocalErrorResponse)
            .build()
    }
}

#[async_trait]
impl Handler<ApplyEndSessionResponseContext> for ProcessLocalErrorResponse {
    async fn handle(&self, context: &mut ApplyEndSessionResponseContext) -> EndSessionResult<()> {
        let Some(error) = context.response().and_then(|r| r.protocol_error()) else {
            return Ok(());
        };

        let status = match error.code {
            ErrorCode::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };

        context
            .transaction
            .set_directive(ResponseDirective::RenderedError { status, error })?;
        context.handle_request();
        Ok(())
    }
}

/// Fallback: an empty success response.
#[derive(Debug, Default)]
pub struct ProcessEmptyResponse;

impl ProcessEmptyResponse {
    pub fn descriptor() -> Descriptor {
        HandlerDescriptor::builder("ProcessEmptyResponse")
            .set_order(order::PROCESS_EMPTY_RESPONSE)
            .set_kind(HandlerKind::BuiltIn)
            .use_singleton_handler(ProcessEmptyResponse)
            .build()
    }
}

#[async_trait]
impl Handler<ApplyEndSessionResponseContext> for ProcessEmptyResponse {
    async fn handle(&self, context: &mut ApplyEndSessionResponseContext) -> EndSessionResult<()> {
        context.transaction.set_directive(ResponseDirective::Empty)?;
        context.handle_request();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheError, InMemoryCache};
    use crate::config::EndSessionOptions;
    use crate::pipeline::Pipeline;
    use crate::protocol::{names, HttpRequestData, ParameterValue, ProtocolError, Transaction};
    use axum::http::Method;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use url::Url;

    #[derive(Debug, Default)]
    struct FailingCache {
        deletes: AtomicUsize,
    }

    #[async_trait]
    impl DistributedCache for FailingCache {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
            Ok(())
        }

        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            Err(CacheError::Backend("unavailable".into()))
        }
    }

    fn pipeline(cache: Arc<dyn DistributedCache>) -> Pipeline {
        Pipeline::builder()
            .register(RemoveCachedRequest::descriptor(cache).unwrap())
            .register(ProcessQueryResponse::descriptor().unwrap())
            .register(ProcessHostRedirectionResponse::descriptor().unwrap())
            .register(ProcessPassthroughResponse::descriptor().unwrap())
            .register(ProcessLocalErrorResponse::descriptor().unwrap())
            .register(ProcessEmptyResponse::descriptor().unwrap())
            .build()
    }

    fn transaction(options: EndSessionOptions) -> Transaction {
        let uri = Url::parse("https://id.example.com/connect/endsession").unwrap();
        Transaction::new(Arc::new(options))
            .with_http(HttpRequestData::new(Method::GET).with_request_uri(uri))
    }

    async fn apply(
        pipeline: &Pipeline,
        transaction: Transaction,
        uri: Option<&str>,
    ) -> (Transaction, ResponseDirective) {
        let uri = uri.map(|uri| Url::parse(uri).unwrap());
        let mut context = ApplyEndSessionResponseContext::new(transaction, uri);
        pipeline.dispatch(&mut context).await.unwrap();
        let (mut transaction, _) = context.into_parts();
        let directive = transaction.take_directive().unwrap();
        (transaction, directive)
    }

    #[tokio::test]
    async fn test_query_response_appends_parameters() {
        let pipeline = pipeline(Arc::new(InMemoryCache::new()));
        let mut tx = transaction(EndSessionOptions::default());
        let response = tx.response.get_or_insert_with(Default::default);
        response.set(names::STATE, "af0ifjsldkj");
        response.set("empty", "");
        response.set("locales", ParameterValue::Array(vec![json!("fr"), json!("en")]));

        let (_, directive) = apply(&pipeline, tx, Some("https://app.example.com/out?x=1")).await;
        let ResponseDirective::Redirect { location } = directive else {
            panic!("expected redirect");
        };
        assert_eq!(
            location.as_str(),
            "https://app.example.com/out?x=1&locales=fr&locales=en&state=af0ifjsldkj"
        );
    }

    #[tokio::test]
    async fn test_query_response_without_parameters_keeps_uri() {
        let pipeline = pipeline(Arc::new(InMemoryCache::new()));
        let tx = transaction(EndSessionOptions::default());

        let (_, directive) = apply(&pipeline, tx, Some("https://app.example.com/out")).await;
        assert_eq!(
            directive,
            ResponseDirective::Redirect {
                location: Url::parse("https://app.example.com/out").unwrap()
            }
        );
    }

    #[tokio::test]
    async fn test_query_response_carries_error() {
        let pipeline = pipeline(Arc::new(InMemoryCache::new()));
        let mut tx = transaction(EndSessionOptions::default());
        tx.response
            .get_or_insert_with(Default::default)
            .set_error(&ProtocolError::invalid_request("bad"));

        let (_, directive) = apply(&pipeline, tx, Some("https://app.example.com/out")).await;
        let ResponseDirective::Redirect { location } = directive else {
            panic!("expected redirect");
        };
        assert!(location.as_str().contains("error=invalid_request"));
        assert!(location.as_str().contains("error_description=bad"));
    }

    #[tokio::test]
    async fn test_host_redirect_requires_no_error() {
        let pipeline = pipeline(Arc::new(InMemoryCache::new()));

        let mut tx = transaction(EndSessionOptions::default());
        tx.properties.host_redirect_uri = Some("/signed-out".into());
        let (_, directive) = apply(&pipeline, tx, None).await;
        assert_eq!(
            directive,
            ResponseDirective::HostRedirect {
                location: "/signed-out".into()
            }
        );

        let mut tx = transaction(EndSessionOptions::default());
        tx.properties.host_redirect_uri = Some("/signed-out".into());
        tx.response
            .get_or_insert_with(Default::default)
            .set_error(&ProtocolError::invalid_request("bad"));
        let (_, directive) = apply(&pipeline, tx, None).await;
        assert!(matches!(
            directive,
            ResponseDirective::RenderedError {
                status: StatusCode::BAD_REQUEST,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_empty_host_redirect_is_ignored() {
        let pipeline = pipeline(Arc::new(InMemoryCache::new()));
        let mut tx = transaction(EndSessionOptions::default());
        tx.properties.host_redirect_uri = Some(String::new());
        let (_, directive) = apply(&pipeline, tx, None).await;
        assert_eq!(directive, ResponseDirective::Empty);
    }

    #[tokio::test]
    async fn test_passthrough_precedes_local_error() {
        let pipeline = pipeline(Arc::new(InMemoryCache::new()));
        let options = EndSessionOptions {
            enable_passthrough: true,
            ..Default::default()
        };
        let mut tx = transaction(options);
        tx.response
            .get_or_insert_with(Default::default)
            .set_error(&ProtocolError::invalid_request("bad"));
        let (_, directive) = apply(&pipeline, tx, None).await;
        assert_eq!(directive, ResponseDirective::Passthrough);
    }

    #[tokio::test]
    async fn test_server_error_renders_500() {
        let pipeline = pipeline(Arc::new(InMemoryCache::new()));
        let mut tx = transaction(EndSessionOptions::default());
        tx.response
            .get_or_insert_with(Default::default)
            .set_error(&ProtocolError::server_error("down"));
        let (_, directive) = apply(&pipeline, tx, None).await;
        let ResponseDirective::RenderedError { status, error } = directive else {
            panic!("expected rendered error");
        };
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.description, "down");
    }

    #[tokio::test]
    async fn test_empty_response_without_http() {
        let pipeline = pipeline(Arc::new(InMemoryCache::new()));
        let tx = Transaction::new(Arc::new(EndSessionOptions::default()));
        let (_, directive) = apply(&pipeline, tx, None).await;
        assert_eq!(directive, ResponseDirective::Empty);
    }

    #[tokio::test]
    async fn test_cleanup_removes_cached_request() {
        let cache = Arc::new(InMemoryCache::new());
        cache
            .set(&request_cache_key("abc"), "token".into(), Duration::from_secs(60))
            .await
            .unwrap();
        let pipeline = pipeline(cache.clone());

        let mut tx = transaction(EndSessionOptions::default());
        let mut request = EndSessionRequest::new();
        request.set(names::REQUEST_ID, "abc");
        tx.request = Some(request);

        let (_, directive) = apply(&pipeline, tx, None).await;
        assert_eq!(directive, ResponseDirective::Empty);
        assert!(cache.get(&request_cache_key("abc")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_failure_is_ignored_and_runs_once() {
        let cache = Arc::new(FailingCache::default());
        let pipeline = pipeline(cache.clone());

        let mut tx = transaction(EndSessionOptions::default());
        let mut request = EndSessionRequest::new();
        request.set(names::REQUEST_ID, "abc");
        tx.request = Some(request);

        let (tx, directive) = apply(&pipeline, tx, Some("https://app.example.com/out")).await;
        assert!(matches!(directive, ResponseDirective::Redirect { .. }));

        // A second pass over the same exchange does not retry the delete.
        let (_, directive) = apply(&pipeline, tx, None).await;
        assert_eq!(directive, ResponseDirective::Empty);
        assert_eq!(cache.deletes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cleanup_skipped_when_caching_disabled() {
        let cache = Arc::new(FailingCache::default());
        let pipeline = pipeline(cache.clone());
        let options = EndSessionOptions {
            enable_request_caching: false,
            ..Default::default()
        };
        let mut tx = transaction(options);
        let mut request = EndSessionRequest::new();
        request.set(names::REQUEST_ID, "abc");
        tx.request = Some(request);

        apply(&pipeline, tx, None).await;
        assert_eq!(cache.deletes.load(Ordering::SeqCst), 0);
    }
}
