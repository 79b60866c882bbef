//! Per-exchange state threaded through every pipeline stage.

use axum::http::Method;
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

use crate::config::EndSessionOptions;
use crate::error::{EndSessionError, EndSessionResult};
use crate::protocol::{EndSessionRequest, EndSessionResponse, ResponseDirective};

/// Transport-neutral view of the inbound HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequestData {
    pub method: Method,
    /// Scheme, host and path base of the server.
    pub base_uri: Option<Url>,
    /// Full URI of the current request.
    pub request_uri: Option<Url>,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
}

impl HttpRequestData {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            base_uri: None,
            request_uri: None,
            query: Vec::new(),
            form: Vec::new(),
        }
    }

    /// Set the request URI, deriving the base URI and the query pairs from it.
    pub fn with_request_uri(mut self, uri: Url) -> Self {
        self.query = uri
            .query_pairs()
            .map(|(name, value)| (name.into_owned(), value.into_owned()))
            .collect();

        let mut base = uri.clone();
        base.set_path("/");
        base.set_query(None);
        base.set_fragment(None);
        self.base_uri = Some(base);
        self.request_uri = Some(uri);
        self
    }

    pub fn with_form(mut self, form: Vec<(String, String)>) -> Self {
        self.form = form;
        self
    }
}

/// Typed side-channel values supplied by the host application.
#[derive(Debug, Clone, Default)]
pub struct TransactionProperties {
    /// Out-of-band redirect target, e.g. from the sign-out properties.
    pub host_redirect_uri: Option<String>,
}

/// Correlates the request, the in-progress response and the properties of
/// a single end-session exchange.
#[derive(Debug)]
pub struct Transaction {
    pub id: Uuid,
    pub options: Arc<EndSessionOptions>,
    pub http: Option<HttpRequestData>,
    pub request: Option<EndSessionRequest>,
    pub response: Option<EndSessionResponse>,
    pub properties: TransactionProperties,
    directive: Option<ResponseDirective>,
    cleanup_attempted: bool,
}

impl Transaction {
    pub fn new(options: Arc<EndSessionOptions>) -> Self {
        Self {
            id: Uuid::new_v4(),
            options,
            http: None,
            request: None,
            response: None,
            properties: TransactionProperties::default(),
            directive: None,
            cleanup_attempted: false,
        }
    }

    pub fn with_http(mut self, http: HttpRequestData) -> Self {
        self.http = Some(http);
        self
    }

    /// The issuer tokens are bound to: the configured issuer, falling back
    /// to the base URI of the current request.
    pub fn issuer(&self) -> Option<Url> {
        self.options
            .issuer
            .clone()
            .or_else(|| self.http.as_ref().and_then(|http| http.base_uri.clone()))
    }

    pub fn directive(&self) -> Option<&ResponseDirective> {
        self.directive.as_ref()
    }

    /// Select the response directive. Selecting a second one is a logic error.
    pub fn set_directive(&mut self, directive: ResponseDirective) -> EndSessionResult<()> {
        if let Some(existing) = &self.directive {
            return Err(EndSessionError::DirectiveConflict {
                existing: existing.name(),
                attempted: directive.name(),
            });
        }
        self.directive = Some(directive);
        Ok(())
    }

    pub fn take_directive(&mut self) -> Option<ResponseDirective> {
        self.directive.take()
    }

    /// Claim the single cache cleanup attempt of this exchange.
    /// Returns `false` if it was already claimed.
    pub fn begin_cache_cleanup(&mut self) -> bool {
        !std::mem::replace(&mut self.cleanup_attempted, true)
    }
}
