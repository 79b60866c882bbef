//! End-session service facade.
//!
//! # Responsibilities
//! - Own the frozen pipeline and the runtime options
//! - Run the extraction stage and hand the request to the host application
//! - Fold the host's outcome into the response and run the response stage
//!
//! # Design Decisions
//! - The host never sees a `request_id` redirect: it is surfaced as
//!   [`ExtractionOutcome::Responded`] and must be returned as-is
//! - A rejected extraction still goes through the response stage, so the
//!   cached request is cleaned up and the error is rendered consistently

use axum::http::StatusCode;
use std::sync::Arc;
use tracing::Instrument;
use url::Url;

use crate::cache::DistributedCache;
use crate::config::EndSessionOptions;
use crate::endsession::{
    register_builtin_handlers, ApplyEndSessionResponseContext, ExtractEndSessionRequestContext,
};
use crate::error::{EndSessionError, EndSessionResult};
use crate::observability::metrics;
use crate::pipeline::{Pipeline, ProcessingState};
use crate::protocol::{
    HttpRequestData, ParameterValue, Parameters, ProtocolError, ResponseDirective, Transaction,
};
use crate::token::TokenService;

/// Result of the extraction stage.
#[derive(Debug)]
pub enum ExtractionOutcome {
    /// The request is ready for the host application to process.
    Ready(Transaction),
    /// The exchange is already answered (e.g. the compacted redirect).
    Responded(ResponseDirective),
    /// The request was rejected. The error is recorded on the response;
    /// pass the transaction to [`EndSessionService::apply_response`].
    Rejected(Transaction, ProtocolError),
    /// A custom handler skipped end-session processing; the host
    /// application owns the response.
    Skipped(Transaction),
}

/// What the host application decided for a ready request.
#[derive(Debug, Clone, Default)]
pub struct EndSessionOutcome {
    pub parameters: Parameters,
    /// Validated post-logout redirect URI.
    pub post_logout_redirect_uri: Option<Url>,
    pub error: Option<ProtocolError>,
    /// Out-of-band redirect target.
    pub host_redirect_uri: Option<String>,
}

impl EndSessionOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejected(error: ProtocolError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.parameters.set(name, value);
        self
    }

    pub fn with_post_logout_redirect_uri(mut self, uri: Url) -> Self {
        self.post_logout_redirect_uri = Some(uri);
        self
    }

    pub fn with_error(mut self, error: ProtocolError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_host_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.host_redirect_uri = Some(uri.into());
        self
    }
}

/// Runs end-session exchanges against a shared, immutable pipeline.
#[derive(Debug, Clone)]
pub struct EndSessionService {
    options: Arc<EndSessionOptions>,
    pipeline: Arc<Pipeline>,
}

impl EndSessionService {
    /// Build the service with the built-in handlers.
    pub fn new(
        options: EndSessionOptions,
        cache: Arc<dyn DistributedCache>,
        tokens: Arc<dyn TokenService>,
    ) -> EndSessionResult<Self> {
        let pipeline = register_builtin_handlers(Pipeline::builder(), cache, tokens)?.build();
        Ok(Self::with_pipeline(options, Arc::new(pipeline)))
    }

    /// Build the service around a pipeline assembled by the caller.
    pub fn with_pipeline(options: EndSessionOptions, pipeline: Arc<Pipeline>) -> Self {
        Self {
            options: Arc::new(options),
            pipeline,
        }
    }

    pub fn options(&self) -> &EndSessionOptions {
        &self.options
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Extract, restore or cache the end-session request.
    pub async fn extract(&self, http: HttpRequestData) -> EndSessionResult<ExtractionOutcome> {
        let transaction = Transaction::new(self.options.clone()).with_http(http);
        let span = tracing::debug_span!("end_session_extract", transaction_id = %transaction.id);

        let mut context = ExtractEndSessionRequestContext::new(transaction);
        self.pipeline.dispatch(&mut context).instrument(span).await?;
        let (mut transaction, state) = context.into_parts();

        match state {
            ProcessingState::Rejected(error) => {
                tracing::warn!(
                    transaction_id = %transaction.id,
                    error = %error.code,
                    description = %error.description,
                    "End-session request rejected"
                );
                transaction
                    .response
                    .get_or_insert_with(Default::default)
                    .set_error(&error);
                Ok(ExtractionOutcome::Rejected(transaction, error))
            }
            ProcessingState::Handled => {
                let directive = transaction
                    .take_directive()
                    .ok_or(EndSessionError::NoDirective)?;
                metrics::record_response(directive.name());
                Ok(ExtractionOutcome::Responded(directive))
            }
            ProcessingState::Skipped => Ok(ExtractionOutcome::Skipped(transaction)),
            ProcessingState::Processing => {
                if transaction.request.is_none() {
                    return Err(EndSessionError::configuration(
                        "no handler extracted the end-session request from the HTTP context",
                    ));
                }
                Ok(ExtractionOutcome::Ready(transaction))
            }
        }
    }

    /// Apply the host's outcome and select the response directive.
    pub async fn apply_response(
        &self,
        mut transaction: Transaction,
        outcome: EndSessionOutcome,
    ) -> EndSessionResult<ResponseDirective> {
        let EndSessionOutcome {
            parameters,
            post_logout_redirect_uri,
            error,
            host_redirect_uri,
        } = outcome;

        let response = transaction.response.get_or_insert_with(Default::default);
        for (name, value) in parameters.iter() {
            response.set(name, value.clone());
        }
        if let Some(error) = &error {
            response.set_error(error);
        }
        if host_redirect_uri.is_some() {
            transaction.properties.host_redirect_uri = host_redirect_uri;
        }

        let span = tracing::debug_span!("end_session_apply", transaction_id = %transaction.id);

        let mut context = ApplyEndSessionResponseContext::new(transaction, post_logout_redirect_uri);
        self.pipeline.dispatch(&mut context).instrument(span).await?;
        let (mut transaction, state) = context.into_parts();

        let directive = match (transaction.take_directive(), state) {
            (Some(directive), _) => directive,
            (None, ProcessingState::Rejected(error)) => ResponseDirective::RenderedError {
                status: StatusCode::BAD_REQUEST,
                error,
            },
            (None, _) => return Err(EndSessionError::NoDirective),
        };

        metrics::record_response(directive.name());
        tracing::debug!(
            transaction_id = %transaction.id,
            directive = directive.name(),
            "End-session response applied"
        );
        Ok(directive)
    }
}
