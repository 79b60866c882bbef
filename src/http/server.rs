//! HTTP server setup and the end-session endpoint.
//!
//! # Responsibilities
//! - Create the Axum router for the end-session endpoint
//! - Wire up middleware (tracing, timeout)
//! - Decide the demo outcome: registered post-logout redirect URIs, `state` echo
//! - Map the selected [`ResponseDirective`] to an HTTP response
//! - Serve with graceful shutdown

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use url::Url;

use crate::config::ServiceConfig;
use crate::error::{EndSessionError, EndSessionResult};
use crate::http::adapter::to_request_data;
use crate::protocol::{names, HttpRequestData, ProtocolError, ResponseDirective, Transaction};
use crate::service::{EndSessionOutcome, EndSessionService, ExtractionOutcome};

/// Body written when the host application owns the response.
pub const SIGNED_OUT_BODY: &str = "You have been signed out.";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: EndSessionService,
    pub post_logout_redirect_uris: Arc<Vec<Url>>,
}

/// HTTP server for the end-session endpoint.
pub struct EndSessionServer {
    router: Router,
}

impl EndSessionServer {
    pub fn new(config: &ServiceConfig, service: EndSessionService) -> EndSessionResult<Self> {
        let post_logout_redirect_uris = config
            .end_session
            .post_logout_redirect_uris
            .iter()
            .map(|uri| {
                Url::parse(uri).map_err(|err| {
                    EndSessionError::configuration(format!(
                        "invalid post-logout redirect URI `{uri}`: {err}"
                    ))
                })
            })
            .collect::<EndSessionResult<Vec<_>>>()?;

        let state = AppState {
            service,
            post_logout_redirect_uris: Arc::new(post_logout_redirect_uris),
        };

        Ok(Self {
            router: Self::build_router(config, state),
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServiceConfig, state: AppState) -> Router {
        Router::new()
            .route(&config.end_session.endpoint_path, any(end_session_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            )
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn end_session_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let http = match to_request_data(request).await {
        Ok(http) => http,
        Err(err) => {
            tracing::warn!(error = %err, "Malformed end-session request");
            return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
        }
    };

    match process(&state, http).await {
        Ok(directive) => directive_response(directive),
        Err(err) => {
            tracing::error!(error = %err, "End-session exchange failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

async fn process(
    state: &AppState,
    http: HttpRequestData,
) -> EndSessionResult<ResponseDirective> {
    match state.service.extract(http).await? {
        ExtractionOutcome::Ready(transaction) => {
            let outcome = decide(&transaction, &state.post_logout_redirect_uris);
            state.service.apply_response(transaction, outcome).await
        }
        ExtractionOutcome::Responded(directive) => Ok(directive),
        ExtractionOutcome::Rejected(transaction, _) => {
            state
                .service
                .apply_response(transaction, EndSessionOutcome::new())
                .await
        }
        ExtractionOutcome::Skipped(_) => Ok(ResponseDirective::Passthrough),
    }
}

/// Sign the user out and pick where to send them.
///
/// A `post_logout_redirect_uri` is honoured only if it is registered;
/// `state` is echoed back with the redirect.
pub fn decide(transaction: &Transaction, registered: &[Url]) -> EndSessionOutcome {
    let mut outcome = EndSessionOutcome::new();
    let Some(request) = transaction.request.as_ref() else {
        return outcome;
    };

    if let Some(state) = request.state() {
        outcome = outcome.with_parameter(names::STATE, state);
    }

    if let Some(uri) = request.post_logout_redirect_uri() {
        match Url::parse(uri) {
            Ok(uri) if registered.contains(&uri) => {
                outcome = outcome.with_post_logout_redirect_uri(uri);
            }
            _ => {
                tracing::warn!(
                    transaction_id = %transaction.id,
                    post_logout_redirect_uri = %uri,
                    "Unregistered post-logout redirect URI"
                );
                outcome = outcome.with_error(ProtocolError::invalid_parameter(
                    names::POST_LOGOUT_REDIRECT_URI,
                ));
            }
        }
    }

    outcome
}

/// Write the selected directive as an HTTP response.
pub fn directive_response(directive: ResponseDirective) -> Response {
    match directive {
        ResponseDirective::Redirect { location } => {
            (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
        }
        ResponseDirective::HostRedirect { location } => {
            (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
        }
        ResponseDirective::RenderedError { status, error } => {
            (status, format!("{}: {}", error.code, error.description)).into_response()
        }
        ResponseDirective::Passthrough => (StatusCode::OK, SIGNED_OUT_BODY).into_response(),
        ResponseDirective::Empty => StatusCode::OK.into_response(),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for the shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndSessionOptions;
    use crate::protocol::EndSessionRequest;

    fn transaction(pairs: &[(&str, &str)]) -> Transaction {
        let mut request = EndSessionRequest::new();
        for (name, value) in pairs {
            request.set(*name, *value);
        }
        let mut transaction = Transaction::new(Arc::new(EndSessionOptions::default()));
        transaction.request = Some(request);
        transaction
    }

    #[test]
    fn test_decide_honours_registered_uri() {
        let registered = vec![Url::parse("https://app.example.com/out").unwrap()];
        let outcome = decide(
            &transaction(&[
                (names::POST_LOGOUT_REDIRECT_URI, "https://app.example.com/out"),
                (names::STATE, "xyz"),
            ]),
            &registered,
        );
        assert_eq!(
            outcome.post_logout_redirect_uri.unwrap().as_str(),
            "https://app.example.com/out"
        );
        assert_eq!(outcome.parameters.get_str(names::STATE), Some("xyz"));
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_decide_rejects_unregistered_uri() {
        let outcome = decide(
            &transaction(&[(names::POST_LOGOUT_REDIRECT_URI, "https://evil.example.com/")]),
            &[],
        );
        assert!(outcome.post_logout_redirect_uri.is_none());
        let error = outcome.error.unwrap();
        assert!(error.description.contains(names::POST_LOGOUT_REDIRECT_URI));
    }

    #[test]
    fn test_directive_response_status() {
        let response = directive_response(ResponseDirective::HostRedirect {
            location: "/bye".into(),
        });
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/bye");

        let response = directive_response(ResponseDirective::RenderedError {
            status: StatusCode::BAD_REQUEST,
            error: ProtocolError::invalid_request("bad"),
        });
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert_eq!(directive_response(ResponseDirective::Empty).status(), StatusCode::OK);
    }
}
