//! The terminal action chosen for an exchange.

use axum::http::StatusCode;
use url::Url;

use crate::protocol::ProtocolError;

/// Exactly one directive is selected per exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseDirective {
    /// Redirect to a protocol-controlled location (post-logout redirect
    /// with response parameters, or the compacted `request_id` redirect).
    Redirect { location: Url },

    /// Redirect to a target supplied out-of-band by the host application.
    HostRedirect { location: String },

    /// The host application writes the response itself.
    Passthrough,

    /// Render the error locally.
    RenderedError {
        status: StatusCode,
        error: ProtocolError,
    },

    /// Nothing to write beyond an empty success response.
    Empty,
}

impl ResponseDirective {
    /// Stable name used in logs and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            ResponseDirective::Redirect { .. } => "redirect",
            ResponseDirective::HostRedirect { .. } => "host_redirect",
            ResponseDirective::Passthrough => "passthrough",
            ResponseDirective::RenderedError { .. } => "rendered_error",
            ResponseDirective::Empty => "empty",
        }
    }
}
