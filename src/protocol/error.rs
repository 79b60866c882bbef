//! Protocol-level rejections.

use std::fmt;

/// OAuth2/OpenID Connect error codes produced by this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidRequest,
    ServerError,
    /// Any other code, set by the host application.
    Other(String),
}

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::ServerError => "server_error",
            ErrorCode::Other(code) => code,
        }
    }
}

impl From<&str> for ErrorCode {
    fn from(value: &str) -> Self {
        match value {
            "invalid_request" => ErrorCode::InvalidRequest,
            "server_error" => ErrorCode::ServerError,
            other => ErrorCode::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A protocol rejection with a stable code and a human-readable description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolError {
    pub code: ErrorCode,
    pub description: String,
    pub uri: Option<String>,
}

impl ProtocolError {
    pub fn new(code: ErrorCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
            uri: None,
        }
    }

    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, description)
    }

    pub fn server_error(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServerError, description)
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Rejection for a parameter whose value cannot be used.
    pub fn invalid_parameter(name: &str) -> Self {
        Self::invalid_request(format!("The specified '{name}' parameter is invalid."))
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.description)
    }
}

impl std::error::Error for ProtocolError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_round_trip() {
        assert_eq!(ErrorCode::from("invalid_request"), ErrorCode::InvalidRequest);
        assert_eq!(ErrorCode::from("server_error"), ErrorCode::ServerError);
        assert_eq!(
            ErrorCode::from("access_denied").as_str(),
            "access_denied"
        );
    }

    #[test]
    fn test_invalid_parameter_description() {
        let error = ProtocolError::invalid_parameter("request_id");
        assert_eq!(error.code, ErrorCode::InvalidRequest);
        assert!(error.description.contains("'request_id'"));
        assert_eq!(
            error.to_string(),
            "invalid_request: The specified 'request_id' parameter is invalid."
        );
        assert_eq!(error.uri, None);
    }

    #[test]
    fn test_with_uri_sets_error_uri() {
        let error = ProtocolError::invalid_request("bad").with_uri("https://id.example.com/errors/bad");
        assert_eq!(error.uri.as_deref(), Some("https://id.example.com/errors/bad"));
        assert_eq!(error.code, ErrorCode::InvalidRequest);
    }
}
