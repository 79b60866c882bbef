//! End-session parameter bag.
//!
//! # Responsibilities
//! - Hold request/response parameters as a tagged union of JSON-like kinds
//! - Give every value a textual form plus a structural kind so it can be
//!   carried through a claim set and restored without ambiguity
//! - Expose the well-known end-session parameters by name
//!
//! # Design Decisions
//! - Parameter order is irrelevant: a `BTreeMap` keeps iteration deterministic
//! - Floating point numbers are not representable and are refused on input
//! - Kinds serialize as their claim value-type names

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::protocol::{ErrorCode, ProtocolError};

/// Well-known parameter names.
pub mod names {
    pub const REQUEST_ID: &str = "request_id";
    pub const POST_LOGOUT_REDIRECT_URI: &str = "post_logout_redirect_uri";
    pub const ID_TOKEN_HINT: &str = "id_token_hint";
    pub const CLIENT_ID: &str = "client_id";
    pub const STATE: &str = "state";
    pub const ERROR: &str = "error";
    pub const ERROR_DESCRIPTION: &str = "error_description";
    pub const ERROR_URI: &str = "error_uri";
}

/// Structural kind of a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    String,
    Integer,
    Boolean,
    Null,
    Array,
    Object,
}

impl ParameterKind {
    /// Claim value-type name used when the value travels inside a token.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterKind::String => "string",
            ParameterKind::Integer => "integer64",
            ParameterKind::Boolean => "boolean",
            ParameterKind::Null => "json_null",
            ParameterKind::Array => "json_array",
            ParameterKind::Object => "json",
        }
    }

    /// Parse a claim value-type name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "string" => Some(ParameterKind::String),
            "integer64" => Some(ParameterKind::Integer),
            "boolean" => Some(ParameterKind::Boolean),
            "json_null" => Some(ParameterKind::Null),
            "json_array" => Some(ParameterKind::Array),
            "json" => Some(ParameterKind::Object),
            _ => None,
        }
    }
}

impl Serialize for ParameterKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ParameterKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        ParameterKind::parse(&name)
            .ok_or_else(|| de::Error::custom(format!("unknown value type `{name}`")))
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised when converting into a [`ParameterValue`].
#[derive(Debug, Error, PartialEq)]
pub enum ParameterError {
    #[error("`{text}` is not a valid {kind} value")]
    InvalidText { kind: ParameterKind, text: String },
}

/// A single parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    String(String),
    Integer(i64),
    Boolean(bool),
    Null,
    Array(Vec<Value>),
    Object(Map<String, Value>),
}

impl ParameterValue {
    pub fn kind(&self) -> ParameterKind {
        match self {
            ParameterValue::String(_) => ParameterKind::String,
            ParameterValue::Integer(_) => ParameterKind::Integer,
            ParameterValue::Boolean(_) => ParameterKind::Boolean,
            ParameterValue::Null => ParameterKind::Null,
            ParameterValue::Array(_) => ParameterKind::Array,
            ParameterValue::Object(_) => ParameterKind::Object,
        }
    }

    /// Textual representation; strings are verbatim, everything else is JSON.
    pub fn to_text(&self) -> String {
        match self {
            ParameterValue::String(value) => value.clone(),
            ParameterValue::Integer(value) => value.to_string(),
            ParameterValue::Boolean(value) => value.to_string(),
            ParameterValue::Null => String::new(),
            ParameterValue::Array(values) => Value::Array(values.clone()).to_string(),
            ParameterValue::Object(map) => Value::Object(map.clone()).to_string(),
        }
    }

    /// Rebuild a value from its textual representation and kind.
    pub fn from_text(text: &str, kind: ParameterKind) -> Result<Self, ParameterError> {
        let invalid = || ParameterError::InvalidText {
            kind,
            text: text.to_string(),
        };

        match kind {
            ParameterKind::String => Ok(ParameterValue::String(text.to_string())),
            ParameterKind::Integer => text
                .parse()
                .map(ParameterValue::Integer)
                .map_err(|_| invalid()),
            ParameterKind::Boolean => text
                .parse()
                .map(ParameterValue::Boolean)
                .map_err(|_| invalid()),
            ParameterKind::Null => Ok(ParameterValue::Null),
            ParameterKind::Array => match serde_json::from_str(text) {
                Ok(Value::Array(values)) => Ok(ParameterValue::Array(values)),
                _ => Err(invalid()),
            },
            ParameterKind::Object => match serde_json::from_str(text) {
                Ok(Value::Object(map)) => Ok(ParameterValue::Object(map)),
                _ => Err(invalid()),
            },
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::String(value) => Some(value),
            _ => None,
        }
    }

    /// Values emitted when the parameter is appended to a query string.
    ///
    /// Arrays expand to one value per element; null and empty values
    /// produce nothing.
    pub fn query_values(&self) -> Vec<String> {
        match self {
            ParameterValue::Null => Vec::new(),
            ParameterValue::String(value) if value.is_empty() => Vec::new(),
            ParameterValue::Array(values) => values
                .iter()
                .filter_map(|value| match value {
                    Value::Null => None,
                    Value::String(text) if text.is_empty() => None,
                    Value::String(text) => Some(text.clone()),
                    other => Some(other.to_string()),
                })
                .collect(),
            ParameterValue::Object(map) if map.is_empty() => Vec::new(),
            other => vec![other.to_text()],
        }
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::String(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::String(value)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        ParameterValue::Integer(value)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        ParameterValue::Boolean(value)
    }
}

/// Shared storage for request and response parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    entries: BTreeMap<String, ParameterValue>,
}

impl Parameters {
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.entries.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ParameterValue::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Set or replace a parameter.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ParameterValue>) {
        self.entries.insert(name.into(), value.into());
    }

    /// Add a parameter unless one with the same name already exists.
    /// Returns `true` when the value was added.
    pub fn add_if_absent(&mut self, name: impl Into<String>, value: ParameterValue) -> bool {
        match self.entries.entry(name.into()) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<ParameterValue> {
        self.entries.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<ParameterValue>> FromIterator<(N, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

/// An end-session request as seen by the pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndSessionRequest {
    parameters: Parameters,
}

impl EndSessionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parameters(parameters: Parameters) -> Self {
        Self { parameters }
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut Parameters {
        &mut self.parameters
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.parameters.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ParameterValue>) {
        self.parameters.set(name, value);
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// The cache reference carried by the request, if any and non-empty.
    pub fn request_id(&self) -> Option<&str> {
        self.parameters
            .get_str(names::REQUEST_ID)
            .filter(|value| !value.is_empty())
    }

    /// Whether any non-empty `request_id` is present, single or repeated.
    pub fn has_request_id(&self) -> bool {
        match self.parameters.get(names::REQUEST_ID) {
            None | Some(ParameterValue::Null) => false,
            Some(ParameterValue::String(value)) => !value.is_empty(),
            Some(ParameterValue::Array(values)) => !values.is_empty(),
            Some(_) => true,
        }
    }

    /// True when `request_id` was supplied more than once.
    pub fn has_repeated_request_id(&self) -> bool {
        matches!(
            self.parameters.get(names::REQUEST_ID),
            Some(ParameterValue::Array(values)) if !values.is_empty()
        )
    }

    pub fn post_logout_redirect_uri(&self) -> Option<&str> {
        self.parameters.get_str(names::POST_LOGOUT_REDIRECT_URI)
    }

    pub fn id_token_hint(&self) -> Option<&str> {
        self.parameters.get_str(names::ID_TOKEN_HINT)
    }

    pub fn state(&self) -> Option<&str> {
        self.parameters.get_str(names::STATE)
    }
}

/// The end-session response parameters, including any protocol error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndSessionResponse {
    parameters: Parameters,
}

impl EndSessionResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parameters(parameters: Parameters) -> Self {
        Self { parameters }
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ParameterValue>) {
        self.parameters.set(name, value);
    }

    /// Record a protocol error on the response.
    pub fn set_error(&mut self, error: &ProtocolError) {
        self.parameters.set(names::ERROR, error.code.as_str());
        self.parameters
            .set(names::ERROR_DESCRIPTION, error.description.clone());
        match &error.uri {
            Some(uri) => self.parameters.set(names::ERROR_URI, uri.clone()),
            None => {
                self.parameters.remove(names::ERROR_URI);
            }
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.parameters
            .get_str(names::ERROR)
            .filter(|value| !value.is_empty())
    }

    /// Rebuild the protocol error carried by the response, if any.
    pub fn protocol_error(&self) -> Option<ProtocolError> {
        let code = self.error()?;
        Some(ProtocolError {
            code: ErrorCode::from(code),
            description: self
                .parameters
                .get_str(names::ERROR_DESCRIPTION)
                .unwrap_or_default()
                .to_string(),
            uri: self.parameters.get_str(names::ERROR_URI).map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_round_trip_per_kind() {
        let values = vec![
            ParameterValue::from("hello"),
            ParameterValue::from(-42i64),
            ParameterValue::from(true),
            ParameterValue::Null,
            ParameterValue::Array(vec![json!("a"), json!(1)]),
            ParameterValue::Object(json!({"k": "v"}).as_object().cloned().unwrap()),
        ];

        for value in values {
            let restored = ParameterValue::from_text(&value.to_text(), value.kind()).unwrap();
            assert_eq!(restored, value);
        }
    }

    #[test]
    fn test_invalid_text() {
        let err = ParameterValue::from_text("abc", ParameterKind::Integer).unwrap_err();
        assert!(matches!(err, ParameterError::InvalidText { .. }));
        assert!(ParameterValue::from_text("{}", ParameterKind::Array).is_err());
    }

    #[test]
    fn test_floats_are_refused() {
        assert!(ParameterValue::from_text("1.5", ParameterKind::Integer).is_err());
        assert_eq!(
            ParameterValue::from_text("7", ParameterKind::Integer).unwrap(),
            ParameterValue::Integer(7)
        );
    }

    #[test]
    fn test_kind_names() {
        for kind in [
            ParameterKind::String,
            ParameterKind::Integer,
            ParameterKind::Boolean,
            ParameterKind::Null,
            ParameterKind::Array,
            ParameterKind::Object,
        ] {
            assert_eq!(ParameterKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ParameterKind::parse("double"), None);

        assert_eq!(serde_json::to_value(ParameterKind::Integer).unwrap(), json!("integer64"));
        assert_eq!(
            serde_json::from_value::<ParameterKind>(json!("json_array")).unwrap(),
            ParameterKind::Array
        );
        assert!(serde_json::from_value::<ParameterKind>(json!("double")).is_err());
    }

    #[test]
    fn test_request_id_ignores_empty_value() {
        let mut request = EndSessionRequest::new();
        request.set(names::REQUEST_ID, "");
        assert_eq!(request.request_id(), None);

        request.set(names::REQUEST_ID, "abc");
        assert_eq!(request.request_id(), Some("abc"));
    }

    #[test]
    fn test_repeated_request_id_is_still_a_request_id() {
        let mut request = EndSessionRequest::new();
        assert!(!request.has_request_id());

        request.set(names::REQUEST_ID, ParameterValue::Array(vec![json!("abc"), json!("abc")]));
        assert_eq!(request.request_id(), None);
        assert!(request.has_request_id());
        assert!(request.has_repeated_request_id());

        request.set(names::REQUEST_ID, "abc");
        assert!(request.has_request_id());
        assert!(!request.has_repeated_request_id());
    }

    #[test]
    fn test_add_if_absent_keeps_first_value() {
        let mut parameters = Parameters::default();
        assert!(parameters.add_if_absent("a", "x".into()));
        assert!(!parameters.add_if_absent("a", "y".into()));
        assert_eq!(parameters.get_str("a"), Some("x"));
    }

    #[test]
    fn test_query_values() {
        assert!(ParameterValue::Null.query_values().is_empty());
        assert!(ParameterValue::from("").query_values().is_empty());
        assert_eq!(
            ParameterValue::Array(vec![json!("a"), json!(""), json!(null), json!(2)]).query_values(),
            vec!["a".to_string(), "2".to_string()]
        );
        assert_eq!(ParameterValue::from(3i64).query_values(), vec!["3".to_string()]);
    }

    #[test]
    fn test_response_error_round_trip() {
        let mut response = EndSessionResponse::new();
        assert!(response.protocol_error().is_none());

        let error = ProtocolError::invalid_request("The specified 'request_id' parameter is invalid.");
        response.set_error(&error);
        assert_eq!(response.error(), Some("invalid_request"));
        assert_eq!(response.protocol_error(), Some(error));
        assert_eq!(response.parameters().get(names::ERROR_URI), None);

        let documented = ProtocolError::invalid_request("Logout is not allowed.")
            .with_uri("https://id.example.com/errors/logout");
        response.set_error(&documented);
        assert_eq!(
            response.parameters().get_str(names::ERROR_URI),
            Some("https://id.example.com/errors/logout")
        );
        assert_eq!(response.protocol_error(), Some(documented));

        // Replacing the error drops a stale error_uri.
        response.set_error(&ProtocolError::server_error("oops"));
        assert_eq!(response.parameters().get(names::ERROR_URI), None);
    }
}
