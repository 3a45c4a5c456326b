//! Error types for the Superset client
//!
//! Failed HTTP responses are translated by [`raise_for_status`] into one of
//! three variants, tried in strict order:
//!
//! 1. the body carries a `message` -> [`Error::BadRequest`]
//! 2. the body carries an `errors` array -> [`Error::ComplexBadRequest`]
//! 3. anything else -> [`Error::Http`], the opaque pass-through
//!
//! Every variant built from a response keeps the [`HttpFailure`] it came from.

use std::fmt;
use std::path::PathBuf;

use reqwest::{Method, StatusCode};
use serde_json::Value;
use thiserror::Error;

use crate::api::http::ApiResponse;

pub type Result<T> = std::result::Result<T, Error>;

/// The request/response pair behind a failed call
#[derive(Debug, Clone)]
pub struct HttpFailure {
    pub method: Method,
    pub url: String,
    pub status: StatusCode,
    pub body: String,
}

impl HttpFailure {
    pub(crate) fn from_response(response: &ApiResponse) -> Self {
        Self {
            method: response.method.clone(),
            url: response.url.clone(),
            status: response.status,
            body: response.text(),
        }
    }
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} returned {}", self.method, self.url, self.status)
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// `find_one` matched no rows
    #[error("No {object} has been found.")]
    NotFound { object: &'static str },

    #[error("{failure}: {message}")]
    BadRequest { failure: HttpFailure, message: String },

    #[error("{failure}: {} error(s)", .errors.len())]
    ComplexBadRequest {
        failure: HttpFailure,
        errors: Vec<Value>,
    },

    #[error("{0}")]
    Http(HttpFailure),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// The entity has no id yet, so it cannot reach its own endpoints
    #[error("{object} is not bound to the server (no id); add it to its collection first")]
    Unbound { object: &'static str },

    #[error("Export is not defined for {object}")]
    NotExportable { object: &'static str },

    #[error("unsupported export content-type: {content_type:?}")]
    UnsupportedContentType { content_type: String },

    #[error("{object} payload is missing required field {field:?}")]
    MissingField {
        object: &'static str,
        field: &'static str,
    },

    #[error("response from {url} has no {key:?}")]
    MissingEnvelope { key: &'static str, url: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// HTTP status of the failed response, if this error came from one
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::BadRequest { failure, .. }
            | Self::ComplexBadRequest { failure, .. }
            | Self::Http(failure) => Some(failure.status),
            Self::Transport(e) => e.status(),
            _ => None,
        }
    }
}

/// Check the response status, translating failures into typed errors
pub fn raise_for_status(response: &ApiResponse) -> Result<()> {
    let code = response.status.as_u16();
    if !(400..600).contains(&code) {
        return Ok(());
    }

    let failure = HttpFailure::from_response(response);
    let Ok(body) = response.json::<Value>() else {
        return Err(Error::Http(failure));
    };

    if let Some(message) = body.get("message") {
        let message = match message {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(Error::BadRequest { failure, message });
    }

    match body.get("errors") {
        Some(Value::Array(errors)) => Err(Error::ComplexBadRequest {
            failure,
            errors: errors.clone(),
        }),
        _ => Err(Error::Http(failure)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;
    use serde_json::json;

    fn response(status: u16, body: &str) -> ApiResponse {
        ApiResponse {
            method: Method::PUT,
            url: "http://localhost:8088/api/v1/dashboard/1".to_string(),
            status: StatusCode::from_u16(status).unwrap(),
            headers: HeaderMap::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn success_and_redirect_statuses_pass() {
        assert!(raise_for_status(&response(200, "")).is_ok());
        assert!(raise_for_status(&response(201, "not json")).is_ok());
        assert!(raise_for_status(&response(304, "")).is_ok());
    }

    #[test]
    fn message_becomes_bad_request() {
        let err = raise_for_status(&response(422, r#"{"message":"bad field"}"#)).unwrap_err();
        match err {
            Error::BadRequest { failure, message } => {
                assert_eq!(message, "bad field");
                assert_eq!(failure.status, StatusCode::UNPROCESSABLE_ENTITY);
                assert_eq!(failure.method, Method::PUT);
                assert!(failure.body.contains("bad field"));
            }
            other => panic!("expected BadRequest, got {other:?}"),
        }
    }

    #[test]
    fn errors_array_becomes_complex_bad_request() {
        let err = raise_for_status(&response(422, r#"{"errors":[{"field":"x"}]}"#)).unwrap_err();
        match err {
            Error::ComplexBadRequest { errors, .. } => {
                assert_eq!(errors, vec![json!({"field": "x"})]);
            }
            other => panic!("expected ComplexBadRequest, got {other:?}"),
        }
    }

    #[test]
    fn message_takes_precedence_over_errors() {
        let body = r#"{"message":"first","errors":[{"field":"x"}]}"#;
        let err = raise_for_status(&response(400, body)).unwrap_err();
        assert!(matches!(err, Error::BadRequest { ref message, .. } if message == "first"));
    }

    #[test]
    fn structured_message_is_rendered_as_json() {
        let body = r#"{"message":{"slug":["must be unique"]}}"#;
        let err = raise_for_status(&response(422, body)).unwrap_err();
        assert!(
            matches!(err, Error::BadRequest { ref message, .. } if message == r#"{"slug":["must be unique"]}"#)
        );
    }

    #[test]
    fn unparsable_body_passes_through() {
        let err = raise_for_status(&response(500, "<html>oops</html>")).unwrap_err();
        match err {
            Error::Http(failure) => {
                assert_eq!(failure.status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(failure.body, "<html>oops</html>");
            }
            other => panic!("expected Http, got {other:?}"),
        }
    }

    #[test]
    fn json_without_known_keys_passes_through() {
        let err = raise_for_status(&response(404, r#"{"detail":"gone"}"#)).unwrap_err();
        assert!(matches!(err, Error::Http(_)));
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn not_found_names_the_object() {
        let err = Error::NotFound { object: "Dashboard" };
        assert_eq!(err.to_string(), "No Dashboard has been found.");
    }
}
