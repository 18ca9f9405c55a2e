//! # Errors
//!
//! Structured errors with a status code and class name. They travel inside
//! `anyhow::Error` through the hook pipeline; the transport decides how to
//! serialize them (see [`QslError::to_envelope`]).

use std::fmt;

use anyhow::Error as AnyError;
use serde_json::{json, Value};

/// Error class names + status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,       // 400
    NotAuthenticated, // 401
    Forbidden,        // 403
    NotFound,         // 404
    MethodNotAllowed, // 405
    Unprocessable,    // 422
    GeneralError,     // 500
    Unavailable,      // 503
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::NotAuthenticated => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::MethodNotAllowed => 405,
            ErrorKind::Unprocessable => 422,
            ErrorKind::GeneralError => 500,
            ErrorKind::Unavailable => 503,
        }
    }

    /// Error `name` (e.g. "NotFound")
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::NotAuthenticated => "NotAuthenticated",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::MethodNotAllowed => "MethodNotAllowed",
            ErrorKind::Unprocessable => "Unprocessable",
            ErrorKind::GeneralError => "GeneralError",
            ErrorKind::Unavailable => "Unavailable",
        }
    }

    /// Error `className`, kebab-cased
    pub fn class_name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad-request",
            ErrorKind::NotAuthenticated => "not-authenticated",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not-found",
            ErrorKind::MethodNotAllowed => "method-not-allowed",
            ErrorKind::Unprocessable => "unprocessable",
            ErrorKind::GeneralError => "general-error",
            ErrorKind::Unavailable => "unavailable",
        }
    }
}

/// A structured error that can live inside `anyhow::Error`.
#[derive(Debug)]
pub struct QslError {
    pub kind: ErrorKind,
    pub message: String,
    pub errors: Option<Value>,
    pub source: Option<AnyError>,
}

impl QslError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            errors: None,
            source: None,
        }
    }

    pub fn with_errors(mut self, errors: Value) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn with_source(mut self, source: AnyError) -> Self {
        self.source = Some(source);
        self
    }

    pub fn code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn class_name(&self) -> &'static str {
        self.kind.class_name()
    }

    /// Convert into `anyhow::Error` so it flows through the hook pipeline.
    pub fn into_anyhow(self) -> AnyError {
        AnyError::new(self)
    }

    /// Downcast an `anyhow::Error` to a `QslError` if possible.
    pub fn from_anyhow(err: &AnyError) -> Option<&QslError> {
        err.downcast_ref::<QslError>()
    }

    /// Find a `QslError` anywhere in the context chain of `err`.
    pub fn find_in(err: &AnyError) -> Option<&QslError> {
        err.chain().find_map(|e| e.downcast_ref::<QslError>())
    }

    /// Copy without the `source`, safe to send to clients.
    pub fn sanitize_for_client(&self) -> QslError {
        QslError {
            kind: self.kind,
            message: self.message.clone(),
            errors: self.errors.clone(),
            source: None,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, msg)
    }
    pub fn not_authenticated(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotAuthenticated, msg)
    }
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, msg)
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }
    pub fn method_not_allowed(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::MethodNotAllowed, msg)
    }
    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unprocessable, msg)
    }
    pub fn general_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::GeneralError, msg)
    }
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, msg)
    }
}

impl fmt::Display for QslError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.code(), self.message)
    }
}

impl std::error::Error for QslError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl QslError {
    /// JSON payload: `{name, message, code, className, errors?}`.
    pub fn to_json(&self) -> Value {
        let mut base = json!({
            "name": self.name(),
            "message": self.message,
            "code": self.code(),
            "className": self.class_name(),
        });

        if let Some(e) = &self.errors {
            base["errors"] = e.clone();
        }
        base
    }

    /// Response body for failed requests: `{success: false, error: {...}}`.
    pub fn to_envelope(&self) -> Value {
        json!({
            "success": false,
            "error": self.to_json(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_status_and_field_errors() {
        let err = QslError::unprocessable("Cards schema validation failed")
            .with_errors(json!({"callsign": ["is required"]}));
        let body = err.to_envelope();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], 422);
        assert_eq!(body["error"]["className"], "unprocessable");
        assert_eq!(body["error"]["errors"]["callsign"][0], "is required");
    }

    #[test]
    fn find_in_sees_through_context() {
        use anyhow::Context;
        let err: anyhow::Result<()> = Err(QslError::not_found("Card not found").into_anyhow());
        let err = err.context("loading card").unwrap_err();
        assert_eq!(QslError::find_in(&err).map(|e| e.code()), Some(404));
    }

    #[test]
    fn sanitized_copy_drops_source() {
        let err = QslError::unavailable("Service temporarily unavailable")
            .with_source(anyhow::anyhow!("socket closed"));
        assert!(err.source.is_some());
        assert!(err.sanitize_for_client().source.is_none());
    }

    #[test]
    fn service_failures_map_to_their_status() {
        assert_eq!(QslError::method_not_allowed("Method not allowed: move").code(), 405);
        assert_eq!(QslError::unavailable("down").class_name(), "unavailable");
        assert_eq!(QslError::not_authenticated("no token").name(), "NotAuthenticated");
    }
}
