use axum::http::StatusCode;
use serde_json::Value;

use super::{AppError, Cause, ErrorKind, Origin};

// Every constructor is `#[track_caller]` so the captured origin points at the
// code raising the failure rather than at this module.
impl AppError {
    #[track_caller]
    fn preset(kind: ErrorKind, message: String) -> Self {
        AppError::assemble(
            kind,
            message,
            kind.default_status(),
            kind.is_operational(),
            None,
            None,
            Origin::capture(),
        )
    }

    /// Catalog variant with every default applied.
    #[track_caller]
    pub(crate) fn from_kind(kind: ErrorKind) -> Self {
        Self::preset(kind, kind.default_message().to_string())
    }

    #[track_caller]
    pub(crate) fn validation(message: impl Into<String>, details: Option<Value>) -> Self {
        let err = Self::preset(ErrorKind::Validation, message.into());
        match details {
            Some(details) => err.with_details(details),
            None => err,
        }
    }

    #[track_caller]
    pub(crate) fn not_found(resource: impl Into<String>) -> Self {
        Self::preset(ErrorKind::NotFound, format!("{} not found", resource.into()))
    }

    #[track_caller]
    pub(crate) fn unauthorized(message: impl Into<String>) -> Self {
        Self::preset(ErrorKind::Unauthorized, message.into())
    }

    #[track_caller]
    pub(crate) fn forbidden(message: impl Into<String>) -> Self {
        Self::preset(ErrorKind::Forbidden, message.into())
    }

    #[track_caller]
    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        Self::preset(ErrorKind::Conflict, message.into())
    }

    #[track_caller]
    pub(crate) fn database(message: impl Into<String>, cause: Option<Cause>) -> Self {
        let err = Self::preset(ErrorKind::Database, message.into());
        match cause {
            Some(cause) => err.with_cause(cause),
            None => err,
        }
    }

    #[track_caller]
    pub(crate) fn external_service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::preset(
            ErrorKind::ExternalService,
            format!("{}: {}", service.into(), message.into()),
        )
    }

    /// Escape hatch for failures outside the catalog.
    #[track_caller]
    pub(crate) fn custom(message: impl Into<String>, status_code: StatusCode, operational: bool) -> Self {
        AppError::assemble(
            ErrorKind::Generic,
            message.into(),
            status_code,
            operational,
            None,
            None,
            Origin::capture(),
        )
    }

    /// Non-operational wrapper for a failure nothing else recognised.
    #[track_caller]
    pub(crate) fn unexpected(message: impl Into<String>, cause: Cause) -> Self {
        Self::preset(ErrorKind::Generic, message.into()).with_cause(cause)
    }

    fn with_details(self, details: Value) -> Self {
        AppError::assemble(
            self.kind(),
            self.message().to_string(),
            self.status_code(),
            self.is_operational(),
            Some(details),
            self.cause().cloned(),
            self.origin().clone(),
        )
    }

    fn with_cause(self, cause: Cause) -> Self {
        AppError::assemble(
            self.kind(),
            self.message().to_string(),
            self.status_code(),
            self.is_operational(),
            self.details().cloned(),
            Some(cause),
            self.origin().clone(),
        )
    }
}
