use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use super::ErrorKind;

/// Outward classification derived from the status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum StatusClass {
    Fail,
    Error,
}

impl StatusClass {
    pub(crate) fn of(status: StatusCode) -> Self {
        if status.is_client_error() {
            StatusClass::Fail
        } else {
            StatusClass::Error
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            StatusClass::Fail => "fail",
            StatusClass::Error => "error",
        }
    }
}

/// Lower-level failure wrapped by an [`AppError`].
#[derive(Clone)]
pub(crate) struct Cause(Arc<dyn StdError + Send + Sync + 'static>);

impl Cause {
    pub(crate) fn new<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Arc::new(err))
    }

    pub(crate) fn from_anyhow(err: anyhow::Error) -> Self {
        let boxed: Box<dyn StdError + Send + Sync + 'static> = err.into();
        Self(Arc::from(boxed))
    }
}

impl fmt::Debug for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl StdError for Cause {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

/// Call site and stack captured when an [`AppError`] is built.
///
/// Only ever written to server-side logs.
#[derive(Clone)]
pub(crate) struct Origin {
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

impl Origin {
    #[track_caller]
    pub(crate) fn capture() -> Self {
        Self {
            location: Location::caller(),
            backtrace: Arc::new(Backtrace::capture()),
        }
    }

    pub(crate) fn location(&self) -> &'static Location<'static> {
        self.location
    }

    pub(crate) fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Debug for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Origin({})", self.location)
    }
}

/// The canonical failure record.
///
/// Fields are private: an entity is fully populated by one of the factory
/// constructors and never changes afterwards. The status class is not stored
/// at all, it is derived from the status code on every read.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub(crate) struct AppError {
    kind: ErrorKind,
    message: String,
    status_code: StatusCode,
    operational: bool,
    details: Option<Value>,
    #[source]
    cause: Option<Cause>,
    origin: Origin,
}

impl AppError {
    pub(super) fn assemble(
        kind: ErrorKind,
        message: String,
        status_code: StatusCode,
        operational: bool,
        details: Option<Value>,
        cause: Option<Cause>,
        origin: Origin,
    ) -> Self {
        Self {
            kind,
            message,
            status_code,
            operational,
            details,
            cause,
            origin,
        }
    }

    pub(crate) fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub(crate) fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn status_code(&self) -> StatusCode {
        self.status_code
    }

    pub(crate) fn status_class(&self) -> StatusClass {
        StatusClass::of(self.status_code)
    }

    pub(crate) fn is_operational(&self) -> bool {
        self.operational
    }

    pub(crate) fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    pub(crate) fn cause(&self) -> Option<&Cause> {
        self.cause.as_ref()
    }

    pub(crate) fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Human-readable trace: a header line, the construction site and, when
    /// backtraces are enabled, the captured frames.
    pub(crate) fn stack(&self) -> String {
        let mut stack = format!(
            "{}: {}\n    at {}",
            self.kind, self.message, self.origin.location()
        );
        if self.origin.backtrace().status() == BacktraceStatus::Captured {
            stack.push('\n');
            stack.push_str(&self.origin.backtrace().to_string());
        }
        if let Some(cause) = &self.cause {
            stack.push_str("\nCaused by: ");
            stack.push_str(&cause.to_string());
        }
        stack
    }

    /// Full-fidelity view used by development responses and logs.
    pub(crate) fn describe(&self) -> Value {
        json!({
            "name": self.kind.name(),
            "kind": self.kind,
            "statusCode": self.status_code.as_u16(),
            "status": self.status_class(),
            "isOperational": self.operational,
            "message": self.message,
            "details": self.details,
            "cause": self.cause.as_ref().map(ToString::to_string),
            "origin": self.origin.location().to_string(),
        })
    }
}
