use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;

use axum::http::StatusCode;
use serde_json::{Value, json};
use thiserror::Error;

use crate::domain::error::{AppError, StatusClass};

/// Anything raised while handling a request.
///
/// Raising code either builds an [`AppError`] or lets a third-party error
/// propagate with `?`. Both end up here and are only shaped into a response
/// by the reporting policy.
#[derive(Debug)]
pub(crate) enum Failure {
    Canonical(AppError),
    Foreign(anyhow::Error),
}

/// Where a guarded operation panicked, recorded by the panic hook.
#[derive(Debug)]
pub(crate) struct PanicSite {
    location: String,
    trace: Backtrace,
}

impl PanicSite {
    pub(crate) fn capture(location: String) -> Self {
        Self {
            location,
            trace: Backtrace::force_capture(),
        }
    }

    pub(crate) fn location(&self) -> &str {
        &self.location
    }
}

/// A panic caught inside a guarded operation.
#[derive(Debug, Error)]
#[error("operation panicked: {message}")]
pub(crate) struct PanicFailure {
    pub(crate) message: String,
    /// Absent when no panic hook recorded the site.
    pub(crate) site: Option<PanicSite>,
}

impl PanicFailure {
    fn stack(&self) -> String {
        match &self.site {
            Some(site) => format!(
                "Panic: {}\n    at {}\n{}",
                self.message, site.location, site.trace
            ),
            None => format!("Panic: {}", self.message),
        }
    }
}

impl Failure {
    pub(crate) fn from_anyhow(err: anyhow::Error) -> Self {
        match err.downcast::<AppError>() {
            Ok(app) => Failure::Canonical(app),
            Err(other) => Failure::Foreign(other),
        }
    }

    pub(crate) fn as_canonical(&self) -> Option<&AppError> {
        match self {
            Failure::Canonical(app) => Some(app),
            Failure::Foreign(_) => None,
        }
    }

    /// Status to report before normalization; foreign failures default to 500.
    pub(crate) fn status_code(&self) -> StatusCode {
        self.as_canonical()
            .map(AppError::status_code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Foreign failures are never operational until normalized.
    pub(crate) fn is_operational(&self) -> bool {
        self.as_canonical().is_some_and(AppError::is_operational)
    }

    pub(crate) fn status_class(&self) -> StatusClass {
        StatusClass::of(self.status_code())
    }

    pub(crate) fn message(&self) -> String {
        match self {
            Failure::Canonical(app) => app.message().to_string(),
            Failure::Foreign(err) => err.to_string(),
        }
    }

    pub(crate) fn stack(&self) -> String {
        match self {
            Failure::Canonical(app) => app.stack(),
            // anyhow's debug format renders the cause chain and,
            // when captured, the backtrace
            Failure::Foreign(err) => match err.downcast_ref::<PanicFailure>() {
                Some(panic) => panic.stack(),
                None => format!("Error: {err:?}"),
            },
        }
    }

    pub(crate) fn describe(&self) -> Value {
        match self {
            Failure::Canonical(app) => app.describe(),
            Failure::Foreign(err) => json!({
                "name": "ForeignError",
                "statusCode": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                "status": StatusClass::Error,
                "message": err.to_string(),
                "chain": err.chain().skip(1).map(ToString::to_string).collect::<Vec<_>>(),
                "origin": err
                    .downcast_ref::<PanicFailure>()
                    .and_then(|panic| panic.site.as_ref())
                    .map(PanicSite::location),
            }),
        }
    }
}

impl<E> From<E> for Failure
where
    E: StdError + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Failure::from_anyhow(anyhow::Error::new(err))
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Canonical(app) => fmt::Display::fmt(app, f),
            Failure::Foreign(err) => fmt::Display::fmt(err, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::ParseIntError;

    use axum::http::StatusCode;

    use super::Failure;
    use crate::domain::error::{AppError, ErrorKind, StatusClass};

    #[test]
    fn app_error_stays_canonical_through_the_blanket_conversion() {
        let failure = Failure::from(AppError::not_found("User"));
        let app = failure.as_canonical().expect("must be canonical");
        assert_eq!(app.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn anyhow_wrapping_an_app_error_is_unwrapped() {
        let failure = Failure::from_anyhow(anyhow::Error::new(AppError::forbidden("no")));
        assert!(failure.as_canonical().is_some());
    }

    #[test]
    fn foreign_failures_default_to_internal_error() {
        let parse: Result<i64, ParseIntError> = "abc".parse();
        let failure = Failure::from(parse.expect_err("must fail"));

        assert!(failure.as_canonical().is_none());
        assert_eq!(failure.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failure.status_class(), StatusClass::Error);
        assert_eq!(failure.describe()["name"], "ForeignError");
        assert!(!failure.stack().is_empty());
    }
}
