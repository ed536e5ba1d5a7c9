use std::fmt;

use axum::http::StatusCode;
use serde::Serialize;

/// Discriminant of every failure variant the service knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub(crate) enum ErrorKind {
    Validation,
    NotFound,
    Unauthorized,
    Forbidden,
    Conflict,
    Database,
    ExternalService,
    Generic,
}

impl ErrorKind {
    #[cfg(test)]
    pub(crate) const ALL: [ErrorKind; 8] = [
        ErrorKind::Validation,
        ErrorKind::NotFound,
        ErrorKind::Unauthorized,
        ErrorKind::Forbidden,
        ErrorKind::Conflict,
        ErrorKind::Database,
        ErrorKind::ExternalService,
        ErrorKind::Generic,
    ];

    pub(crate) fn default_status(self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Database | ErrorKind::Generic => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::ExternalService => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Operational kinds describe anticipated conditions whose message may be
    /// shown to the caller verbatim.
    pub(crate) fn is_operational(self) -> bool {
        !matches!(
            self,
            ErrorKind::Database | ErrorKind::ExternalService | ErrorKind::Generic
        )
    }

    pub(crate) fn default_message(self) -> &'static str {
        match self {
            ErrorKind::Validation => "Validation failed",
            ErrorKind::NotFound => "Resource not found",
            ErrorKind::Unauthorized => "Unauthorized access",
            ErrorKind::Forbidden => "Access forbidden",
            ErrorKind::Conflict => "Resource conflict",
            ErrorKind::Database => "Database operation failed",
            ErrorKind::ExternalService => "External service: Service unavailable",
            ErrorKind::Generic => "Internal server error",
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::Unauthorized => "UnauthorizedError",
            ErrorKind::Forbidden => "ForbiddenError",
            ErrorKind::Conflict => "ConflictError",
            ErrorKind::Database => "DatabaseError",
            ErrorKind::ExternalService => "ExternalServiceError",
            ErrorKind::Generic => "AppError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
