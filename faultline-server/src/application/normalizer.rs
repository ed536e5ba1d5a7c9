//! Turns failures that did not come from the factory into canonical entities.
//!
//! Each recognised shape is a pure function over the foreign error. They are
//! tried in a fixed order and the first match wins; anything left over is
//! wrapped as a non-operational generic entity.

use std::error::Error as StdError;
use std::sync::LazyLock;

use axum::extract::path::{ErrorKind as PathErrorKind, FailedToDeserializePathParams};
use axum::extract::rejection::PathRejection;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use regex::Regex;
use serde_json::{Map, Value, json};
use sqlx::error::DatabaseError;
use sqlx::postgres::PgDatabaseError;
use validator::ValidationErrors;

use crate::application::failure::Failure;
use crate::domain::error::{AppError, Cause};

pub(crate) const INVALID_TOKEN_MESSAGE: &str = "Invalid token. Please log in again!";
pub(crate) const EXPIRED_TOKEN_MESSAGE: &str = "Your token has expired! Please log in again.";

/// Codes storage backends report for a uniqueness violation: Postgres
/// `unique_violation` and the MongoDB duplicate key code.
const UNIQUE_VIOLATION_CODES: [&str; 2] = ["23505", "11000"];

static QUOTED_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""[^"]*"|'[^']*'"#).expect("quoted value pattern is valid"));
static DETAIL_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(([^)]*)\)=\((.*)\)").expect("key detail pattern is valid")
});

type ShapeMatcher = fn(&anyhow::Error) -> Option<AppError>;

const SHAPES: [ShapeMatcher; 5] = [
    cast_failure,
    duplicate_key,
    field_validation,
    malformed_token,
    expired_token,
];

/// Canonical entities pass through untouched, foreign failures are matched
/// against the known shapes.
pub(crate) fn normalize(failure: Failure) -> AppError {
    match failure {
        Failure::Canonical(app) => app,
        Failure::Foreign(err) => match SHAPES.iter().find_map(|shape| shape(&err)) {
            Some(app) => app,
            None => AppError::unexpected(err.to_string(), Cause::from_anyhow(err)),
        },
    }
}

fn find_in_chain<T>(err: &anyhow::Error) -> Option<&T>
where
    T: StdError + 'static,
{
    err.chain().find_map(|cause| cause.downcast_ref::<T>())
}

fn cast_failure(err: &anyhow::Error) -> Option<AppError> {
    let kind = err.chain().find_map(|cause| {
        if let Some(PathRejection::FailedToDeserializePathParams(inner)) =
            cause.downcast_ref::<PathRejection>()
        {
            return Some(inner.kind());
        }
        cause
            .downcast_ref::<FailedToDeserializePathParams>()
            .map(FailedToDeserializePathParams::kind)
    })?;

    let (path, value) = match kind {
        PathErrorKind::ParseErrorAtKey { key, value, .. } => (key.clone(), value.clone()),
        PathErrorKind::ParseErrorAtIndex { index, value, .. } => (index.to_string(), value.clone()),
        PathErrorKind::DeserializeError { key, value, .. } => (key.clone(), value.clone()),
        PathErrorKind::ParseError { value, .. } => ("parameter".to_string(), value.clone()),
        _ => return None,
    };

    Some(AppError::validation(format!("Invalid {path}: {value}"), None))
}

fn duplicate_key(err: &anyhow::Error) -> Option<AppError> {
    let db_err = err.chain().find_map(|cause| match cause.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db_err)) => Some(db_err.as_ref()),
        _ => None,
    })?;

    let code = db_err.code();
    let is_duplicate = db_err.is_unique_violation()
        || code
            .as_deref()
            .is_some_and(|code| UNIQUE_VIOLATION_CODES.contains(&code));
    if !is_duplicate {
        return None;
    }

    let message = match duplicated_value(db_err) {
        Some(value) => format!("Duplicate field value: {value}. Please use another value!"),
        None => "Duplicate field value. Please use another value!".to_string(),
    };
    Some(AppError::validation(message, None))
}

fn duplicated_value(db_err: &(dyn DatabaseError + 'static)) -> Option<String> {
    // Postgres puts the offending value in the detail: `Key (email)=(a@b.c) already exists.`
    let from_detail = db_err
        .try_downcast_ref::<PgDatabaseError>()
        .and_then(PgDatabaseError::detail)
        .and_then(|detail| DETAIL_VALUE.captures(detail))
        .and_then(|captures| captures.get(2))
        .map(|value| format!("\"{}\"", value.as_str()));

    from_detail.or_else(|| {
        QUOTED_VALUE
            .find(db_err.message())
            .map(|value| value.as_str().to_string())
    })
}

fn field_validation(err: &anyhow::Error) -> Option<AppError> {
    let errors = find_in_chain::<ValidationErrors>(err)?;

    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|(left, _), (right, _)| left.cmp(right));

    let mut messages = Vec::new();
    let mut details = Map::new();
    for (field, field_errors) in fields {
        let rendered: Vec<String> = field_errors
            .iter()
            .map(|error| match &error.message {
                Some(message) => message.to_string(),
                None => format!("{field} is invalid ({})", error.code),
            })
            .collect();
        messages.extend(rendered.iter().cloned());
        details.insert(field.to_string(), json!(rendered));
    }

    let message = if messages.is_empty() {
        "Invalid input data.".to_string()
    } else {
        format!("Invalid input data. {}", messages.join(". "))
    };
    Some(AppError::validation(message, Some(Value::Object(details))))
}

fn malformed_token(err: &anyhow::Error) -> Option<AppError> {
    let jwt_err = find_in_chain::<jsonwebtoken::errors::Error>(err)?;
    if matches!(jwt_err.kind(), JwtErrorKind::ExpiredSignature) {
        return None;
    }
    Some(AppError::unauthorized(INVALID_TOKEN_MESSAGE))
}

fn expired_token(err: &anyhow::Error) -> Option<AppError> {
    let jwt_err = find_in_chain::<jsonwebtoken::errors::Error>(err)?;
    matches!(jwt_err.kind(), JwtErrorKind::ExpiredSignature)
        .then(|| AppError::unauthorized(EXPIRED_TOKEN_MESSAGE))
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;
    use std::fmt;

    use anyhow::Context;
    use axum::http::StatusCode;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{EncodingKey, Header, encode};
    use sqlx::error::{DatabaseError, ErrorKind as DbErrorKind};
    use validator::Validate;

    use super::{EXPIRED_TOKEN_MESSAGE, INVALID_TOKEN_MESSAGE, normalize};
    use crate::application::failure::Failure;
    use crate::domain::error::{AppError, ErrorKind};
    use crate::infrastructure::jwt::{Claims, JwtService};

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[derive(Debug)]
    struct FakeDbError {
        code: &'static str,
        message: String,
        unique: bool,
    }

    impl fmt::Display for FakeDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.message)
        }
    }

    impl std::error::Error for FakeDbError {}

    impl DatabaseError for FakeDbError {
        fn message(&self) -> &str {
            &self.message
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.code))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> DbErrorKind {
            if self.unique {
                DbErrorKind::UniqueViolation
            } else {
                DbErrorKind::Other
            }
        }
    }

    fn db_failure(code: &'static str, message: &str, unique: bool) -> Failure {
        Failure::from(sqlx::Error::Database(Box::new(FakeDbError {
            code,
            message: message.to_string(),
            unique,
        })))
    }

    #[derive(Debug, Validate)]
    struct SignupForm {
        #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
        name: String,
        #[validate(email(message = "Please provide a valid email"))]
        email: String,
    }

    #[test]
    fn duplicate_key_extracts_the_quoted_value() {
        let failure = db_failure(
            "11000",
            r#"E11000 duplicate key error collection: app.users index: email_1 dup key: { email: "john@example.com" }"#,
            false,
        );

        let app = normalize(failure);
        assert_eq!(app.kind(), ErrorKind::Validation);
        assert_eq!(app.status_code(), StatusCode::BAD_REQUEST);
        assert!(app.message().contains(r#"Duplicate field value: "john@example.com""#));
        assert!(app.is_operational());
    }

    #[test]
    fn unique_violation_kind_is_recognised_without_a_known_code() {
        let failure = db_failure("SQLITE_CONSTRAINT", "UNIQUE constraint failed: 'users.email'", true);

        let app = normalize(failure);
        assert_eq!(app.kind(), ErrorKind::Validation);
        assert_eq!(
            app.message(),
            "Duplicate field value: 'users.email'. Please use another value!"
        );
    }

    #[test]
    fn other_database_failures_are_not_duplicates() {
        let failure = db_failure("08006", "connection failure", false);

        let app = normalize(failure);
        assert_eq!(app.kind(), ErrorKind::Generic);
        assert_eq!(app.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!app.is_operational());
    }

    #[test]
    fn field_validation_joins_sub_errors() {
        let form = SignupForm {
            name: "J".to_string(),
            email: "not-an-email".to_string(),
        };
        let errors = form.validate().expect_err("form must be invalid");

        let app = normalize(Failure::from(errors));
        assert_eq!(app.kind(), ErrorKind::Validation);
        assert_eq!(app.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            app.message(),
            "Invalid input data. Please provide a valid email. Name must be at least 2 characters"
        );
        let details = app.details().expect("details must be attached");
        assert_eq!(details["name"][0], "Name must be at least 2 characters");
    }

    #[test]
    fn malformed_token_is_unauthorized() {
        let jwt = JwtService::new(SECRET, 3600);
        let err = jwt.verify_token("definitely.not.a-token").expect_err("must fail");

        let app = normalize(Failure::from(err));
        assert_eq!(app.kind(), ErrorKind::Unauthorized);
        assert_eq!(app.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(app.message(), INVALID_TOKEN_MESSAGE);
    }

    #[test]
    fn token_signed_with_another_secret_is_unauthorized() {
        let other = JwtService::new("fedcba9876543210fedcba9876543210", 3600);
        let token = other.generate_token(7, "someone").expect("token must encode");
        let err = JwtService::new(SECRET, 3600)
            .verify_token(&token)
            .expect_err("signature must not match");

        assert_eq!(normalize(Failure::from(err)).message(), INVALID_TOKEN_MESSAGE);
    }

    #[test]
    fn expired_token_is_unauthorized_with_expiry_message() {
        let claims = Claims {
            user_id: 7,
            username: "someone".to_string(),
            exp: (Utc::now() - Duration::hours(1)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .expect("token must encode");
        let err = JwtService::new(SECRET, 3600)
            .verify_token(&token)
            .expect_err("token must be expired");

        let app = normalize(Failure::from(err));
        assert_eq!(app.kind(), ErrorKind::Unauthorized);
        assert_eq!(app.message(), EXPIRED_TOKEN_MESSAGE);
    }

    #[test]
    fn shapes_are_found_behind_context() {
        let err = JwtService::new(SECRET, 3600)
            .verify_token("garbage")
            .context("loading session");

        let failure = Failure::from_anyhow(err.expect_err("must fail"));
        assert_eq!(normalize(failure).kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn unknown_foreign_failure_is_wrapped_as_generic() {
        let failure = Failure::from_anyhow(anyhow::anyhow!("cannot read property 'id' of undefined"));

        let app = normalize(failure);
        assert_eq!(app.kind(), ErrorKind::Generic);
        assert_eq!(app.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!app.is_operational());
        assert_eq!(
            app.cause().map(ToString::to_string).as_deref(),
            Some("cannot read property 'id' of undefined")
        );
    }

    #[test]
    fn canonical_entities_are_not_wrapped_again() {
        let original = AppError::not_found("User");
        let once = normalize(Failure::from(original.clone()));
        let twice = normalize(Failure::from(once.clone()));

        for app in [&once, &twice] {
            assert_eq!(app.kind(), original.kind());
            assert_eq!(app.message(), original.message());
            assert_eq!(app.status_code(), original.status_code());
            assert_eq!(app.is_operational(), original.is_operational());
            assert_eq!(app.origin().location(), original.origin().location());
            assert!(app.cause().is_none());
        }
    }
}
