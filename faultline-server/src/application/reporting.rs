use axum::Json;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::application::failure::Failure;
use crate::application::normalizer::normalize;
use crate::domain::error::{AppError, StatusClass};
use crate::infrastructure::settings::Environment;

pub(crate) const GENERIC_MESSAGE: &str = "Something went wrong!";

/// What the reporting policy knows about the request that failed.
#[derive(Debug, Clone, Default)]
pub(crate) struct RequestContext {
    pub(crate) method: String,
    pub(crate) path: String,
    pub(crate) client_ip: Option<String>,
    pub(crate) user_agent: Option<String>,
    pub(crate) user: Option<String>,
    pub(crate) headers: Option<HeaderMap>,
    pub(crate) body: Option<String>,
}

impl RequestContext {
    pub(crate) fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    fn client(&self) -> &str {
        self.client_ip.as_deref().unwrap_or("-")
    }

    fn agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or("-")
    }

    fn user(&self) -> &str {
        self.user.as_deref().unwrap_or("-")
    }
}

/// Full-fidelity payload returned in development.
#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct DevelopmentErrorBody {
    #[schema(value_type = String, example = "fail")]
    pub(crate) status: StatusClass,
    #[schema(value_type = Object)]
    pub(crate) error: Value,
    pub(crate) message: String,
    pub(crate) stack: String,
    pub(crate) timestamp: String,
    pub(crate) path: String,
    pub(crate) method: String,
}

/// Caller-safe payload returned everywhere else.
#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct RestrictedErrorBody {
    #[schema(value_type = String, example = "fail")]
    pub(crate) status: StatusClass,
    pub(crate) message: String,
    pub(crate) timestamp: String,
    pub(crate) path: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum ErrorBody {
    Development(DevelopmentErrorBody),
    Restricted(RestrictedErrorBody),
}

/// Decides how a failure is logged and what the caller gets back.
#[derive(Debug, Clone)]
pub(crate) struct ErrorReporter {
    environment: Environment,
}

impl ErrorReporter {
    pub(crate) fn new(environment: Environment) -> Self {
        Self { environment }
    }

    pub(crate) fn environment(&self) -> Environment {
        self.environment
    }

    pub(crate) fn report(&self, failure: Failure, ctx: &RequestContext) -> Response {
        let (status, body) = self.render(failure, ctx);
        (status, Json(body)).into_response()
    }

    pub(crate) fn render(&self, failure: Failure, ctx: &RequestContext) -> (StatusCode, ErrorBody) {
        match self.environment {
            Environment::Development => Self::render_development(failure, ctx),
            Environment::Production => Self::render_restricted(failure, ctx),
        }
    }

    fn render_development(failure: Failure, ctx: &RequestContext) -> (StatusCode, ErrorBody) {
        let status = failure.status_code();
        let entity = failure.describe();
        let stack = failure.stack();

        if is_severe(status, failure.is_operational()) {
            error!(
                method = %ctx.method,
                path = %ctx.path,
                client = ctx.client(),
                user_agent = ctx.agent(),
                user = ctx.user(),
                status = status.as_u16(),
                error = %entity,
                stack = %stack,
                headers = ?ctx.headers,
                body = ctx.body.as_deref().unwrap_or(""),
                "error in development"
            );
        } else {
            warn!(
                method = %ctx.method,
                path = %ctx.path,
                client = ctx.client(),
                user_agent = ctx.agent(),
                user = ctx.user(),
                status = status.as_u16(),
                error = %entity,
                stack = %stack,
                headers = ?ctx.headers,
                body = ctx.body.as_deref().unwrap_or(""),
                "error in development"
            );
        }

        let body = DevelopmentErrorBody {
            status: failure.status_class(),
            error: entity,
            message: failure.message(),
            stack,
            timestamp: timestamp(),
            path: ctx.path.clone(),
            method: ctx.method.clone(),
        };
        (status, ErrorBody::Development(body))
    }

    fn render_restricted(failure: Failure, ctx: &RequestContext) -> (StatusCode, ErrorBody) {
        let foreign_trace = failure.as_canonical().is_none().then(|| failure.stack());
        let app = normalize(failure);
        log_restricted(&app, foreign_trace.as_deref(), ctx);

        if app.is_operational() {
            let body = RestrictedErrorBody {
                status: app.status_class(),
                message: app.message().to_string(),
                timestamp: timestamp(),
                path: ctx.path.clone(),
            };
            return (app.status_code(), ErrorBody::Restricted(body));
        }

        let body = RestrictedErrorBody {
            status: StatusClass::Error,
            message: GENERIC_MESSAGE.to_string(),
            timestamp: timestamp(),
            path: ctx.path.clone(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::Restricted(body))
    }
}

/// Server faults and anything not anticipated are logged at `ERROR`,
/// operational client failures at `WARN`.
fn is_severe(status: StatusCode, operational: bool) -> bool {
    status.is_server_error() || !operational
}

fn log_restricted(app: &AppError, foreign_trace: Option<&str>, ctx: &RequestContext) {
    if is_severe(app.status_code(), app.is_operational()) {
        error!(
            method = %ctx.method,
            path = %ctx.path,
            client = ctx.client(),
            user_agent = ctx.agent(),
            user = ctx.user(),
            status = app.status_code().as_u16(),
            class = app.status_class().as_str(),
            kind = %app.kind(),
            operational = app.is_operational(),
            detail = app.message(),
            stack = %app.stack(),
            cause_trace = foreign_trace.unwrap_or("-"),
            "error in production"
        );
    } else {
        warn!(
            method = %ctx.method,
            path = %ctx.path,
            client = ctx.client(),
            user_agent = ctx.agent(),
            user = ctx.user(),
            status = app.status_code().as_u16(),
            class = app.status_class().as_str(),
            kind = %app.kind(),
            operational = true,
            detail = app.message(),
            "error in production"
        );
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
