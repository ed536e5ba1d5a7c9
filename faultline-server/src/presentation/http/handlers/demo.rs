//! Endpoints that raise every kind of failure the service knows how to
//! classify. Their business content is deliberately trivial.

use std::io;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use validator::Validate;

use crate::application::failure::Failure;
use crate::application::reporting::{DevelopmentErrorBody, RestrictedErrorBody};
use crate::domain::error::{AppError, Cause, ErrorKind};
use crate::presentation::AppState;
use crate::presentation::http::app_error::AppResult;
use crate::presentation::http::extract::{JsonBody, PathParam};
use crate::presentation::http::middleware::auth::AuthenticatedUser;

const TAKEN_EMAIL: &str = "john@example.com";

/// Named so a cast failure can report which segment was wrong.
#[derive(Debug, Deserialize)]
pub(crate) struct ItemPath {
    id: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct ItemDto {
    pub(crate) id: u64,
    pub(crate) name: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub(crate) struct SignupDto {
    #[validate(length(min = 2, max = 50, message = "Name must be between 2 and 50 characters"))]
    pub(crate) name: String,
    #[validate(email(message = "Please provide a valid email"))]
    pub(crate) email: String,
    #[validate(range(min = 18, max = 120, message = "Age must be between 18 and 120"))]
    pub(crate) age: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct SignupResponseDto {
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) access_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct SessionDto {
    pub(crate) user_id: i64,
    pub(crate) username: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct AcceptedDto {
    pub(crate) status: String,
}

#[utoipa::path(
    get,
    path = "/api/demo/items/{id}",
    tag = "demo",
    params(("id" = u64, Path, description = "Item id; only 1 exists")),
    responses(
        (status = 200, description = "Item found", body = ItemDto),
        (status = 400, description = "Id is not a number", body = RestrictedErrorBody),
        (status = 404, description = "Item not found", body = RestrictedErrorBody)
    )
)]
pub(crate) async fn get_item(PathParam(ItemPath { id }): PathParam<ItemPath>) -> AppResult<Json<ItemDto>> {
    if id != 1 {
        return Err(AppError::not_found("Item").into());
    }
    Ok(Json(ItemDto {
        id,
        name: "Sample item".to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/demo/signup",
    tag = "demo",
    request_body = SignupDto,
    responses(
        (status = 201, description = "Signed up", body = SignupResponseDto),
        (status = 400, description = "Invalid input data", body = RestrictedErrorBody),
        (status = 409, description = "Email already registered", body = RestrictedErrorBody)
    )
)]
pub(crate) async fn signup(
    State(state): State<AppState>,
    JsonBody(dto): JsonBody<SignupDto>,
) -> AppResult<(StatusCode, Json<SignupResponseDto>)> {
    dto.validate()?;

    if dto.email.eq_ignore_ascii_case(TAKEN_EMAIL) {
        return Err(AppError::conflict("User with this email already exists").into());
    }

    let access_token = state.jwt.generate_token(1, &dto.name)?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponseDto {
            name: dto.name,
            email: dto.email,
            access_token,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/demo/session",
    tag = "demo",
    responses(
        (status = 200, description = "Token is valid", body = SessionDto),
        (status = 401, description = "Missing, malformed or expired token", body = RestrictedErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub(crate) async fn session(user: AuthenticatedUser) -> Json<SessionDto> {
    Json(SessionDto {
        user_id: user.user_id,
        username: user.username,
    })
}

#[utoipa::path(
    get,
    path = "/api/demo/errors/{kind}",
    tag = "demo",
    params((
        "kind" = String,
        Path,
        description = "validation, not-found, unauthorized, forbidden, conflict, database, \
                       external-service, custom, unhandled, panic or detached"
    )),
    responses(
        (status = 202, description = "Detached failure scheduled (development only)", body = AcceptedDto),
        (status = "4XX", description = "Operational failure", body = RestrictedErrorBody),
        (status = "5XX", description = "Non-operational failure", body = DevelopmentErrorBody)
    )
)]
pub(crate) async fn raise(
    State(state): State<AppState>,
    PathParam(kind): PathParam<String>,
) -> AppResult<(StatusCode, Json<AcceptedDto>)> {
    let failure: Failure = match kind.as_str() {
        "validation" => {
            AppError::validation("Email is required", Some(json!({ "email": ["required"] }))).into()
        }
        "not-found" => AppError::not_found("User").into(),
        "unauthorized" => AppError::unauthorized("Missing credentials for this resource").into(),
        "forbidden" => {
            AppError::forbidden("You do not have permission to perform this action").into()
        }
        "conflict" => AppError::from_kind(ErrorKind::Conflict).into(),
        "database" => {
            let driver = io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused");
            AppError::database("Failed to fetch users from database", Some(Cause::new(driver))).into()
        }
        "external-service" => AppError::external_service("Payment gateway", "Service unavailable").into(),
        "custom" => AppError::custom("Too many requests", StatusCode::TOO_MANY_REQUESTS, true).into(),
        "unhandled" => {
            let quantity: i64 = "forty-two".parse()?;
            AppError::validation(format!("Unexpected quantity {quantity}"), None).into()
        }
        "panic" => panic!("simulated programming error"),
        "detached" if state.reporter.environment().is_development() => {
            state.monitor.spawn_detached("demo-detached", async {
                tokio::task::yield_now().await;
                Err::<(), _>(anyhow::anyhow!("detached demo task failed"))
            });
            return Ok((
                StatusCode::ACCEPTED,
                Json(AcceptedDto {
                    status: "accepted".to_string(),
                }),
            ));
        }
        other => AppError::not_found(format!("Error kind `{other}`")).into(),
    };

    Err(failure)
}
