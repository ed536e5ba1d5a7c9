use axum::Json;
use axum::extract::OriginalUri;
use serde::Serialize;
use utoipa::ToSchema;

use crate::application::failure::Failure;
use crate::domain::error::AppError;

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct IndexDto {
    pub(crate) status: String,
    pub(crate) message: String,
    pub(crate) docs: String,
    pub(crate) endpoints: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct HealthzDto {
    pub(crate) status: String,
}

#[utoipa::path(
    get,
    path = "/",
    tag = "system",
    responses((status = 200, description = "Service description", body = IndexDto))
)]
pub(crate) async fn index() -> Json<IndexDto> {
    Json(IndexDto {
        status: "success".to_string(),
        message: "Centralized error handling service".to_string(),
        docs: "/swagger-ui".to_string(),
        endpoints: [
            "/api/demo/items/{id}",
            "/api/demo/signup",
            "/api/demo/session",
            "/api/demo/errors/{kind}",
        ]
        .map(str::to_string)
        .to_vec(),
    })
}

#[utoipa::path(
    get,
    path = "/healthz",
    tag = "system",
    responses((status = 200, description = "Service is up", body = HealthzDto))
)]
pub(crate) async fn healthz() -> Json<HealthzDto> {
    Json(HealthzDto {
        status: "ok".to_string(),
    })
}

/// Fallback for every path no route matched.
pub(crate) async fn route_not_found(OriginalUri(uri): OriginalUri) -> Failure {
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    AppError::not_found(format!("Route {target}")).into()
}
