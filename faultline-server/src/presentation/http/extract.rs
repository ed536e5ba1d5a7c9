use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Path, Request};

use crate::application::failure::Failure;
use crate::domain::error::AppError;

/// `Path` whose deserialization failures go through the reporting policy.
#[derive(Debug, FromRequestParts)]
#[from_request(via(Path), rejection(Failure))]
pub(crate) struct PathParam<T>(pub(crate) T);

/// JSON body whose rejections are raised as operational failures carrying
/// the rejection's own status.
#[derive(Debug)]
pub(crate) struct JsonBody<T>(pub(crate) T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = Failure;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                Err(AppError::custom(rejection.body_text(), rejection.status(), true).into())
            }
        }
    }
}
