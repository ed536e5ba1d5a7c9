use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::application::failure::Failure;

pub(crate) type AppResult<T> = Result<T, Failure>;

/// A failure travelling from a handler back up to the operation guard.
///
/// Handlers never format error payloads themselves: the failure rides in the
/// response extensions and the guard middleware takes it out exactly once.
#[derive(Clone)]
pub(crate) struct RaisedFailure(Arc<Mutex<Option<Failure>>>);

impl RaisedFailure {
    fn take(&self) -> Option<Failure> {
        self.0.lock().ok()?.take()
    }
}

pub(crate) fn take_raised(response: &mut Response) -> Option<Failure> {
    response.extensions_mut().remove::<RaisedFailure>()?.take()
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        // the guard replaces this placeholder with the reported payload
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response
            .extensions_mut()
            .insert(RaisedFailure(Arc::new(Mutex::new(Some(self)))));
        response
    }
}

#[cfg(test)]
mod tests {
    use axum::response::IntoResponse;

    use super::take_raised;
    use crate::application::failure::Failure;
    use crate::domain::error::{AppError, ErrorKind};

    #[test]
    fn failure_is_carried_once() {
        let mut response = Failure::from(AppError::conflict("taken")).into_response();

        let failure = take_raised(&mut response).expect("failure must be attached");
        assert_eq!(failure.as_canonical().map(AppError::kind), Some(ErrorKind::Conflict));
        assert!(take_raised(&mut response).is_none());
    }
}
