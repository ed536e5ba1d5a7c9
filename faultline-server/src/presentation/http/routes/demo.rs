use axum::Router;
use axum::routing::{get, post};

use crate::presentation::AppState;
use crate::presentation::http::handlers::demo::{get_item, raise, session, signup};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/items/{id}", get(get_item))
        .route("/signup", post(signup))
        .route("/session", get(session))
        .route("/errors/{kind}", get(raise))
}
