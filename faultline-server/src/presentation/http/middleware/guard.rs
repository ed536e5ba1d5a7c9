use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::application::failure::Failure;
use crate::application::guard::guarded;
use crate::application::reporting::RequestContext;
use crate::presentation::AppState;
use crate::presentation::http::app_error::take_raised;
use crate::presentation::http::middleware::auth::bearer_token;

/// Largest request body copied into development logs.
const LOGGED_BODY_LIMIT: usize = 64 * 1024;

/// Runs the rest of the stack as a guarded operation and routes whatever it
/// raises, returned or panicked, to the reporting policy.
pub(crate) async fn operation_guard(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let (request, ctx) = match capture_context(&state, request).await {
        Ok(captured) => captured,
        Err((failure, ctx)) => return state.reporter.report(failure, &ctx),
    };

    let outcome = guarded(async move { Ok::<_, Failure>(next.run(request).await) }).await;

    match outcome {
        Ok(mut response) => match take_raised(&mut response) {
            Some(failure) => state.reporter.report(failure, &ctx),
            None => response,
        },
        Err(failure) => state.reporter.report(failure, &ctx),
    }
}

async fn capture_context(
    state: &AppState,
    request: Request,
) -> Result<(Request, RequestContext), (Failure, RequestContext)> {
    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| request.uri().path());
    let mut ctx = RequestContext::new(request.method().as_str(), path);

    ctx.client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());
    ctx.user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    ctx.user = bearer_token(request.headers())
        .and_then(|token| state.jwt.verify_token(token).ok())
        .map(|claims| format!("{}#{}", claims.username, claims.user_id));

    if !state.reporter.environment().is_development() {
        return Ok((request, ctx));
    }

    ctx.headers = Some(request.headers().clone());
    let loggable = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok())
        .is_some_and(|len| len > 0 && len <= LOGGED_BODY_LIMIT);
    if !loggable {
        return Ok((request, ctx));
    }

    let (parts, body) = request.into_parts();
    match axum::body::to_bytes(body, LOGGED_BODY_LIMIT).await {
        Ok(bytes) => {
            ctx.body = Some(String::from_utf8_lossy(&bytes).into_owned());
            Ok((Request::from_parts(parts, Body::from(bytes)), ctx))
        }
        Err(err) => Err((Failure::from(err), ctx)),
    }
}
