use axum::Router;
use axum::middleware;
use axum::routing::get;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::presentation::AppState;
use crate::presentation::http::handlers::system::{healthz, index, route_not_found};
use crate::presentation::http::middleware::guard::operation_guard;
use crate::presentation::http::openapi::ApiDoc;

pub(crate) mod demo;

/// Every route, the fallback included, runs behind the operation guard.
pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .nest("/api/demo", demo::router())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .fallback(route_not_found)
        .layer(middleware::from_fn_with_state(state.clone(), operation_guard))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::router;
    use crate::application::normalizer::INVALID_TOKEN_MESSAGE;
    use crate::application::reporting::{ErrorReporter, GENERIC_MESSAGE};
    use crate::infrastructure::fatal::{FatalMonitor, PANIC_HOOK_LOCK, ShutdownHandle};
    use crate::infrastructure::jwt::JwtService;
    use crate::infrastructure::settings::Environment;
    use crate::presentation::AppState;
    use crate::presentation::http::middleware::auth::NOT_LOGGED_IN_MESSAGE;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn app(environment: Environment, shutdown: ShutdownHandle) -> Router {
        let state = AppState::new(
            Arc::new(ErrorReporter::new(environment)),
            Arc::new(JwtService::new(SECRET, 3600)),
            FatalMonitor::new(shutdown),
        );
        router(state)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body must be readable");
        let body = serde_json::from_slice(&bytes).expect("body must be json");
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).expect("valid request")
    }

    #[tokio::test]
    async fn unknown_route_is_operational_not_found() {
        let (status, body) = send(app(Environment::Production, ShutdownHandle::new()), get("/nope")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "fail");
        assert_eq!(body["message"], "Route /nope not found");
        assert_eq!(body["path"], "/nope");
        assert!(body.get("stack").is_none());
    }

    #[tokio::test]
    async fn unknown_route_message_keeps_the_query() {
        let (status, body) = send(
            app(Environment::Production, ShutdownHandle::new()),
            get("/nope?page=2"),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Route /nope?page=2 not found");
        assert_eq!(body["path"], "/nope?page=2");
    }

    #[tokio::test]
    async fn success_passes_through_untouched() {
        let (status, body) = send(
            app(Environment::Production, ShutdownHandle::new()),
            get("/api/demo/items/1"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 1);
        assert_eq!(body["name"], "Sample item");
    }

    #[tokio::test]
    async fn unparsable_path_parameter_is_a_validation_failure() {
        let (status, body) = send(
            app(Environment::Production, ShutdownHandle::new()),
            get("/api/demo/items/abc"),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "fail");
        assert_eq!(body["message"], "Invalid id: abc");
    }

    #[tokio::test]
    async fn invalid_signup_aggregates_field_messages() {
        let request = Request::post("/api/demo/signup")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"name":"J","email":"not-an-email","age":30}"#))
            .expect("valid request");

        let (status, body) = send(app(Environment::Production, ShutdownHandle::new()), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "Invalid input data. Please provide a valid email. Name must be between 2 and 50 characters"
        );
    }

    #[tokio::test]
    async fn taken_email_is_a_conflict() {
        let request = Request::post("/api/demo/signup")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"name":"John","email":"john@example.com","age":30}"#))
            .expect("valid request");

        let (status, body) = send(app(Environment::Production, ShutdownHandle::new()), request).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "User with this email already exists");
    }

    #[tokio::test]
    async fn session_requires_a_token() {
        let (status, body) = send(
            app(Environment::Production, ShutdownHandle::new()),
            get("/api/demo/session"),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], NOT_LOGGED_IN_MESSAGE);
    }

    #[tokio::test]
    async fn garbage_token_is_normalized() {
        let request = Request::get("/api/demo/session")
            .header(header::AUTHORIZATION, "Bearer not.a.jwt")
            .body(Body::empty())
            .expect("valid request");

        let (status, body) = send(app(Environment::Production, ShutdownHandle::new()), request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], INVALID_TOKEN_MESSAGE);
    }

    #[tokio::test]
    async fn issued_token_opens_the_session() {
        let token = JwtService::new(SECRET, 3600)
            .generate_token(7, "jane")
            .expect("token must be issued");
        let request = Request::get("/api/demo/session")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .expect("valid request");

        let (status, body) = send(app(Environment::Production, ShutdownHandle::new()), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_id"], 7);
        assert_eq!(body["username"], "jane");
    }

    #[tokio::test]
    async fn non_operational_failure_is_masked() {
        let (status, body) = send(
            app(Environment::Production, ShutdownHandle::new()),
            get("/api/demo/errors/database"),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], GENERIC_MESSAGE);
    }

    #[tokio::test]
    async fn handler_panic_is_answered_without_shutdown() {
        let _lock = PANIC_HOOK_LOCK.lock().await;
        let original = std::panic::take_hook();
        let shutdown = ShutdownHandle::new();
        FatalMonitor::new(shutdown.clone()).install_panic_hook();

        let (status, body) = send(
            app(Environment::Production, shutdown.clone()),
            get("/api/demo/errors/panic"),
        )
        .await;
        std::panic::set_hook(original);

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], GENERIC_MESSAGE);
        assert!(!shutdown.is_shutting_down());
    }

    #[tokio::test]
    async fn development_panic_stack_points_at_the_handler() {
        let _lock = PANIC_HOOK_LOCK.lock().await;
        let original = std::panic::take_hook();
        let shutdown = ShutdownHandle::new();
        FatalMonitor::new(shutdown.clone()).install_panic_hook();

        let (status, body) = send(
            app(Environment::Development, shutdown.clone()),
            get("/api/demo/errors/panic"),
        )
        .await;
        std::panic::set_hook(original);

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "operation panicked: simulated programming error");
        let stack = body["stack"].as_str().expect("stack must be a string");
        assert!(stack.contains("handlers/demo.rs"), "{stack}");
        assert!(
            body["error"]["origin"]
                .as_str()
                .is_some_and(|origin| origin.contains("handlers/demo.rs"))
        );
        assert!(!shutdown.is_shutting_down());
    }

    #[tokio::test]
    async fn development_exposes_the_full_entity() {
        let (status, body) = send(
            app(Environment::Development, ShutdownHandle::new()),
            get("/api/demo/errors/external-service"),
        )
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Payment gateway: Service unavailable");
        assert_eq!(body["method"], "GET");
        assert_eq!(body["path"], "/api/demo/errors/external-service");
        assert!(body["stack"].as_str().is_some_and(|stack| !stack.is_empty()));
        assert!(body["error"].is_object());
    }

    #[tokio::test]
    async fn access_failures_keep_their_messages() {
        for (kind, expected_status, expected_message) in [
            (
                "unauthorized",
                StatusCode::UNAUTHORIZED,
                "Missing credentials for this resource",
            ),
            (
                "forbidden",
                StatusCode::FORBIDDEN,
                "You do not have permission to perform this action",
            ),
        ] {
            let (status, body) = send(
                app(Environment::Production, ShutdownHandle::new()),
                get(&format!("/api/demo/errors/{kind}")),
            )
            .await;

            assert_eq!(status, expected_status);
            assert_eq!(body["status"], "fail");
            assert_eq!(body["message"], expected_message);
        }
    }

    #[tokio::test]
    async fn unknown_error_kind_is_reported_as_missing() {
        let (status, body) = send(
            app(Environment::Production, ShutdownHandle::new()),
            get("/api/demo/errors/detached"),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Error kind `detached` not found");
    }
}
