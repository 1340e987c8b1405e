//! HTTP server

use crate::config::DaemonConfig;
use crate::error::ApiError;
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use code_executor_core::{EntryPoint, ExecutionResult, Executor};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub const SERVICE_NAME: &str = "code-executor";

/// State shared by all handlers
#[derive(Debug)]
pub struct AppState {
    pub executor: Executor,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Build the router
pub fn router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/execute", post(execute))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn run<F>(listener: TcpListener, config: DaemonConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let executor = Executor::new(config.executor.clone())?;
    let state = Arc::new(AppState { executor });
    let app = router(state, config.max_body_bytes);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn execute(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<ExecutionResult>, ApiError> {
    let body = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let result = state
        .executor
        .execute_body(&body, EntryPoint::Network)
        .await?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use code_executor_core::ExecutorConfig;
    use tower::ServiceExt;

    fn app() -> Router {
        let executor = Executor::new(ExecutorConfig::default()).unwrap();
        router(Arc::new(AppState { executor }), 2 * 1024 * 1024)
    }

    fn python_available() -> bool {
        std::process::Command::new(code_executor_core::config::default_python_path())
            .arg("--version")
            .output()
            .is_ok_and(|o| o.status.success())
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn post_execute(body: impl Into<Body>) -> Request<Body> {
        Request::post("/execute")
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_service() {
        let request = Request::get("/health").body(Body::empty()).unwrap();
        let (status, json) = send(app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json,
            serde_json::json!({"status": "ok", "service": "code-executor", "version": "1.0.0"})
        );
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let request = Request::get("/nope").body(Body::empty()).unwrap();
        let (status, _) = send(app(), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_code_is_bad_request() {
        let (status, json) = send(app(), post_execute(r#"{"timeout":5}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Code is required");
    }

    #[tokio::test]
    async fn oversized_code_is_bad_request() {
        let body = serde_json::json!({ "code": "a".repeat(100_001) }).to_string();
        let (status, json) = send(app(), post_execute(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json["error"],
            "Code exceeds maximum length of 100000 characters"
        );
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let (status, json) = send(app(), post_execute("{oops")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid JSON");
    }

    #[tokio::test]
    async fn spawn_failure_is_internal_error() {
        let config = ExecutorConfig::builder()
            .python_path("/nonexistent/python3")
            .build();
        let executor = Executor::new(config).unwrap();
        let app = router(Arc::new(AppState { executor }), 1024 * 1024);

        let (status, json) = send(app, post_execute(r#"{"code":"print(1)"}"#)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"].as_str().unwrap().contains("failed to spawn worker"));
    }

    #[tokio::test]
    async fn executes_code() {
        if !python_available() {
            return;
        }
        let (status, json) = send(
            app(),
            post_execute(r#"{"code":"print('hello')","timeout":5}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "success");
        assert_eq!(json["output"], "hello\n");
        assert_eq!(json["error"], "");
        assert!(json["execution_time"].is_u64());
    }

    #[tokio::test]
    async fn rejected_import_is_still_ok_status() {
        if !python_available() {
            return;
        }
        let (status, json) = send(
            app(),
            post_execute(r#"{"code":"import subprocess","timeout":5}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "error");
        assert_eq!(
            json["error"],
            "Import of 'subprocess' is not allowed for security reasons"
        );
    }
}
