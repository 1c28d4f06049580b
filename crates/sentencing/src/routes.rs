use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use sentencing_core::auth::{self, ExpectedCaller};
use sentencing_core::scheduler::ImportTask;
use sentencing_core::{ImportError, NotificationEnvelope};

use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/trigger_import",
            post(trigger_import).route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_notification_sender,
            )),
        )
        .route(
            "/handle_import",
            post(handle_import).route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_task_caller,
            )),
        )
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn require_notification_sender(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let expected = state.callers.notification.clone();
    authorize(&state, &expected, request, next).await
}

async fn require_task_caller(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let expected = state.callers.task.clone();
    authorize(&state, &expected, request, next).await
}

/// Rejects the request with 401 unless it carries an ID token for `expected`.
async fn authorize(
    state: &AppState,
    expected: &ExpectedCaller,
    request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    match auth::authorize(state.verifier.as_ref(), header.as_deref(), expected).await {
        Ok(_) => next.run(request).await,
        Err(err) => {
            state.reporter.report(&format!(
                "Unauthorized request to {}: {}",
                request.uri().path(),
                err
            ));
            StatusCode::UNAUTHORIZED.into_response()
        }
    }
}

async fn trigger_import(State(state): State<Arc<AppState>>, body: Bytes) -> StatusCode {
    let envelope: NotificationEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(err) => {
            state
                .reporter
                .report(&format!("Invalid import notification: {err}"));
            return StatusCode::BAD_REQUEST;
        }
    };

    match state.trigger.receive(envelope).await {
        Ok(outcome) => {
            tracing::debug!(?outcome, "notification handled");
            StatusCode::OK
        }
        Err(err) => status_for(&err),
    }
}

async fn handle_import(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let task: ImportTask = match serde_json::from_slice(&body) {
        Ok(task) => task,
        Err(err) => {
            state
                .reporter
                .report(&format!("Invalid import task: {err}"));
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match state.handler.handle(&task.bucket_id, &task.object_id).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => status_for(&err).into_response(),
    }
}

fn status_for(err: &ImportError) -> StatusCode {
    match err {
        ImportError::Auth(_) => StatusCode::UNAUTHORIZED,
        ImportError::Routing(_) => StatusCode::BAD_REQUEST,
        ImportError::Failed { .. } | ImportError::Scheduler(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
