//! HTTP service exposing CRUD over todo records.
//!
//! # Overview
//! Requests flow handler → service → repository → database and back. The
//! repository is a trait object, so the same router runs against MongoDB in
//! production and an in-memory store in tests.
//!
//! # Design
//! - `AppState` is the only shared value; it holds the service, which holds
//!   an `Arc<dyn TodoRepository>`. No other state crosses requests.
//! - Each request runs on its own task. A panicking handler is turned into a
//!   500 response by `CatchPanicLayer` instead of tearing down the server.
//! - A request that exceeds its deadline gets a 500 with the error envelope,
//!   and the dropped handler future cancels the in-flight database call.

pub mod config;
pub mod error;
pub mod handler;
pub mod model;
pub mod repository;
pub mod service;

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    error_handling::HandleErrorLayer,
    extract::Request,
    response::{IntoResponse, Response},
    routing::get,
    BoxError, Router, ServiceExt,
};
use tokio::net::TcpListener;
use tower::{timeout::error::Elapsed, ServiceBuilder};
use tower_http::{catch_panic::CatchPanicLayer, normalize_path::NormalizePath, trace::TraceLayer};

use crate::error::ApiError;
use crate::repository::{InMemoryTodoRepository, TodoRepository};
use crate::service::TodoService;

pub use crate::model::{Todo, TodoInput};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Every route `router` serves, as `METHOD path`.
pub const ROUTES: &[&str] = &[
    "GET /",
    "GET /todo",
    "POST /todo",
    "GET /todo/{id}",
    "HEAD /todo/{id}",
    "PUT /todo/{id}",
    "DELETE /todo/{id}",
];

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: TodoService,
}

impl AppState {
    pub fn new(repository: Arc<dyn TodoRepository>) -> Self {
        Self {
            service: TodoService::new(repository),
        }
    }

    /// State backed by a fresh, empty in-memory repository.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryTodoRepository::new()))
    }
}

/// Routes without middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handler::health))
        .route(
            "/todo",
            get(handler::list_todos).post(handler::create_todo),
        )
        .route(
            "/todo/{id}",
            get(handler::get_todo)
                .head(handler::todo_exists)
                .put(handler::update_todo)
                .delete(handler::delete_todo),
        )
        .with_state(state)
}

/// The full application: routes plus tracing, panic recovery, request
/// timeout, and trailing-slash normalization.
pub fn app(state: AppState, request_timeout: Duration) -> NormalizePath<Router> {
    let router = router(state)
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(timeout_response))
                .timeout(request_timeout),
        )
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http());
    NormalizePath::trim_trailing_slash(router)
}

async fn timeout_response(error: BoxError) -> ApiError {
    if error.is::<Elapsed>() {
        tracing::error!("request exceeded its deadline");
    } else {
        tracing::error!(%error, "request failed in middleware");
    }
    ApiError::internal()
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    tracing::error!(detail, "request handler panicked");
    ApiError::internal().into_response()
}

/// Serves `app` on `listener` until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    app: NormalizePath<Router>,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Serves `state` with the default middleware until the process ends.
pub async fn run(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    serve(
        listener,
        app(state, DEFAULT_REQUEST_TIMEOUT),
        std::future::pending(),
    )
    .await
}
