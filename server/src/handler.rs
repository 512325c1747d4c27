use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::model::{Todo, TodoInput};
use crate::repository::Page;
use crate::AppState;

/// Query string for `GET /todo`. Numbers arrive as text so a bad value gets
/// the JSON error envelope instead of the extractor's plain-text rejection.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub keyword: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl ListParams {
    pub fn page(&self) -> Result<Page, ApiError> {
        let limit = parse_count("limit", self.limit.as_deref())?.unwrap_or(Page::DEFAULT_LIMIT);
        let offset = parse_count("offset", self.offset.as_deref())?.unwrap_or(0);
        Ok(Page::new(limit, offset))
    }
}

/// Largest `limit` or `offset` accepted; storage keeps both as signed 64-bit.
const MAX_COUNT: u64 = i64::MAX as u64;

fn parse_count(name: &str, value: Option<&str>) -> Result<Option<u64>, ApiError> {
    let Some(raw) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    match raw.parse::<u64>() {
        Ok(count) if count <= MAX_COUNT => Ok(Some(count)),
        Ok(_) => Err(ApiError::bad_request(format!(
            "{name} must not exceed {MAX_COUNT}, got {raw:?}"
        ))),
        Err(_) => Err(ApiError::bad_request(format!(
            "{name} must be a non-negative integer, got {raw:?}"
        ))),
    }
}

/// Body of `GET /todo`.
#[derive(Debug, Serialize)]
pub struct TodoList {
    pub items: Vec<Todo>,
    pub total: u64,
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "success": true,
        "code": 200,
        "message": "Services run properly",
    }))
}

pub async fn list_todos(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<TodoList>, ApiError> {
    let Query(params) = params?;
    let page = params.page()?;
    let keyword = params.keyword.unwrap_or_default();
    let (items, total) = tokio::try_join!(
        state.service.find_all(&keyword, page),
        state.service.count_find_all(&keyword)
    )?;
    Ok(Json(TodoList { items, total }))
}

pub async fn create_todo(
    State(state): State<AppState>,
    payload: Result<Json<TodoInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Todo>), ApiError> {
    let Json(input) = payload?;
    input.validate()?;
    let todo = state.service.store(input).await?;
    tracing::info!(id = %todo.id, "created todo");
    Ok((StatusCode::CREATED, Json(todo)))
}

pub async fn get_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Todo>, ApiError> {
    Ok(Json(state.service.find_by_id(&id).await?))
}

pub async fn todo_exists(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.service.count_find_by_id(&id).await?;
    Ok(StatusCode::OK)
}

pub async fn update_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<TodoInput>, JsonRejection>,
) -> Result<Json<Todo>, ApiError> {
    let Json(input) = payload?;
    input.validate()?;
    let todo = state.service.update(&id, input).await?;
    tracing::info!(%id, "updated todo");
    Ok(Json(todo))
}

pub async fn delete_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.service.delete(&id).await?;
    tracing::info!(%id, "deleted todo");
    Ok(StatusCode::NO_CONTENT)
}
