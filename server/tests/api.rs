use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use serde::Deserialize;
use todo_server::error::TodoError;
use todo_server::repository::{Page, TodoRepository};
use todo_server::{app, AppState, Todo, TodoInput, DEFAULT_REQUEST_TIMEOUT, ROUTES};
use tower::ServiceExt;

#[derive(Debug, Deserialize)]
struct TodoList {
    items: Vec<Todo>,
    total: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    success: bool,
    message: String,
}

async fn send(state: &AppState, request: Request<String>) -> axum::response::Response {
    app(state.clone(), DEFAULT_REQUEST_TIMEOUT)
        .oneshot(request)
        .await
        .unwrap()
}

/// Storage that fails every call, optionally after stalling first.
struct BrokenRepository {
    stall: Option<Duration>,
}

impl BrokenRepository {
    async fn fail<T>(&self) -> Result<T, TodoError> {
        if let Some(stall) = self.stall {
            tokio::time::sleep(stall).await;
        }
        Err(TodoError::Storage("connection refused".to_string()))
    }
}

#[async_trait]
impl TodoRepository for BrokenRepository {
    async fn find_all(&self, _keyword: &str, _page: Page) -> Result<Vec<Todo>, TodoError> {
        self.fail().await
    }

    async fn count_find_all(&self, _keyword: &str) -> Result<u64, TodoError> {
        self.fail().await
    }

    async fn find_by_id(&self, _id: &str) -> Result<Todo, TodoError> {
        self.fail().await
    }

    async fn count_find_by_id(&self, _id: &str) -> Result<u64, TodoError> {
        self.fail().await
    }

    async fn store(&self, _input: TodoInput) -> Result<Todo, TodoError> {
        self.fail().await
    }

    async fn update(&self, _id: &str, _input: TodoInput) -> Result<Todo, TodoError> {
        self.fail().await
    }

    async fn delete(&self, _id: &str) -> Result<(), TodoError> {
        self.fail().await
    }
}

fn broken_state(stall: Option<Duration>) -> AppState {
    AppState::new(Arc::new(BrokenRepository { stall }))
}

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(String::new())
        .unwrap()
}

async fn create(state: &AppState, title: &str) -> Todo {
    let body = serde_json::json!({ "title": title }).to_string();
    let resp = send(state, json_request("POST", "/todo", &body)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    body_json(resp).await
}

async fn list(state: &AppState, uri: &str) -> TodoList {
    let resp = send(state, empty_request("GET", uri)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    body_json(resp).await
}

// --- health ---

#[tokio::test]
async fn health_check_reports_running() {
    let state = AppState::in_memory();
    let resp = send(&state, empty_request("GET", "/")).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["code"], 200);
    assert_eq!(body["message"], "Services run properly");
}

#[tokio::test]
async fn every_listed_route_is_served() {
    let state = AppState::in_memory();
    let todo = create(&state, "route table").await;

    // DELETE comes last, so the record is present for every other route.
    for route in ROUTES {
        let (method, path) = route.split_once(' ').unwrap();
        let uri = path.replace("{id}", &todo.id);
        let resp = send(&state, json_request(method, &uri, r#"{"title":"routed"}"#)).await;
        assert!(resp.status().is_success(), "{route} answered {}", resp.status());
    }
}

// --- failures ---

#[tokio::test]
async fn storage_failure_returns_500_envelope() {
    let state = broken_state(None);
    let todo_path = "/todo/00000000-0000-0000-0000-000000000000";

    for request in [
        empty_request("GET", "/todo"),
        json_request("POST", "/todo", r#"{"title":"lost"}"#),
        empty_request("GET", todo_path),
        json_request("PUT", todo_path, r#"{"title":"lost"}"#),
        empty_request("DELETE", todo_path),
    ] {
        let resp = send(&state, request).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorBody = body_json(resp).await;
        assert!(!body.success);
        assert_eq!(body.message, "internal server error");
    }
}

#[tokio::test]
async fn request_past_deadline_returns_500_envelope() {
    let state = broken_state(Some(Duration::from_secs(5)));
    let resp = app(state, Duration::from_millis(50))
        .oneshot(empty_request("GET", "/todo"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: ErrorBody = body_json(resp).await;
    assert!(!body.success);
    assert_eq!(body.message, "internal server error");
}

// --- list ---

#[tokio::test]
async fn list_todos_empty() {
    let state = AppState::in_memory();
    let page = list(&state, "/todo").await;
    assert!(page.items.is_empty());
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn list_filters_by_keyword_newest_first() {
    let state = AppState::in_memory();
    create(&state, "alpha").await;
    create(&state, "beta").await;
    create(&state, "alpha2").await;

    let page = list(&state, "/todo?keyword=alpha").await;
    let titles: Vec<_> = page.items.iter().map(|todo| todo.title.as_str()).collect();
    assert_eq!(titles, vec!["alpha2", "alpha"]);
    assert_eq!(page.total, 2);

    let everything = list(&state, "/todo?keyword=").await;
    assert_eq!(everything.items.len(), 3);
    assert_eq!(everything.total, 3);
}

#[tokio::test]
async fn list_applies_limit_and_offset_but_total_counts_all_matches() {
    let state = AppState::in_memory();
    for title in ["t1", "t2", "t3", "t4"] {
        create(&state, title).await;
    }

    let page = list(&state, "/todo?limit=2&offset=1").await;
    let titles: Vec<_> = page.items.iter().map(|todo| todo.title.as_str()).collect();
    assert_eq!(titles, vec!["t3", "t2"]);
    assert_eq!(page.total, 4);
}

#[tokio::test]
async fn list_rejects_non_numeric_limit() {
    let state = AppState::in_memory();
    let resp = send(&state, empty_request("GET", "/todo?limit=lots")).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = body_json(resp).await;
    assert!(!body.success);
    assert!(body.message.contains("limit"));
}

#[tokio::test]
async fn list_rejects_negative_offset() {
    let state = AppState::in_memory();
    let resp = send(&state, empty_request("GET", "/todo?offset=-3")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_rejects_offset_beyond_signed_range() {
    let state = AppState::in_memory();
    let resp = send(
        &state,
        empty_request("GET", "/todo?offset=9223372036854775808"),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = body_json(resp).await;
    assert!(body.message.contains("offset"));
}

#[tokio::test]
async fn trailing_slash_is_normalized() {
    let state = AppState::in_memory();
    create(&state, "slashed").await;
    let page = list(&state, "/todo/").await;
    assert_eq!(page.total, 1);
}

// --- create ---

#[tokio::test]
async fn create_todo_returns_201() {
    let state = AppState::in_memory();
    let resp = send(
        &state,
        json_request(
            "POST",
            "/todo",
            r#"{"title":"Buy milk","description":"semi-skimmed"}"#,
        ),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::CREATED);
    let todo: Todo = body_json(resp).await;
    assert_eq!(todo.title, "Buy milk");
    assert_eq!(todo.description.as_deref(), Some("semi-skimmed"));
    assert!(!todo.id.is_empty());
    assert_eq!(todo.created_at, todo.updated_at);
}

#[tokio::test]
async fn create_todo_ignores_client_supplied_id() {
    let state = AppState::in_memory();
    let resp = send(
        &state,
        json_request("POST", "/todo", r#"{"id":"mine","title":"Sneaky"}"#),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::CREATED);
    let todo: Todo = body_json(resp).await;
    assert_ne!(todo.id, "mine");
}

#[tokio::test]
async fn create_todo_with_empty_title_returns_400_and_persists_nothing() {
    let state = AppState::in_memory();
    let resp = send(&state, json_request("POST", "/todo", r#"{"title":""}"#)).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = body_json(resp).await;
    assert!(!body.success);
    assert_eq!(body.message, "title is required");

    assert_eq!(list(&state, "/todo").await.total, 0);
}

#[tokio::test]
async fn create_todo_without_title_returns_400() {
    let state = AppState::in_memory();
    let resp = send(&state, json_request("POST", "/todo", r#"{"description":"x"}"#)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_todo_malformed_json_uses_error_envelope() {
    let state = AppState::in_memory();
    let resp = send(&state, json_request("POST", "/todo", "{not json")).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = body_json(resp).await;
    assert!(!body.success);
}

#[tokio::test]
async fn create_todo_wrong_field_type_returns_422() {
    let state = AppState::in_memory();
    let resp = send(&state, json_request("POST", "/todo", r#"{"title":42}"#)).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- get ---

#[tokio::test]
async fn get_todo_not_found() {
    let state = AppState::in_memory();
    let resp = send(
        &state,
        empty_request("GET", "/todo/00000000-0000-0000-0000-000000000000"),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: ErrorBody = body_json(resp).await;
    assert!(!body.success);
}

#[tokio::test]
async fn head_reports_existence() {
    let state = AppState::in_memory();
    let todo = create(&state, "exists").await;

    let resp = send(&state, empty_request("HEAD", &format!("/todo/{}", todo.id))).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&state, empty_request("HEAD", "/todo/nope")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- update ---

#[tokio::test]
async fn update_todo_not_found() {
    let state = AppState::in_memory();
    let resp = send(
        &state,
        json_request(
            "PUT",
            "/todo/00000000-0000-0000-0000-000000000000",
            r#"{"title":"Nope"}"#,
        ),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_todo_with_blank_title_returns_400() {
    let state = AppState::in_memory();
    let todo = create(&state, "keep me").await;
    let resp = send(
        &state,
        json_request("PUT", &format!("/todo/{}", todo.id), r#"{"title":"  "}"#),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let resp = send(&state, empty_request("GET", &format!("/todo/{}", todo.id))).await;
    let unchanged: Todo = body_json(resp).await;
    assert_eq!(unchanged.title, "keep me");
}

// --- delete ---

#[tokio::test]
async fn delete_missing_todo_is_idempotent() {
    let state = AppState::in_memory();
    let resp = send(
        &state,
        empty_request("DELETE", "/todo/00000000-0000-0000-0000-000000000000"),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

// --- full CRUD lifecycle ---

#[tokio::test]
async fn crud_lifecycle() {
    let state = AppState::in_memory();

    // create
    let created = create(&state, "buy milk").await;
    let id = created.id.clone();

    // list: should contain the one todo
    let page = list(&state, "/todo").await;
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, id);

    // get
    let resp = send(&state, empty_request("GET", &format!("/todo/{id}"))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched: Todo = body_json(resp).await;
    assert_eq!(fetched, created);

    // update: replaces title, keeps identity
    let resp = send(
        &state,
        json_request("PUT", &format!("/todo/{id}"), r#"{"title":"buy bread"}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Todo = body_json(resp).await;
    assert_eq!(updated.id, id);
    assert_eq!(updated.title, "buy bread");
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at > created.updated_at);

    // get reflects the update
    let resp = send(&state, empty_request("GET", &format!("/todo/{id}"))).await;
    let fetched: Todo = body_json(resp).await;
    assert_eq!(fetched, updated);

    // delete
    let resp = send(&state, empty_request("DELETE", &format!("/todo/{id}"))).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let body = body_bytes(resp).await;
    assert!(body.is_empty());

    // get after delete: 404
    let resp = send(&state, empty_request("GET", &format!("/todo/{id}"))).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // delete again: still fine
    let resp = send(&state, empty_request("DELETE", &format!("/todo/{id}"))).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    // list after delete: empty
    let page = list(&state, "/todo").await;
    assert!(page.items.is_empty());
    assert_eq!(page.total, 0);
}
