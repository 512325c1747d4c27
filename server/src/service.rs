use std::sync::Arc;

use crate::error::TodoError;
use crate::model::{Todo, TodoInput};
use crate::repository::{Page, TodoRepository};

/// Application layer between the handlers and storage.
///
/// Currently forwards every call unchanged; business rules that span
/// repository calls belong here.
#[derive(Clone)]
pub struct TodoService {
    repository: Arc<dyn TodoRepository>,
}

impl TodoService {
    pub fn new(repository: Arc<dyn TodoRepository>) -> Self {
        Self { repository }
    }

    pub async fn find_all(&self, keyword: &str, page: Page) -> Result<Vec<Todo>, TodoError> {
        self.repository.find_all(keyword, page).await
    }

    pub async fn count_find_all(&self, keyword: &str) -> Result<u64, TodoError> {
        self.repository.count_find_all(keyword).await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Todo, TodoError> {
        self.repository.find_by_id(id).await
    }

    pub async fn count_find_by_id(&self, id: &str) -> Result<u64, TodoError> {
        self.repository.count_find_by_id(id).await
    }

    pub async fn store(&self, input: TodoInput) -> Result<Todo, TodoError> {
        self.repository.store(input).await
    }

    pub async fn update(&self, id: &str, input: TodoInput) -> Result<Todo, TodoError> {
        self.repository.update(id, input).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), TodoError> {
        self.repository.delete(id).await
    }
}
