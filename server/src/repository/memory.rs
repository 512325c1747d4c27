use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Page, TodoRepository};
use crate::error::TodoError;
use crate::model::{Todo, TodoInput};

/// In-process storage kept in insertion order.
///
/// Backs the `in_memory` storage mode and the test suites. Cloning shares the
/// same underlying records.
#[derive(Clone, Debug, Default)]
pub struct InMemoryTodoRepository {
    todos: Arc<RwLock<Vec<Todo>>>,
}

impl InMemoryTodoRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn window(len: u64) -> usize {
    usize::try_from(len).unwrap_or(usize::MAX)
}

#[async_trait]
impl TodoRepository for InMemoryTodoRepository {
    async fn find_all(&self, keyword: &str, page: Page) -> Result<Vec<Todo>, TodoError> {
        let todos = self.todos.read().await;
        // Reversed first so the stable sort leaves later inserts ahead on ties.
        let mut matched: Vec<&Todo> = todos
            .iter()
            .rev()
            .filter(|todo| todo.title.contains(keyword))
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matched
            .into_iter()
            .skip(window(page.offset))
            .take(window(page.limit))
            .cloned()
            .collect())
    }

    async fn count_find_all(&self, keyword: &str) -> Result<u64, TodoError> {
        let todos = self.todos.read().await;
        Ok(todos.iter().filter(|todo| todo.title.contains(keyword)).count() as u64)
    }

    async fn find_by_id(&self, id: &str) -> Result<Todo, TodoError> {
        let todos = self.todos.read().await;
        let mut matches = todos.iter().filter(|todo| todo.id == id);
        match (matches.next(), matches.next()) {
            (Some(todo), None) => Ok(todo.clone()),
            (Some(_), Some(_)) => {
                tracing::warn!(%id, "multiple todos share one id");
                Err(TodoError::NotFound(id.to_string()))
            }
            _ => Err(TodoError::NotFound(id.to_string())),
        }
    }

    async fn count_find_by_id(&self, id: &str) -> Result<u64, TodoError> {
        let todos = self.todos.read().await;
        match todos.iter().filter(|todo| todo.id == id).count() {
            0 => Err(TodoError::NotFound(id.to_string())),
            count => Ok(count as u64),
        }
    }

    async fn store(&self, input: TodoInput) -> Result<Todo, TodoError> {
        let todo = Todo::create(input);
        let mut todos = self.todos.write().await;
        if todos.iter().any(|existing| existing.id == todo.id) {
            tracing::error!(id = %todo.id, "generated id already in use");
            return Err(TodoError::Storage(format!("duplicate id {}", todo.id)));
        }
        todos.push(todo.clone());
        Ok(todo)
    }

    async fn update(&self, id: &str, input: TodoInput) -> Result<Todo, TodoError> {
        let mut todos = self.todos.write().await;
        let mut updated = None;
        for todo in todos.iter_mut().filter(|todo| todo.id == id) {
            todo.apply(input.clone());
            updated = Some(todo.clone());
        }
        updated.ok_or_else(|| TodoError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &str) -> Result<(), TodoError> {
        let mut todos = self.todos.write().await;
        let before = todos.len();
        todos.retain(|todo| todo.id != id);
        tracing::debug!(%id, removed = before - todos.len(), "deleted todos");
        Ok(())
    }
}
