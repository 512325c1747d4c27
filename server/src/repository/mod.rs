//! Storage port for todo records.
//!
//! # Design
//! `TodoRepository` is the only thing the service knows about storage. It is
//! object-safe (via `async_trait`) so the service holds an
//! `Arc<dyn TodoRepository>` and a MongoDB-backed or in-memory implementation
//! can be swapped in without touching the service or handlers.

mod memory;
mod mongo;

pub use memory::InMemoryTodoRepository;
pub use mongo::{MongoConfig, MongoTodoRepository};

use async_trait::async_trait;

use crate::error::TodoError;
use crate::model::{Todo, TodoInput};

/// Name of the collection holding todo documents.
pub const COLLECTION: &str = "todo";

/// Pagination window for list queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
}

impl Page {
    pub const DEFAULT_LIMIT: u64 = 10;
    pub const MAX_LIMIT: u64 = 100;

    pub fn new(limit: u64, offset: u64) -> Self {
        Self {
            limit: limit.min(Self::MAX_LIMIT),
            offset,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT, 0)
    }
}

/// CRUD operations over the `todo` collection.
#[async_trait]
pub trait TodoRepository: Send + Sync {
    /// Records whose title contains `keyword`, newest first, windowed by `page`.
    /// An empty keyword matches everything.
    async fn find_all(&self, keyword: &str, page: Page) -> Result<Vec<Todo>, TodoError>;

    /// Number of records `find_all` would match for `keyword` without paging.
    async fn count_find_all(&self, keyword: &str) -> Result<u64, TodoError>;

    /// The single record with this id. Zero or several matches are `NotFound`.
    async fn find_by_id(&self, id: &str) -> Result<Todo, TodoError>;

    /// Number of records with this id; `NotFound` when there are none.
    async fn count_find_by_id(&self, id: &str) -> Result<u64, TodoError>;

    /// Persists a new record with a generated id and fresh timestamps.
    async fn store(&self, input: TodoInput) -> Result<Todo, TodoError>;

    /// Replaces title and description, refreshes `updated_at`, and returns the
    /// record as stored after the update.
    async fn update(&self, id: &str, input: TodoInput) -> Result<Todo, TodoError>;

    /// Removes every record with this id. Deleting a missing id succeeds.
    async fn delete(&self, id: &str) -> Result<(), TodoError>;
}
