//! MongoDB-backed repository.
//!
//! # Design
//! Every trait method issues exactly one query against the `todo`
//! collection. Documents hold the record fields and nothing else (MongoDB
//! adds its own `_id`, which is ignored on read). Timestamps are stored as
//! BSON dates so `created_at` sorts chronologically server-side.
//!
//! Connection details arrive through `MongoConfig`; nothing here reads the
//! process environment.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{self, doc, Document};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};

use super::{Page, TodoRepository, COLLECTION};
use crate::error::TodoError;
use crate::model::{now, Todo, TodoInput};

/// Where to find the database.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MongoConfig {
    /// Connection string, e.g. `mongodb://localhost:27017`.
    pub url: String,
    pub database: String,
}

/// Stored shape of a todo.
#[derive(Debug, Serialize, Deserialize)]
struct TodoDocument {
    id: String,
    title: String,
    description: Option<String>,
    created_at: bson::DateTime,
    updated_at: bson::DateTime,
}

impl From<&Todo> for TodoDocument {
    fn from(todo: &Todo) -> Self {
        Self {
            id: todo.id.clone(),
            title: todo.title.clone(),
            description: todo.description.clone(),
            created_at: to_bson(todo.created_at),
            updated_at: to_bson(todo.updated_at),
        }
    }
}

impl TryFrom<TodoDocument> for Todo {
    type Error = TodoError;

    fn try_from(document: TodoDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            created_at: from_bson(document.created_at)?,
            updated_at: from_bson(document.updated_at)?,
            id: document.id,
            title: document.title,
            description: document.description,
        })
    }
}

fn to_bson(stamp: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(stamp.timestamp_millis())
}

fn from_bson(stamp: bson::DateTime) -> Result<DateTime<Utc>, TodoError> {
    DateTime::from_timestamp_millis(stamp.timestamp_millis())
        .ok_or_else(|| TodoError::Storage(format!("timestamp out of range: {stamp}")))
}

/// Logs a driver error where it happened and collapses it into `Storage`.
fn storage(operation: &'static str) -> impl Fn(mongodb::error::Error) -> TodoError {
    move |error| {
        tracing::error!(%error, operation, "MongoDB operation failed");
        TodoError::Storage(format!("{operation}: {error}"))
    }
}

/// Literal substring match on `title`; an empty keyword matches everything.
fn keyword_filter(keyword: &str) -> Document {
    if keyword.is_empty() {
        doc! {}
    } else {
        doc! { "title": { "$regex": regex::escape(keyword) } }
    }
}

fn id_filter(id: &str) -> Document {
    doc! { "id": id }
}

fn newest_first() -> Document {
    doc! { "created_at": -1, "_id": -1 }
}

/// Aggregation-pipeline update so the new `updated_at` can be computed from
/// the stored one in the same round trip. User text goes through `$literal`
/// so a title such as `"$foo"` is not read as a field path.
fn update_pipeline(input: &TodoInput, stamp: bson::DateTime) -> Vec<Document> {
    vec![doc! {
        "$set": {
            "title": { "$literal": input.title.as_str() },
            "description": { "$literal": input.description.as_deref() },
            "updated_at": { "$max": [stamp, { "$add": ["$updated_at", 1_i64] }] },
        }
    }]
}

/// Repository over the `todo` collection of one MongoDB database.
#[derive(Clone, Debug)]
pub struct MongoTodoRepository {
    collection: Collection<TodoDocument>,
}

impl MongoTodoRepository {
    pub fn new(database: &Database) -> Self {
        Self {
            collection: database.collection(COLLECTION),
        }
    }

    /// Opens a client, checks the server answers, and makes sure the
    /// collection's indexes exist.
    pub async fn connect(config: &MongoConfig) -> Result<Self, TodoError> {
        let client = Client::with_uri_str(&config.url)
            .await
            .map_err(storage("connect"))?;
        let database = client.database(&config.database);
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(storage("ping"))?;
        tracing::info!(database = %config.database, "connected to MongoDB");

        let repository = Self::new(&database);
        repository.ensure_indexes().await?;
        Ok(repository)
    }

    async fn ensure_indexes(&self) -> Result<(), TodoError> {
        let unique_id = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        let by_creation = IndexModel::builder().keys(doc! { "created_at": -1 }).build();
        self.collection
            .create_indexes([unique_id, by_creation])
            .await
            .map_err(storage("create indexes"))?;
        Ok(())
    }
}

#[async_trait]
impl TodoRepository for MongoTodoRepository {
    async fn find_all(&self, keyword: &str, page: Page) -> Result<Vec<Todo>, TodoError> {
        // The driver treats limit 0 as "no limit".
        if page.limit == 0 {
            return Ok(Vec::new());
        }
        let cursor = self
            .collection
            .find(keyword_filter(keyword))
            .sort(newest_first())
            .skip(page.offset)
            .limit(i64::try_from(page.limit).unwrap_or(i64::MAX))
            .await
            .map_err(storage("find todos"))?;
        let documents: Vec<TodoDocument> =
            cursor.try_collect().await.map_err(storage("read todos"))?;
        documents.into_iter().map(Todo::try_from).collect()
    }

    async fn count_find_all(&self, keyword: &str) -> Result<u64, TodoError> {
        self.collection
            .count_documents(keyword_filter(keyword))
            .await
            .map_err(storage("count todos"))
    }

    async fn find_by_id(&self, id: &str) -> Result<Todo, TodoError> {
        let cursor = self
            .collection
            .find(id_filter(id))
            .limit(2)
            .await
            .map_err(storage("find todo"))?;
        let mut documents: Vec<TodoDocument> =
            cursor.try_collect().await.map_err(storage("read todo"))?;
        match (documents.pop(), documents.is_empty()) {
            (Some(document), true) => Todo::try_from(document),
            (Some(_), false) => {
                tracing::warn!(%id, "multiple todos share one id");
                Err(TodoError::NotFound(id.to_string()))
            }
            (None, _) => Err(TodoError::NotFound(id.to_string())),
        }
    }

    async fn count_find_by_id(&self, id: &str) -> Result<u64, TodoError> {
        let count = self
            .collection
            .count_documents(id_filter(id))
            .await
            .map_err(storage("count todo"))?;
        if count == 0 {
            return Err(TodoError::NotFound(id.to_string()));
        }
        Ok(count)
    }

    async fn store(&self, input: TodoInput) -> Result<Todo, TodoError> {
        let todo = Todo::create(input);
        self.collection
            .insert_one(TodoDocument::from(&todo))
            .await
            .map_err(storage("insert todo"))?;
        Ok(todo)
    }

    async fn update(&self, id: &str, input: TodoInput) -> Result<Todo, TodoError> {
        let updated = self
            .collection
            .find_one_and_update(id_filter(id), update_pipeline(&input, to_bson(now())))
            .return_document(ReturnDocument::After)
            .await
            .map_err(storage("update todo"))?;
        match updated {
            Some(document) => Todo::try_from(document),
            None => Err(TodoError::NotFound(id.to_string())),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), TodoError> {
        let result = self
            .collection
            .delete_many(id_filter(id))
            .await
            .map_err(storage("delete todo"))?;
        tracing::debug!(%id, removed = result.deleted_count, "deleted todos");
        Ok(())
    }
}
