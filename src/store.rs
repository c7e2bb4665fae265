use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::memory::MemoryStore;
use crate::sqlite::SqliteStore;
use crate::types::{Backend, User};

/// Storage type of a mapped column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Boolean,
    Text,
}

/// Maps one `User` field onto a storage column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub field: &'static str,
    pub column: String,
    pub kind: ColumnKind,
    pub primary_key: bool,
}

/// Explicit description of how the benchmarked entity is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub table: String,
    pub columns: Vec<Column>,
}

impl Schema {
    /// The default mapping of [`User`]: one column per field, same names.
    pub fn user() -> Self {
        let column = |field: &'static str, kind, primary_key| Column {
            field,
            column: field.to_string(),
            kind,
            primary_key,
        };
        Schema {
            table: "user".to_string(),
            columns: vec![
                column("id", ColumnKind::Integer, true),
                column("id2", ColumnKind::Integer, false),
                column("ready", ColumnKind::Boolean, false),
                column("priority", ColumnKind::Integer, false),
                column("name", ColumnKind::Text, false),
            ],
        }
    }

    /// Storage column name for `field`, falling back to the field name.
    pub fn column_for<'a>(&'a self, field: &'a str) -> &'a str {
        self.columns
            .iter()
            .find(|c| c.field == field)
            .map(|c| c.column.as_str())
            .unwrap_or(field)
    }
}

/// What the harness needs from a persistence layer.
///
/// Implementations own their connection: it is opened by [`open`] and must be
/// released by [`Store::close`].
#[async_trait]
pub trait Store: Send + Sync {
    fn backend(&self) -> Backend;

    /// Drop and recreate the storage for `schema`.
    async fn provision(&self, schema: &Schema) -> Result<()>;

    async fn delete_all(&self) -> Result<()>;

    /// Persist fresh users, assigning their ids.
    async fn insert_many(&self, users: Vec<User>) -> Result<()>;

    async fn find_all(&self) -> Result<Vec<User>>;

    /// Persist changes made to already stored users.
    async fn update_many(&self, users: &[User]) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Connection settings for [`open`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub backend: Backend,
    /// Database file for `sqlite-file`.
    pub db_path: PathBuf,
}

pub async fn open(options: &StoreOptions) -> Result<Box<dyn Store>> {
    info!(backend = %options.backend, "opening store");
    let store: Box<dyn Store> = match options.backend {
        Backend::Memory => Box::new(MemoryStore::new()),
        Backend::Sqlite => Box::new(SqliteStore::open_in_memory().await?),
        Backend::SqliteFile => Box::new(SqliteStore::open(options.db_path.clone()).await?),
    };
    Ok(store)
}
