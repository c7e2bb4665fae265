//! SQLite backend.
//!
//! rusqlite is synchronous, so every call runs on the blocking pool and the
//! async caller awaits it. The connection sits behind a mutex and is taken
//! out of it on close.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection, params};
use tracing::{debug, info};

use crate::errors::BenchError;
use crate::store::{ColumnKind, Schema, Store};
use crate::types::{Backend, User};

/// Statements rendered from a [`Schema`] at provisioning time.
#[derive(Debug, Clone)]
struct Statements {
    drop: String,
    create: String,
    insert: String,
    select: String,
    update: String,
    delete: String,
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

impl Statements {
    fn render(schema: &Schema) -> Self {
        let table = quote(&schema.table);
        let col = |field: &str| quote(schema.column_for(field));

        let definitions: Vec<String> = schema
            .columns
            .iter()
            .map(|c| {
                let ty = match c.kind {
                    ColumnKind::Integer | ColumnKind::Boolean => "INTEGER",
                    ColumnKind::Text => "TEXT",
                };
                if c.primary_key {
                    format!("{} {} PRIMARY KEY", quote(&c.column), ty)
                } else {
                    format!("{} {} NOT NULL", quote(&c.column), ty)
                }
            })
            .collect();

        Statements {
            drop: format!("DROP TABLE IF EXISTS {table}"),
            create: format!("CREATE TABLE {table} ({})", definitions.join(", ")),
            insert: format!(
                "INSERT INTO {table} ({}, {}, {}, {}) VALUES (?1, ?2, ?3, ?4)",
                col("id2"),
                col("ready"),
                col("priority"),
                col("name"),
            ),
            select: format!(
                "SELECT {}, {}, {}, {}, {} FROM {table} ORDER BY {}",
                col("id"),
                col("id2"),
                col("ready"),
                col("priority"),
                col("name"),
                col("id"),
            ),
            update: format!(
                "UPDATE {table} SET {} = ?1, {} = ?2, {} = ?3, {} = ?4 WHERE {} = ?5",
                col("id2"),
                col("ready"),
                col("priority"),
                col("name"),
                col("id"),
            ),
            delete: format!("DELETE FROM {table}"),
        }
    }
}

struct Inner {
    conn: Mutex<Option<Connection>>,
    sql: Mutex<Option<Statements>>,
    path: Option<PathBuf>,
}

fn storage(operation: &str, detail: impl ToString) -> anyhow::Error {
    BenchError::Storage {
        operation: operation.to_string(),
        detail: detail.to_string(),
    }
    .into()
}

#[derive(Clone)]
pub struct SqliteStore {
    inner: Arc<Inner>,
}

impl SqliteStore {
    pub async fn open_in_memory() -> Result<Self> {
        let conn = tokio::task::spawn_blocking(Connection::open_in_memory)
            .await
            .map_err(|e| storage("open", e))?
            .map_err(|e| storage("open", e))?;
        info!("opened in-memory SQLite database");
        Ok(Self::from_connection(conn, None))
    }

    pub async fn open(path: PathBuf) -> Result<Self> {
        let target = path.clone();
        let conn = tokio::task::spawn_blocking(move || -> rusqlite::Result<Connection> {
            let conn = Connection::open(&target)?;
            conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
            Ok(conn)
        })
        .await
        .map_err(|e| storage("open", e))?
        .map_err(|e| storage("open", e))?;
        info!(path = %path.display(), "opened SQLite database");
        Ok(Self::from_connection(conn, Some(path)))
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> Self {
        SqliteStore {
            inner: Arc::new(Inner {
                conn: Mutex::new(Some(conn)),
                sql: Mutex::new(None),
                path,
            }),
        }
    }

    /// Run `f` on the blocking pool with the open connection and the
    /// provisioned statements.
    async fn blocking<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection, &Statements) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let sql = inner
                .sql
                .lock()
                .clone()
                .ok_or_else(|| storage(operation, "schema has not been provisioned"))?;
            let mut guard = inner.conn.lock();
            let conn = guard
                .as_mut()
                .ok_or_else(|| storage(operation, "connection is closed"))?;
            f(conn, &sql).map_err(|e| storage(operation, e))
        })
        .await
        .map_err(|e| storage(operation, e))?
    }
}

#[async_trait]
impl Store for SqliteStore {
    fn backend(&self) -> Backend {
        if self.inner.path.is_some() {
            Backend::SqliteFile
        } else {
            Backend::Sqlite
        }
    }

    async fn provision(&self, schema: &Schema) -> Result<()> {
        let sql = Statements::render(schema);
        debug!(create = %sql.create, "provisioning SQLite schema");

        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || -> Result<()> {
            let guard = inner.conn.lock();
            let conn = guard
                .as_ref()
                .ok_or_else(|| storage("provision", "connection is closed"))?;
            conn.execute_batch(&format!("{}; {};", sql.drop, sql.create))
                .map_err(|e| storage("provision", e))?;
            *inner.sql.lock() = Some(sql);
            Ok(())
        })
        .await
        .map_err(|e| storage("provision", e))?
    }

    async fn delete_all(&self) -> Result<()> {
        self.blocking("delete_all", |conn, sql| {
            conn.execute(&sql.delete, [])?;
            Ok(())
        })
        .await
    }

    async fn insert_many(&self, users: Vec<User>) -> Result<()> {
        self.blocking("insert_many", move |conn, sql| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(&sql.insert)?;
                for user in &users {
                    stmt.execute(params![user.id2, user.ready, user.priority, user.name])?;
                }
            }
            tx.commit()
        })
        .await
    }

    async fn find_all(&self) -> Result<Vec<User>> {
        self.blocking("find_all", |conn, sql| {
            let mut stmt = conn.prepare(&sql.select)?;
            let rows = stmt.query_map([], |row| {
                Ok(User {
                    id: row.get(0)?,
                    id2: row.get(1)?,
                    ready: row.get(2)?,
                    priority: row.get(3)?,
                    name: row.get(4)?,
                })
            })?;
            rows.collect()
        })
        .await
    }

    async fn update_many(&self, users: &[User]) -> Result<()> {
        let users = users.to_vec();
        self.blocking("update_many", move |conn, sql| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(&sql.update)?;
                for user in &users {
                    let changed = stmt.execute(params![
                        user.id2,
                        user.ready,
                        user.priority,
                        user.name,
                        user.id
                    ])?;
                    if changed == 0 {
                        return Err(rusqlite::Error::QueryReturnedNoRows);
                    }
                }
            }
            tx.commit()
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || -> Result<()> {
            let Some(conn) = inner.conn.lock().take() else {
                return Ok(());
            };
            conn.close().map_err(|(_, e)| storage("close", e))?;
            info!("closed SQLite database");
            Ok(())
        })
        .await
        .map_err(|e| storage("close", e))?
    }
}
