use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::BenchError;
use crate::store::{Schema, Store};
use crate::types::{Backend, User};

#[derive(Debug, Default)]
struct State {
    table: Option<String>,
    rows: BTreeMap<i64, User>,
    next_id: i64,
    closed: bool,
}

impl State {
    fn check(&self, operation: &str) -> Result<()> {
        if self.closed {
            return Err(storage(operation, "store is closed"));
        }
        if self.table.is_none() {
            return Err(storage(operation, "schema has not been provisioned"));
        }
        Ok(())
    }
}

fn storage(operation: &str, detail: &str) -> anyhow::Error {
    BenchError::Storage {
        operation: operation.to_string(),
        detail: detail.to_string(),
    }
    .into()
}

/// In-process store keyed by id. Every call yields to the runtime once so it
/// behaves like a round-trip to a real backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.rows.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> Backend {
        Backend::Memory
    }

    async fn provision(&self, schema: &Schema) -> Result<()> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(storage("provision", "store is closed"));
        }
        debug!(table = %schema.table, "provisioning memory table");
        state.table = Some(schema.table.clone());
        state.rows.clear();
        state.next_id = 0;
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().await;
        state.check("delete_all")?;
        state.rows.clear();
        Ok(())
    }

    async fn insert_many(&self, users: Vec<User>) -> Result<()> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().await;
        state.check("insert_many")?;
        for mut user in users {
            state.next_id += 1;
            user.id = state.next_id;
            state.rows.insert(user.id, user);
        }
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<User>> {
        tokio::task::yield_now().await;
        let state = self.state.lock().await;
        state.check("find_all")?;
        Ok(state.rows.values().cloned().collect())
    }

    async fn update_many(&self, users: &[User]) -> Result<()> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().await;
        state.check("update_many")?;
        for user in users {
            match state.rows.get_mut(&user.id) {
                Some(row) => row.clone_from(user),
                None => {
                    return Err(storage(
                        "update_many",
                        &format!("no row with id {}", user.id),
                    ));
                }
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.closed = true;
        state.rows.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn provisioned() -> MemoryStore {
        let store = MemoryStore::new();
        store.provision(&Schema::user()).await.unwrap();
        store
    }

    #[tokio::test]
    async fn insert_assigns_sequential_ids() {
        let store = provisioned().await;
        store
            .insert_many((1..=3).map(User::fixture).collect())
            .await
            .unwrap();

        let users = store.find_all().await.unwrap();
        let ids: Vec<i64> = users.iter().map(|u| u.id).collect();
        assert_eq!(ids, [1, 2, 3]);
        assert_eq!(users[2].name, "Peter 3");
    }

    #[tokio::test]
    async fn update_persists_changes() {
        let store = provisioned().await;
        store
            .insert_many((1..=2).map(User::fixture).collect())
            .await
            .unwrap();

        let mut users = store.find_all().await.unwrap();
        users.iter_mut().for_each(|u| u.priority += 1);
        store.update_many(&users).await.unwrap();

        let reloaded = store.find_all().await.unwrap();
        assert!(reloaded.iter().all(|u| u.priority == 6));
    }

    #[tokio::test]
    async fn update_of_unknown_row_fails() {
        let store = provisioned().await;
        let mut ghost = User::fixture(1);
        ghost.id = 99;
        let err = store.update_many(&[ghost]).await.unwrap_err();
        assert!(err.to_string().contains("no row with id 99"));
    }

    #[tokio::test]
    async fn delete_all_empties_store() {
        let store = provisioned().await;
        store
            .insert_many((1..=5).map(User::fixture).collect())
            .await
            .unwrap();
        store.delete_all().await.unwrap();
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn operations_require_provisioning() {
        let store = MemoryStore::new();
        let err = store.find_all().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BenchError>(),
            Some(BenchError::Storage { .. })
        ));
    }

    #[tokio::test]
    async fn closed_store_rejects_calls() {
        let store = provisioned().await;
        store.close().await.unwrap();
        assert!(store.delete_all().await.is_err());
        assert!(store.provision(&Schema::user()).await.is_err());
    }
}
