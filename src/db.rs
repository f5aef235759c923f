use async_trait::async_trait;
use sqlx::{sqlite::SqlitePoolOptions, Executor, Pool, Row, Sqlite};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::Error;

/// One pending change to a key-value namespace.
#[derive(Clone, Debug, PartialEq)]
pub enum Edit {
    Put(String, String),
    Remove(String),
}

#[async_trait]
pub trait KeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Applies every edit, or none of them if the backend supports it.
    async fn apply(&self, edits: Vec<Edit>) -> Result<(), Error>;

    /// Removes every key of the namespace.
    async fn clear(&self) -> Result<(), Error>;
}

pub type DynStore = Arc<dyn KeyValueStore + Send + Sync>;

pub struct SqliteStore {
    pool: Pool<Sqlite>,
    namespace: String,
}

impl SqliteStore {
    #[tracing::instrument(name = "SqliteStore::new")]
    pub async fn new(db_uri: &str, max_connections: u32, namespace: &str) -> Result<Self, Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(db_uri)
            .await?;

        pool.execute("CREATE TABLE IF NOT EXISTS preferences (namespace TEXT NOT NULL, key TEXT NOT NULL, value TEXT NOT NULL, PRIMARY KEY (namespace, key))")
            .await?;

        Ok(Self {
            pool,
            namespace: namespace.into(),
        })
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    #[tracing::instrument(skip(self), fields(namespace = %self.namespace))]
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let maybe_row = self
            .pool
            .fetch_optional(
                sqlx::query("SELECT value FROM preferences WHERE namespace = ? AND key = ?")
                    .bind(self.namespace.as_str())
                    .bind(key),
            )
            .await?;

        match maybe_row {
            Some(row) => Ok(Some(row.try_get("value")?)),
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self), fields(namespace = %self.namespace))]
    async fn apply(&self, edits: Vec<Edit>) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;

        for edit in edits {
            let result = match edit {
                Edit::Put(key, value) => {
                    tx.execute(
                        sqlx::query("INSERT INTO preferences (namespace, key, value) VALUES (?, ?, ?) ON CONFLICT (namespace, key) DO UPDATE SET value = excluded.value")
                            .bind(self.namespace.as_str())
                            .bind(key)
                            .bind(value),
                    )
                    .await
                }
                Edit::Remove(key) => {
                    tx.execute(
                        sqlx::query("DELETE FROM preferences WHERE namespace = ? AND key = ?")
                            .bind(self.namespace.as_str())
                            .bind(key),
                    )
                    .await
                }
            };

            if let Err(err) = result {
                tx.rollback().await?;
                return Err(err.into());
            }
        }

        tx.commit().await?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(namespace = %self.namespace))]
    async fn clear(&self) -> Result<(), Error> {
        self.pool
            .execute(
                sqlx::query("DELETE FROM preferences WHERE namespace = ?")
                    .bind(self.namespace.as_str()),
            )
            .await?;

        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.values.lock().await.len()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn apply(&self, edits: Vec<Edit>) -> Result<(), Error> {
        let mut values = self.values.lock().await;

        for edit in edits {
            match edit {
                Edit::Put(key, value) => {
                    values.insert(key, value);
                }
                Edit::Remove(key) => {
                    values.remove(&key);
                }
            }
        }

        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        self.values.lock().await.clear();

        Ok(())
    }
}

#[cfg(test)]
async fn exercise_store(store: &dyn KeyValueStore) {
    store
        .apply(vec![
            Edit::Put("point_a".into(), "1,2".into()),
            Edit::Put("point_b".into(), "3,4".into()),
        ])
        .await
        .unwrap();
    assert_eq!(store.get("point_a").await.unwrap().as_deref(), Some("1,2"));

    store
        .apply(vec![
            Edit::Put("point_a".into(), "5,6".into()),
            Edit::Remove("point_b".into()),
            Edit::Remove("never_written".into()),
        ])
        .await
        .unwrap();
    assert_eq!(store.get("point_a").await.unwrap().as_deref(), Some("5,6"));
    assert_eq!(store.get("point_b").await.unwrap(), None);

    store.clear().await.unwrap();
    assert_eq!(store.get("point_a").await.unwrap(), None);
}

#[tokio::test]
async fn memory_store_edits() {
    let store = MemoryStore::new();
    exercise_store(&store).await;
    assert_eq!(store.len().await, 0);
}

#[tokio::test]
async fn sqlite_store_edits() {
    let store = SqliteStore::new("sqlite::memory:", 1, "PalaksaPrefs")
        .await
        .unwrap();
    exercise_store(&store).await;
}

#[tokio::test]
async fn sqlite_clear_is_scoped_to_namespace() {
    let store = SqliteStore::new("sqlite::memory:", 1, "PalaksaPrefs")
        .await
        .unwrap();
    let other = SqliteStore {
        pool: store.pool.clone(),
        namespace: "osm".into(),
    };

    store
        .apply(vec![Edit::Put("point_a".into(), "1,2".into())])
        .await
        .unwrap();
    other
        .apply(vec![Edit::Put("point_a".into(), "9,9".into())])
        .await
        .unwrap();

    store.clear().await.unwrap();
    assert_eq!(store.get("point_a").await.unwrap(), None);
    assert_eq!(other.get("point_a").await.unwrap().as_deref(), Some("9,9"));
}
