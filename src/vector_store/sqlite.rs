//! SQLite-backed [`VectorStore`] implementation.
//!
//! Persists every collection in one database file,
//! `<data_dir>/vectors.sqlite`. Embeddings are stored as little-endian
//! `f32` BLOBs and queried with a brute-force cosine scan over the
//! collection, which is adequate for a local documents folder.
//!
//! # Schema
//!
//! ```sql
//! collections (id INTEGER PRIMARY KEY, name TEXT UNIQUE, created_at INTEGER)
//! vectors     (collection_id, id, document, metadata_json, embedding BLOB,
//!              PRIMARY KEY (collection_id, id))
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::{
    check_dims, cosine_distance, nearest, ChunkMetadata, Collection, VectorHit, VectorRecord,
    VectorStore,
};
use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::RagError;

/// File name of the vector database inside the data directory.
pub const VECTOR_DB_FILE: &str = "vectors.sqlite";

/// SQLite implementation of the [`VectorStore`] trait.
pub struct SqliteVectorStore {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteVectorStore {
    /// Open (creating if needed) `<data_dir>/vectors.sqlite`.
    ///
    /// Any failure to create the directory, open the file, or apply the
    /// schema is reported as [`RagError::MissingCapability`].
    pub async fn open(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(VECTOR_DB_FILE);
        let unavailable = |e: &dyn std::fmt::Display| {
            RagError::missing(format!(
                "vector store at {} is unavailable: {}",
                path.display(),
                e
            ))
        };

        std::fs::create_dir_all(data_dir).map_err(|e| unavailable(&e))?;

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| unavailable(&e))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| unavailable(&e))?;

        migrate(&pool).await.map_err(|e| unavailable(&e))?;

        Ok(Self { pool, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close all pooled connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn collection_id(&self, name: &str) -> Result<Option<i64>> {
        let row = sqlx::query("SELECT id FROM collections WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<i64, _>("id")))
    }

    fn handle(&self, id: i64, name: &str) -> Box<dyn Collection> {
        Box::new(SqliteCollection {
            pool: self.pool.clone(),
            id,
            name: name.to_string(),
        })
    }
}

async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vectors (
            collection_id INTEGER NOT NULL REFERENCES collections(id),
            id TEXT NOT NULL,
            document TEXT NOT NULL,
            metadata_json TEXT NOT NULL,
            embedding BLOB NOT NULL,
            PRIMARY KEY (collection_id, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn get_or_create_collection(&self, name: &str) -> Result<Box<dyn Collection>> {
        sqlx::query("INSERT OR IGNORE INTO collections (name, created_at) VALUES (?, ?)")
            .bind(name)
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await?;

        match self.collection_id(name).await? {
            Some(id) => Ok(self.handle(id, name)),
            None => bail!("collection '{}' could not be created", name),
        }
    }

    async fn create_collection(&self, name: &str) -> Result<Box<dyn Collection>> {
        if self.collection_id(name).await?.is_some() {
            bail!("collection '{}' already exists", name);
        }

        let id = sqlx::query("INSERT INTO collections (name, created_at) VALUES (?, ?)")
            .bind(name)
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        Ok(self.handle(id, name))
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let Some(id) = self.collection_id(name).await? else {
            return Ok(());
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM vectors WHERE collection_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM collections WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::debug!("deleted collection '{}'", name);
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT name FROM collections ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get::<String, _>("name")).collect())
    }
}

struct SqliteCollection {
    pool: SqlitePool,
    id: i64,
    name: String,
}

impl SqliteCollection {
    /// Dimensionality of the stored vectors, `None` while the collection
    /// is empty.
    async fn stored_dims(&self) -> Result<Option<usize>> {
        let row = sqlx::query(
            "SELECT length(embedding) AS bytes FROM vectors WHERE collection_id = ? LIMIT 1",
        )
        .bind(self.id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.get::<i64, _>("bytes") as usize / std::mem::size_of::<f32>()))
    }

    async fn write(&self, records: &[VectorRecord], replace: bool) -> Result<()> {
        let sql = if replace {
            r#"
            INSERT INTO vectors (collection_id, id, document, metadata_json, embedding)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(collection_id, id) DO UPDATE SET
                document = excluded.document,
                metadata_json = excluded.metadata_json,
                embedding = excluded.embedding
            "#
        } else {
            r#"
            INSERT INTO vectors (collection_id, id, document, metadata_json, embedding)
            VALUES (?, ?, ?, ?, ?)
            "#
        };

        check_dims(
            &self.name,
            self.stored_dims().await?,
            records.iter().map(|r| r.embedding.as_slice()),
        )?;

        let mut tx = self.pool.begin().await?;
        for record in records {
            let metadata_json = serde_json::to_string(&record.metadata)?;
            sqlx::query(sql)
                .bind(self.id)
                .bind(&record.id)
                .bind(&record.document)
                .bind(&metadata_json)
                .bind(vec_to_blob(&record.embedding))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl Collection for SqliteCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        self.write(records, true).await
    }

    async fn add(&self, records: &[VectorRecord]) -> Result<()> {
        self.write(records, false).await
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<VectorHit>> {
        check_dims(&self.name, self.stored_dims().await?, [embedding])?;

        let rows =
            sqlx::query("SELECT id, metadata_json, embedding FROM vectors WHERE collection_id = ?")
                .bind(self.id)
                .fetch_all(&self.pool)
                .await?;

        let hits = rows
            .iter()
            .map(|row| {
                let id: String = row.get("id");
                let metadata_json: String = row.get("metadata_json");
                let blob: Vec<u8> = row.get("embedding");
                VectorHit {
                    id,
                    metadata: serde_json::from_str::<ChunkMetadata>(&metadata_json).ok(),
                    distance: cosine_distance(embedding, &blob_to_vec(&blob)),
                }
            })
            .collect();

        Ok(nearest(hits, k))
    }

    async fn count(&self) -> Result<usize> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM vectors WHERE collection_id = ?")
            .bind(self.id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("cnt") as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: &str, doc_id: &str, embedding: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            document: format!("text of {}", id),
            metadata: ChunkMetadata {
                doc_id: doc_id.to_string(),
                source_path: format!("docs/{}.txt", doc_id),
                chunk_index: 0,
            },
            embedding,
        }
    }

    #[tokio::test]
    async fn test_open_creates_file() {
        let tmp = TempDir::new().unwrap();
        let data_dir = tmp.path().join("data");
        let store = SqliteVectorStore::open(&data_dir).await.unwrap();
        assert!(data_dir.join(VECTOR_DB_FILE).exists());
        assert_eq!(store.path(), data_dir.join(VECTOR_DB_FILE));
        assert!(store.list_collections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_unusable_path_is_missing_capability() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();

        let err = match SqliteVectorStore::open(&blocker).await {
            Ok(_) => panic!("expected open to fail"),
            Err(e) => e,
        };
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::MissingCapability(_))
        ));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let tmp = TempDir::new().unwrap();
        {
            let store = SqliteVectorStore::open(tmp.path()).await.unwrap();
            let coll = store.get_or_create_collection("docs").await.unwrap();
            coll.upsert(&[
                record("a:0", "a", vec![1.0, 0.0]),
                record("b:0", "b", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();
            store.close().await;
        }

        let store = SqliteVectorStore::open(tmp.path()).await.unwrap();
        let coll = store.get_or_create_collection("docs").await.unwrap();
        assert_eq!(coll.count().await.unwrap(), 2);

        let hits = coll.query(&[0.0, 1.0], 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "b:0");
        assert!(hits[0].distance.abs() < 1e-6);
        let meta = hits[0].metadata.as_ref().unwrap();
        assert_eq!(meta.doc_id, "b");
        assert_eq!(meta.source_path, "docs/b.txt");
    }

    #[tokio::test]
    async fn test_upsert_replaces_add_rejects_duplicates() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(tmp.path()).await.unwrap();
        let coll = store.get_or_create_collection("docs").await.unwrap();

        coll.upsert(&[record("a:0", "a", vec![1.0, 0.0])]).await.unwrap();
        coll.upsert(&[record("a:0", "a", vec![0.0, 1.0])]).await.unwrap();
        assert_eq!(coll.count().await.unwrap(), 1);
        let hits = coll.query(&[0.0, 1.0], 1).await.unwrap();
        assert!(hits[0].distance.abs() < 1e-6);

        assert!(coll.add(&[record("a:0", "a", vec![1.0, 0.0])]).await.is_err());
        coll.add(&[record("a:1", "a", vec![1.0, 0.0])]).await.unwrap();
        assert_eq!(coll.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(tmp.path()).await.unwrap();
        let one = store.get_or_create_collection("one").await.unwrap();
        let two = store.get_or_create_collection("two").await.unwrap();
        one.upsert(&[record("x:0", "x", vec![1.0])]).await.unwrap();

        assert_eq!(one.count().await.unwrap(), 1);
        assert_eq!(two.count().await.unwrap(), 0);
        assert_eq!(store.list_collections().await.unwrap(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_delete_then_create_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(tmp.path()).await.unwrap();
        let coll = store.create_collection("docs").await.unwrap();
        coll.upsert(&[record("a:0", "a", vec![1.0])]).await.unwrap();
        assert!(store.create_collection("docs").await.is_err());

        store.delete_collection("docs").await.unwrap();
        store.delete_collection("docs").await.unwrap();

        let fresh = store.create_collection("docs").await.unwrap();
        assert_eq!(fresh.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected_after_reopen() {
        let tmp = TempDir::new().unwrap();
        {
            let store = SqliteVectorStore::open(tmp.path()).await.unwrap();
            let coll = store.get_or_create_collection("docs").await.unwrap();
            coll.upsert(&[record("a:0", "a", vec![1.0, 0.0])]).await.unwrap();
            store.close().await;
        }

        let store = SqliteVectorStore::open(tmp.path()).await.unwrap();
        let coll = store.get_or_create_collection("docs").await.unwrap();
        let err = coll.query(&[1.0, 0.0, 0.0], 1).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::InvalidConfiguration(_))
        ));
        assert!(coll
            .upsert(&[record("b:0", "b", vec![0.0, 1.0, 0.0])])
            .await
            .is_err());
        assert!(coll
            .add(&[record("b:0", "b", vec![0.0, 1.0, 0.0])])
            .await
            .is_err());
        assert_eq!(coll.count().await.unwrap(), 1);

        let other = store.get_or_create_collection("other").await.unwrap();
        other
            .upsert(&[record("b:0", "b", vec![0.0, 1.0, 0.0])])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_undecodable_metadata_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(tmp.path()).await.unwrap();
        let coll = store.get_or_create_collection("docs").await.unwrap();
        coll.upsert(&[record("a:0", "a", vec![1.0])]).await.unwrap();

        sqlx::query("UPDATE vectors SET metadata_json = 'not json'")
            .execute(&store.pool)
            .await
            .unwrap();

        let hits = coll.query(&[1.0], 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].metadata.is_none());
    }
}
