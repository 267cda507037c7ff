//! `SQLite` document store.

use std::path::Path;

use chrono::Utc;
use envwatch_report_models::{
    NewReport, Report, StatusPatch,
    community::{CommunityPost, NewComment, NewCommunityPost},
};
use moosicbox_json_utils::database::ToValue as _;
use serde::{Serialize, de::DeserializeOwned};
use switchy_database::{Database, DatabaseValue};
use switchy_database_connection::init_sqlite_rusqlite;

use crate::{COMMUNITY_POSTS, REPORTS, ReportStore, StoreError, new_id};

/// Default path for the envwatch database.
pub const DEFAULT_DB_PATH: &str = "data/envwatch.db";

/// Stores every record as a JSON document keyed by collection and id.
pub struct SqliteStore {
    db: Box<dyn Database>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and ensures the schema
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database cannot be opened or schema
    /// creation fails.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let db = init_sqlite_rusqlite(Some(path)).map_err(|e| StoreError::Database(e.to_string()))?;
        ensure_schema(db.as_ref()).await?;

        Ok(Self { db })
    }

    /// Upserts `reports` as-is, keeping their ids. Returns how many were
    /// written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if any write fails.
    pub async fn import_reports(&self, reports: &[Report]) -> Result<usize, StoreError> {
        for report in reports {
            self.upsert(REPORTS, &report.id, report).await?;
        }
        Ok(reports.len())
    }

    async fn load_all<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>, StoreError> {
        let rows = self
            .db
            .query_raw_params(
                "SELECT id, body FROM documents WHERE collection = $1 ORDER BY rowid DESC",
                &[DatabaseValue::String(collection.to_string())],
            )
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.to_value("id").unwrap_or_default();
            let body: String = row.to_value("body").unwrap_or_default();
            match serde_json::from_str(&body) {
                Ok(document) => documents.push(document),
                Err(e) => log::warn!("Skipping malformed {collection} document {id}: {e}"),
            }
        }

        Ok(documents)
    }

    async fn load_one<T: DeserializeOwned>(
        &self,
        collection: &'static str,
        id: &str,
    ) -> Result<T, StoreError> {
        let rows = self
            .db
            .query_raw_params(
                "SELECT body FROM documents WHERE collection = $1 AND id = $2",
                &[
                    DatabaseValue::String(collection.to_string()),
                    DatabaseValue::String(id.to_string()),
                ],
            )
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let body: String = rows
            .first()
            .map(|row| row.to_value("body").unwrap_or_default())
            .ok_or_else(|| StoreError::NotFound {
                collection,
                id: id.to_string(),
            })?;

        Ok(serde_json::from_str(&body)?)
    }

    async fn upsert<T: Serialize + Sync>(
        &self,
        collection: &str,
        id: &str,
        document: &T,
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let body = serde_json::to_string(document)?;

        self.db
            .exec_raw_params(
                "INSERT INTO documents (collection, id, body, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $4)
                 ON CONFLICT (collection, id) DO UPDATE SET
                   body = excluded.body,
                   updated_at = excluded.updated_at",
                &[
                    DatabaseValue::String(collection.to_string()),
                    DatabaseValue::String(id.to_string()),
                    DatabaseValue::String(body),
                    DatabaseValue::String(now),
                ],
            )
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    async fn update_post(
        &self,
        id: &str,
        change: impl FnOnce(&CommunityPost) -> CommunityPost + Send,
    ) -> Result<CommunityPost, StoreError> {
        let post: CommunityPost = self.load_one(COMMUNITY_POSTS, id).await?;
        let updated = change(&post);
        self.upsert(COMMUNITY_POSTS, id, &updated).await?;
        Ok(updated)
    }
}

/// Creates the documents table if it doesn't already exist.
async fn ensure_schema(db: &dyn Database) -> Result<(), StoreError> {
    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS documents (
            collection  TEXT NOT NULL,
            id          TEXT NOT NULL,
            body        TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL,
            PRIMARY KEY (collection, id)
        )",
    )
    .await
    .map_err(|e| StoreError::Database(e.to_string()))?;

    Ok(())
}

#[async_trait::async_trait]
impl ReportStore for SqliteStore {
    async fn list_reports(&self) -> Result<Vec<Report>, StoreError> {
        self.load_all(REPORTS).await
    }

    async fn list_community_posts(&self) -> Result<Vec<CommunityPost>, StoreError> {
        self.load_all(COMMUNITY_POSTS).await
    }

    async fn create_report(&self, report: NewReport) -> Result<Report, StoreError> {
        report.validate()?;
        let report = report.into_report(new_id(), Utc::now());
        self.upsert(REPORTS, &report.id, &report).await?;
        log::debug!("Created report {}", report.id);
        Ok(report)
    }

    async fn update_report_status(
        &self,
        id: &str,
        patch: &StatusPatch,
    ) -> Result<Report, StoreError> {
        let report: Report = self.load_one(REPORTS, id).await?;
        let updated = patch.applied_to(&report, Utc::now());
        self.upsert(REPORTS, id, &updated).await?;
        Ok(updated)
    }

    async fn create_community_post(
        &self,
        post: NewCommunityPost,
    ) -> Result<CommunityPost, StoreError> {
        let post = post.into_post(new_id(), Utc::now());
        self.upsert(COMMUNITY_POSTS, &post.id, &post).await?;
        Ok(post)
    }

    async fn like_community_post(&self, id: &str) -> Result<CommunityPost, StoreError> {
        self.update_post(id, CommunityPost::liked).await
    }

    async fn add_comment(
        &self,
        post_id: &str,
        comment: NewComment,
    ) -> Result<CommunityPost, StoreError> {
        let comment = comment.into_comment(new_id(), Utc::now());
        self.update_post(post_id, move |post| post.with_comment(comment))
            .await
    }
}
