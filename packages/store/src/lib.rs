#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Persistence for reports and community posts.
//!
//! [`ReportStore`] is the document-store boundary the rest of the system
//! talks to. [`SqliteStore`] keeps each record as a JSON document in a
//! single `SQLite` table via `switchy_database`; [`MemoryStore`] keeps
//! everything in process and can simulate write failures.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{DEFAULT_DB_PATH, SqliteStore};

use envwatch_report_models::{
    InvalidReportError, NewReport, Report, StatusPatch,
    community::{CommunityPost, NewComment, NewCommunityPost},
};
use thiserror::Error;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database query or command failed.
    #[error("Database error: {0}")]
    Database(String),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload was rejected before writing.
    #[error(transparent)]
    Invalid(#[from] InvalidReportError),

    /// No document with the given id exists.
    #[error("{collection} {id} not found")]
    NotFound {
        /// Collection searched.
        collection: &'static str,
        /// Missing id.
        id: String,
    },

    /// The store refused the write.
    #[error("Store unavailable: {message}")]
    Unavailable {
        /// Description.
        message: String,
    },
}

/// Document collection holding reports.
pub const REPORTS: &str = "reports";

/// Document collection holding community posts.
pub const COMMUNITY_POSTS: &str = "community_posts";

/// The persistence collaborator.
///
/// Listings return newest records first. Ids are assigned by the store.
#[async_trait::async_trait]
pub trait ReportStore: Send + Sync {
    /// Returns every stored report.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails. Individual malformed
    /// documents are skipped, not reported as errors.
    async fn list_reports(&self) -> Result<Vec<Report>, StoreError>;

    /// Returns every community post.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    async fn list_community_posts(&self) -> Result<Vec<CommunityPost>, StoreError>;

    /// Stores a new report with status `received` and returns the stored
    /// record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for a rejected payload, or another
    /// [`StoreError`] if the write fails.
    async fn create_report(&self, report: NewReport) -> Result<Report, StoreError>;

    /// Applies `patch` to report `id` and returns the updated record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the report does not exist.
    async fn update_report_status(
        &self,
        id: &str,
        patch: &StatusPatch,
    ) -> Result<Report, StoreError>;

    /// Stores a new community post and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    async fn create_community_post(
        &self,
        post: NewCommunityPost,
    ) -> Result<CommunityPost, StoreError>;

    /// Increments the like counter of post `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the post does not exist.
    async fn like_community_post(&self, id: &str) -> Result<CommunityPost, StoreError>;

    /// Appends a comment to post `id` and bumps its comment counter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the post does not exist.
    async fn add_comment(
        &self,
        post_id: &str,
        comment: NewComment,
    ) -> Result<CommunityPost, StoreError>;
}

/// Generates a new document id.
#[must_use]
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
