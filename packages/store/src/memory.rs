//! In-process store.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use envwatch_report_models::{
    NewReport, Report, StatusPatch,
    community::{CommunityPost, NewComment, NewCommunityPost},
};
use tokio::sync::RwLock;

use crate::{COMMUNITY_POSTS, REPORTS, ReportStore, StoreError, new_id};

#[derive(Debug, Default)]
struct Collections {
    reports: Vec<Report>,
    posts: Vec<CommunityPost>,
}

/// Keeps all documents in memory, oldest first.
///
/// Writes can be made to fail with [`MemoryStore::fail_writes`] to
/// exercise callers' error paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `reports` (oldest first).
    #[must_use]
    pub fn with_reports(reports: Vec<Report>) -> Self {
        Self {
            collections: RwLock::new(Collections {
                reports,
                posts: Vec::new(),
            }),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent write fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Replaces a stored report directly, bypassing the write path.
    pub async fn put_report(&self, report: Report) {
        let mut collections = self.collections.write().await;
        match collections.reports.iter_mut().find(|r| r.id == report.id) {
            Some(existing) => *existing = report,
            None => collections.reports.push(report),
        }
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable {
                message: "writes disabled".to_string(),
            });
        }
        Ok(())
    }

    async fn update_post(
        &self,
        id: &str,
        change: impl FnOnce(&CommunityPost) -> CommunityPost + Send,
    ) -> Result<CommunityPost, StoreError> {
        self.check_writable()?;
        let mut collections = self.collections.write().await;
        let post = collections
            .posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound {
                collection: COMMUNITY_POSTS,
                id: id.to_string(),
            })?;
        *post = change(post);
        Ok(post.clone())
    }
}

#[async_trait::async_trait]
impl ReportStore for MemoryStore {
    async fn list_reports(&self) -> Result<Vec<Report>, StoreError> {
        Ok(self.collections.read().await.reports.iter().rev().cloned().collect())
    }

    async fn list_community_posts(&self) -> Result<Vec<CommunityPost>, StoreError> {
        Ok(self.collections.read().await.posts.iter().rev().cloned().collect())
    }

    async fn create_report(&self, report: NewReport) -> Result<Report, StoreError> {
        report.validate()?;
        self.check_writable()?;
        let report = report.into_report(new_id(), Utc::now());
        self.collections.write().await.reports.push(report.clone());
        Ok(report)
    }

    async fn update_report_status(
        &self,
        id: &str,
        patch: &StatusPatch,
    ) -> Result<Report, StoreError> {
        self.check_writable()?;
        let mut collections = self.collections.write().await;
        let report = collections
            .reports
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound {
                collection: REPORTS,
                id: id.to_string(),
            })?;
        *report = patch.applied_to(report, Utc::now());
        Ok(report.clone())
    }

    async fn create_community_post(
        &self,
        post: NewCommunityPost,
    ) -> Result<CommunityPost, StoreError> {
        self.check_writable()?;
        let post = post.into_post(new_id(), Utc::now());
        self.collections.write().await.posts.push(post.clone());
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
