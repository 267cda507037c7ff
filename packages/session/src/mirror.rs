//! Optimistic in-memory mirror of the persisted collections.
//!
//! The mirror is an accepted eventual-consistency cache: local writes are
//! applied immediately and never rolled back. [`ReportMirror::refresh`]
//! replaces it wholesale with server truth after logging where the two
//! disagreed.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use envwatch_ai::LlmProvider;
use envwatch_report_models::{
    NewReport, Report, StatusPatch,
    community::{CommunityPost, NewComment, NewCommunityPost},
};
use envwatch_store::{ReportStore, StoreError, new_id};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::{
    auth::{AuthGate, AuthRedirect, Session},
    notify::Notifier,
};

/// Errors from mirror operations.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The action needs a logged-in user.
    #[error("Login required")]
    LoginRequired(AuthRedirect),

    /// The action needs an administrator.
    #[error("Administrator privileges required")]
    Forbidden,

    /// No such record in the mirror.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Record kind.
        kind: &'static str,
        /// Missing id.
        id: String,
    },

    /// The persistence collaborator failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AuthGate> for MirrorError {
    fn from(gate: AuthGate) -> Self {
        match gate {
            AuthGate::LoginRequired(redirect) => Self::LoginRequired(redirect),
            AuthGate::Forbidden => Self::Forbidden,
        }
    }
}

/// A point-in-time view of the mirror.
///
/// Collections are shared, never mutated after the snapshot is taken.
#[derive(Debug, Clone)]
pub struct MirrorSnapshot {
    /// Increments on every change to either collection.
    pub revision: u64,
    pub reports: Arc<Vec<Report>>,
    pub posts: Arc<Vec<CommunityPost>>,
}

/// One disagreement found by [`ReportMirror::refresh`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Divergence {
    /// The mirror has a report the server does not.
    MissingOnServer { id: String },
    /// The server has a report the mirror did not.
    NewOnServer { id: String },
    /// Both have the report with different statuses.
    StatusMismatch {
        id: String,
        local: String,
        server: String,
    },
}

/// Result of [`ReportMirror::refresh`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSummary {
    pub reports: usize,
    pub posts: usize,
    pub divergences: Vec<Divergence>,
}

#[derive(Debug, Default)]
struct MirrorState {
    revision: u64,
    loaded: bool,
    reports: Arc<Vec<Report>>,
    posts: Arc<Vec<CommunityPost>>,
}

impl MirrorState {
    fn snapshot(&self) -> MirrorSnapshot {
        MirrorSnapshot {
            revision: self.revision,
            reports: self.reports.clone(),
            posts: self.posts.clone(),
        }
    }

    fn splice_report(&mut self, report: Report) {
        let reports = Arc::make_mut(&mut self.reports);
        match reports.iter_mut().find(|r| r.id == report.id) {
            Some(existing) => *existing = report,
            None => reports.insert(0, report),
        }
        self.revision += 1;
    }

    fn splice_post(&mut self, post: CommunityPost) {
        let posts = Arc::make_mut(&mut self.posts);
        match posts.iter_mut().find(|p| p.id == post.id) {
            Some(existing) => *existing = post,
            None => posts.insert(0, post),
        }
        self.revision += 1;
    }
}

/// Read-through cache of reports and community posts.
///
/// Locks are never held across calls to the store or the AI provider, so
/// a slow write does not block readers or other writes.
pub struct ReportMirror {
    store: Arc<dyn ReportStore>,
    notifier: Notifier,
    ai: Option<Arc<dyn LlmProvider>>,
    state: RwLock<MirrorState>,
}

impl std::fmt::Debug for ReportMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportMirror")
            .field("ai", &self.ai.is_some())
            .finish_non_exhaustive()
    }
}

impl ReportMirror {
    #[must_use]
    pub fn new(store: Arc<dyn ReportStore>, notifier: Notifier) -> Self {
        Self {
            store,
            notifier,
            ai: None,
            state: RwLock::new(MirrorState::default()),
        }
    }

    /// Enables best-effort AI summaries for submitted reports.
    #[must_use]
    pub fn with_ai(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.ai = Some(provider);
        self
    }

    #[must_use]
    pub const fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub async fn snapshot(&self) -> MirrorSnapshot {
        self.state.read().await.snapshot()
    }

    pub async fn revision(&self) -> u64 {
        self.state.read().await.revision
    }

    /// Fetches both collections and replaces the mirror with them.
    ///
    /// Differences between the previous mirror and the server are logged,
    /// not merged. The first refresh only loads.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Store`] if either fetch fails; the mirror is
    /// left unchanged.
    pub async fn refresh(&self) -> Result<RefreshSummary, MirrorError> {
        let reports = self.store.list_reports().await?;
        let posts = self.store.list_community_posts().await?;

        let mut state = self.state.write().await;
        let divergences = if state.loaded {
            diff_reports(&state.reports, &reports)
        } else {
            Vec::new()
        };
        for divergence in &divergences {
            log::warn!("Mirror diverged from server: {divergence:?}");
        }

        let summary = RefreshSummary {
            reports: reports.len(),
            posts: posts.len(),
            divergences,
        };
        state.reports = Arc::new(reports);
        state.posts = Arc::new(posts);
        state.loaded = true;
        state.revision += 1;

        Ok(summary)
    }

    /// Submits a new report as the logged-in user.
    ///
    /// Without a precomputed analysis, an AI summary of the description is
    /// requested first; its failure never blocks submission.
    ///
    /// # Errors
    ///
    /// * [`MirrorError::LoginRequired`] if nobody is logged in
    /// * [`MirrorError::Store`] if the store rejects the report; the user is
    ///   also notified
    pub async fn submit_report(
        &self,
        session: &Session,
        mut report: NewReport,
    ) -> Result<Report, MirrorError> {
        let user = session
            .require_user("/report/new")
            .map_err(MirrorError::LoginRequired)?;
        report.reporter_id = Some(user.id.clone());
        report.reporter_name = Some(user.display_name.clone());
        report.validate().map_err(StoreError::from)?;

        if report.ai_analysis.is_none()
            && let Some(provider) = &self.ai
        {
            let text = format!("{}\n\n{}", report.title, report.description);
            report.ai_analysis = envwatch_ai::summarize(provider.as_ref(), &text).await;
        }

        match self.store.create_report(report).await {
            Ok(created) => {
                self.state.write().await.splice_report(created.clone());
                self.notifier.success(&user.id, "Report submitted");
                Ok(created)
            }
            Err(e) => {
                self.notifier
                    .error(&user.id, format!("Failed to submit report: {e}"));
                Err(e.into())
            }
        }
    }

    /// Changes a report's status as an administrator.
    ///
    /// The mirror is updated before the write is attempted. A failed write
    /// is reported through the notifier and the local change is kept.
    ///
    /// # Errors
    ///
    /// * [`MirrorError::LoginRequired`] or [`MirrorError::Forbidden`] for a
    ///   non-administrator
    /// * [`MirrorError::NotFound`] if the mirror has no such report
    pub async fn update_status(
        &self,
        session: &Session,
        id: &str,
        patch: StatusPatch,
    ) -> Result<Report, MirrorError> {
        let admin = session.require_admin("/admin")?;

        let updated = {
            let mut state = self.state.write().await;
            let current = state
                .reports
                .iter()
                .find(|r| r.id == id)
                .ok_or_else(|| MirrorError::NotFound {
                    kind: "Report",
                    id: id.to_string(),
                })?;
            let updated = patch.applied_to(current, Utc::now());
            state.splice_report(updated.clone());
            updated
        };

        match self.store.update_report_status(id, &patch).await {
            Ok(_) => self.notifier.success(
                &admin.id,
                format!("Status changed to {}", updated.status.label()),
            ),
            Err(e) => self.notifier.error(
                &admin.id,
                format!("Failed to save status for report {id}: {e}"),
            ),
        }

        Ok(updated)
    }

    /// Publishes a community post as the logged-in user.
    ///
    /// # Errors
    ///
    /// * [`MirrorError::LoginRequired`] if nobody is logged in
    /// * [`MirrorError::Store`] if the write fails
    pub async fn create_post(
        &self,
        session: &Session,
        mut post: NewCommunityPost,
    ) -> Result<CommunityPost, MirrorError> {
        let user = session
            .require_user("/community")
            .map_err(MirrorError::LoginRequired)?;
        post.author.clone_from(&user.display_name);

        match self.store.create_community_post(post).await {
            Ok(created) => {
                self.state.write().await.splice_post(created.clone());
                Ok(created)
            }
            Err(e) => {
                self.notifier
                    .error(&user.id, format!("Failed to publish post: {e}"));
                Err(e.into())
            }
        }
    }

    /// Likes a post. The local counter is bumped immediately.
    ///
    /// # Errors
    ///
    /// * [`MirrorError::LoginRequired`] if nobody is logged in
    /// * [`MirrorError::NotFound`] if the mirror has no such post
    pub async fn like_post(
        &self,
        session: &Session,
        id: &str,
    ) -> Result<CommunityPost, MirrorError> {
        let user = session
            .require_user("/community")
            .map_err(MirrorError::LoginRequired)?;

        let liked = self.update_local_post(id, CommunityPost::liked).await?;

        if let Err(e) = self.store.like_community_post(id).await {
            self.notifier
                .error(&user.id, format!("Failed to save like: {e}"));
        }

        Ok(liked)
    }

    /// Comments on a post as the logged-in user. The comment appears
    /// locally immediately.
    ///
    /// # Errors
    ///
    /// * [`MirrorError::LoginRequired`] if nobody is logged in
    /// * [`MirrorError::NotFound`] if the mirror has no such post
    pub async fn add_comment(
        &self,
        session: &Session,
        post_id: &str,
        mut comment: NewComment,
    ) -> Result<CommunityPost, MirrorError> {
        let user = session
            .require_user("/community")
            .map_err(MirrorError::LoginRequired)?;
        comment.author.clone_from(&user.display_name);

        let local = comment.clone().into_comment(new_id(), Utc::now());
        let commented = self
            .update_local_post(post_id, move |post| post.with_comment(local))
            .await?;

        match self.store.add_comment(post_id, comment).await {
            Ok(stored) => {
                self.state.write().await.splice_post(stored.clone());
                Ok(stored)
            }
            Err(e) => {
                self.notifier
                    .error(&user.id, format!("Failed to save comment: {e}"));
                Ok(commented)
            }
        }
    }

    async fn update_local_post(
        &self,
        id: &str,
        change: impl FnOnce(&CommunityPost) -> CommunityPost,
    ) -> Result<CommunityPost, MirrorError> {
        let mut state = self.state.write().await;
        let current = state
            .posts
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| MirrorError::NotFound {
                kind: "Post",
                id: id.to_string(),
            })?;
        let updated = change(current);
        state.splice_post(updated.clone());
        Ok(updated)
    }
}

fn diff_reports(local: &[Report], server: &[Report]) -> Vec<Divergence> {
    let server_by_id: BTreeMap<&str, &Report> =
        server.iter().map(|r| (r.id.as_str(), r)).collect();
    let local_by_id: BTreeMap<&str, &Report> = local.iter().map(|r| (r.id.as_str(), r)).collect();

    let mut divergences = Vec::new();
    for (id, report) in &local_by_id {
        match server_by_id.get(id) {
            None => divergences.push(Divergence::MissingOnServer { id: (*id).to_string() }),
            Some(remote) if remote.status != report.status => {
                divergences.push(Divergence::StatusMismatch {
                    id: (*id).to_string(),
                    local: report.status.to_string(),
                    server: remote.status.to_string(),
                });
            }
            Some(_) => {}
        }
    }
    for id in server_by_id.keys() {
        if !local_by_id.contains_key(id) {
            divergences.push(Divergence::NewOnServer { id: (*id).to_string() });
        }
    }
    divergences
}
