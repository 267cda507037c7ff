//! Memoizing wrapper that re-derives views only when an input changed.

use chrono::{DateTime, Utc};
use envwatch_query_models::{Filters, SearchQuery, Stats, ViewMode};
use envwatch_report_models::Report;

use crate::{apply_filters, apply_search, compute_stats, select_display_set};

/// Derived state for one set of inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedView {
    /// Input revision this view was computed from.
    pub revision: u64,
    /// Reports to show.
    pub display: Vec<Report>,
    /// Which view produced `display`.
    pub mode: ViewMode,
    /// Aggregates over the whole collection.
    pub stats: Stats,
}

/// Holds the current query inputs and the last derived view.
///
/// Every setter that actually changes an input bumps the revision; setters
/// given an equal value are no-ops. [`ReportQueryEngine::view`] recomputes
/// only when the cached view is older than the current revision, so the
/// result always reflects the latest inputs.
#[derive(Debug, Default)]
pub struct ReportQueryEngine {
    reports: Vec<Report>,
    filters: Filters,
    search: SearchQuery,
    revision: u64,
    cached: Option<DerivedView>,
    recomputations: u64,
}

impl ReportQueryEngine {
    /// Creates an engine over `reports` with no filters or search.
    #[must_use]
    pub fn new(reports: Vec<Report>) -> Self {
        Self {
            reports,
            ..Self::default()
        }
    }

    /// Replaces the source collection wholesale.
    pub fn set_reports(&mut self, reports: Vec<Report>) {
        if self.reports != reports {
            self.reports = reports;
            self.revision += 1;
        }
    }

    /// Replaces the filters.
    pub fn set_filters(&mut self, filters: Filters) {
        if self.filters != filters {
            self.filters = filters;
            self.revision += 1;
        }
    }

    /// Replaces the search state.
    pub fn set_search(&mut self, search: SearchQuery) {
        if self.search != search {
            self.search = search;
            self.revision += 1;
        }
    }

    /// Clears the search, returning to the filtered view.
    pub fn clear_search(&mut self) {
        self.set_search(SearchQuery::default());
    }

    /// Current source collection.
    #[must_use]
    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    /// Current filters.
    #[must_use]
    pub const fn filters(&self) -> &Filters {
        &self.filters
    }

    /// Current search state.
    #[must_use]
    pub const fn search(&self) -> &SearchQuery {
        &self.search
    }

    /// Current input revision.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of full recomputations performed so far.
    #[must_use]
    pub const fn recomputations(&self) -> u64 {
        self.recomputations
    }

    /// Returns the derived view for the current inputs, evaluated at the
    /// current time.
    pub fn view(&mut self) -> &DerivedView {
        self.view_at(Utc::now())
    }

    /// Returns the derived view for the current inputs, evaluated at `now`
    /// if a recomputation is needed.
    pub fn view_at(&mut self, now: DateTime<Utc>) -> &DerivedView {
        match self.cached.take() {
            Some(view) if view.revision == self.revision => self.cached.insert(view),
            _ => {
                let view = self.derive(now);
                self.recomputations += 1;
                self.cached.insert(view)
            }
        }
    }

    fn derive(&self, now: DateTime<Utc>) -> DerivedView {
        log::debug!(
            "Recomputing report view for revision {} ({} reports)",
            self.revision,
            self.reports.len()
        );
        let filtered = apply_filters(&self.reports, &self.filters, now);
        let results = apply_search(&self.reports, &self.search);
        let (display, mode) = select_display_set(filtered, results, &self.search);
        DerivedView {
            revision: self.revision,
            display,
            mode,
            stats: compute_stats(&self.reports, now),
        }
    }
}
