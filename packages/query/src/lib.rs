#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Derived views over the in-memory report collection.
//!
//! Everything here is a pure, synchronous function of its inputs: the
//! source collection is never mutated and every result is a fresh `Vec`.
//! Filtering and search are mutually exclusive view modes; see
//! [`select_display_set`]. [`ReportQueryEngine`] wraps the functions with
//! revision-based memoization so views are re-derived only when an input
//! actually changed.

pub mod engine;
pub mod export;
pub mod filter;
pub mod search;
pub mod stats;

pub use engine::{DerivedView, ReportQueryEngine};
pub use export::reports_to_csv;
pub use filter::apply_filters;
pub use search::apply_search;
pub use stats::{compute_stats, percentage};

use envwatch_query_models::{SearchQuery, ViewMode};
use envwatch_report_models::Report;
use thiserror::Error;

/// Errors that can occur while exporting reports.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Writing a CSV record failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Finalizing the output buffer failed.
    #[error("Export flush error: {message}")]
    Flush {
        /// Description of what went wrong.
        message: String,
    },
}

/// Picks the collection to display.
///
/// An applied search wins outright and its results are shown unfiltered;
/// otherwise the filtered set is shown.
#[must_use]
pub fn select_display_set(
    filtered: Vec<Report>,
    search_results: Vec<Report>,
    search: &SearchQuery,
) -> (Vec<Report>, ViewMode) {
    if search.active_term().is_some() {
        (search_results, ViewMode::Search)
    } else {
        (filtered, ViewMode::Filtered)
    }
}
