#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the envwatch server.
//!
//! These types are serialized to JSON for the REST API. Query parameters
//! are kept as raw strings here and converted to the query engine's
//! [`Filters`] and [`SearchQuery`] so a bad value can be reported back to
//! the caller instead of failing extraction.

use envwatch_query_models::{DateRange, Filters, SearchQuery, ViewMode, all_or::ALL};
use envwatch_report_models::{AiAnalysis, Report, ReportStatus};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealth {
    pub healthy: bool,
    pub version: String,
}

/// Query parameters shared by the report listing and export endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQueryParams {
    /// Category key, or `all`.
    #[serde(rename = "type")]
    pub category: Option<String>,
    /// Status key in any accepted spelling, or `all`.
    pub status: Option<String>,
    /// Severity key, or `all`.
    pub severity: Option<String>,
    /// One of `all`, `week`, `month`, `3months`.
    pub date_range: Option<String>,
    /// Applied search term. A non-blank term switches to the search view.
    pub q: Option<String>,
}

impl ReportQueryParams {
    /// Converts the raw parameters into dashboard filters.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first parameter that does not parse.
    pub fn filters(&self) -> Result<Filters, String> {
        Ok(Filters {
            category: parse_param("type", self.category.as_deref())?,
            status: parse_with("status", self.status.as_deref(), ReportStatus::known)?,
            severity: parse_param("severity", self.severity.as_deref())?,
            date_range: parse_param::<DateRange>("dateRange", self.date_range.as_deref())?
                .unwrap_or_default(),
        })
    }

    /// Returns the search state. A present `q` counts as submitted.
    #[must_use]
    pub fn search(&self) -> SearchQuery {
        self.q
            .as_deref()
            .map_or_else(SearchQuery::default, SearchQuery::applied)
    }
}

fn selected(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|v| !v.is_empty() && *v != ALL)
}

fn parse_param<T: std::str::FromStr>(name: &str, raw: Option<&str>) -> Result<Option<T>, String> {
    parse_with(name, raw, |value| value.parse().ok())
}

fn parse_with<T>(
    name: &str,
    raw: Option<&str>,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, String> {
    selected(raw)
        .map(|value| parse(value).ok_or_else(|| format!("Invalid {name} parameter: {value}")))
        .transpose()
}

/// Response of the report listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiReports {
    /// Mirror revision the listing was computed from.
    pub revision: u64,
    /// Whether the listing is a filtered view or search results.
    pub mode: ViewMode,
    /// Number of reports in the listing.
    pub total: usize,
    pub reports: Vec<Report>,
}

/// Body returned when an action needs a logged-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiLoginRequired {
    pub error: String,
    pub login_required: bool,
    /// Login page to send the user to.
    pub login_path: String,
    /// Page to come back to afterwards.
    pub return_to: String,
}

/// Request body for the summarize endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizeRequest {
    pub text: String,
}

/// Response of the summarize endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizeResponse {
    pub analysis: AiAnalysis,
}

/// Response of the refresh endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRefresh {
    pub reports: usize,
    pub posts: usize,
    /// Number of disagreements logged between the mirror and the store.
    pub divergences: usize,
}
