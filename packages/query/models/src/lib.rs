#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Query parameter and derived statistics types for the report query engine.
//!
//! Filters and search terms are session-scoped UI state; [`Stats`] is a
//! pure function of the report collection. None of these are persisted.

use envwatch_report_models::{ReportCategory, ReportStatus, Severity};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Trailing date window relative to evaluation time.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum DateRange {
    /// No date filtering.
    #[default]
    #[serde(rename = "all")]
    #[strum(serialize = "all")]
    All,
    /// Last 7 days.
    #[serde(rename = "week")]
    #[strum(serialize = "week")]
    Week,
    /// Last 30 days.
    #[serde(rename = "month")]
    #[strum(serialize = "month")]
    Month,
    /// Last 90 days.
    #[serde(rename = "3months")]
    #[strum(serialize = "3months")]
    ThreeMonths,
}

impl DateRange {
    /// Length of the window in days, or `None` for [`DateRange::All`].
    #[must_use]
    pub const fn days(self) -> Option<i64> {
        match self {
            Self::All => None,
            Self::Week => Some(7),
            Self::Month => Some(30),
            Self::ThreeMonths => Some(90),
        }
    }
}

/// Dashboard filters. A `None` field means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Filters {
    /// Category to keep.
    #[serde(rename = "type", with = "all_or")]
    pub category: Option<ReportCategory>,
    /// Status to keep.
    #[serde(with = "all_or::status")]
    pub status: Option<ReportStatus>,
    /// Severity to keep.
    #[serde(with = "all_or")]
    pub severity: Option<Severity>,
    /// Trailing date window.
    pub date_range: DateRange,
}

impl Filters {
    /// Returns `true` if no field restricts the result.
    #[must_use]
    pub fn is_unfiltered(&self) -> bool {
        self.category.is_none()
            && self.status.is_none()
            && self.severity.is_none()
            && self.date_range == DateRange::All
    }
}

/// Free-text search state.
///
/// The term is only used once the user explicitly applies the search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchQuery {
    /// Raw search input.
    pub term: String,
    /// Whether the search was submitted.
    pub applied: bool,
}

impl SearchQuery {
    /// Creates an applied search for `term`.
    #[must_use]
    pub fn applied(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            applied: true,
        }
    }

    /// Returns the trimmed term if the search is applied and non-blank.
    #[must_use]
    pub fn active_term(&self) -> Option<&str> {
        let term = self.term.trim();
        (self.applied && !term.is_empty()).then_some(term)
    }
}

/// Which of the two mutually exclusive views produced the display set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewMode {
    /// Filtered view of the whole collection.
    Filtered,
    /// Search results; filters are ignored.
    Search,
}

/// Count and percentage for one bucket of a breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Share<K> {
    /// Bucket key.
    pub key: K,
    /// Number of reports in the bucket.
    pub count: u64,
    /// Share of the total, 0-100.
    pub percent: f64,
}

/// Aggregate statistics over a report collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Number of reports.
    pub total: u64,
    /// Reports in [`ReportStatus::Received`].
    pub pending: u64,
    /// Reports in [`ReportStatus::InProgress`].
    pub processing: u64,
    /// Reports in [`ReportStatus::Resolved`].
    pub resolved: u64,
    /// Reports flagged [`ReportStatus::Urgent`].
    pub urgent: u64,
    /// Reports dated within the trailing 7 days.
    pub this_week: u64,
    /// `resolved / total` as a percentage. Zero for an empty collection.
    pub resolution_rate: f64,
    /// Breakdown by category, one entry per category.
    pub by_category: Vec<Share<ReportCategory>>,
    /// Breakdown by severity, one entry per severity.
    pub by_severity: Vec<Share<Severity>>,
}

/// Serde adapter mapping `"all"` (or a missing/blank value) to `None`.
pub mod all_or {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::{Deserialize, Deserializer, Serializer};

    /// The wire value meaning "no filter".
    pub const ALL: &str = "all";

    /// Serializes `None` as `"all"` and `Some(v)` via `Display`.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    #[allow(clippy::ref_option)]
    pub fn serialize<T: Display, S: Serializer>(
        value: &Option<T>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.collect_str(v),
            None => serializer.serialize_str(ALL),
        }
    }

    /// Deserializes `"all"`, an empty string or null as `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a recognized variant.
    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("" | ALL) => Ok(None),
            Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
        }
    }

    /// Status filter. Unlike stored reports, a filter only accepts the
    /// recognized status spellings.
    pub mod status {
        use envwatch_report_models::ReportStatus;
        use serde::{Deserialize, Deserializer, Serializer};

        use super::ALL;

        /// # Errors
        ///
        /// Propagates serializer errors.
        #[allow(clippy::ref_option)]
        pub fn serialize<S: Serializer>(
            value: &Option<ReportStatus>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            super::serialize(value, serializer)
        }

        /// # Errors
        ///
        /// Returns an error for a status that is not recognized.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<ReportStatus>, D::Error> {
            let raw = Option::<String>::deserialize(deserializer)?;
            match raw.as_deref().map(str::trim) {
                None | Some("" | ALL) => Ok(None),
                Some(value) => ReportStatus::known(value).map(Some).ok_or_else(|| {
                    serde::de::Error::custom(format!("unknown status: {value}"))
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filters_are_unfiltered() {
        assert!(Filters::default().is_unfiltered());
    }

    #[test]
    fn filters_deserialize_all_as_none() {
        let filters: Filters = serde_json::from_str(
            r#"{"type":"waste","status":"all","severity":"all","dateRange":"3months"}"#,
        )
        .unwrap();
        assert_eq!(filters.category, Some(ReportCategory::Waste));
        assert_eq!(filters.status, None);
        assert_eq!(filters.severity, None);
        assert_eq!(filters.date_range, DateRange::ThreeMonths);
    }

    #[test]
    fn filters_accept_korean_status() {
        let filters: Filters = serde_json::from_str(r#"{"status":"처리중"}"#).unwrap();
        assert_eq!(filters.status, Some(ReportStatus::InProgress));
    }

    #[test]
    fn filters_serialize_none_as_all() {
        let json = serde_json::to_value(Filters {
            severity: Some(Severity::High),
            ..Filters::default()
        })
        .unwrap();
        assert_eq!(json["type"], "all");
        assert_eq!(json["severity"], "high");
        assert_eq!(json["dateRange"], "all");
    }

    #[test]
    fn rejects_unknown_category() {
        assert!(serde_json::from_str::<Filters>(r#"{"type":"fire"}"#).is_err());
    }

    #[test]
    fn rejects_unknown_status() {
        assert!(serde_json::from_str::<Filters>(r#"{"status":"bogus"}"#).is_err());
    }

    #[test]
    fn search_requires_applied_and_nonblank_term() {
        assert_eq!(SearchQuery::default().active_term(), None);
        assert_eq!(SearchQuery::applied("   ").active_term(), None);
        let pending = SearchQuery {
            term: "park".to_string(),
            applied: false,
        };
        assert_eq!(pending.active_term(), None);
        assert_eq!(SearchQuery::applied(" park ").active_term(), Some("park"));
    }

    #[test]
    fn date_range_parses_from_str() {
        assert_eq!("3months".parse::<DateRange>().unwrap(), DateRange::ThreeMonths);
        assert_eq!(DateRange::Month.days(), Some(30));
        assert_eq!(DateRange::All.days(), None);
    }
}
