#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Environmental issue report types.
//!
//! This crate defines the citizen report record shared by the whole
//! envwatch system: the closed category/severity/status taxonomies, the
//! tagged [`Location`] variant, the optional AI analysis bundle, and the
//! write payloads handed to the persistence layer. Community forum types
//! live in [`community`].

pub mod community;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Date format used when the system stamps a new record.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Kind of environmental issue being reported.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ReportCategory {
    /// Illegal dumping, litter, overflowing bins
    Waste,
    /// Smoke, dust, odors, emissions
    Air,
    /// Polluted streams, discharge, algae
    Water,
    /// Construction, traffic, late-night noise
    Noise,
}

impl ReportCategory {
    /// Returns the Korean display label shown to citizens.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Waste => "쓰레기",
            Self::Air => "대기오염",
            Self::Water => "수질오염",
            Self::Noise => "소음",
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Waste, Self::Air, Self::Water, Self::Noise]
    }
}

/// How serious a reported issue is. Ordered `Low < Medium < High`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Severity {
    /// Nuisance with no immediate harm
    Low,
    /// Needs attention within days
    Medium,
    /// Needs attention now
    High,
}

impl Severity {
    /// Returns the Korean display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "낮음",
            Self::Medium => "보통",
            Self::High => "높음",
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Low, Self::Medium, Self::High]
    }
}

/// Lifecycle status of a report.
///
/// The canonical wire form is the snake-case English key. The Korean
/// display strings and the `pending`/`processing` aliases are accepted on
/// input so records written by older clients keep their meaning. Any other
/// value is preserved verbatim in [`ReportStatus::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReportStatus {
    /// Submitted, not yet looked at
    Received,
    /// Assigned and being worked on
    InProgress,
    /// Closed out
    Resolved,
    /// Flagged for immediate handling, outside the normal progression
    Urgent,
    /// A value this version does not recognize
    Unknown(String),
}

impl ReportStatus {
    /// Parses any accepted spelling of a status. Never fails.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "received" | "pending" | "제보접수" => Self::Received,
            "in_progress" | "in-progress" | "processing" | "처리중" => Self::InProgress,
            "resolved" | "처리완료" => Self::Resolved,
            "urgent" | "긴급" => Self::Urgent,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Parses a recognized spelling, returning `None` for anything that
    /// would become [`ReportStatus::Unknown`].
    #[must_use]
    pub fn known(value: &str) -> Option<Self> {
        match Self::parse(value) {
            Self::Unknown(_) => None,
            status => Some(status),
        }
    }

    /// Returns the canonical key for this status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Received => "received",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Urgent => "urgent",
            Self::Unknown(value) => value,
        }
    }

    /// Returns the Korean display label.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Received => "제보접수",
            Self::InProgress => "처리중",
            Self::Resolved => "처리완료",
            Self::Urgent => "긴급",
            Self::Unknown(value) => value,
        }
    }

    /// Returns the next status in the normal progression, if any.
    ///
    /// `Urgent` and unknown values have no defined successor.
    #[must_use]
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Received => Some(Self::InProgress),
            Self::InProgress => Some(Self::Resolved),
            Self::Resolved | Self::Urgent | Self::Unknown(_) => None,
        }
    }
}

impl From<String> for ReportStatus {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl std::str::FromStr for ReportStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<ReportStatus> for String {
    fn from(status: ReportStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl Coordinates {
    /// Creates a new coordinate pair.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Returns `true` if both components are finite and within the valid
    /// latitude/longitude ranges.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Where an issue was observed.
///
/// Older records store a bare string, newer ones an object with an
/// `address` field. Both deserialize into this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Location {
    /// Free-text label such as a park name.
    PlainText(String),
    /// Structured address from a geocoder or map picker.
    Structured {
        /// Human-readable address line.
        address: String,
    },
}

impl Location {
    /// Returns the string to display for this location.
    #[must_use]
    pub fn display(&self) -> &str {
        match self {
            Self::PlainText(text) => text,
            Self::Structured { address } => address,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display())
    }
}

/// AI-derived analysis attached to a report.
///
/// Models are loose with types, so the label fields also accept numbers
/// and booleans, and `keywords` also accepts a comma-joined string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiAnalysis {
    /// One-paragraph summary of the report text.
    pub summary: String,
    /// Salient keywords.
    #[serde(deserialize_with = "lenient::keywords")]
    pub keywords: Vec<String>,
    /// Suggested category label.
    #[serde(deserialize_with = "lenient::text")]
    pub category: Option<String>,
    /// Suggested urgency label.
    #[serde(deserialize_with = "lenient::text")]
    pub urgency: Option<String>,
    /// Rough cost estimate for remediation.
    #[serde(deserialize_with = "lenient::text")]
    pub estimated_cost: Option<String>,
    /// Rough time estimate for remediation.
    #[serde(deserialize_with = "lenient::text")]
    pub expected_duration: Option<String>,
}

mod lenient {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Integer(i64),
        Float(f64),
        Flag(bool),
    }

    impl Scalar {
        fn into_string(self) -> String {
            match self {
                Self::Text(text) => text,
                Self::Integer(n) => n.to_string(),
                Self::Float(n) => n.to_string(),
                Self::Flag(b) => b.to_string(),
            }
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Keywords {
        List(Vec<Scalar>),
        Joined(String),
    }

    pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        Ok(Option::<Scalar>::deserialize(deserializer)?.map(Scalar::into_string))
    }

    pub fn keywords<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        Ok(match Option::<Keywords>::deserialize(deserializer)? {
            None => Vec::new(),
            Some(Keywords::List(items)) => items.into_iter().map(Scalar::into_string).collect(),
            Some(Keywords::Joined(joined)) => joined
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }
}

impl AiAnalysis {
    /// Wraps unstructured model output as a summary-only analysis.
    #[must_use]
    pub fn from_raw_text(raw: impl Into<String>) -> Self {
        Self {
            summary: raw.into(),
            ..Self::default()
        }
    }
}

/// A single citizen submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Opaque identifier assigned by the persistence layer.
    pub id: String,
    /// Short headline.
    pub title: String,
    /// Where the issue was observed.
    #[serde(default)]
    pub location: Option<Location>,
    /// Issue category.
    #[serde(rename = "type")]
    pub category: ReportCategory,
    /// How serious the issue is.
    pub severity: Severity,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Submission date as stored. May be malformed; see [`Report::submitted_at`].
    #[serde(default)]
    pub date: String,
    /// Lifecycle status.
    pub status: ReportStatus,
    /// Map position. `None` when the reporter did not share one.
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    /// Image URLs.
    #[serde(default)]
    pub images: Vec<String>,
    /// Account id of the reporter.
    #[serde(default)]
    pub reporter_id: Option<String>,
    /// Display name of the reporter.
    #[serde(default)]
    pub reporter_name: Option<String>,
    /// Staff member handling the report.
    #[serde(default)]
    pub assigned_to: Option<String>,
    /// Internal processing notes.
    #[serde(default)]
    pub processing_notes: Option<String>,
    /// When the report was resolved.
    #[serde(default)]
    pub resolved_at: Option<String>,
    /// Closing summary written by staff.
    #[serde(default)]
    pub resolution_report: Option<String>,
    /// AI analysis bundle, when summarization succeeded.
    #[serde(default)]
    pub ai_analysis: Option<AiAnalysis>,
}

impl Report {
    /// Parses the stored submission date. Returns `None` for malformed values.
    #[must_use]
    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        parse_report_date(&self.date)
    }

    /// Returns the display string for the location, if one is set.
    #[must_use]
    pub fn location_display(&self) -> Option<&str> {
        self.location.as_ref().map(Location::display)
    }
}

/// Parses the date formats found in stored reports.
///
/// Accepts RFC 3339 timestamps, naive `YYYY-MM-DDTHH:MM:SS[.f]` and
/// `YYYY-MM-DD HH:MM:SS` timestamps (interpreted as UTC), and bare
/// `YYYY-MM-DD` dates (midnight UTC).
#[must_use]
pub fn parse_report_date(value: &str) -> Option<DateTime<Utc>> {
    let s = value.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Error returned when a new report fails basic validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidReportError {
    /// Which field was rejected.
    pub field: &'static str,
    /// Why it was rejected.
    pub reason: &'static str,
}

impl std::fmt::Display for InvalidReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid report {}: {}", self.field, self.reason)
    }
}

impl std::error::Error for InvalidReportError {}

/// Payload for creating a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    /// Short headline.
    pub title: String,
    /// Where the issue was observed.
    #[serde(default)]
    pub location: Option<Location>,
    /// Issue category.
    #[serde(rename = "type")]
    pub category: ReportCategory,
    /// How serious the issue is.
    pub severity: Severity,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Explicit submission date. Defaults to today.
    #[serde(default)]
    pub date: Option<String>,
    /// Map position.
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    /// Image URLs.
    #[serde(default)]
    pub images: Vec<String>,
    /// Account id of the reporter. Filled in from the session.
    #[serde(default)]
    pub reporter_id: Option<String>,
    /// Display name of the reporter. Filled in from the session.
    #[serde(default)]
    pub reporter_name: Option<String>,
    /// AI analysis computed before submission.
    #[serde(default)]
    pub ai_analysis: Option<AiAnalysis>,
}

impl NewReport {
    /// Checks the invariants a report must satisfy before it is stored.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidReportError`] if the title is blank or the supplied
    /// coordinates are out of range.
    pub fn validate(&self) -> Result<(), InvalidReportError> {
        if self.title.trim().is_empty() {
            return Err(InvalidReportError {
                field: "title",
                reason: "must not be empty",
            });
        }
        if self.coordinates.is_some_and(|c| !c.is_valid()) {
            return Err(InvalidReportError {
                field: "coordinates",
                reason: "out of range",
            });
        }
        Ok(())
    }

    /// Builds the stored record for this payload.
    #[must_use]
    pub fn into_report(self, id: String, now: DateTime<Utc>) -> Report {
        Report {
            id,
            title: self.title.trim().to_string(),
            location: self.location,
            category: self.category,
            severity: self.severity,
            description: self.description,
            date: self
                .date
                .unwrap_or_else(|| now.format(DATE_FORMAT).to_string()),
            status: ReportStatus::Received,
            coordinates: self.coordinates,
            images: self.images,
            reporter_id: self.reporter_id,
            reporter_name: self.reporter_name,
            assigned_to: None,
            processing_notes: None,
            resolved_at: None,
            resolution_report: None,
            ai_analysis: self.ai_analysis,
        }
    }
}

/// A status update issued by an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPatch {
    /// New status.
    pub status: ReportStatus,
    /// Staff member taking the report.
    #[serde(default)]
    pub assigned_to: Option<String>,
    /// Processing notes to record.
    #[serde(default)]
    pub processing_notes: Option<String>,
    /// Closing summary, usually sent together with `resolved`.
    #[serde(default)]
    pub resolution_report: Option<String>,
}

impl StatusPatch {
    /// Creates a patch that only changes the status.
    #[must_use]
    pub const fn status(status: ReportStatus) -> Self {
        Self {
            status,
            assigned_to: None,
            processing_notes: None,
            resolution_report: None,
        }
    }

    /// Returns a copy of `report` with this patch applied.
    ///
    /// Fields the patch leaves unset keep their previous values. Moving to
    /// [`ReportStatus::Resolved`] stamps `resolved_at` if it is not set yet.
    #[must_use]
    pub fn applied_to(&self, report: &Report, now: DateTime<Utc>) -> Report {
        let mut next = report.clone();
        next.status = self.status.clone();
        if let Some(assignee) = &self.assigned_to {
            next.assigned_to = Some(assignee.clone());
        }
        if let Some(notes) = &self.processing_notes {
            next.processing_notes = Some(notes.clone());
        }
        if let Some(resolution) = &self.resolution_report {
            next.resolution_report = Some(resolution.clone());
        }
        if self.status == ReportStatus::Resolved && next.resolved_at.is_none() {
            next.resolved_at = Some(now.format(DATE_FORMAT).to_string());
        }
        next
    }
}
