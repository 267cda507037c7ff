//! Exact-match dashboard filtering.

use chrono::{DateTime, Duration, Utc};
use envwatch_query_models::Filters;
use envwatch_report_models::Report;

/// Returns the reports that pass every active filter, in input order.
///
/// Category, status and severity must match exactly. With a date range
/// set, the report date must fall within `[now - days, now]`; reports whose
/// date fails to parse never pass a date range filter.
#[must_use]
pub fn apply_filters(reports: &[Report], filters: &Filters, now: DateTime<Utc>) -> Vec<Report> {
    if filters.is_unfiltered() {
        return reports.to_vec();
    }

    reports
        .iter()
        .filter(|report| matches_filters(report, filters, now))
        .cloned()
        .collect()
}

/// Returns `true` if `report` passes every active field of `filters`.
#[must_use]
pub fn matches_filters(report: &Report, filters: &Filters, now: DateTime<Utc>) -> bool {
    if filters.category.is_some_and(|c| c != report.category) {
        return false;
    }
    if filters.severity.is_some_and(|s| s != report.severity) {
        return false;
    }
    if filters
        .status
        .as_ref()
        .is_some_and(|status| *status != report.status)
    {
        return false;
    }
    match filters.date_range.days() {
        None => true,
        Some(days) => within_trailing_days(report, days, now),
    }
}

/// Returns `true` if the report date lies in `[now - days, now]`.
///
/// Malformed dates are logged and treated as outside every window.
#[must_use]
pub fn within_trailing_days(report: &Report, days: i64, now: DateTime<Utc>) -> bool {
    let Some(date) = report.submitted_at() else {
        log::debug!(
            "Report {} has unparseable date {:?}; excluding from date window",
            report.id,
            report.date
        );
        return false;
    };
    date >= now - Duration::days(days) && date <= now
}

#[cfg(test)]
mod tests {
    use envwatch_query_models::DateRange;
    use envwatch_report_models::{ReportCategory, ReportStatus, Severity};

    use super::*;
    use crate::test_support::{at, report, scenario_reports};

    #[test]
    fn unfiltered_is_identity() {
        let reports = scenario_reports();
        let now = at("2024-01-21");
        assert_eq!(apply_filters(&reports, &Filters::default(), now), reports);
    }

    #[test]
    fn filters_by_category() {
        let reports = scenario_reports();
        let filters = Filters {
            category: Some(ReportCategory::Waste),
            ..Filters::default()
        };
        let result = apply_filters(&reports, &filters, at("2024-01-21"));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "1");
    }

    #[test]
    fn filters_combine_with_and() {
        let reports = scenario_reports();
        let filters = Filters {
            category: Some(ReportCategory::Air),
            severity: Some(Severity::Low),
            ..Filters::default()
        };
        assert!(apply_filters(&reports, &filters, at("2024-01-21")).is_empty());

        let filters = Filters {
            category: Some(ReportCategory::Air),
            status: Some(ReportStatus::InProgress),
            severity: Some(Severity::High),
            ..Filters::default()
        };
        let result = apply_filters(&reports, &filters, at("2024-01-21"));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "2");
    }

    #[test]
    fn date_range_uses_trailing_window() {
        let reports = vec![
            report("old", ReportCategory::Water, "2023-12-01"),
            report("recent", ReportCategory::Water, "2024-01-18"),
            report("month", ReportCategory::Water, "2024-01-01"),
        ];
        let now = at("2024-01-21");

        let week = Filters {
            date_range: DateRange::Week,
            ..Filters::default()
        };
        let ids: Vec<_> = apply_filters(&reports, &week, now)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["recent"]);

        let month = Filters {
            date_range: DateRange::Month,
            ..Filters::default()
        };
        let ids: Vec<_> = apply_filters(&reports, &month, now)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["recent", "month"]);
    }

    #[test]
    fn malformed_date_is_excluded_without_affecting_others() {
        let reports = vec![
            report("bad", ReportCategory::Noise, "not a date"),
            report("good", ReportCategory::Noise, "2024-01-20"),
        ];
        let filters = Filters {
            date_range: DateRange::Week,
            ..Filters::default()
        };
        let result = apply_filters(&reports, &filters, at("2024-01-21"));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "good");
    }

    #[test]
    fn preserves_input_order() {
        let reports = vec![
            report("c", ReportCategory::Waste, "2024-01-03"),
            report("a", ReportCategory::Waste, "2024-01-01"),
            report("b", ReportCategory::Waste, "2024-01-02"),
        ];
        let filters = Filters {
            category: Some(ReportCategory::Waste),
            ..Filters::default()
        };
        let ids: Vec<_> = apply_filters(&reports, &filters, at("2024-01-21"))
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }
}
