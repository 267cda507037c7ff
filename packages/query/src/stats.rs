//! Dashboard aggregates.

use chrono::{DateTime, Utc};
use envwatch_query_models::{Share, Stats};
use envwatch_report_models::{Report, ReportCategory, ReportStatus, Severity};

use crate::filter::within_trailing_days;

const THIS_WEEK_DAYS: i64 = 7;

/// Computes aggregate statistics over `reports` in a single pass.
///
/// Status buckets are exact matches and do not overlap; unknown statuses
/// are counted only in `total`. Reports with malformed dates are left out
/// of `this_week`.
#[must_use]
pub fn compute_stats(reports: &[Report], now: DateTime<Utc>) -> Stats {
    let mut pending = 0;
    let mut processing = 0;
    let mut resolved = 0;
    let mut urgent = 0;
    let mut this_week = 0;
    let mut by_category = [0u64; 4];
    let mut by_severity = [0u64; 3];

    for report in reports {
        match report.status {
            ReportStatus::Received => pending += 1,
            ReportStatus::InProgress => processing += 1,
            ReportStatus::Resolved => resolved += 1,
            ReportStatus::Urgent => urgent += 1,
            ReportStatus::Unknown(_) => {}
        }
        if within_trailing_days(report, THIS_WEEK_DAYS, now) {
            this_week += 1;
        }
        by_category[category_index(report.category)] += 1;
        by_severity[severity_index(report.severity)] += 1;
    }

    let total = reports.len() as u64;

    Stats {
        total,
        pending,
        processing,
        resolved,
        urgent,
        this_week,
        resolution_rate: percentage(resolved, total),
        by_category: ReportCategory::all()
            .iter()
            .map(|&key| share(key, by_category[category_index(key)], total))
            .collect(),
        by_severity: Severity::all()
            .iter()
            .map(|&key| share(key, by_severity[severity_index(key)], total))
            .collect(),
    }
}

/// Returns `part / total` as a percentage, or `0.0` when `total` is zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}

fn share<K>(key: K, count: u64, total: u64) -> Share<K> {
    Share {
        key,
        count,
        percent: percentage(count, total),
    }
}

const fn category_index(category: ReportCategory) -> usize {
    match category {
        ReportCategory::Waste => 0,
        ReportCategory::Air => 1,
        ReportCategory::Water => 2,
        ReportCategory::Noise => 3,
    }
}

const fn severity_index(severity: Severity) -> usize {
    match severity {
        Severity::Low => 0,
        Severity::Medium => 1,
        Severity::High => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, report, scenario_reports};

    #[test]
    fn empty_collection_has_zero_percentages() {
        let stats = compute_stats(&[], at("2024-01-21"));
        assert_eq!(stats.total, 0);
        assert!(stats.resolution_rate.abs() < f64::EPSILON);
        assert!(!stats.resolution_rate.is_nan());
        assert_eq!(stats.by_category.len(), 4);
        assert!(stats.by_category.iter().all(|s| s.percent.abs() < f64::EPSILON));
        assert!(stats.by_severity.iter().all(|s| !s.percent.is_nan()));
    }

    #[test]
    fn percentage_guards_zero_total() {
        assert!(percentage(5, 0).abs() < f64::EPSILON);
        assert!((percentage(1, 4) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn buckets_do_not_overlap() {
        let mut reports = scenario_reports();
        let mut resolved = report("3", ReportCategory::Water, "2024-01-10");
        resolved.status = ReportStatus::Resolved;
        let mut urgent = report("4", ReportCategory::Noise, "2024-01-20");
        urgent.status = ReportStatus::Urgent;
        let mut unknown = report("5", ReportCategory::Noise, "2024-01-20");
        unknown.status = ReportStatus::parse("archived");
        reports.extend([resolved, urgent, unknown]);

        let stats = compute_stats(&reports, at("2024-01-21"));
        assert_eq!(stats.total, 5);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.processing, 1);
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.urgent, 1);
        assert!(stats.pending + stats.processing + stats.resolved <= stats.total);
        assert!((stats.resolution_rate - 20.0).abs() < 1e-9);
    }

    #[test]
    fn this_week_skips_malformed_and_old_dates() {
        let reports = vec![
            report("a", ReportCategory::Air, "2024-01-20"),
            report("b", ReportCategory::Air, "2024-01-01"),
            report("c", ReportCategory::Air, "garbage"),
        ];
        let stats = compute_stats(&reports, at("2024-01-21"));
        assert_eq!(stats.total, 3);
        assert_eq!(stats.this_week, 1);
    }

    #[test]
    fn breakdowns_cover_every_variant() {
        let stats = compute_stats(&scenario_reports(), at("2024-01-21"));
        let waste = stats
            .by_category
            .iter()
            .find(|s| s.key == ReportCategory::Waste)
            .unwrap();
        assert_eq!(waste.count, 1);
        assert!((waste.percent - 50.0).abs() < f64::EPSILON);
        let low = stats
            .by_severity
            .iter()
            .find(|s| s.key == Severity::Low)
            .unwrap();
        assert_eq!(low.count, 0);
    }
}
