//! Case-insensitive substring search.

use envwatch_query_models::SearchQuery;
use envwatch_report_models::Report;

/// Returns the reports matching the applied search term, in input order.
///
/// Returns an empty list unless the search is applied with a non-blank
/// term. A report matches if its title, location, description or reporter
/// name contains the term, ignoring case. There is no tokenization or
/// ranking.
#[must_use]
pub fn apply_search(reports: &[Report], search: &SearchQuery) -> Vec<Report> {
    let Some(term) = search.active_term() else {
        return Vec::new();
    };
    let needle = term.to_lowercase();

    reports
        .iter()
        .filter(|report| matches_term(report, &needle))
        .cloned()
        .collect()
}

/// Returns `true` if any searchable field of `report` contains `needle`.
///
/// `needle` must already be lowercased.
#[must_use]
pub fn matches_term(report: &Report, needle: &str) -> bool {
    searchable_fields(report).any(|field| field.to_lowercase().contains(needle))
}

fn searchable_fields(report: &Report) -> impl Iterator<Item = &str> {
    [
        Some(report.title.as_str()),
        report.location_display(),
        Some(report.description.as_str()),
        report.reporter_name.as_deref(),
    ]
    .into_iter()
    .flatten()
}
