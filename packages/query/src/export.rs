//! CSV export of the report collection.

use envwatch_report_models::Report;

use crate::ExportError;

/// Column order of the CSV export. Stable across releases.
pub const CSV_COLUMNS: &[&str] = &[
    "id",
    "title",
    "location",
    "category",
    "severity",
    "status",
    "date",
    "latitude",
    "longitude",
    "description",
    "reporter",
    "assignee",
    "notes",
    "resolved_at",
    "resolution",
    "images",
    "ai_summary",
    "ai_keywords",
    "ai_category",
    "ai_urgency",
    "ai_estimated_cost",
    "ai_expected_duration",
];

/// Serializes `reports` into a CSV document with a header row.
///
/// Multi-valued fields (images, keywords) are joined with `;`.
///
/// # Errors
///
/// Returns [`ExportError`] if the CSV writer fails.
pub fn reports_to_csv(reports: &[Report]) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_COLUMNS)?;

    for report in reports {
        writer.write_record(csv_row(report))?;
    }

    let bytes = writer.into_inner().map_err(|e| ExportError::Flush {
        message: e.to_string(),
    })?;
    String::from_utf8(bytes).map_err(|e| ExportError::Flush {
        message: e.to_string(),
    })
}

fn csv_row(report: &Report) -> Vec<String> {
    let analysis = report.ai_analysis.as_ref();
    let opt = |value: Option<&String>| value.cloned().unwrap_or_default();

    vec![
        report.id.clone(),
        report.title.clone(),
        report.location_display().unwrap_or_default().to_string(),
        report.category.to_string(),
        report.severity.to_string(),
        report.status.to_string(),
        report.date.clone(),
        report
            .coordinates
            .map(|c| c.latitude.to_string())
            .unwrap_or_default(),
        report
            .coordinates
            .map(|c| c.longitude.to_string())
            .unwrap_or_default(),
        report.description.clone(),
        opt(report.reporter_name.as_ref()),
        opt(report.assigned_to.as_ref()),
        opt(report.processing_notes.as_ref()),
        opt(report.resolved_at.as_ref()),
        opt(report.resolution_report.as_ref()),
        report.images.join(";"),
        analysis.map(|a| a.summary.clone()).unwrap_or_default(),
        analysis.map(|a| a.keywords.join(";")).unwrap_or_default(),
        opt(analysis.and_then(|a| a.category.as_ref())),
        opt(analysis.and_then(|a| a.urgency.as_ref())),
        opt(analysis.and_then(|a| a.estimated_cost.as_ref())),
        opt(analysis.and_then(|a| a.expected_duration.as_ref())),
    ]
}
