//! `GeoJSON` export of the displayed reports.

use envwatch_report_models::Report;
use geo::{BoundingRect, MultiPoint, Point};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value, feature::Id};

use crate::{
    MapError,
    placement::{MissingCoordinates, marker_position},
};

/// Builds a feature collection with one `Point` per placeable report.
///
/// Placement follows the same rules as the map markers, so the export
/// matches what the map shows.
#[must_use]
pub fn display_set_to_geojson(
    reports: &[Report],
    policy: &MissingCoordinates,
) -> FeatureCollection {
    let mut points = Vec::with_capacity(reports.len());
    let features = reports
        .iter()
        .filter_map(|report| {
            let position = marker_position(report, policy)?;
            points.push(Point::new(position.longitude, position.latitude));
            Some(Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::Point(vec![
                    position.longitude,
                    position.latitude,
                ]))),
                id: Some(Id::String(report.id.clone())),
                properties: Some(properties(report)),
                foreign_members: None,
            })
        })
        .collect();

    let bbox = MultiPoint::from(points)
        .bounding_rect()
        .map(|rect| vec![rect.min().x, rect.min().y, rect.max().x, rect.max().y]);

    FeatureCollection {
        bbox,
        features,
        foreign_members: None,
    }
}

/// Serializes [`display_set_to_geojson`] to a JSON string.
///
/// # Errors
///
/// Returns [`MapError::Json`] if serialization fails.
pub fn display_set_to_geojson_string(
    reports: &[Report],
    policy: &MissingCoordinates,
) -> Result<String, MapError> {
    Ok(serde_json::to_string(&display_set_to_geojson(reports, policy))?)
}

fn properties(report: &Report) -> JsonObject {
    let mut props = JsonObject::new();
    props.insert("id".to_string(), report.id.clone().into());
    props.insert("title".to_string(), report.title.clone().into());
    props.insert("category".to_string(), report.category.to_string().into());
    props.insert("severity".to_string(), report.severity.to_string().into());
    props.insert("status".to_string(), report.status.as_str().into());
    props.insert("date".to_string(), report.date.clone().into());
    if let Some(location) = report.location_display() {
        props.insert("location".to_string(), location.into());
    }
    props
}
