//! Resolving where a report's marker goes.

use envwatch_report_models::{Coordinates, Report};

use crate::geolocation::WatchOptions;

/// Seoul City Hall.
pub const DEFAULT_CENTER: Coordinates = Coordinates::new(37.5665, 126.9780);

/// What to do with a report that has no coordinates at all.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MissingCoordinates {
    /// Leave it off the map.
    Skip,
    /// Place it near `center`, offset by up to `radius_deg` in each axis.
    ///
    /// The offset is derived from the report id, so the same report always
    /// lands in the same spot and markers do not overlap exactly.
    JitterAround {
        /// Fallback center.
        center: Coordinates,
        /// Maximum offset in degrees.
        radius_deg: f64,
    },
}

/// Tunables for [`MapSyncController`](crate::controller::MapSyncController).
#[derive(Debug, Clone, PartialEq)]
pub struct MapSyncConfig {
    /// Initial viewport center.
    pub default_center: Coordinates,
    /// Initial zoom.
    pub default_zoom: u8,
    /// Zoom used when flying to a selected report.
    pub selected_zoom: u8,
    /// Zoom used when flying to the device location.
    pub location_zoom: u8,
    /// Fixes less accurate than this are discarded.
    pub accuracy_threshold_m: f64,
    /// Fixes closer than this to the last accepted fix do not move the marker.
    pub min_move_m: f64,
    /// Center the map on the first accepted fix of a watch.
    pub recenter_on_first_fix: bool,
    /// Placement policy for reports without coordinates.
    pub missing_coordinates: MissingCoordinates,
    /// Options for continuous watches.
    pub watch: WatchOptions,
}

impl Default for MapSyncConfig {
    fn default() -> Self {
        Self {
            default_center: DEFAULT_CENTER,
            default_zoom: 12,
            selected_zoom: 16,
            location_zoom: 16,
            accuracy_threshold_m: 20.0,
            min_move_m: 1.0,
            recenter_on_first_fix: true,
            missing_coordinates: MissingCoordinates::JitterAround {
                center: DEFAULT_CENTER,
                radius_deg: 0.01,
            },
            watch: WatchOptions::default(),
        }
    }
}

/// Returns where `report` should be drawn, or `None` to skip it.
///
/// Reports with malformed coordinates (non-finite or out of range) are
/// always skipped. Reports with no coordinates follow `policy`.
#[must_use]
pub fn marker_position(report: &Report, policy: &MissingCoordinates) -> Option<Coordinates> {
    match (report.coordinates, policy) {
        (Some(coordinates), _) if coordinates.is_valid() => Some(coordinates),
        (Some(coordinates), _) => {
            log::warn!(
                "Skipping marker for report {}: malformed coordinates {coordinates:?}",
                report.id
            );
            None
        }
        (None, MissingCoordinates::Skip) => {
            log::debug!("Skipping marker for report {}: no coordinates", report.id);
            None
        }
        (None, MissingCoordinates::JitterAround { center, radius_deg }) => {
            Some(jittered(&report.id, *center, *radius_deg))
        }
    }
}

fn jittered(seed: &str, center: Coordinates, radius_deg: f64) -> Coordinates {
    let digest = md5::compute(seed.as_bytes());
    let unit = |hi: u8, lo: u8| {
        f64::from(u16::from_be_bytes([hi, lo])) / f64::from(u16::MAX) * 2.0 - 1.0
    };
    Coordinates::new(
        center.latitude + unit(digest[0], digest[1]) * radius_deg,
        center.longitude + unit(digest[2], digest[3]) * radius_deg,
    )
}
