#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map marker synchronization.
//!
//! [`MapSyncController`] owns one embedded map widget and keeps its markers,
//! viewport and current-location indicator consistent with the displayed
//! reports, the selected report and the device position. The widget and
//! the position service are reached only through the [`MapWidget`],
//! [`MapWidgetFactory`] and [`Geolocation`] traits so hosts can plug in
//! their own implementations. [`MapRegistry`] keeps one controller per
//! mounted view.

pub mod controller;
pub mod export;
pub mod geolocation;
pub mod placement;
pub mod registry;
pub mod widget;

pub use controller::{
    CenterRequest, MapSyncController, ReconcileSummary, WidgetHandle, WidgetState,
};
pub use export::{display_set_to_geojson, display_set_to_geojson_string};
pub use geolocation::{
    FixOutcome, Geolocation, GeolocationError, LocationState, PositionFix, WatchId, WatchOptions,
};
pub use placement::{DEFAULT_CENTER, MapSyncConfig, MissingCoordinates, marker_position};
pub use registry::{MapRegistry, ViewId};
pub use widget::{
    ContainerId, MapWidget, MapWidgetFactory, MarkerHandle, MarkerIcon, MarkerSpec, MarkerStyle,
    WidgetEvent,
};

use thiserror::Error;

/// Errors raised by the map layer.
///
/// Only resource acquisition and lifecycle misuse surface as errors.
/// Per-report rendering problems are logged and skipped.
#[derive(Debug, Error)]
pub enum MapError {
    /// The widget or its tile provider could not be created.
    #[error("Map widget failed to initialize: {message}")]
    WidgetInit {
        /// Description of the failure.
        message: String,
    },

    /// The container already hosts a live widget.
    #[error("Container {container} is already bound to a map widget")]
    AlreadyBound {
        /// The contested container.
        container: ContainerId,
    },

    /// The requested operation is not allowed in the current widget state.
    #[error("Cannot {action} while the map widget is {from:?}")]
    InvalidTransition {
        /// State the widget was in.
        from: WidgetState,
        /// Operation that was attempted.
        action: &'static str,
    },

    /// The widget rejected a marker.
    #[error("Marker error: {message}")]
    Marker {
        /// Description of the failure.
        message: String,
    },

    /// No controller is registered for the view.
    #[error("No map view registered for {view}")]
    UnknownView {
        /// The missing view.
        view: ViewId,
    },

    /// Building the `GeoJSON` export failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
