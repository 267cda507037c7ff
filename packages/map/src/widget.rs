//! Boundary to the embedded third-party map widget.
//!
//! Only [`MapSyncController`](crate::controller::MapSyncController) calls
//! these traits. Implementations wrap whatever widget the host UI embeds.

use envwatch_report_models::{Coordinates, Report, ReportCategory, ReportStatus};
use serde::{Deserialize, Serialize};

use crate::MapError;

/// Identifies the DOM container (or equivalent) a widget is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerId(pub String);

impl std::fmt::Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Widget-assigned marker identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerHandle(pub u64);

/// Glyph drawn inside a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkerIcon {
    /// A report of the given category.
    Report(ReportCategory),
    /// The device's own position.
    CurrentLocation,
}

impl MarkerIcon {
    /// Emoji used by the default web widget.
    #[must_use]
    pub const fn glyph(self) -> &'static str {
        match self {
            Self::Report(ReportCategory::Waste) => "🗑️",
            Self::Report(ReportCategory::Air) => "🌫️",
            Self::Report(ReportCategory::Water) => "💧",
            Self::Report(ReportCategory::Noise) => "🔊",
            Self::CurrentLocation => "📍",
        }
    }
}

/// Visual attributes of a marker. Changing these never recreates a marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerStyle {
    /// Glyph.
    pub icon: MarkerIcon,
    /// Fill color as a CSS hex string.
    pub color: &'static str,
    /// Border width in pixels.
    pub border_width: u8,
    /// Scale relative to the base size, in percent.
    pub scale_percent: u16,
    /// Whether this marker is the current selection.
    pub selected: bool,
}

impl MarkerStyle {
    /// Style for a report marker.
    #[must_use]
    pub fn for_report(report: &Report, selected: bool) -> Self {
        Self {
            icon: MarkerIcon::Report(report.category),
            color: status_color(&report.status),
            border_width: if selected { 4 } else { 2 },
            scale_percent: if selected { 130 } else { 100 },
            selected,
        }
    }

    /// Style for the current-location marker.
    #[must_use]
    pub const fn current_location() -> Self {
        Self {
            icon: MarkerIcon::CurrentLocation,
            color: "#2563eb",
            border_width: 3,
            scale_percent: 100,
            selected: false,
        }
    }
}

const fn status_color(status: &ReportStatus) -> &'static str {
    match status {
        ReportStatus::Received => "#f59e0b",
        ReportStatus::InProgress => "#3b82f6",
        ReportStatus::Resolved => "#10b981",
        ReportStatus::Urgent => "#ef4444",
        ReportStatus::Unknown(_) => "#9ca3af",
    }
}

/// Everything the widget needs to draw a new marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    /// Where to draw it.
    pub position: Coordinates,
    /// How to draw it.
    pub style: MarkerStyle,
    /// Tooltip text.
    pub title: String,
}

/// Events the widget reports back to its controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetEvent {
    /// The base tile layer finished loading; the widget is usable.
    TilesLoaded,
    /// The tile provider could not be reached.
    LoadFailed(String),
    /// The user clicked a marker.
    MarkerClicked(MarkerHandle),
}

/// An attached map widget instance.
pub trait MapWidget {
    /// Draws a marker and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Marker`] if the widget rejects the marker.
    fn add_marker(&mut self, spec: &MarkerSpec) -> Result<MarkerHandle, MapError>;

    /// Removes a marker. Unknown handles are ignored.
    fn remove_marker(&mut self, handle: MarkerHandle);

    /// Changes the look of an existing marker in place.
    fn set_marker_style(&mut self, handle: MarkerHandle, style: &MarkerStyle);

    /// Moves an existing marker.
    fn move_marker(&mut self, handle: MarkerHandle, position: Coordinates);

    /// Centers the viewport.
    fn set_view(&mut self, center: Coordinates, zoom: u8);

    /// Releases the widget and clears its container.
    fn destroy(&mut self);
}

/// Creates widget instances bound to a container.
pub trait MapWidgetFactory {
    /// Constructs a widget in `container`. Tile loading continues
    /// asynchronously and is signalled by [`WidgetEvent::TilesLoaded`].
    ///
    /// # Errors
    ///
    /// Returns [`MapError::WidgetInit`] if the widget or its tile provider
    /// cannot be created.
    fn create(
        &mut self,
        container: &ContainerId,
        center: Coordinates,
        zoom: u8,
    ) -> Result<Box<dyn MapWidget>, MapError>;
}
