//! Boundary to the device geolocation service.

use envwatch_report_models::Coordinates;
use thiserror::Error;

/// Identifier of a continuous position watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(pub u64);

/// One position reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionFix {
    /// Reported position.
    pub coordinates: Coordinates,
    /// Radius of the 95% confidence circle, in meters.
    pub accuracy_m: f64,
}

/// Why the device could not provide a position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeolocationError {
    /// The user or platform refused location access.
    #[error("Location permission denied")]
    PermissionDenied,

    /// No position source is available.
    #[error("Location unavailable: {message}")]
    Unavailable {
        /// Platform-provided detail.
        message: String,
    },

    /// No fix arrived within the configured timeout.
    #[error("Location request timed out")]
    Timeout,
}

/// Options passed to the platform when starting a watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    /// Request GPS-grade accuracy.
    pub high_accuracy: bool,
    /// Give up on a single reading after this many milliseconds.
    pub timeout_ms: u32,
    /// Accept cached readings up to this age.
    pub maximum_age_ms: u32,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout_ms: 10_000,
            maximum_age_ms: 0,
        }
    }
}

/// Device position service.
///
/// Readings for a watch are delivered to
/// [`MapSyncController::on_position`](crate::controller::MapSyncController::on_position)
/// by the host event loop.
pub trait Geolocation {
    /// Starts a continuous watch.
    ///
    /// # Errors
    ///
    /// Returns [`GeolocationError`] if watching cannot start at all, for
    /// example because permission was already denied.
    fn watch_position(&mut self, options: &WatchOptions) -> Result<WatchId, GeolocationError>;

    /// Stops a watch. Unknown ids are ignored.
    fn clear_watch(&mut self, id: WatchId);
}

/// Location indicator sub-state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocationState {
    /// No acceptable fix yet, or tracking stopped.
    NoFix,
    /// Last acceptable fix.
    Fixed(PositionFix),
}

/// What happened to a reading passed to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixOutcome {
    /// The fix passed the accuracy threshold and was applied.
    Accepted,
    /// The fix was too inaccurate and was dropped without a state change.
    Discarded,
    /// The reading belonged to a watch that is no longer active.
    Stale,
    /// The reading was an error and was forwarded to the error callback.
    Failed,
}
