//! Widget lifecycle, marker reconciliation and location tracking.

use std::collections::{BTreeMap, BTreeSet};

use envwatch_report_models::{Coordinates, Report};
use geo::{Distance, Haversine, Point};

use crate::{
    MapError,
    geolocation::{
        FixOutcome, Geolocation, GeolocationError, LocationState, PositionFix, WatchId,
    },
    placement::{MapSyncConfig, marker_position},
    widget::{
        ContainerId, MapWidget, MapWidgetFactory, MarkerHandle, MarkerSpec, MarkerStyle,
        WidgetEvent,
    },
};

/// Lifecycle of the widget owned by a controller.
///
/// `Ready` never goes back to `Initializing` directly; a widget must be
/// destroyed before a new one is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetState {
    /// Nothing attached yet.
    Uninitialized,
    /// Widget constructed, tiles still loading. No marker operations.
    Initializing,
    /// Widget attached and usable.
    Ready,
    /// Widget released and container cleared.
    Destroyed,
}

/// Returned by [`MapSyncController::attach`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetHandle {
    /// Container the widget was bound to.
    pub container: ContainerId,
    /// Increments on every successful attach.
    pub generation: u64,
}

/// Outcome of a viewport request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CenterRequest {
    /// The viewport moved.
    Applied,
    /// The widget is still initializing; applied once tiles load.
    Queued,
    /// No widget to move, or the target was unusable.
    Dropped,
}

/// Widget mutations performed by one [`MapSyncController::reconcile_markers`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Markers created.
    pub added: usize,
    /// Markers removed.
    pub removed: usize,
    /// Markers restyled in place.
    pub restyled: usize,
    /// Markers moved in place.
    pub moved: usize,
    /// Reports that could not be placed or were rejected by the widget.
    pub skipped: usize,
    /// The widget was still initializing; the request will be applied
    /// once tiles finish loading.
    pub deferred: bool,
    /// No widget was attached, so the request was discarded.
    pub dropped: bool,
}

impl ReconcileSummary {
    /// Total number of widget mutation calls.
    #[must_use]
    pub const fn mutations(&self) -> usize {
        self.added + self.removed + self.restyled + self.moved
    }
}

struct RenderedMarker {
    handle: MarkerHandle,
    position: Coordinates,
    style: MarkerStyle,
}

struct PendingReconcile {
    display: Vec<Report>,
    selected: Option<String>,
}

type FixCallback = Box<dyn FnMut(&PositionFix)>;
type ErrorCallback = Box<dyn FnMut(&GeolocationError)>;

struct Tracking {
    id: WatchId,
    on_fix: FixCallback,
    on_error: ErrorCallback,
    recenter_pending: bool,
}

/// Keeps one map widget in sync with report and location state.
///
/// This is the only component that talks to the widget. All methods are
/// synchronous and meant to be driven from a single UI event loop.
pub struct MapSyncController {
    config: MapSyncConfig,
    factory: Box<dyn MapWidgetFactory>,
    geolocation: Box<dyn Geolocation>,
    state: WidgetState,
    generation: u64,
    container: Option<ContainerId>,
    widget: Option<Box<dyn MapWidget>>,
    markers: BTreeMap<String, RenderedMarker>,
    handles: BTreeMap<MarkerHandle, String>,
    pending_reconcile: Option<PendingReconcile>,
    pending_center: Option<(Coordinates, u8)>,
    tracking: Option<Tracking>,
    location: LocationState,
    location_marker: Option<(MarkerHandle, Coordinates)>,
}

impl std::fmt::Debug for MapSyncController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapSyncController")
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("container", &self.container)
            .field("markers", &self.markers.len())
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl MapSyncController {
    #[must_use]
    pub fn new(
        config: MapSyncConfig,
        factory: Box<dyn MapWidgetFactory>,
        geolocation: Box<dyn Geolocation>,
    ) -> Self {
        Self {
            config,
            factory,
            geolocation,
            state: WidgetState::Uninitialized,
            generation: 0,
            container: None,
            widget: None,
            markers: BTreeMap::new(),
            handles: BTreeMap::new(),
            pending_reconcile: None,
            pending_center: None,
            tracking: None,
            location: LocationState::NoFix,
            location_marker: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> WidgetState {
        self.state
    }

    #[must_use]
    pub const fn config(&self) -> &MapSyncConfig {
        &self.config
    }

    #[must_use]
    pub const fn container(&self) -> Option<&ContainerId> {
        self.container.as_ref()
    }

    #[must_use]
    pub const fn location(&self) -> LocationState {
        self.location
    }

    #[must_use]
    pub const fn active_watch(&self) -> Option<WatchId> {
        match &self.tracking {
            Some(tracking) => Some(tracking.id),
            None => None,
        }
    }

    /// Ids of reports that currently have a marker.
    pub fn rendered_ids(&self) -> impl Iterator<Item = &str> {
        self.markers.keys().map(String::as_str)
    }

    /// Creates a widget in `container` and enters `Initializing`.
    ///
    /// Allowed from `Uninitialized` and `Destroyed` only. A factory failure
    /// leaves the controller `Destroyed`; the caller decides whether to
    /// retry.
    ///
    /// # Errors
    ///
    /// * [`MapError::AlreadyBound`] if a widget is initializing or ready
    /// * [`MapError::WidgetInit`] if the widget could not be created
    pub fn attach(&mut self, container: ContainerId) -> Result<WidgetHandle, MapError> {
        match self.state {
            WidgetState::Initializing | WidgetState::Ready => {
                return Err(MapError::AlreadyBound {
                    container: self.container.clone().unwrap_or(container),
                });
            }
            WidgetState::Uninitialized | WidgetState::Destroyed => {}
        }

        log::debug!("Attaching map widget to {container}");

        match self
            .factory
            .create(&container, self.config.default_center, self.config.default_zoom)
        {
            Ok(widget) => {
                self.widget = Some(widget);
                self.container = Some(container.clone());
                self.state = WidgetState::Initializing;
                self.generation += 1;
                Ok(WidgetHandle {
                    container,
                    generation: self.generation,
                })
            }
            Err(e) => {
                log::error!("Failed to attach map widget to {container}: {e}");
                self.state = WidgetState::Destroyed;
                Err(e)
            }
        }
    }

    /// Releases the widget and clears all rendered markers.
    ///
    /// Any active location watch is cancelled. Idempotent.
    pub fn detach(&mut self) {
        self.stop_tracking();
        self.release_widget();
    }

    fn release_widget(&mut self) {
        if let Some(mut widget) = self.widget.take() {
            widget.destroy();
        }
        if let Some(container) = self.container.take() {
            log::debug!("Released map widget in {container}");
        }
        self.markers.clear();
        self.handles.clear();
        self.location_marker = None;
        self.pending_reconcile = None;
        self.pending_center = None;
        if self.state != WidgetState::Uninitialized {
            self.state = WidgetState::Destroyed;
        }
    }

    /// Feeds a widget event into the controller.
    ///
    /// Returns the id of the clicked report for
    /// [`WidgetEvent::MarkerClicked`], `None` otherwise.
    ///
    /// # Errors
    ///
    /// * [`MapError::WidgetInit`] if tile loading failed; the widget is
    ///   destroyed
    /// * [`MapError::InvalidTransition`] if tiles report loaded while the
    ///   widget is not initializing
    pub fn handle_event(&mut self, event: WidgetEvent) -> Result<Option<String>, MapError> {
        match event {
            WidgetEvent::TilesLoaded => {
                if self.state != WidgetState::Initializing {
                    return Err(MapError::InvalidTransition {
                        from: self.state,
                        action: "finish loading tiles",
                    });
                }
                self.state = WidgetState::Ready;
                self.flush_pending();
                Ok(None)
            }
            WidgetEvent::LoadFailed(message) => {
                log::error!("Map tiles failed to load: {message}");
                self.release_widget();
                Err(MapError::WidgetInit { message })
            }
            WidgetEvent::MarkerClicked(handle) => Ok(self.handles.get(&handle).cloned()),
        }
    }

    fn flush_pending(&mut self) {
        if let Some(pending) = self.pending_reconcile.take() {
            let summary = self.reconcile_markers(&pending.display, pending.selected.as_deref());
            log::debug!("Applied deferred marker reconcile: {summary:?}");
        }
        if let Some((center, zoom)) = self.pending_center.take() {
            self.center_on(center, zoom);
        }
        if let LocationState::Fixed(fix) = self.location {
            self.draw_location(fix.coordinates);
        }
    }

    /// Brings the rendered marker set in line with `display`.
    ///
    /// Markers for ids that left the set are removed, new ids get a
    /// marker, and existing markers are restyled or moved in place. A
    /// report that cannot be placed or that the widget rejects is skipped
    /// without affecting the others. Calling this again with the same
    /// arguments performs no widget mutations.
    ///
    /// While initializing the request is remembered (latest wins) and
    /// applied when tiles finish loading. Without a widget it is dropped.
    pub fn reconcile_markers(
        &mut self,
        display: &[Report],
        selected: Option<&str>,
    ) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();

        match self.state {
            WidgetState::Ready => {}
            WidgetState::Initializing => {
                self.pending_reconcile = Some(PendingReconcile {
                    display: display.to_vec(),
                    selected: selected.map(str::to_string),
                });
                summary.deferred = true;
                return summary;
            }
            WidgetState::Uninitialized | WidgetState::Destroyed => {
                log::debug!("Ignoring marker reconcile while widget is {:?}", self.state);
                summary.dropped = true;
                return summary;
            }
        }
        let Some(widget) = self.widget.as_deref_mut() else {
            return summary;
        };

        let mut seen = BTreeSet::new();
        let mut wanted = Vec::with_capacity(display.len());
        for report in display {
            if !seen.insert(report.id.as_str()) {
                continue;
            }
            match marker_position(report, &self.config.missing_coordinates) {
                Some(position) => wanted.push((report, position)),
                None => summary.skipped += 1,
            }
        }
        let wanted_ids: BTreeSet<&str> = wanted.iter().map(|(r, _)| r.id.as_str()).collect();

        let stale: Vec<String> = self
            .markers
            .keys()
            .filter(|id| !wanted_ids.contains(id.as_str()))
            .cloned()
            .collect();
        for id in stale {
            if let Some(marker) = self.markers.remove(&id) {
                widget.remove_marker(marker.handle);
                self.handles.remove(&marker.handle);
                summary.removed += 1;
            }
        }

        for (report, position) in wanted {
            let style = MarkerStyle::for_report(report, selected == Some(report.id.as_str()));

            if let Some(marker) = self.markers.get_mut(&report.id) {
                if marker.style != style {
                    widget.set_marker_style(marker.handle, &style);
                    marker.style = style;
                    summary.restyled += 1;
                }
                if marker.position != position {
                    widget.move_marker(marker.handle, position);
                    marker.position = position;
                    summary.moved += 1;
                }
                continue;
            }

            let spec = MarkerSpec {
                position,
                style,
                title: report.title.clone(),
            };
            match widget.add_marker(&spec) {
                Ok(handle) => {
                    self.handles.insert(handle, report.id.clone());
                    self.markers.insert(
                        report.id.clone(),
                        RenderedMarker {
                            handle,
                            position,
                            style: spec.style,
                        },
                    );
                    summary.added += 1;
                }
                Err(e) => {
                    log::warn!("Skipping marker for report {}: {e}", report.id);
                    summary.skipped += 1;
                }
            }
        }

        summary
    }

    /// Moves the viewport.
    ///
    /// While the widget is initializing the request is queued (latest
    /// wins). Without a widget, or for an unusable target, it is dropped.
    pub fn center_on(&mut self, center: Coordinates, zoom: u8) -> CenterRequest {
        if !center.is_valid() {
            log::warn!("Dropping center request for invalid coordinates {center:?}");
            return CenterRequest::Dropped;
        }

        match (self.state, self.widget.as_deref_mut()) {
            (WidgetState::Ready, Some(widget)) => {
                widget.set_view(center, zoom);
                CenterRequest::Applied
            }
            (WidgetState::Initializing, _) => {
                log::warn!("Map widget still initializing; queueing center request");
                self.pending_center = Some((center, zoom));
                CenterRequest::Queued
            }
            (state, _) => {
                log::warn!("Dropping center request while widget is {state:?}");
                CenterRequest::Dropped
            }
        }
    }

    /// Flies to a report at the configured selection zoom.
    pub fn focus_report(&mut self, report: &Report) -> CenterRequest {
        match marker_position(report, &self.config.missing_coordinates) {
            Some(position) => self.center_on(position, self.config.selected_zoom),
            None => CenterRequest::Dropped,
        }
    }

    /// Flies to the last accepted device position.
    pub fn center_on_location(&mut self) -> CenterRequest {
        match self.location {
            LocationState::Fixed(fix) => self.center_on(fix.coordinates, self.config.location_zoom),
            LocationState::NoFix => CenterRequest::Dropped,
        }
    }

    /// Starts a continuous position watch.
    ///
    /// A previously active watch is stopped first, which also clears the
    /// location fix and its marker. `on_fix` only sees
    /// fixes that pass the accuracy threshold; `on_error` sees every
    /// failure reported for this watch.
    ///
    /// # Errors
    ///
    /// Returns [`GeolocationError`] if the watch could not be started.
    pub fn track_location(
        &mut self,
        on_fix: impl FnMut(&PositionFix) + 'static,
        on_error: impl FnMut(&GeolocationError) + 'static,
    ) -> Result<WatchId, GeolocationError> {
        if let Some(previous) = self.active_watch() {
            log::debug!("Replacing location watch {previous:?}");
            self.stop_tracking();
        }

        let id = self.geolocation.watch_position(&self.config.watch)?;
        self.tracking = Some(Tracking {
            id,
            on_fix: Box::new(on_fix),
            on_error: Box::new(on_error),
            recenter_pending: self.config.recenter_on_first_fix,
        });
        Ok(id)
    }

    /// Cancels the location watch and hides the location marker.
    ///
    /// Returns `true` if a watch was active.
    pub fn stop_tracking(&mut self) -> bool {
        let was_tracking = self.tracking.take().is_some_and(|tracking| {
            self.geolocation.clear_watch(tracking.id);
            true
        });

        if let Some((handle, _)) = self.location_marker.take()
            && let Some(widget) = self.widget.as_deref_mut()
        {
            widget.remove_marker(handle);
        }
        self.location = LocationState::NoFix;

        was_tracking
    }

    /// Delivers a reading for `watch`.
    ///
    /// Fixes less accurate than the configured threshold are discarded
    /// without any state change. Readings for a watch that is no longer
    /// active are ignored.
    pub fn on_position(
        &mut self,
        watch: WatchId,
        reading: Result<PositionFix, GeolocationError>,
    ) -> FixOutcome {
        let threshold = self.config.accuracy_threshold_m;
        let Some(tracking) = self.tracking.as_mut().filter(|t| t.id == watch) else {
            log::debug!("Ignoring reading for inactive watch {watch:?}");
            return FixOutcome::Stale;
        };

        let fix = match reading {
            Ok(fix) => fix,
            Err(e) => {
                log::warn!("Location watch {watch:?} failed: {e}");
                (tracking.on_error)(&e);
                return FixOutcome::Failed;
            }
        };

        if !fix.coordinates.is_valid() || fix.accuracy_m.is_nan() || fix.accuracy_m > threshold {
            log::debug!(
                "Discarding location fix with accuracy {}m (threshold {threshold}m)",
                fix.accuracy_m
            );
            return FixOutcome::Discarded;
        }

        (tracking.on_fix)(&fix);
        let recenter = std::mem::take(&mut tracking.recenter_pending);

        self.location = LocationState::Fixed(fix);
        self.draw_location(fix.coordinates);
        if recenter {
            self.center_on(fix.coordinates, self.config.location_zoom);
        }

        FixOutcome::Accepted
    }

    fn draw_location(&mut self, position: Coordinates) {
        if self.state != WidgetState::Ready {
            return;
        }
        let Some(widget) = self.widget.as_deref_mut() else {
            return;
        };

        if let Some((handle, drawn)) = self.location_marker.as_mut() {
            let distance = Haversine.distance(
                Point::new(drawn.longitude, drawn.latitude),
                Point::new(position.longitude, position.latitude),
            );
            if distance >= self.config.min_move_m {
                widget.move_marker(*handle, position);
                *drawn = position;
            }
            return;
        }

        let spec = MarkerSpec {
            position,
            style: MarkerStyle::current_location(),
            title: "My location".to_string(),
        };
        match widget.add_marker(&spec) {
            Ok(handle) => self.location_marker = Some((handle, position)),
            Err(e) => log::warn!("Failed to draw location marker: {e}"),
        }
    }
}

impl Drop for MapSyncController {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use envwatch_report_models::{ReportCategory, ReportStatus, Severity};

    use super::*;
    use crate::geolocation::WatchOptions;
    use crate::placement::MissingCoordinates;

    #[derive(Debug, Default)]
    pub struct WidgetLog {
        pub added: Vec<MarkerSpec>,
        pub removed: Vec<MarkerHandle>,
        pub restyled: Vec<(MarkerHandle, MarkerStyle)>,
        pub moved: Vec<(MarkerHandle, Coordinates)>,
        pub views: Vec<(Coordinates, u8)>,
        pub destroyed: usize,
    }

    impl WidgetLog {
        pub fn mutations(&self) -> usize {
            self.added.len() + self.removed.len() + self.restyled.len() + self.moved.len()
        }
    }

    struct RecordingWidget {
        log: Rc<RefCell<WidgetLog>>,
        next: u64,
        reject_title: Option<String>,
    }

    impl MapWidget for RecordingWidget {
        fn add_marker(&mut self, spec: &MarkerSpec) -> Result<MarkerHandle, MapError> {
            if self.reject_title.as_deref() == Some(spec.title.as_str()) {
                return Err(MapError::Marker {
                    message: "rejected".to_string(),
                });
            }
            self.next += 1;
            self.log.borrow_mut().added.push(spec.clone());
            Ok(MarkerHandle(self.next))
        }

        fn remove_marker(&mut self, handle: MarkerHandle) {
            self.log.borrow_mut().removed.push(handle);
        }

        fn set_marker_style(&mut self, handle: MarkerHandle, style: &MarkerStyle) {
            self.log.borrow_mut().restyled.push((handle, style.clone()));
        }

        fn move_marker(&mut self, handle: MarkerHandle, position: Coordinates) {
            self.log.borrow_mut().moved.push((handle, position));
        }

        fn set_view(&mut self, center: Coordinates, zoom: u8) {
            self.log.borrow_mut().views.push((center, zoom));
        }

        fn destroy(&mut self) {
            self.log.borrow_mut().destroyed += 1;
        }
    }

    #[derive(Default)]
    pub struct RecordingFactory {
        pub log: Rc<RefCell<WidgetLog>>,
        pub fail: Rc<RefCell<Option<String>>>,
        pub created: Rc<Cell<usize>>,
        pub reject_title: Option<String>,
    }

    impl MapWidgetFactory for RecordingFactory {
        fn create(
            &mut self,
            _container: &ContainerId,
            _center: Coordinates,
            _zoom: u8,
        ) -> Result<Box<dyn MapWidget>, MapError> {
            if let Some(message) = self.fail.borrow().clone() {
                return Err(MapError::WidgetInit { message });
            }
            self.created.set(self.created.get() + 1);
            Ok(Box::new(RecordingWidget {
                log: self.log.clone(),
                next: 0,
                reject_title: self.reject_title.clone(),
            }))
        }
    }

    #[derive(Debug, Default)]
    pub struct GeoLog {
        pub next: u64,
        pub active: BTreeSet<WatchId>,
        pub cleared: Vec<WatchId>,
        pub deny: bool,
    }

    #[derive(Default)]
    pub struct FakeGeolocation {
        pub log: Rc<RefCell<GeoLog>>,
    }

    impl Geolocation for FakeGeolocation {
        fn watch_position(&mut self, _options: &WatchOptions) -> Result<WatchId, GeolocationError> {
            let mut log = self.log.borrow_mut();
            if log.deny {
                return Err(GeolocationError::PermissionDenied);
            }
            log.next += 1;
            let id = WatchId(log.next);
            log.active.insert(id);
            Ok(id)
        }

        fn clear_watch(&mut self, id: WatchId) {
            let mut log = self.log.borrow_mut();
            log.active.remove(&id);
            log.cleared.push(id);
        }
    }

    struct Harness {
        controller: MapSyncController,
        widget: Rc<RefCell<WidgetLog>>,
        created: Rc<Cell<usize>>,
        fail: Rc<RefCell<Option<String>>>,
        geo: Rc<RefCell<GeoLog>>,
    }

    fn harness_with(config: MapSyncConfig, reject_title: Option<&str>) -> Harness {
        let factory = RecordingFactory {
            reject_title: reject_title.map(str::to_string),
            ..RecordingFactory::default()
        };
        let widget = factory.log.clone();
        let created = factory.created.clone();
        let fail = factory.fail.clone();
        let geolocation = FakeGeolocation::default();
        let geo = geolocation.log.clone();
        Harness {
            controller: MapSyncController::new(config, Box::new(factory), Box::new(geolocation)),
            widget,
            created,
            fail,
            geo,
        }
    }

    fn harness() -> Harness {
        harness_with(MapSyncConfig::default(), None)
    }

    fn ready(h: &mut Harness) {
        h.controller.attach(ContainerId("map".to_string())).unwrap();
        h.controller.handle_event(WidgetEvent::TilesLoaded).unwrap();
    }

    fn report(id: &str, coordinates: Option<Coordinates>) -> Report {
        Report {
            id: id.to_string(),
            title: format!("Report {id}"),
            location: None,
            category: ReportCategory::Water,
            severity: Severity::Medium,
            description: String::new(),
            date: "2024-01-20".to_string(),
            status: ReportStatus::Received,
            coordinates,
            images: Vec::new(),
            reporter_id: None,
            reporter_name: None,
            assigned_to: None,
            processing_notes: None,
            resolved_at: None,
            resolution_report: None,
            ai_analysis: None,
        }
    }

    fn at(lat: f64, lng: f64) -> Option<Coordinates> {
        Some(Coordinates::new(lat, lng))
    }

    fn fix(lat: f64, lng: f64, accuracy_m: f64) -> PositionFix {
        PositionFix {
            coordinates: Coordinates::new(lat, lng),
            accuracy_m,
        }
    }

    #[test]
    fn attach_enters_initializing_then_ready() {
        let mut h = harness();
        assert_eq!(h.controller.state(), WidgetState::Uninitialized);

        let handle = h.controller.attach(ContainerId("map".to_string())).unwrap();
        assert_eq!(handle.generation, 1);
        assert_eq!(h.controller.state(), WidgetState::Initializing);

        h.controller.handle_event(WidgetEvent::TilesLoaded).unwrap();
        assert_eq!(h.controller.state(), WidgetState::Ready);
    }

    #[test]
    fn ready_widget_cannot_be_reattached_without_destroy() {
        let mut h = harness();
        ready(&mut h);

        let err = h
            .controller
            .attach(ContainerId("map".to_string()))
            .unwrap_err();
        assert!(matches!(err, MapError::AlreadyBound { .. }));
        assert_eq!(h.created.get(), 1);

        h.controller.detach();
        assert_eq!(h.controller.state(), WidgetState::Destroyed);
        assert_eq!(h.widget.borrow().destroyed, 1);

        let handle = h.controller.attach(ContainerId("map".to_string())).unwrap();
        assert_eq!(handle.generation, 2);
        assert_eq!(h.created.get(), 2);
    }

    #[test]
    fn attach_failure_is_surfaced_and_not_retried() {
        let mut h = harness();
        *h.fail.borrow_mut() = Some("tile server unreachable".to_string());

        let err = h
            .controller
            .attach(ContainerId("map".to_string()))
            .unwrap_err();
        assert!(matches!(err, MapError::WidgetInit { .. }));
        assert_eq!(h.controller.state(), WidgetState::Destroyed);
        assert_eq!(h.created.get(), 0);

        *h.fail.borrow_mut() = None;
        h.controller.attach(ContainerId("map".to_string())).unwrap();
        assert_eq!(h.created.get(), 1);
    }

    #[test]
    fn tile_load_failure_destroys_widget() {
        let mut h = harness();
        h.controller.attach(ContainerId("map".to_string())).unwrap();

        let err = h
            .controller
            .handle_event(WidgetEvent::LoadFailed("offline".to_string()))
            .unwrap_err();
        assert!(matches!(err, MapError::WidgetInit { .. }));
        assert_eq!(h.controller.state(), WidgetState::Destroyed);
        assert_eq!(h.widget.borrow().destroyed, 1);
    }

    #[test]
    fn tiles_loaded_outside_initializing_is_rejected() {
        let mut h = harness();
        let err = h.controller.handle_event(WidgetEvent::TilesLoaded).unwrap_err();
        assert!(matches!(
            err,
            MapError::InvalidTransition {
                from: WidgetState::Uninitialized,
                ..
            }
        ));
    }

    #[test]
    fn reconcile_is_idempotent() {
        let mut h = harness();
        ready(&mut h);
        let display = vec![report("1", at(37.5, 127.0)), report("2", at(37.6, 127.1))];

        let first = h.controller.reconcile_markers(&display, Some("1"));
        assert_eq!(first.added, 2);
        let before = h.widget.borrow().mutations();

        let second = h.controller.reconcile_markers(&display, Some("1"));
        assert_eq!(second.mutations(), 0);
        assert_eq!(h.widget.borrow().mutations(), before);
    }

    #[test]
    fn selection_change_restyles_without_recreating() {
        let mut h = harness();
        ready(&mut h);
        let display = vec![report("1", at(37.5, 127.0)), report("2", at(37.6, 127.1))];
        h.controller.reconcile_markers(&display, None);

        let summary = h.controller.reconcile_markers(&display, Some("2"));
        assert_eq!(summary.added, 0);
        assert_eq!(summary.removed, 0);
        assert_eq!(summary.restyled, 1);

        let log = h.widget.borrow();
        assert_eq!(log.added.len(), 2);
        assert!(log.removed.is_empty());
        let (_, style) = log.restyled.last().unwrap();
        assert!(style.selected);
        assert_eq!(style.border_width, 4);
        assert_eq!(style.scale_percent, 130);
    }

    #[test]
    fn markers_leaving_display_set_are_removed() {
        let mut h = harness();
        ready(&mut h);
        h.controller.reconcile_markers(
            &[report("1", at(37.5, 127.0)), report("2", at(37.6, 127.1))],
            None,
        );

        let summary = h.controller.reconcile_markers(
            &[report("2", at(37.6, 127.1)), report("3", at(37.7, 127.2))],
            None,
        );
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.added, 1);
        assert_eq!(h.controller.rendered_ids().collect::<Vec<_>>(), vec!["2", "3"]);
    }

    #[test]
    fn status_change_restyles_and_coordinate_change_moves() {
        let mut h = harness();
        ready(&mut h);
        h.controller.reconcile_markers(&[report("1", at(37.5, 127.0))], None);

        let mut updated = report("1", at(37.55, 127.0));
        updated.status = ReportStatus::Resolved;
        let summary = h.controller.reconcile_markers(&[updated], None);

        assert_eq!(summary.restyled, 1);
        assert_eq!(summary.moved, 1);
        assert_eq!(summary.added, 0);
        assert_eq!(h.widget.borrow().restyled[0].1.color, "#10b981");
    }

    #[test]
    fn null_coordinates_are_skipped_while_siblings_render() {
        let config = MapSyncConfig {
            missing_coordinates: MissingCoordinates::Skip,
            ..MapSyncConfig::default()
        };
        let mut h = harness_with(config, None);
        ready(&mut h);

        let display = vec![
            report("1", at(37.5, 127.0)),
            report("2", None),
            report("3", at(37.6, 127.1)),
        ];
        let summary = h.controller.reconcile_markers(&display, None);

        assert_eq!(summary.added, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(h.controller.rendered_ids().collect::<Vec<_>>(), vec!["1", "3"]);
    }

    #[test]
    fn null_coordinates_fall_back_to_jittered_center_by_default() {
        let mut h = harness();
        ready(&mut h);

        let summary = h.controller.reconcile_markers(&[report("1", None)], None);
        assert_eq!(summary.added, 1);

        let again = h.controller.reconcile_markers(&[report("1", None)], None);
        assert_eq!(again.mutations(), 0);
    }

    #[test]
    fn widget_rejection_skips_only_that_report() {
        let mut h = harness_with(MapSyncConfig::default(), Some("Report 2"));
        ready(&mut h);

        let summary = h.controller.reconcile_markers(
            &[
                report("1", at(37.5, 127.0)),
                report("2", at(37.6, 127.1)),
                report("3", at(37.7, 127.2)),
            ],
            None,
        );
        assert_eq!(summary.added, 2);
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn reconcile_during_initialization_is_deferred_until_ready() {
        let mut h = harness();
        h.controller.attach(ContainerId("map".to_string())).unwrap();

        let summary = h
            .controller
            .reconcile_markers(&[report("1", at(37.5, 127.0))], Some("1"));
        assert!(summary.deferred);
        assert_eq!(h.widget.borrow().mutations(), 0);

        h.controller.handle_event(WidgetEvent::TilesLoaded).unwrap();
        assert_eq!(h.widget.borrow().added.len(), 1);
        assert!(h.widget.borrow().added[0].style.selected);
    }

    #[test]
    fn reconcile_without_widget_is_dropped() {
        let mut h = harness();
        let summary = h
            .controller
            .reconcile_markers(&[report("1", at(37.5, 127.0))], None);
        assert!(summary.dropped);
        assert!(!summary.deferred);

        ready(&mut h);
        assert!(h.widget.borrow().added.is_empty());
        assert_eq!(h.controller.rendered_ids().count(), 0);
    }

    #[test]
    fn center_is_queued_during_initialization() {
        let mut h = harness();
        assert_eq!(
            h.controller.center_on(Coordinates::new(37.5, 127.0), 14),
            CenterRequest::Dropped
        );

        h.controller.attach(ContainerId("map".to_string())).unwrap();
        assert_eq!(
            h.controller.center_on(Coordinates::new(37.5, 127.0), 14),
            CenterRequest::Queued
        );
        assert_eq!(
            h.controller.center_on(Coordinates::new(37.6, 127.1), 15),
            CenterRequest::Queued
        );
        assert!(h.widget.borrow().views.is_empty());

        h.controller.handle_event(WidgetEvent::TilesLoaded).unwrap();
        assert_eq!(
            h.widget.borrow().views,
            vec![(Coordinates::new(37.6, 127.1), 15)]
        );
        assert_eq!(
            h.controller.center_on(Coordinates::new(37.5, 127.0), 14),
            CenterRequest::Applied
        );
    }

    #[test]
    fn marker_click_resolves_report_id() {
        let mut h = harness();
        ready(&mut h);
        h.controller.reconcile_markers(&[report("abc", at(37.5, 127.0))], None);

        let clicked = h
            .controller
            .handle_event(WidgetEvent::MarkerClicked(MarkerHandle(1)))
            .unwrap();
        assert_eq!(clicked.as_deref(), Some("abc"));

        let unknown = h
            .controller
            .handle_event(WidgetEvent::MarkerClicked(MarkerHandle(99)))
            .unwrap();
        assert_eq!(unknown, None);
    }

    #[test]
    fn inaccurate_fix_is_discarded_from_no_fix() {
        let mut h = harness();
        ready(&mut h);
        let fixes = Rc::new(Cell::new(0));
        let counter = fixes.clone();
        let watch = h
            .controller
            .track_location(move |_| counter.set(counter.get() + 1), |_| {})
            .unwrap();

        let outcome = h.controller.on_position(watch, Ok(fix(37.5, 127.0, 50.0)));

        assert_eq!(outcome, FixOutcome::Discarded);
        assert_eq!(h.controller.location(), LocationState::NoFix);
        assert_eq!(fixes.get(), 0);
        assert_eq!(h.widget.borrow().mutations(), 0);
    }

    #[test]
    fn inaccurate_fix_keeps_last_good_position() {
        let mut h = harness();
        ready(&mut h);
        let watch = h.controller.track_location(|_| {}, |_| {}).unwrap();

        let good = fix(37.5, 127.0, 10.0);
        assert_eq!(h.controller.on_position(watch, Ok(good)), FixOutcome::Accepted);
        let mutations = h.widget.borrow().mutations();

        assert_eq!(
            h.controller.on_position(watch, Ok(fix(37.7, 127.3, 50.0))),
            FixOutcome::Discarded
        );
        assert_eq!(h.controller.location(), LocationState::Fixed(good));
        assert_eq!(h.widget.borrow().mutations(), mutations);
    }

    #[test]
    fn first_accepted_fix_draws_marker_and_recenters_once() {
        let mut h = harness();
        ready(&mut h);
        let watch = h.controller.track_location(|_| {}, |_| {}).unwrap();

        h.controller.on_position(watch, Ok(fix(37.5, 127.0, 5.0)));
        h.controller.on_position(watch, Ok(fix(37.51, 127.0, 5.0)));

        let log = h.widget.borrow();
        assert_eq!(log.added.len(), 1);
        assert_eq!(log.added[0].style, MarkerStyle::current_location());
        assert_eq!(log.moved.len(), 1);
        assert_eq!(log.views.len(), 1);
    }

    #[test]
    fn jitter_below_minimum_movement_does_not_move_marker() {
        let mut h = harness();
        ready(&mut h);
        let watch = h.controller.track_location(|_| {}, |_| {}).unwrap();

        h.controller.on_position(watch, Ok(fix(37.5, 127.0, 5.0)));
        h.controller.on_position(watch, Ok(fix(37.500_001, 127.0, 5.0)));

        assert!(h.widget.borrow().moved.is_empty());
    }

    #[test]
    fn tracking_again_cancels_prior_watch() {
        let mut h = harness();
        let first = h.controller.track_location(|_| {}, |_| {}).unwrap();
        let second = h.controller.track_location(|_| {}, |_| {}).unwrap();

        assert_ne!(first, second);
        assert_eq!(h.geo.borrow().cleared, vec![first]);
        assert_eq!(h.geo.borrow().active.len(), 1);
        assert_eq!(
            h.controller.on_position(first, Ok(fix(37.5, 127.0, 5.0))),
            FixOutcome::Stale
        );
    }

    #[test]
    fn failed_restart_leaves_no_fix_behind() {
        let mut h = harness();
        ready(&mut h);
        let watch = h.controller.track_location(|_| {}, |_| {}).unwrap();
        h.controller.on_position(watch, Ok(fix(37.5, 127.0, 5.0)));
        assert!(matches!(h.controller.location(), LocationState::Fixed(_)));

        h.geo.borrow_mut().deny = true;
        assert_eq!(
            h.controller.track_location(|_| {}, |_| {}),
            Err(GeolocationError::PermissionDenied)
        );

        assert_eq!(h.controller.active_watch(), None);
        assert_eq!(h.controller.location(), LocationState::NoFix);
        assert!(h.geo.borrow().active.is_empty());
        assert_eq!(h.widget.borrow().removed.len(), 1);
    }

    #[test]
    fn stop_tracking_clears_watch_and_marker() {
        let mut h = harness();
        ready(&mut h);
        let watch = h.controller.track_location(|_| {}, |_| {}).unwrap();
        h.controller.on_position(watch, Ok(fix(37.5, 127.0, 5.0)));

        assert!(h.controller.stop_tracking());
        assert_eq!(h.controller.location(), LocationState::NoFix);
        assert!(h.geo.borrow().active.is_empty());
        assert_eq!(h.widget.borrow().removed.len(), 1);
        assert!(!h.controller.stop_tracking());
    }

    #[test]
    fn errors_reach_error_callback() {
        let mut h = harness();
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = errors.clone();
        let watch = h
            .controller
            .track_location(|_| {}, move |e| sink.borrow_mut().push(e.clone()))
            .unwrap();

        let outcome = h
            .controller
            .on_position(watch, Err(GeolocationError::Timeout));
        assert_eq!(outcome, FixOutcome::Failed);
        assert_eq!(*errors.borrow(), vec![GeolocationError::Timeout]);
    }

    #[test]
    fn denied_watch_is_reported() {
        let mut h = harness();
        h.geo.borrow_mut().deny = true;
        assert_eq!(
            h.controller.track_location(|_| {}, |_| {}),
            Err(GeolocationError::PermissionDenied)
        );
        assert_eq!(h.controller.active_watch(), None);
    }

    #[test]
    fn detach_cancels_location_watch() {
        let mut h = harness();
        ready(&mut h);
        h.controller.track_location(|_| {}, |_| {}).unwrap();

        h.controller.detach();
        assert!(h.geo.borrow().active.is_empty());
        assert_eq!(h.controller.state(), WidgetState::Destroyed);
    }

    #[test]
    fn fix_before_ready_is_drawn_once_tiles_load() {
        let mut h = harness();
        h.controller.attach(ContainerId("map".to_string())).unwrap();
        let watch = h.controller.track_location(|_| {}, |_| {}).unwrap();
        h.controller.on_position(watch, Ok(fix(37.5, 127.0, 5.0)));
        assert!(h.widget.borrow().added.is_empty());

        h.controller.handle_event(WidgetEvent::TilesLoaded).unwrap();
        assert_eq!(h.widget.borrow().added.len(), 1);
        assert_eq!(h.widget.borrow().views.len(), 1);
    }
}
