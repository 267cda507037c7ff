//! One [`MapSyncController`] per mounted view.

use std::collections::BTreeMap;

use crate::{
    MapError,
    controller::{MapSyncController, WidgetHandle, WidgetState},
    widget::ContainerId,
};

/// Identifies a mounted view that shows a map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub String);

impl std::fmt::Display for ViewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Controllers indexed by view id, owned outside the render cycle.
///
/// Re-rendering a view looks its controller up here instead of creating a
/// new widget, so attach and detach only happen on mount and unmount.
#[derive(Debug, Default)]
pub struct MapRegistry {
    views: BTreeMap<ViewId, MapSyncController>,
}

impl MapRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `controller` for `view` and attaches it to `container`.
    ///
    /// A controller already registered for `view` is detached and replaced.
    ///
    /// # Errors
    ///
    /// * [`MapError::AlreadyBound`] if another live view owns `container`
    /// * any error from [`MapSyncController::attach`]; the view is not
    ///   registered in that case
    pub fn mount(
        &mut self,
        view: ViewId,
        mut controller: MapSyncController,
        container: ContainerId,
    ) -> Result<WidgetHandle, MapError> {
        if self.owner_of(&container).is_some_and(|owner| owner != &view) {
            return Err(MapError::AlreadyBound { container });
        }

        if let Some(mut previous) = self.views.remove(&view) {
            log::debug!("Replacing map controller for view {view}");
            previous.detach();
        }

        let handle = controller.attach(container)?;
        self.views.insert(view, controller);
        Ok(handle)
    }

    /// Detaches and drops the controller for `view`.
    ///
    /// Returns `false` if nothing was registered.
    pub fn unmount(&mut self, view: &ViewId) -> bool {
        self.views.remove(view).is_some_and(|mut controller| {
            controller.detach();
            true
        })
    }

    #[must_use]
    pub fn get(&self, view: &ViewId) -> Option<&MapSyncController> {
        self.views.get(view)
    }

    /// Looks up the controller for `view`.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::UnknownView`] if `view` is not mounted.
    pub fn controller_mut(&mut self, view: &ViewId) -> Result<&mut MapSyncController, MapError> {
        self.views
            .get_mut(view)
            .ok_or_else(|| MapError::UnknownView { view: view.clone() })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.views.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    fn owner_of(&self, container: &ContainerId) -> Option<&ViewId> {
        self.views.iter().find_map(|(view, controller)| {
            let live = matches!(
                controller.state(),
                WidgetState::Initializing | WidgetState::Ready
            );
            (live && controller.container() == Some(container)).then_some(view)
        })
    }
}
