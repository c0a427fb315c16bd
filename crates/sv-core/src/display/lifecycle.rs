//! Rebuild, Update and the visibility predicate

use crate::axis::Axis;
use crate::error::ViewError;
use crate::events::events::{ActiveAxisChanged, DisplayRebuilt, ViewFailed};
use crate::events::EventBus;
use crate::view::{View, ViewHandle};

use super::{Display, DisplayId, DisplayState, ViewEntry};

/// A view whose rebuild or update failed during a pass
#[derive(Debug, Clone, PartialEq)]
pub struct ViewFailure {
    pub view: ViewHandle,
    pub error: ViewError,
}

/// Outcome of a Rebuild or Update pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    pub failures: Vec<ViewFailure>,
}

impl PassReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    fn from_notices(notices: &[Notice]) -> Self {
        let failures = notices
            .iter()
            .filter_map(|notice| match notice {
                Notice::ViewFailed(view, error) => Some(ViewFailure {
                    view: *view,
                    error: error.clone(),
                }),
                _ => None,
            })
            .collect();
        Self { failures }
    }
}

/// Synchronous notifications collected under the display lock and published
/// once it is released
#[derive(Debug, Clone)]
pub(super) enum Notice {
    ActiveAxis(Axis),
    ViewFailed(ViewHandle, ViewError),
    Rebuilt,
}

impl Notice {
    pub(super) fn publish(self, display: DisplayId, events: &EventBus) {
        match self {
            Notice::ActiveAxis(axis) => events.publish(ActiveAxisChanged { display, axis }),
            Notice::ViewFailed(view, error) => events.publish(ViewFailed {
                display,
                view,
                message: error.to_string(),
            }),
            Notice::Rebuilt => events.publish(DisplayRebuilt { display }),
        }
    }
}

impl Display {
    /// Recompute the combined interval from scratch, rebuild every view and
    /// reconcile positions and the active axis.
    pub fn rebuild(&self) -> PassReport {
        let mut notices = Vec::new();
        {
            let mut state = self.state.write();
            self.rebuild_locked(&mut state, &mut notices);
        }
        let report = PassReport::from_notices(&notices);
        self.emit(notices);
        report
    }

    /// Refresh bounds, push positions down into the views and update them.
    pub fn update(&self) -> PassReport {
        let mut notices = Vec::new();
        {
            let mut state = self.state.write();
            self.update_locked(&mut state, &mut notices);
        }
        let report = PassReport::from_notices(&notices);
        self.emit(notices);
        report
    }

    /// Rebuild then Update as one critical section
    pub fn rebuild_and_update(&self) -> PassReport {
        let mut notices = Vec::new();
        {
            let mut state = self.state.write();
            self.rebuild_locked(&mut state, &mut notices);
            self.update_locked(&mut state, &mut notices);
        }
        let report = PassReport::from_notices(&notices);
        self.emit(notices);
        report
    }

    pub(super) fn rebuild_locked(&self, state: &mut DisplayState, notices: &mut Vec<Notice>) {
        let DisplayState { views, interval, active_axis } = state;

        interval.rebuild_structure(views.iter().map(|entry| entry.view.own_axes()));
        self.report_invalid_extents(views, notices);

        for entry in views.iter_mut() {
            if let Err(error) = entry.view.rebuild() {
                let view_type = entry.view.view_type();
                tracing::warn!(
                    "{}: {} ({}) failed to rebuild: {}",
                    self.id,
                    entry.handle,
                    view_type,
                    error
                );
                notices.push(Notice::ViewFailed(entry.handle, error));
            }
        }

        let removed = self.positions.prune(interval);
        let seeded = self.positions.seed_new_axes(interval);
        if !removed.is_empty() || !seeded.is_empty() {
            tracing::debug!("{}: positions pruned {:?}, seeded {:?}", self.id, removed, seeded);
        }

        let still_valid = active_axis
            .as_ref()
            .map(|axis| interval.contains(axis))
            .unwrap_or(false);
        if !still_valid {
            let first = interval.non_planar_axes().next().cloned();
            if *active_axis != first {
                if let Some(axis) = &first {
                    notices.push(Notice::ActiveAxis(axis.clone()));
                }
                *active_axis = first;
            }
        }

        let (view_count, axis_count) = (views.len(), interval.len());
        tracing::debug!("{}: rebuilt with {} views over {} axes", self.id, view_count, axis_count);
        notices.push(Notice::Rebuilt);
    }

    pub(super) fn update_locked(&self, state: &mut DisplayState, notices: &mut Vec<Notice>) {
        let own_axes = state.views.iter().map(|entry| entry.view.own_axes());
        if state.interval.refresh_bounds(own_axes) {
            tracing::debug!("{}: axis set changed during update, rebuilding", self.id);
            self.rebuild_locked(state, notices);
        } else {
            self.report_invalid_extents(&state.views, notices);
        }

        let DisplayState { views, interval, .. } = state;

        for entry in views.iter_mut() {
            for own in entry.view.own_axes() {
                if own.axis.is_planar() || !interval.contains(&own.axis) {
                    continue;
                }
                let position = self.positions.get(&own.axis, interval);
                // Positions outside the view's own extent are not propagated;
                // the view keeps its last position.
                if own.min <= position && position < own.max + 1.0 {
                    entry.view.set_own_position(&own.axis, position);
                }
            }
        }

        for entry in views.iter_mut() {
            if let Err(error) = entry.view.update() {
                let view_type = entry.view.view_type();
                tracing::warn!(
                    "{}: {} ({}) failed to update: {}",
                    self.id,
                    entry.handle,
                    view_type,
                    error
                );
                notices.push(Notice::ViewFailed(entry.handle, error));
            }
        }
    }

    /// Non-finite extents are left out of the combined interval; report
    /// each one against the view that exposed it.
    fn report_invalid_extents(&self, views: &[ViewEntry], notices: &mut Vec<Notice>) {
        for entry in views {
            for extent in entry.view.own_axes().into_iter().filter(|e| !e.is_finite()) {
                tracing::warn!("{}: {} exposes non-finite {:?}", self.id, entry.handle, extent);
                let error = ViewError::InvalidExtent(extent.axis);
                notices.push(Notice::ViewFailed(entry.handle, error));
            }
        }
    }

    /// Every non-planar combined axis must either fall inside the view's own
    /// extent or, for axes the view lacks, sit exactly at 0.
    pub(super) fn visible_locked(&self, state: &DisplayState, view: &dyn View) -> bool {
        let own_axes = view.own_axes();
        state.interval.non_planar_axes().all(|axis| {
            let position = self.positions.get(axis, &state.interval);
            match own_axes.iter().find(|own| &own.axis == axis) {
                Some(own) => own.contains(position),
                None => position == 0.0,
            }
        })
    }
}
