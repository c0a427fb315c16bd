//! Per-axis navigation positions

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::axis::Axis;
use crate::error::DisplayError;
use crate::interval::CombinedInterval;

/// Last known scalar position per non-planar axis.
///
/// The map sits behind its own lock, so pruning and seeding during a rebuild
/// can never interleave with a navigation write on another thread. Reads are
/// clamped to the current combined extent; the stored value is left as is.
#[derive(Debug, Default)]
pub struct PositionStore {
    positions: RwLock<AHashMap<Axis, f64>>,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position of `axis` clamped into its current combined extent.
    ///
    /// Axes that are not tracked read as `0`.
    pub fn get(&self, axis: &Axis, interval: &CombinedInterval) -> f64 {
        let Some(extent) = interval.extent(axis) else {
            return 0.0;
        };
        match self.positions.read().get(axis) {
            Some(value) => extent.clamp(*value),
            None => 0.0,
        }
    }

    /// Store `value` clamped into the combined extent of `axis` and return the
    /// stored value.
    pub fn set(
        &self,
        axis: &Axis,
        value: f64,
        interval: &CombinedInterval,
    ) -> Result<f64, DisplayError> {
        let extent = match interval.extent(axis) {
            Some(extent) if !axis.is_planar() => extent,
            _ => return Err(DisplayError::AxisUnknown(axis.clone())),
        };
        let clamped = extent.clamp(value);
        self.positions.write().insert(axis.clone(), clamped);
        Ok(clamped)
    }

    /// Drop every axis the interval no longer contains
    pub fn prune(&self, interval: &CombinedInterval) -> Vec<Axis> {
        let mut positions = self.positions.write();
        let mut removed = Vec::new();
        positions.retain(|axis, _| {
            let keep = interval.contains(axis) && !axis.is_planar();
            if !keep {
                removed.push(axis.clone());
            }
            keep
        });
        removed
    }

    /// Start every untracked non-planar axis at its minimum
    pub fn seed_new_axes(&self, interval: &CombinedInterval) -> Vec<Axis> {
        let mut positions = self.positions.write();
        let mut seeded = Vec::new();
        for (axis, extent) in interval.iter() {
            if axis.is_planar() || positions.contains_key(axis) {
                continue;
            }
            positions.insert(axis.clone(), extent.min);
            seeded.push(axis.clone());
        }
        seeded
    }

    /// Stored (unclamped) value, if the axis is tracked
    pub fn raw(&self, axis: &Axis) -> Option<f64> {
        self.positions.read().get(axis).copied()
    }

    /// Tracked axes, sorted
    pub fn keys(&self) -> Vec<Axis> {
        let mut keys: Vec<Axis> = self.positions.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.positions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.read().is_empty()
    }

    pub fn clear(&self) {
        self.positions.write().clear();
    }
}
