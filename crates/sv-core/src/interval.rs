//! Combined interval - the union of every attached view's coordinate space

use indexmap::IndexMap;
use serde::Serialize;

use crate::axis::{Axis, AxisExtent};
use crate::settings::ScaleAveraging;

/// Combined extent and averaged calibration of one axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CombinedExtent {
    pub min: f64,
    pub max: f64,
    pub scale: f64,
}

impl CombinedExtent {
    /// Clamp `value` into `[min, max]`
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }
}

/// Running totals for one axis while unioning view extents
#[derive(Debug, Clone, Copy)]
struct Accumulator {
    min: f64,
    max: f64,
    scale_sum: f64,
    count: usize,
    weighted_scale_sum: f64,
    weight_sum: f64,
}

impl Accumulator {
    fn new(extent: &AxisExtent) -> Self {
        let mut acc = Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            scale_sum: 0.0,
            count: 0,
            weighted_scale_sum: 0.0,
            weight_sum: 0.0,
        };
        acc.add(extent);
        acc
    }

    fn add(&mut self, extent: &AxisExtent) {
        self.min = self.min.min(extent.min);
        self.max = self.max.max(extent.max);
        self.scale_sum += extent.scale;
        self.count += 1;
        self.weighted_scale_sum += extent.scale * extent.span();
        self.weight_sum += extent.span();
    }

    fn finish(&self, averaging: ScaleAveraging) -> CombinedExtent {
        let simple = self.scale_sum / self.count as f64;
        let scale = match averaging {
            ScaleAveraging::Simple => simple,
            // Zero-width contributions carry no weight; fall back to the plain mean.
            ScaleAveraging::ExtentWeighted if self.weight_sum > 0.0 => {
                self.weighted_scale_sum / self.weight_sum
            }
            ScaleAveraging::ExtentWeighted => simple,
        };
        CombinedExtent { min: self.min, max: self.max, scale }
    }
}

/// Union over the current view set of all distinct axes.
///
/// An axis is present iff at least one view exposes it. Iteration order is
/// the order in which axes were first observed while walking the views.
#[derive(Debug, Clone, Default)]
pub struct CombinedInterval {
    entries: IndexMap<Axis, CombinedExtent>,
    averaging: ScaleAveraging,
}

impl CombinedInterval {
    pub fn new(averaging: ScaleAveraging) -> Self {
        Self {
            entries: IndexMap::new(),
            averaging,
        }
    }

    /// Discard every entry and recompute the union from `spaces`, one
    /// coordinate space per view in view-list order.
    pub fn rebuild_structure<I>(&mut self, spaces: I)
    where
        I: IntoIterator<Item = Vec<AxisExtent>>,
    {
        self.entries = union(spaces, self.averaging);
    }

    /// Recompute bounds and scales for the existing axes.
    ///
    /// Returns `true` without touching any entry if the union now has a
    /// different axis set; the caller must rebuild instead.
    pub fn refresh_bounds<I>(&mut self, spaces: I) -> bool
    where
        I: IntoIterator<Item = Vec<AxisExtent>>,
    {
        let fresh = union(spaces, self.averaging);
        let same_axes = fresh.len() == self.entries.len()
            && fresh.keys().all(|axis| self.entries.contains_key(axis));
        if !same_axes {
            return true;
        }
        for (axis, extent) in fresh {
            if let Some(entry) = self.entries.get_mut(&axis) {
                *entry = extent;
            }
        }
        false
    }

    /// Remove every axis
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, axis: &Axis) -> bool {
        self.entries.contains_key(axis)
    }

    /// Extent of `axis`, if any view exposes it
    pub fn extent(&self, axis: &Axis) -> Option<CombinedExtent> {
        self.entries.get(axis).copied()
    }

    /// Averaged calibration of `axis`
    pub fn average_scale(&self, axis: &Axis) -> Option<f64> {
        self.entries.get(axis).map(|e| e.scale)
    }

    /// All axes in first-observed order
    pub fn axes(&self) -> impl Iterator<Item = &Axis> {
        self.entries.keys()
    }

    /// Non-planar axes in first-observed order
    pub fn non_planar_axes(&self) -> impl Iterator<Item = &Axis> {
        self.entries.keys().filter(|axis| !axis.is_planar())
    }

    /// Axes paired with their combined extents, in first-observed order
    pub fn iter(&self) -> impl Iterator<Item = (&Axis, &CombinedExtent)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn union<I>(spaces: I, averaging: ScaleAveraging) -> IndexMap<Axis, CombinedExtent>
where
    I: IntoIterator<Item = Vec<AxisExtent>>,
{
    let mut accumulators: IndexMap<Axis, Accumulator> = IndexMap::new();
    for space in spaces {
        for extent in space {
            // Reported per view by the display; skipped here
            if !extent.is_finite() {
                tracing::debug!("Ignoring non-finite extent {:?}", extent);
                continue;
            }
            let extent = if extent.min > extent.max {
                AxisExtent::new(extent.axis, extent.max, extent.min, extent.scale)
            } else {
                extent
            };
            match accumulators.get_mut(&extent.axis) {
                Some(acc) => acc.add(&extent),
                None => {
                    let acc = Accumulator::new(&extent);
                    accumulators.insert(extent.axis, acc);
                }
            }
        }
    }
    accumulators
        .into_iter()
        .map(|(axis, acc)| (axis, acc.finish(averaging)))
        .collect()
}
