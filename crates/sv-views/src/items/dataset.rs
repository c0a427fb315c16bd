//! N-dimensional calibrated image data

use std::any::Any;
use std::ops::Range;
use std::sync::Arc;

use ndarray::{Array2, ArrayD, Axis as Dim, Ix2, IxDyn, Slice};
use parking_lot::RwLock;
use sv_core::{Axis, AxisExtent, DataItem, ItemEvent, ItemId};

use super::ItemError;

/// Origin and sample spacing of one dataset axis
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pub axis: Axis,
    pub origin: f64,
    pub scale: f64,
}

impl Calibration {
    pub fn uncalibrated(axis: Axis) -> Self {
        Self { axis, origin: 0.0, scale: 1.0 }
    }

    /// Real coordinate of sample `index`
    pub fn coordinate(&self, index: usize) -> f64 {
        self.origin + index as f64 * self.scale
    }

    /// Nearest sample index for a real coordinate, clamped to `[0, len)`
    pub fn index_of(&self, position: f64, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let raw = if self.scale == 0.0 {
            0.0
        } else {
            ((position - self.origin) / self.scale).round()
        };
        raw.max(0.0).min((len - 1) as f64) as usize
    }
}

#[derive(Debug)]
struct DatasetInner {
    data: ArrayD<f32>,
    calibration: Vec<Calibration>,
}

/// Image data with one named, calibrated axis per array dimension
#[derive(Debug)]
pub struct Dataset {
    id: ItemId,
    name: String,
    inner: RwLock<DatasetInner>,
}

impl Dataset {
    /// Wrap `data`, naming its dimensions in order. All axes start uncalibrated.
    pub fn new(
        name: impl Into<String>,
        data: ArrayD<f32>,
        axes: Vec<Axis>,
    ) -> Result<Arc<Self>, ItemError> {
        validate_axes(&axes, data.ndim())?;
        Ok(Arc::new(Self {
            id: ItemId::new(),
            name: name.into(),
            inner: RwLock::new(DatasetInner {
                data,
                calibration: axes.into_iter().map(Calibration::uncalibrated).collect(),
            }),
        }))
    }

    /// Zero-filled dataset with the given axis lengths
    pub fn zeros(name: impl Into<String>, shape: &[(Axis, usize)]) -> Result<Arc<Self>, ItemError> {
        let dims: Vec<usize> = shape.iter().map(|(_, len)| *len).collect();
        let axes = shape.iter().map(|(axis, _)| axis.clone()).collect();
        Self::new(name, ArrayD::zeros(IxDyn(&dims)), axes)
    }

    pub fn axes(&self) -> Vec<Axis> {
        self.inner.read().calibration.iter().map(|c| c.axis.clone()).collect()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.inner.read().data.shape().to_vec()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().data.is_empty()
    }

    pub fn calibration(&self, axis: &Axis) -> Option<Calibration> {
        self.inner.read().calibration.iter().find(|c| &c.axis == axis).cloned()
    }

    /// Real extent of every axis: `[origin, origin + (len - 1) * scale]`
    pub fn extents(&self) -> Vec<AxisExtent> {
        let inner = self.inner.read();
        inner
            .calibration
            .iter()
            .zip(inner.data.shape())
            .map(|(c, &len)| {
                let last = c.coordinate(len.saturating_sub(1));
                let (min, max) = (c.origin.min(last), c.origin.max(last));
                AxisExtent::new(c.axis.clone(), min, max, c.scale.abs())
            })
            .collect()
    }

    /// Change the origin and spacing of `axis`
    pub fn set_calibration(
        &self,
        axis: &Axis,
        origin: f64,
        scale: f64,
    ) -> Result<ItemEvent, ItemError> {
        let mut inner = self.inner.write();
        let calibration = inner
            .calibration
            .iter_mut()
            .find(|c| &c.axis == axis)
            .ok_or_else(|| ItemError::UnknownAxis(axis.clone()))?;
        calibration.origin = origin;
        calibration.scale = scale;
        Ok(ItemEvent::Updated(self.id))
    }

    /// Keep only samples `range` along `axis`. The origin shifts so that the
    /// remaining samples keep their real coordinates.
    pub fn crop(&self, axis: &Axis, range: Range<usize>) -> Result<ItemEvent, ItemError> {
        let mut inner = self.inner.write();
        let dim = inner
            .calibration
            .iter()
            .position(|c| &c.axis == axis)
            .ok_or_else(|| ItemError::UnknownAxis(axis.clone()))?;
        let len = inner.data.len_of(Dim(dim));
        if range.start >= range.end || range.end > len {
            return Err(ItemError::InvalidRange {
                axis: axis.clone(),
                start: range.start,
                end: range.end,
                len,
            });
        }
        let cropped = inner
            .data
            .slice_axis(Dim(dim), Slice::from(range.start..range.end))
            .to_owned();
        inner.data = cropped;
        let calibration = &mut inner.calibration[dim];
        calibration.origin = calibration.coordinate(range.start);
        tracing::debug!("Cropped '{}' along {} to {:?}", self.name, axis, range);
        Ok(ItemEvent::Updated(self.id))
    }

    /// Replace the whole array and its axes. Calibrations of axes that
    /// survive are kept.
    pub fn replace_data(&self, data: ArrayD<f32>, axes: Vec<Axis>) -> Result<ItemEvent, ItemError> {
        validate_axes(&axes, data.ndim())?;
        let mut inner = self.inner.write();
        let calibration: Vec<Calibration> = axes
            .into_iter()
            .map(|axis| {
                inner
                    .calibration
                    .iter()
                    .find(|c| c.axis == axis)
                    .cloned()
                    .unwrap_or_else(|| Calibration::uncalibrated(axis))
            })
            .collect();
        inner.calibration = calibration;
        inner.data = data;
        Ok(ItemEvent::Restructured(self.id))
    }

    /// Overwrite every sample, keeping shape and axes
    pub fn fill(&self, value: f32) -> ItemEvent {
        self.inner.write().data.fill(value);
        ItemEvent::Updated(self.id)
    }

    /// The X/Y plane at the given positions along the other axes, as
    /// `[y, x]`. Axes without a position use their first sample.
    pub fn plane<F>(&self, position: F) -> Option<Array2<f32>>
    where
        F: Fn(&Axis) -> Option<f64>,
    {
        let inner = self.inner.read();
        let x_dim = inner.calibration.iter().position(|c| c.axis == Axis::X)?;
        let y_dim = inner.calibration.iter().position(|c| c.axis == Axis::Y)?;

        let mut view = inner.data.view();
        // Remove trailing dimensions first so earlier indices stay valid.
        for (dim, calibration) in inner.calibration.iter().enumerate().rev() {
            if calibration.axis.is_planar() {
                continue;
            }
            let len = view.len_of(Dim(dim));
            let index = position(&calibration.axis)
                .map(|p| calibration.index_of(p, len))
                .unwrap_or(0);
            view = view.index_axis_move(Dim(dim), index);
        }
        let plane = view.into_dimensionality::<Ix2>().ok()?;
        let plane = if x_dim < y_dim { plane.reversed_axes() } else { plane };
        Some(plane.to_owned())
    }

    /// Minimum and maximum sample value
    pub fn value_range(&self) -> Option<(f32, f32)> {
        let inner = self.inner.read();
        if inner.data.is_empty() {
            return None;
        }
        let init = (f32::INFINITY, f32::NEG_INFINITY);
        Some(inner.data.iter().fold(init, |(lo, hi), &v| (lo.min(v), hi.max(v))))
    }
}

impl DataItem for Dataset {
    fn id(&self) -> ItemId {
        self.id
    }

    fn name(&self) -> Option<String> {
        (!self.name.is_empty()).then(|| self.name.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn validate_axes(axes: &[Axis], ndim: usize) -> Result<(), ItemError> {
    if axes.len() != ndim {
        return Err(ItemError::AxisCountMismatch { axes: axes.len(), dims: ndim });
    }
    for (i, axis) in axes.iter().enumerate() {
        if axes[..i].contains(axis) {
            return Err(ItemError::DuplicateAxis(axis.clone()));
        }
    }
    Ok(())
}
