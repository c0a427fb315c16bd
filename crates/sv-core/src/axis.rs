//! Axis identities

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named dimension of a coordinate space.
///
/// Equality is identity: two axes are the same axis iff they carry the same
/// variant (and label, for custom axes). Ordering follows declaration order,
/// with custom axes sorted after the built-ins by label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Axis {
    /// Horizontal plane axis
    X,
    /// Vertical plane axis
    Y,
    /// Depth
    Z,
    /// Spectral or fluorescence channel
    Channel,
    /// Time point
    Time,
    /// Any other named dimension
    Custom(String),
}

impl Axis {
    /// Create a custom axis with the given label
    pub fn custom(label: impl Into<String>) -> Self {
        Axis::Custom(label.into())
    }

    /// Whether this axis is one of the two rendering-plane axes.
    ///
    /// Planar axes are never position-tracked.
    pub fn is_planar(&self) -> bool {
        matches!(self, Axis::X | Axis::Y)
    }

    /// Human readable label
    pub fn label(&self) -> &str {
        match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
            Axis::Channel => "Channel",
            Axis::Time => "Time",
            Axis::Custom(label) => label,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One axis of a view's own coordinate space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisExtent {
    pub axis: Axis,
    pub min: f64,
    pub max: f64,
    /// Calibration (physical units per sample)
    pub scale: f64,
}

impl AxisExtent {
    pub fn new(axis: Axis, min: f64, max: f64, scale: f64) -> Self {
        Self { axis, min, max, scale }
    }

    /// Whether `value` lies inside `[min, max]`
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }

    /// Width of the extent (never negative)
    pub fn span(&self) -> f64 {
        (self.max - self.min).max(0.0)
    }

    /// Whether bounds and scale are all finite
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.scale.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planarity_follows_identity() {
        assert!(Axis::X.is_planar());
        assert!(Axis::Y.is_planar());
        assert!(!Axis::Z.is_planar());
        assert!(!Axis::Time.is_planar());
        assert!(!Axis::custom("X").is_planar());
    }

    #[test]
    fn test_ordering_puts_custom_axes_last() {
        let mut axes =
            vec![Axis::custom("Lambda"), Axis::Time, Axis::X, Axis::custom("Alpha"), Axis::Z];
        axes.sort();
        assert_eq!(
            axes,
            vec![Axis::X, Axis::Z, Axis::Time, Axis::custom("Alpha"), Axis::custom("Lambda")]
        );
    }

    #[test]
    fn test_extent_contains_is_inclusive() {
        let extent = AxisExtent::new(Axis::Z, 0.0, 10.0, 1.0);
        assert!(extent.contains(0.0));
        assert!(extent.contains(10.0));
        assert!(!extent.contains(10.5));
        assert_eq!(extent.span(), 10.0);
    }
}
