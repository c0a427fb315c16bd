//! Display coordinate coordinator for multi-view stacks
//!
//! This crate fuses the individually named and scaled axes of several views
//! into one combined display space, tracks a navigable position per
//! non-planar axis and decides which views are visible at that position.

pub mod axis;
pub mod display;
pub mod error;
pub mod events;
pub mod interval;
pub mod navigation;
pub mod settings;
pub mod view;
pub mod worker;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use axis::{Axis, AxisExtent};
pub use display::{
    AxisSnapshot, Display, DisplayId, DisplayRegistry, DisplaySnapshot, PassReport,
    PlaneExtents, ViewFailure, ViewSnapshot,
};
pub use error::{ConfigError, DisplayError, ViewError};
pub use events::EventBus;
pub use interval::{CombinedExtent, CombinedInterval};
pub use navigation::PositionStore;
pub use settings::{DisplaySettings, ScaleAveraging};
pub use view::{DataItem, ItemId, View, ViewFactory, ViewHandle, ViewRegistry};
pub use worker::{DisplayWorker, ItemEvent};
