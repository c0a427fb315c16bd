//! Navigation state: where the display currently is along each axis

mod position;

pub use position::PositionStore;

/// Direction of a single navigation step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    Forward,
    Backward,
}

impl StepDirection {
    /// Signed multiplier for a step of this direction
    pub fn sign(self) -> f64 {
        match self {
            StepDirection::Forward => 1.0,
            StepDirection::Backward => -1.0,
        }
    }
}
