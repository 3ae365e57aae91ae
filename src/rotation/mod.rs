pub mod controller;
pub mod state;

pub use controller::{RotationSnapshot, SceneScheduler};
pub use state::{RotationState, RotationStatus};
