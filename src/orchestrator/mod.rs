pub mod celebration;
pub mod controller;

pub use celebration::{Celebration, CelebrationEffect, CelebrationState};
pub use controller::{DisplayOrchestrator, DisplaySnapshot};
