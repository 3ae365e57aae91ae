pub mod controller;
pub mod loop_worker;
pub mod watermark;

pub use controller::MilestoneDedupPoller;
pub use watermark::Watermark;
