pub mod aggregate;
pub mod feed;

pub use aggregate::{aggregate, newest_sale, window_minutes_for, TrendEvent, TrendPoint};
pub use feed::{DashboardFeed, DashboardSnapshot, FeedConfig};
