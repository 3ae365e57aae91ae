pub mod leaderboard;
pub mod milestone;
pub mod sales;
pub mod scene;

pub use leaderboard::{LeaderboardMetric, MerchantLeaderboardRow, ProductLeaderboardRow, WifiConfig};
pub use milestone::{MilestoneEvent, MilestoneKind};
pub use sales::{SaleEntry, Summary};
pub use scene::{default_rotation, rotation_from_records, SceneDescriptor, SceneRecord};
