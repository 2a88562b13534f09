//! Achievement catalog, level curve and XP-granting metrics.

pub mod achievements;
pub mod levels;
pub mod metrics;

pub use achievements::{Achievement, EarnedAchievement};
pub use levels::Level;
pub use metrics::MetricService;
