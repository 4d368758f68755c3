// Account pool: lifecycle, rotation and cooldowns
pub mod manager;
pub mod tracker;

pub use manager::{LoadSummary, PoolManager};
pub use tracker::{CleanupStats, CooldownTracker, MaintenanceSchedule};
