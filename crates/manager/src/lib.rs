pub mod cron_utils;
pub mod item_cache;
pub mod manager;

pub use cron_utils::CronScheduler;
pub use item_cache::TaskItemCache;
pub use manager::{ProcessorFactory, ScheduleManager};
