pub mod hooks;
pub mod processor;
pub mod storage;

pub use hooks::PartitionHooks;
pub use processor::{ScheduleTaskDeal, TaskProcessor};
pub use storage::ScheduleStorage;
