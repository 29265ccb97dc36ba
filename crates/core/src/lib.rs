pub mod deal_registry;
pub mod errors;
pub mod models;
pub mod traits;
pub mod utils;

pub use deal_registry::DealRegistry;
pub use errors::{ScheduleError, ScheduleResult};
pub use models::{
    InitialResult, ProcessorMode, ScheduleServer, StatisticsInfo, Task, TaskItemRuntime,
    TaskItemStatus,
};
pub use traits::{PartitionHooks, ScheduleStorage, ScheduleTaskDeal, TaskProcessor};
