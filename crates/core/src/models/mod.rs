pub mod server;
pub mod statistics;
pub mod task;
pub mod task_item;

pub use server::{InitialResult, ScheduleServer};
pub use statistics::StatisticsInfo;
pub use task::{ProcessorMode, Task};
pub use task_item::{TaskItemRuntime, TaskItemStatus};
