use async_trait::async_trait;

use crate::{models::TaskItemRuntime, ScheduleResult};

/// 分区策略钩子
///
/// 具体的调度器类型（按范围分区、按哈希分区等）通过实现本接口向
/// 核心提供任务项视角，核心不继承、只依赖注入。
#[async_trait]
pub trait PartitionHooks: Send + Sync {
    /// Manager注册完成后的一次性初始化（装载任务项分配等）
    async fn initial(&self) -> ScheduleResult<()>;

    /// 重新计算任务项到存活服务器的分配（领导者执行）。
    /// 可能在Manager的互斥段内被调用，实现不得同步回调Manager的控制方法。
    async fn refresh_schedule_server_info(&self) -> ScheduleResult<()>;

    /// 当前本Manager持有的任务项清单
    fn current_task_item_list(&self) -> Vec<TaskItemRuntime>;

    /// 任务项总数
    fn task_item_count(&self) -> usize;
}
