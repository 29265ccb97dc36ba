use async_trait::async_trait;

use crate::ScheduleResult;

/// 任务处理器（工作线程池）接口
///
/// 由Manager在resume时按配置的处理器模式实例化，负责循环拉取并
/// 执行任务项。Manager只通过本接口向它发信号。
#[async_trait]
pub trait TaskProcessor: Send + Sync {
    /// 请求优雅停止：只发信号，不等待排空完成。
    /// 实现不得在本调用内同步回调Manager的控制方法；排空完成后由
    /// 处理器自己的工作任务回调 `unregister_schedule_server`。
    async fn stop_schedule(&self) -> ScheduleResult<()>;

    /// 丢弃所有已拉取但未处理的数据
    async fn clear_all_fetched_data(&self) -> ScheduleResult<()>;
}

/// 任务处理句柄（业务插件）接口
///
/// 按 `deal_handler_name` 从注册表解析，构造Manager时绑定缺失即失败。
/// 具体的取数与执行语义属于Processor层，核心不感知。
#[async_trait]
pub trait ScheduleTaskDeal: Send + Sync {
    /// 按任务项列表选取一批待处理数据
    async fn select_tasks(
        &self,
        parameter: &str,
        own_sign: &str,
        task_item_ids: &[String],
        fetch_number: usize,
    ) -> ScheduleResult<Vec<serde_json::Value>>;

    /// 执行单条数据，返回是否成功
    async fn execute(&self, item: serde_json::Value, own_sign: &str) -> ScheduleResult<bool>;
}
