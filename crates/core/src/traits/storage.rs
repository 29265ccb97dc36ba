use async_trait::async_trait;

use crate::{
    models::{InitialResult, ScheduleServer, Task},
    ScheduleResult,
};

/// 协调存储接口
///
/// 外部共享键值服务，假定提供按记录的原子创建/更新/删除。核心只
/// 依赖本接口，不关心存储内部的复制与一致性协议。
#[async_trait]
pub trait ScheduleStorage: Send + Sync {
    /// 创建一条服务器注册记录
    async fn create_server(&self, server: &ScheduleServer) -> ScheduleResult<()>;

    /// 更新一条服务器注册记录。
    /// 返回 `Ok(false)` 表示记录已经不存在（被外部清理），调用方需要重建。
    async fn update_server(&self, server: &ScheduleServer) -> ScheduleResult<bool>;

    /// 删除一条服务器注册记录
    async fn remove_server(
        &self,
        task_name: &str,
        own_sign: &str,
        uuid: &str,
    ) -> ScheduleResult<()>;

    /// 列出指定分组当前存活的服务器UUID，按注册序列号升序
    async fn get_server_uuid_list(
        &self,
        task_name: &str,
        own_sign: &str,
    ) -> ScheduleResult<Vec<String>>;

    /// 列出指定任务名下所有 running entry
    async fn get_running_entry_list(&self, task_name: &str) -> ScheduleResult<Vec<String>>;

    /// 读取分组运行信息的初始化结果，不存在时返回 `None`
    async fn get_initial_running_info_result(
        &self,
        task_name: &str,
        own_sign: &str,
    ) -> ScheduleResult<Option<InitialResult>>;

    /// 删除一个分组的运行时簿记（过期分组清理用）
    async fn remove_running_entry(&self, task_name: &str, own_sign: &str) -> ScheduleResult<()>;

    /// 全局时钟（毫秒时间戳），所有Manager共享
    async fn get_global_time(&self) -> ScheduleResult<i64>;

    /// 进程间唯一的单调序列号，用于UUID组装
    async fn get_sequence_number(&self) -> ScheduleResult<u64>;

    /// 改写任务项的当前持有者，空串表示释放
    async fn update_task_item_current_server(
        &self,
        task_name: &str,
        own_sign: &str,
        task_item_id: &str,
        server_uuid: &str,
    ) -> ScheduleResult<()>;

    /// 装载任务配置
    async fn get_task(&self, task_name: &str) -> ScheduleResult<Task>;
}
