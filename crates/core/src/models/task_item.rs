use std::fmt;

use serde::{Deserialize, Serialize};

/// 任务项完成状态
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskItemStatus {
    #[default]
    #[serde(rename = "ACTIVE")]
    Active,
    #[serde(rename = "FINISH")]
    Finish,
    #[serde(rename = "HALT")]
    Halt,
}

/// 任务项运行时信息
///
/// 任务的最小可分配工作单元，身份为 running_entry + 任务项ID。
/// 不变式：任意时刻至多一个持有者（`current_server`）；`request_server`
/// 非空表示有待交接的申请，持有者处理完当前批次后必须让出。
/// 核心永远不会物理删除任务项，只改写持有关系字段。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskItemRuntime {
    pub task_name: String,
    pub own_sign: String,
    pub running_entry: String,
    /// 任务项ID
    pub task_item_id: String,
    pub status: TaskItemStatus,
    /// 当前持有该任务项的服务器UUID，空串表示无人持有
    pub current_server: String,
    /// 正在申请该任务项的服务器UUID，用于协作式交接
    pub request_server: String,
    /// 处理器专用参数
    pub deal_parameter: String,
    /// 处理器回写的自由文本说明
    pub deal_desc: String,
}

impl TaskItemRuntime {
    pub fn new(task_name: &str, own_sign: &str, task_item_id: &str) -> Self {
        Self {
            task_name: task_name.to_string(),
            own_sign: own_sign.to_string(),
            running_entry: crate::utils::running_entry(task_name, own_sign),
            task_item_id: task_item_id.to_string(),
            status: TaskItemStatus::Active,
            current_server: String::new(),
            request_server: String::new(),
            deal_parameter: String::new(),
            deal_desc: String::new(),
        }
    }
}

impl fmt::Display for TaskItemRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RUNNING_ENTRY={}:TASK_ITEM={}:CUR_SERVER={}:REQ_SERVER={}:DEAL_PARAMETER={}",
            self.running_entry,
            self.task_item_id,
            self.current_server,
            self.request_server,
            self.deal_parameter
        )
    }
}
