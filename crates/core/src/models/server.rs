use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils;

/// 调度服务器注册记录
///
/// 每个存活的Manager实例在协调存储里持有一条记录，复合身份为
/// 任务名 + 分组标识 + UUID。记录由所属Manager独占写入：每次心跳
/// 推进 `heartbeat_time` 并自增 `version`，其他Manager只读（用于
/// 领导者计算和存活判定）。优雅注销时从存储中删除。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleServer {
    pub task_name: String,
    pub own_sign: String,
    /// 任务名+分组标识的组合键
    pub running_entry: String,
    pub ip: String,
    pub host_name: String,
    /// 全局唯一标识: {running_entry}${ip}${随机串}${存储序列号:010}
    pub uuid: String,
    pub thread_number: usize,
    pub register_time: DateTime<Utc>,
    /// 最近一次心跳时间，心跳成功后推进
    pub heartbeat_time: Option<DateTime<Utc>>,
    /// 单调递增的心跳版本号
    pub version: u64,
    /// 状态描述（暂停原因 + 处理统计），供人工观察
    pub deal_info_desc: String,
    /// 下一次运行窗口起点的展示文本
    pub next_run_start_time: Option<String>,
    /// 下一次运行窗口终点的展示文本
    pub next_run_end_time: Option<String>,
}

impl ScheduleServer {
    /// 组装一条新的注册记录，版本号从0开始，状态为 INIT。
    ///
    /// UUID 混入本机IP、随机成分和存储签发的单调序列号，即使时钟偏移
    /// 或IP复用也能保证全局唯一；序列号同时决定了同分组内注册记录的
    /// 全序（用于领导者计算）。
    pub fn assemble(
        now: DateTime<Utc>,
        task_name: &str,
        own_sign: &str,
        thread_number: usize,
        sequence: u64,
    ) -> Self {
        let running_entry = utils::running_entry(task_name, own_sign);
        let ip = utils::local_ip();
        let random = Uuid::new_v4().simple().to_string().to_uppercase();
        let uuid = format!("{running_entry}${ip}${random}${sequence:010}");
        Self {
            task_name: task_name.to_string(),
            own_sign: own_sign.to_string(),
            running_entry,
            ip,
            host_name: utils::local_host_name(),
            uuid,
            thread_number,
            register_time: now,
            heartbeat_time: None,
            version: 0,
            deal_info_desc: "INIT".to_string(),
            next_run_start_time: None,
            next_run_end_time: None,
        }
    }
}

/// 分组运行信息的初始化结果，记录最近一次任务项初始化的时间，
/// 过期分组清理时据此判断分组是否废弃。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialResult {
    pub version: u64,
    /// 最近一次更新时间（毫秒时间戳，存储全局时钟）
    pub update_time_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_uuid_shape() {
        let server = ScheduleServer::assemble(Utc::now(), "demo", "BASE", 4, 42);
        assert_eq!(server.running_entry, "demo");
        assert_eq!(server.version, 0);
        assert_eq!(server.deal_info_desc, "INIT");

        let parts: Vec<&str> = server.uuid.split('$').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "demo");
        assert_eq!(parts[3], "0000000042");
        assert_eq!(parts[2].len(), 32);
    }

    #[test]
    fn test_assemble_non_default_own_sign() {
        let server = ScheduleServer::assemble(Utc::now(), "demo", "shard1", 1, 7);
        assert_eq!(server.running_entry, "demo$shard1");
        assert!(server.uuid.starts_with("demo$shard1$"));
    }
}
