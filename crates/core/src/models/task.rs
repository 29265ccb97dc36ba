use serde::{Deserialize, Serialize};

use crate::{ScheduleError, ScheduleResult};

/// 任务定义
///
/// 一个任务类型的完整调度配置，Manager构造时从协调存储装载一次，
/// 装载后除处理器模式（resume时归一化）外不再变化。
///
/// 时间类字段单位均为毫秒；`expire_own_sign_interval` 以天为单位。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// 任务名
    pub name: String,
    /// 心跳间隔（毫秒）
    #[serde(default = "default_heart_beat_rate")]
    pub heart_beat_rate_ms: u64,
    /// 判定服务器死亡的间隔（毫秒），必须 >= 5倍心跳间隔
    #[serde(default = "default_judge_dead_interval")]
    pub judge_dead_interval_ms: u64,
    /// 工作线程数
    #[serde(default = "default_thread_number")]
    pub thread_number: usize,
    /// 允许运行的起始时间，CRON表达式；`startrun:` 前缀表示立即启动
    #[serde(default)]
    pub permit_run_start_time: Option<String>,
    /// 允许运行的结束时间，CRON表达式；"-1" 表示一直运行
    #[serde(default)]
    pub permit_run_end_time: Option<String>,
    /// 处理器模式
    #[serde(default)]
    pub processor_mode: ProcessorMode,
    /// 任务处理器的绑定名
    pub deal_handler_name: String,
    /// 过期分组清理窗口（天）
    #[serde(default = "default_expire_interval")]
    pub expire_own_sign_interval: f64,
    /// 任务队列定义（任务项ID列表）
    #[serde(default)]
    pub task_items: Vec<String>,
    /// 单次获取的数据条数
    #[serde(default = "default_fetch_data_number")]
    pub fetch_data_number: usize,
    /// 没有数据时的休眠时间（毫秒），SLEEP模式使用
    #[serde(default = "default_sleep_time_no_data")]
    pub sleep_time_no_data_ms: u64,
    /// 每批数据处理完后的休眠时间（毫秒）
    #[serde(default)]
    pub sleep_time_interval_ms: u64,
}

fn default_heart_beat_rate() -> u64 {
    2_000
}

fn default_judge_dead_interval() -> u64 {
    60_000
}

fn default_thread_number() -> usize {
    1
}

fn default_expire_interval() -> f64 {
    1.0
}

fn default_fetch_data_number() -> usize {
    500
}

fn default_sleep_time_no_data() -> u64 {
    500
}

impl Task {
    /// 默认分组标识
    pub const DEFAULT_OWN_SIGN: &'static str = "BASE";

    /// 校验调度相关配置
    ///
    /// 死亡判定间隔必须不小于5倍心跳间隔，否则一次心跳写入失败的抖动
    /// 就可能让其他节点误判本节点已死。
    pub fn validate(&self) -> ScheduleResult<()> {
        if self.name.is_empty() {
            return Err(ScheduleError::Configuration("任务名不能为空".to_string()));
        }
        if self.deal_handler_name.is_empty() {
            return Err(ScheduleError::Configuration(
                "任务处理器绑定名不能为空".to_string(),
            ));
        }
        if self.heart_beat_rate_ms == 0 {
            return Err(ScheduleError::Configuration(
                "心跳间隔必须大于0".to_string(),
            ));
        }
        if self.judge_dead_interval_ms < self.heart_beat_rate_ms * 5 {
            return Err(ScheduleError::Configuration(format!(
                "死亡判定间隔必须不小于5倍心跳间隔: judge_dead_interval={}ms, heart_beat_rate={}ms",
                self.judge_dead_interval_ms, self.heart_beat_rate_ms
            )));
        }
        Ok(())
    }
}

/// 处理器模式
///
/// - `Sleep`: 获取不到数据时按 `sleep_time_no_data_ms` 休眠后再拉取
/// - `NotSleep`: 持续轮询，批次之间不休眠
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProcessorMode {
    #[default]
    #[serde(rename = "SLEEP")]
    Sleep,
    #[serde(rename = "NOTSLEEP")]
    NotSleep,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_task() -> Task {
        Task {
            name: "demo-task".to_string(),
            heart_beat_rate_ms: 2_000,
            judge_dead_interval_ms: 60_000,
            thread_number: 2,
            permit_run_start_time: None,
            permit_run_end_time: None,
            processor_mode: ProcessorMode::Sleep,
            deal_handler_name: "demoDeal".to_string(),
            expire_own_sign_interval: 1.0,
            task_items: vec!["0".to_string(), "1".to_string()],
            fetch_data_number: 500,
            sleep_time_no_data_ms: 500,
            sleep_time_interval_ms: 0,
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(base_task().validate().is_ok());
    }

    #[test]
    fn test_validate_dead_interval_too_small() {
        let mut task = base_task();
        task.judge_dead_interval_ms = task.heart_beat_rate_ms * 5 - 1;
        let err = task.validate().unwrap_err();
        assert!(matches!(err, ScheduleError::Configuration(_)));
    }

    #[test]
    fn test_validate_dead_interval_exactly_five_times() {
        let mut task = base_task();
        task.judge_dead_interval_ms = task.heart_beat_rate_ms * 5;
        assert!(task.validate().is_ok());
    }

    #[test]
    fn test_validate_missing_handler() {
        let mut task = base_task();
        task.deal_handler_name.clear();
        assert!(task.validate().is_err());
    }

    #[test]
    fn test_processor_mode_serde() {
        let mode: ProcessorMode = serde_json::from_str("\"NOTSLEEP\"").unwrap();
        assert_eq!(mode, ProcessorMode::NotSleep);
        assert_eq!(serde_json::to_string(&ProcessorMode::Sleep).unwrap(), "\"SLEEP\"");
    }
}
