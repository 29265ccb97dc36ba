use thiserror::Error;

/// 调度协调核心错误类型定义
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("无效的CRON表达式: {expr} - {message}")]
    InvalidCron { expr: String, message: String },

    #[error("任务未找到: {name}")]
    TaskNotFound { name: String },

    #[error("协调存储错误: {0}")]
    Storage(String),

    #[error("任务处理器错误: {0}")]
    Processor(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 统一的Result类型
pub type ScheduleResult<T> = std::result::Result<T, ScheduleError>;
