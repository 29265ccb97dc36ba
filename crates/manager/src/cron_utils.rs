use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;

use schedule_core::{ScheduleError, ScheduleResult};

/// CRON表达式解析和时间窗口计算工具
///
/// 窗口表达式采用带秒的6/7字段语法（秒 分 时 日 月 星期 [年]）。
/// 纯函数式的"给定时刻→下一个有效时刻"计算，不掺杂调度状态机逻辑。
pub struct CronScheduler {
    schedule: Schedule,
}

impl CronScheduler {
    /// 创建新的CRON调度器
    pub fn new(cron_expr: &str) -> ScheduleResult<Self> {
        let schedule = Schedule::from_str(cron_expr).map_err(|e| ScheduleError::InvalidCron {
            expr: cron_expr.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self { schedule })
    }

    /// 严格晚于 `from` 的下一个有效时刻
    pub fn next_time_after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&from).next()
    }

    /// 从指定时间开始的多个有效时刻
    pub fn upcoming_times(&self, from: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        self.schedule.after(&from).take(count).collect()
    }

    /// 验证CRON表达式是否有效
    pub fn validate_cron_expression(cron_expr: &str) -> ScheduleResult<()> {
        Schedule::from_str(cron_expr).map_err(|e| ScheduleError::InvalidCron {
            expr: cron_expr.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }
}
