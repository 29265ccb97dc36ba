use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::{traits::ScheduleTaskDeal, ScheduleError, ScheduleResult};

/// 任务处理句柄注册表
///
/// 把处理句柄的绑定名映射到具体实现，Manager构造时按
/// `deal_handler_name` 解析，绑定缺失视为配置错误。
#[derive(Default)]
pub struct DealRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn ScheduleTaskDeal>>>,
}

impl DealRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, name: &str, handler: Arc<dyn ScheduleTaskDeal>) {
        let mut handlers = self.handlers.write().await;
        debug!("注册任务处理句柄: {}", name);
        handlers.insert(name.to_string(), handler);
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn ScheduleTaskDeal>> {
        let handlers = self.handlers.read().await;
        handlers.get(name).cloned()
    }

    /// 解析绑定，缺失时返回配置错误
    pub async fn resolve(&self, name: &str) -> ScheduleResult<Arc<dyn ScheduleTaskDeal>> {
        self.get(name).await.ok_or_else(|| {
            ScheduleError::Configuration(format!("任务处理句柄 {name} 未注册"))
        })
    }
}
