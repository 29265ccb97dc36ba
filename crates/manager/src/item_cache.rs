use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use schedule_core::TaskItemRuntime;

/// 任务项快照缓存
///
/// 处理器的工作线程在迭代清单的同时，重装载逻辑可能整体替换它。
/// 读写约定：读方克隆 `Arc` 得到迭代开始时刻的快照，写方整体换入
/// 新向量，迭代永远不会被并发修改打断。
///
/// 句柄可克隆（内部共享），Manager与具体分区策略持同一份缓存。
#[derive(Clone, Default)]
pub struct TaskItemCache {
    inner: Arc<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    items: RwLock<Arc<Vec<TaskItemRuntime>>>,
    /// 下次拉取前需要全量重装载任务项分配
    need_reload: AtomicBool,
}

impl TaskItemCache {
    pub fn new() -> Self {
        let cache = Self::default();
        cache.inner.need_reload.store(true, Ordering::SeqCst);
        cache
    }

    /// 当前清单的快照
    pub fn snapshot(&self) -> Arc<Vec<TaskItemRuntime>> {
        self.inner.items.read().unwrap().clone()
    }

    /// 整体换入新的任务项清单
    pub fn replace(&self, items: Vec<TaskItemRuntime>) {
        *self.inner.items.write().unwrap() = Arc::new(items);
    }

    pub fn clear(&self) {
        self.replace(Vec::new());
    }

    pub fn len(&self) -> usize {
        self.inner.items.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn mark_need_reload(&self) {
        self.inner.need_reload.store(true, Ordering::SeqCst);
    }

    /// 取走重装载标记；返回true表示调用方应当全量重装载
    pub fn take_need_reload(&self) -> bool {
        self.inner.need_reload.swap(false, Ordering::SeqCst)
    }

    pub fn need_reload(&self) -> bool {
        self.inner.need_reload.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_survives_replace() {
        let cache = TaskItemCache::new();
        cache.replace(vec![
            TaskItemRuntime::new("demo", "BASE", "0"),
            TaskItemRuntime::new("demo", "BASE", "1"),
        ]);

        let snapshot = cache.snapshot();
        cache.replace(vec![TaskItemRuntime::new("demo", "BASE", "9")]);

        // 先前取得的快照不受并发替换影响
        assert_eq!(snapshot.len(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_reload_flag_lifecycle() {
        let cache = TaskItemCache::new();
        assert!(cache.take_need_reload());
        assert!(!cache.need_reload());

        cache.mark_need_reload();
        assert!(cache.need_reload());
        assert!(cache.take_need_reload());
        assert!(!cache.take_need_reload());
    }

    #[test]
    fn test_clone_shares_state() {
        let cache = TaskItemCache::new();
        let other = cache.clone();
        other.replace(vec![TaskItemRuntime::new("demo", "BASE", "0")]);
        assert_eq!(cache.len(), 1);
    }
}
