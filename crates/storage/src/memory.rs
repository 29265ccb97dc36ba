use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;

use schedule_core::{
    utils, InitialResult, ScheduleError, ScheduleResult, ScheduleServer, ScheduleStorage, Task,
    TaskItemRuntime,
};

/// 内存版协调存储
///
/// 单进程内的 `ScheduleStorage` 实现，适用于嵌入式部署和集成测试。
/// 所有表按 running entry 作键，互斥锁保证按记录的原子更新语义。
#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<StorageState>,
    sequence: AtomicU64,
    /// 测试用的全局时钟偏移（毫秒）
    time_offset_ms: AtomicI64,
}

#[derive(Default)]
struct StorageState {
    tasks: HashMap<String, Task>,
    /// running entry -> (uuid -> 注册记录)
    servers: HashMap<String, HashMap<String, ScheduleServer>>,
    /// running entry -> 初始化结果
    running_infos: HashMap<String, InitialResult>,
    /// running entry -> (任务项ID -> 运行时信息)
    task_items: HashMap<String, BTreeMap<String, TaskItemRuntime>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个任务配置
    pub async fn register_task(&self, task: Task) {
        let mut state = self.state.lock().await;
        state.tasks.insert(task.name.clone(), task);
    }

    /// 按配置初始化一个分组的任务项，并推进该分组的运行信息时间戳
    pub async fn init_task_items(&self, task_name: &str, own_sign: &str, item_ids: &[String]) {
        let now = self.global_time_ms();
        let entry = utils::running_entry(task_name, own_sign);
        let mut state = self.state.lock().await;
        let items = state.task_items.entry(entry.clone()).or_default();
        for id in item_ids {
            items
                .entry(id.clone())
                .or_insert_with(|| TaskItemRuntime::new(task_name, own_sign, id));
        }
        let info = state.running_infos.entry(entry).or_insert(InitialResult {
            version: 0,
            update_time_ms: now,
        });
        info.version += 1;
        info.update_time_ms = now;
    }

    /// 直接写入一条分组运行信息（测试过期清理用）
    pub async fn put_initial_running_info(
        &self,
        task_name: &str,
        own_sign: &str,
        info: InitialResult,
    ) {
        let entry = utils::running_entry(task_name, own_sign);
        let mut state = self.state.lock().await;
        state.running_infos.insert(entry, info);
    }

    /// 读取一个任务项的运行时信息
    pub async fn get_task_item(
        &self,
        task_name: &str,
        own_sign: &str,
        task_item_id: &str,
    ) -> Option<TaskItemRuntime> {
        let entry = utils::running_entry(task_name, own_sign);
        let state = self.state.lock().await;
        state
            .task_items
            .get(&entry)
            .and_then(|items| items.get(task_item_id))
            .cloned()
    }

    /// 测试用：拨动全局时钟
    pub fn advance_time(&self, delta_ms: i64) {
        self.time_offset_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    fn global_time_ms(&self) -> i64 {
        Utc::now().timestamp_millis() + self.time_offset_ms.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScheduleStorage for MemoryStorage {
    async fn create_server(&self, server: &ScheduleServer) -> ScheduleResult<()> {
        let mut state = self.state.lock().await;
        let servers = state
            .servers
            .entry(server.running_entry.clone())
            .or_default();
        debug!("创建注册记录: {}", server.uuid);
        servers.insert(server.uuid.clone(), server.clone());
        Ok(())
    }

    async fn update_server(&self, server: &ScheduleServer) -> ScheduleResult<bool> {
        let mut state = self.state.lock().await;
        match state
            .servers
            .get_mut(&server.running_entry)
            .and_then(|servers| servers.get_mut(&server.uuid))
        {
            Some(existing) => {
                *existing = server.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_server(
        &self,
        task_name: &str,
        own_sign: &str,
        uuid: &str,
    ) -> ScheduleResult<()> {
        let entry = utils::running_entry(task_name, own_sign);
        let mut state = self.state.lock().await;
        if let Some(servers) = state.servers.get_mut(&entry) {
            servers.remove(uuid);
        }
        Ok(())
    }

    async fn get_server_uuid_list(
        &self,
        task_name: &str,
        own_sign: &str,
    ) -> ScheduleResult<Vec<String>> {
        let entry = utils::running_entry(task_name, own_sign);
        let state = self.state.lock().await;
        let mut uuid_list: Vec<String> = state
            .servers
            .get(&entry)
            .map(|servers| servers.keys().cloned().collect())
            .unwrap_or_default();
        // 注册序列号（UUID末段）升序，决定领导者选择的全序
        uuid_list.sort_by_key(|uuid| {
            uuid.rsplit('$')
                .next()
                .and_then(|seq| seq.parse::<u64>().ok())
                .unwrap_or(u64::MAX)
        });
        Ok(uuid_list)
    }

    async fn get_running_entry_list(&self, task_name: &str) -> ScheduleResult<Vec<String>> {
        let state = self.state.lock().await;
        let mut entries: Vec<String> = state
            .running_infos
            .keys()
            .chain(state.task_items.keys())
            .filter(|entry| utils::task_name_from_running_entry(entry) == task_name)
            .cloned()
            .collect();
        entries.sort();
        entries.dedup();
        Ok(entries)
    }

    async fn get_initial_running_info_result(
        &self,
        task_name: &str,
        own_sign: &str,
    ) -> ScheduleResult<Option<InitialResult>> {
        let entry = utils::running_entry(task_name, own_sign);
        let state = self.state.lock().await;
        Ok(state.running_infos.get(&entry).cloned())
    }

    async fn remove_running_entry(&self, task_name: &str, own_sign: &str) -> ScheduleResult<()> {
        let entry = utils::running_entry(task_name, own_sign);
        let mut state = self.state.lock().await;
        state.running_infos.remove(&entry);
        state.task_items.remove(&entry);
        debug!("删除分组簿记: {}", entry);
        Ok(())
    }

    async fn get_global_time(&self) -> ScheduleResult<i64> {
        Ok(self.global_time_ms())
    }

    async fn get_sequence_number(&self) -> ScheduleResult<u64> {
        Ok(self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn update_task_item_current_server(
        &self,
        task_name: &str,
        own_sign: &str,
        task_item_id: &str,
        server_uuid: &str,
    ) -> ScheduleResult<()> {
        let entry = utils::running_entry(task_name, own_sign);
        let mut state = self.state.lock().await;
        let item = state
            .task_items
            .get_mut(&entry)
            .and_then(|items| items.get_mut(task_item_id))
            .ok_or_else(|| {
                ScheduleError::Storage(format!("任务项不存在: {entry}:{task_item_id}"))
            })?;
        item.current_server = server_uuid.to_string();
        Ok(())
    }

    async fn get_task(&self, task_name: &str) -> ScheduleResult<Task> {
        let state = self.state.lock().await;
        state
            .tasks
            .get(task_name)
            .cloned()
            .ok_or_else(|| ScheduleError::TaskNotFound {
                name: task_name.to_string(),
            })
    }
}
