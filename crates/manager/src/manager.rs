use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Mutex, MutexGuard};
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info, warn};

use schedule_core::{
    utils, DealRegistry, PartitionHooks, ProcessorMode, ScheduleError, ScheduleResult,
    ScheduleServer, ScheduleStorage, ScheduleTaskDeal, StatisticsInfo, Task, TaskProcessor,
};

use crate::cron_utils::CronScheduler;
use crate::item_cache::TaskItemCache;

/// `startrun:` 前缀：立即启动，剩余部分仅用于计算展示用的下次起点
const RUN_NOW_PREFIX: &str = "startrun:";
/// 运行窗口终点的"一直运行"标记
const RUN_FOREVER_MARK: &str = "-1";
/// 未配置终点时的展示文本
const PAUSE_WHEN_NO_DATA_DESC: &str = "当获取不到数据的时候暂停";

/// 处理器工厂
///
/// resume时按处理器模式实例化新的Processor。实现只负责组装，
/// 不得在 `create_processor` 内同步调用Manager的控制方法。
#[async_trait]
pub trait ProcessorFactory: Send + Sync {
    async fn create_processor(
        &self,
        mode: ProcessorMode,
        manager: Arc<ScheduleManager>,
        deal: Arc<dyn ScheduleTaskDeal>,
        statistics: Arc<StatisticsInfo>,
    ) -> ScheduleResult<Arc<dyn TaskProcessor>>;
}

#[derive(Debug, Clone, Copy)]
enum WindowAction {
    Resume,
    Pause,
}

/// 互斥段内的可变状态
///
/// 心跳的读-改-写、暂停/恢复、注销共用这一把锁，保证心跳不会与
/// 并发注销竞争（否则刚删除的记录可能被随后的心跳复活）。
struct ManagerInner {
    server: ScheduleServer,
    /// 暂停标记，构造后默认暂停，直到窗口计算决定启动
    paused: bool,
    pause_message: String,
    /// 终止标记，仅注销路径置位，此后心跳一律跳过
    stopped: bool,
    /// 初始化失败的错误文本，置位后心跳状态固定显示它
    start_error: Option<String>,
    processor: Option<Arc<dyn TaskProcessor>>,
    /// 归一化后的处理器模式
    processor_mode: ProcessorMode,
}

/// 调度管理器
///
/// 一个Manager为一种任务类型（的一个分组）注册一条服务器记录，
/// 驱动心跳、领导者计算、运行窗口的暂停/恢复以及优雅注销。状态机：
/// `Constructing → Registered{Paused|Running} → Stopping → Unregistered`。
pub struct ScheduleManager {
    task: Task,
    own_sign: String,
    storage: Arc<dyn ScheduleStorage>,
    deal: Arc<dyn ScheduleTaskDeal>,
    hooks: Arc<dyn PartitionHooks>,
    processor_factory: Arc<dyn ProcessorFactory>,
    statistics: Arc<StatisticsInfo>,
    item_cache: TaskItemCache,
    serial_number: u32,
    server_uuid: String,
    self_ref: OnceLock<Weak<ScheduleManager>>,
    /// 心跳与窗口定时器的取消通道
    shutdown_tx: broadcast::Sender<()>,
    inner: Mutex<ManagerInner>,
}

impl ScheduleManager {
    /// 创建并注册一个调度管理器
    ///
    /// 依次执行：过期分组清理、处理句柄解析、配置校验、注册记录
    /// 创建、心跳定时器启动、分区策略初始化、运行窗口计算。配置
    /// 错误与窗口计算错误直接返回，Manager不会进入存活状态。
    pub async fn new(
        storage: Arc<dyn ScheduleStorage>,
        registry: Arc<DealRegistry>,
        processor_factory: Arc<dyn ProcessorFactory>,
        hooks: Arc<dyn PartitionHooks>,
        item_cache: TaskItemCache,
        task_name: &str,
        own_sign: &str,
    ) -> ScheduleResult<Arc<Self>> {
        let serial_number = utils::next_serial_number();
        let task = storage.get_task(task_name).await?;
        info!("创建调度管理器: {}({}) #{}", task_name, own_sign, serial_number);

        // 超过配置窗口且没有存活服务器的分组视为废弃
        clear_expired_running_entries(storage.as_ref(), task_name, task.expire_own_sign_interval)
            .await?;

        let deal = registry.resolve(&task.deal_handler_name).await?;
        task.validate()?;

        let now = global_time_of(storage.as_ref()).await;
        let sequence = storage.get_sequence_number().await?;
        let server = ScheduleServer::assemble(now, task_name, own_sign, task.thread_number, sequence);
        storage.create_server(&server).await?;

        let heartbeat_rate = Duration::from_millis(task.heart_beat_rate_ms);
        let processor_mode = task.processor_mode;
        let (shutdown_tx, _) = broadcast::channel(4);
        let manager = Arc::new(Self {
            task,
            own_sign: own_sign.to_string(),
            storage,
            deal,
            hooks,
            processor_factory,
            statistics: Arc::new(StatisticsInfo::new()),
            item_cache,
            serial_number,
            server_uuid: server.uuid.clone(),
            self_ref: OnceLock::new(),
            shutdown_tx,
            inner: Mutex::new(ManagerInner {
                server,
                paused: true,
                pause_message: String::new(),
                stopped: false,
                start_error: None,
                processor: None,
                processor_mode,
            }),
        });
        let _ = manager.self_ref.set(Arc::downgrade(&manager));

        manager.spawn_heartbeat_timer(heartbeat_rate);

        if let Err(e) = manager.hooks.initial().await {
            // 初始化失败不立即终止：固定错误文本随心跳上报，供人工处置
            error!("分区策略初始化失败: {} - {}", manager.server_uuid, e);
            let mut inner = manager.inner.lock().await;
            inner.start_error = Some(format!("INIT失败: {e}"));
        }

        {
            let mut inner = manager.inner.lock().await;
            if let Err(e) = manager.compute_start(&mut inner).await {
                error!("计算运行窗口失败: {} - {}", manager.server_uuid, e);
                let _ = manager.shutdown_tx.send(());
                // 刚创建的注册记录不能遗留
                let _ = manager
                    .storage
                    .remove_server(&manager.task.name, &manager.own_sign, &manager.server_uuid)
                    .await;
                return Err(e);
            }
        }

        Ok(manager)
    }

    /// 策略入口钩子，记录归属的调度策略
    pub fn initial_task_parameter(&self, strategy_name: &str, task_parameter: &str) {
        info!("初始化调度策略: {} 参数: {}", strategy_name, task_parameter);
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn own_sign(&self) -> &str {
        &self.own_sign
    }

    pub fn server_uuid(&self) -> &str {
        &self.server_uuid
    }

    pub fn serial_number(&self) -> u32 {
        self.serial_number
    }

    pub fn statistics(&self) -> Arc<StatisticsInfo> {
        Arc::clone(&self.statistics)
    }

    pub fn item_cache(&self) -> &TaskItemCache {
        &self.item_cache
    }

    pub async fn is_pause_schedule(&self) -> bool {
        self.inner.lock().await.paused
    }

    pub async fn is_stop_schedule(&self) -> bool {
        self.inner.lock().await.stopped
    }

    /// 注册记录的当前内存视图（测试与展示用）
    pub async fn current_server(&self) -> ScheduleServer {
        self.inner.lock().await.server.clone()
    }

    /// 本Manager是否为所在分组的领导者
    ///
    /// 每次都从存储取最新的存活UUID列表，无缓存、无副作用。
    pub async fn is_leader(&self) -> ScheduleResult<bool> {
        let uuid_list = self
            .storage
            .get_server_uuid_list(&self.task.name, &self.own_sign)
            .await?;
        Ok(utils::is_leader(&self.server_uuid, &uuid_list))
    }

    /// 清除内存中所有已取得的数据和任务队列
    ///
    /// 在心跳记录被重建、或发现注册信息丢失后调用。无论Processor的
    /// 清理是否成功，重装载标记都必须置位。
    pub async fn clear_memo_info(&self) {
        let mut inner = self.inner.lock().await;
        self.clear_memo_info_locked(&mut inner).await;
    }

    async fn clear_memo_info_locked(&self, inner: &mut MutexGuard<'_, ManagerInner>) {
        self.item_cache.clear();
        let result = match inner.processor.clone() {
            Some(processor) => processor.clear_all_fetched_data().await,
            None => Ok(()),
        };
        self.item_cache.mark_need_reload();
        if let Err(e) = result {
            warn!("清理处理器已拉取数据失败: {}", e);
        }
    }

    /// 心跳：推进心跳时间戳与版本号并写回存储
    ///
    /// 写入失败回滚推进、下个周期重试，绝不向外传播；记录不存在时
    /// 先强制失效本地缓存再重建记录。
    async fn send_heartbeat_locked(&self, inner: &mut MutexGuard<'_, ManagerInner>) {
        if inner.stopped {
            debug!("停止标记已置位，跳过心跳: {}", inner.server.uuid);
            return;
        }

        inner.server.deal_info_desc = match &inner.start_error {
            Some(err) => err.clone(),
            None => format!("{}:{}", inner.pause_message, self.statistics.deal_description()),
        };

        let old_heartbeat = inner.server.heartbeat_time;
        let old_version = inner.server.version;
        inner.server.heartbeat_time = Some(self.global_time().await);
        inner.server.version = old_version + 1;

        match self.storage.update_server(&inner.server).await {
            Ok(true) => {}
            Ok(false) => {
                // 注册记录被外部清理了，重建一条全新的
                warn!("注册记录不存在，重建: {}", inner.server.uuid);
                self.clear_memo_info_locked(inner).await;
                if let Err(e) = self.storage.create_server(&inner.server).await {
                    warn!("重建注册记录失败，本次心跳放弃: {}", e);
                    inner.server.heartbeat_time = old_heartbeat;
                    inner.server.version = old_version;
                } else if let Err(e) = self.hooks.refresh_schedule_server_info().await {
                    // 记录刚重新出现，任务项分配需要重算，失败留给下个周期
                    warn!("重新计算任务项分配失败: {}", e);
                }
            }
            Err(e) => {
                warn!("心跳写入失败，忽略: {}", e);
                inner.server.heartbeat_time = old_heartbeat;
                inner.server.version = old_version;
            }
        }
    }

    /// 启动时计算运行窗口并安排暂停/恢复定时器
    async fn compute_start(&self, inner: &mut MutexGuard<'_, ManagerInner>) -> ScheduleResult<()> {
        let mut run_now = false;
        match self.task.permit_run_start_time.clone() {
            None => run_now = true,
            Some(start_expr) => {
                let mut expr = start_expr;
                if expr.to_lowercase().starts_with(RUN_NOW_PREFIX) {
                    run_now = true;
                    expr = expr[RUN_NOW_PREFIX.len()..].to_string();
                }
                let cron_start = CronScheduler::new(expr.trim())?;
                let now = self.global_time().await;
                let first_start =
                    cron_start
                        .next_time_after(now)
                        .ok_or_else(|| ScheduleError::InvalidCron {
                            expr: expr.clone(),
                            message: "无法计算下一个有效起点".to_string(),
                        })?;
                self.spawn_window_timer(WindowAction::Resume, cron_start, first_start);
                inner.server.next_run_start_time = Some(utils::format_timestamp(&first_start));

                match self.task.permit_run_end_time.as_deref() {
                    None | Some(RUN_FOREVER_MARK) => {
                        inner.server.next_run_end_time = Some(PAUSE_WHEN_NO_DATA_DESC.to_string());
                    }
                    Some(end_expr) => {
                        let cron_end = CronScheduler::new(end_expr)?;
                        let mut first_end = cron_end.next_time_after(first_start).ok_or_else(
                            || ScheduleError::InvalidCron {
                                expr: end_expr.to_string(),
                                message: "无法计算下一个有效终点".to_string(),
                            },
                        )?;
                        let now_end = cron_end.next_time_after(now).ok_or_else(|| {
                            ScheduleError::InvalidCron {
                                expr: end_expr.to_string(),
                                message: "无法计算下一个有效终点".to_string(),
                            }
                        })?;
                        // 当前时刻已落在窗口内：更近的终点生效，立即启动
                        if now_end != first_end && now < now_end {
                            run_now = true;
                            first_end = now_end;
                        }
                        self.spawn_window_timer(WindowAction::Pause, cron_end, first_end);
                        inner.server.next_run_end_time = Some(utils::format_timestamp(&first_end));
                    }
                }
            }
        }

        if run_now {
            self.resume_locked(inner, "开启服务立即启动").await?;
        }
        self.send_heartbeat_locked(inner).await;
        Ok(())
    }

    /// 当Processor获取不到数据时回调，决定是否继续轮询
    ///
    /// 持有任务项、配置了起始窗口且没有终点窗口时，语义为
    /// "数据耗尽即整体暂停"：转入暂停并返回false；其余情况一律继续。
    pub async fn is_continue_when_no_data(&self) -> ScheduleResult<bool> {
        if !self.item_cache.is_empty() && self.task.permit_run_start_time.is_some() {
            match self.task.permit_run_end_time.as_deref() {
                None | Some(RUN_FOREVER_MARK) => {
                    self.pause("没有数据，暂停调度").await?;
                    return Ok(false);
                }
                Some(_) => return Ok(true),
            }
        }
        Ok(true)
    }

    /// 暂停调度（幂等）：停掉Processor并立即强制一次心跳。
    /// 停止信号在锁外发出，信号再慢也不会压住心跳。
    pub async fn pause(&self, message: &str) -> ScheduleResult<()> {
        let processor = {
            let mut inner = self.inner.lock().await;
            if inner.paused {
                return Ok(());
            }
            debug!(
                "暂停调度: {} - {}",
                inner.server.uuid,
                self.statistics.deal_description()
            );
            inner.paused = true;
            inner.pause_message = message.to_string();
            inner.processor.clone()
        };
        if let Some(processor) = processor {
            processor.stop_schedule().await?;
        }
        let mut inner = self.inner.lock().await;
        self.send_heartbeat_locked(&mut inner).await;
        Ok(())
    }

    /// 恢复调度（幂等）：按配置模式实例化新Processor并强制一次心跳
    pub async fn resume(&self, message: &str) -> ScheduleResult<()> {
        let mut inner = self.inner.lock().await;
        if !inner.paused {
            return Ok(());
        }
        self.resume_locked(&mut inner, message).await?;
        self.send_heartbeat_locked(&mut inner).await;
        Ok(())
    }

    async fn resume_locked(
        &self,
        inner: &mut MutexGuard<'_, ManagerInner>,
        message: &str,
    ) -> ScheduleResult<()> {
        if !inner.paused {
            return Ok(());
        }
        debug!("恢复调度: {}", inner.server.uuid);
        let manager = self.strong_ref()?;
        // 创建处理器必须和清除暂停标记在同一互斥段内完成，否则并发的
        // 暂停可能插在两者之间，留下暂停态下仍在运行的处理器
        let processor = self
            .processor_factory
            .create_processor(
                inner.processor_mode,
                manager,
                Arc::clone(&self.deal),
                Arc::clone(&self.statistics),
            )
            .await
            .map_err(|e| ScheduleError::Processor(format!("创建处理器失败: {e}")))?;
        // 处理器就位后才清除暂停标记，创建失败时保持暂停态
        inner.paused = false;
        inner.pause_message = message.to_string();
        inner.processor = Some(processor);
        Ok(())
    }

    /// 请求停止：只向Processor发信号，不等待排空。
    /// 没有活跃Processor时立即注销。
    ///
    /// 暂停状态下发出的stop不注销：暂停意味着仍是后续恢复的候选，
    /// 终止被推迟到下一个暂停/恢复周期（有意保留的延迟终止策略）。
    pub async fn stop(&self, strategy_name: &str) -> ScheduleResult<()> {
        let mut inner = self.inner.lock().await;
        info!("停止调度服务器: {} ({})", inner.server.uuid, strategy_name);
        if inner.paused {
            debug!("暂停状态下的stop被推迟: {}", inner.server.uuid);
            return Ok(());
        }
        match inner.processor.clone() {
            Some(processor) => {
                drop(inner);
                processor.stop_schedule().await
            }
            None => self.unregister_locked(&mut inner).await,
        }
    }

    /// 注销调度服务器
    ///
    /// 仅应由排空完成的Processor（或无Processor的stop路径）调用。
    /// 处于暂停状态时不注销：暂停不是终止，注册记录必须保留给窗口
    /// 定时器后续恢复。这是唯一会永久删除服务器记录的路径。
    pub async fn unregister_schedule_server(&self) -> ScheduleResult<()> {
        let mut inner = self.inner.lock().await;
        self.unregister_locked(&mut inner).await
    }

    async fn unregister_locked(
        &self,
        inner: &mut MutexGuard<'_, ManagerInner>,
    ) -> ScheduleResult<()> {
        inner.processor = None;
        if inner.paused {
            // 暂停中的stop被推迟：记录保留，等待下一个暂停/恢复周期
            return Ok(());
        }
        if inner.stopped {
            return Ok(());
        }
        info!("注销调度服务器: {}", inner.server.uuid);
        inner.stopped = true;
        // 取消心跳与窗口定时器，整个生命周期只发生一次
        let _ = self.shutdown_tx.send(());

        for item in self.hooks.current_task_item_list() {
            self.storage
                .update_task_item_current_server(
                    &inner.server.task_name,
                    &inner.server.own_sign,
                    &item.task_item_id,
                    "",
                )
                .await?;
        }
        self.storage
            .remove_server(
                &inner.server.task_name,
                &inner.server.own_sign,
                &inner.server.uuid,
            )
            .await?;
        Ok(())
    }

    fn spawn_heartbeat_timer(&self, rate: Duration) {
        let Ok(manager) = self.strong_ref() else {
            return;
        };
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            // 首个心跳稍作延迟，避开刚完成的注册写入
            let start = Instant::now() + Duration::from_millis(300);
            let mut ticker = interval_at(start, rate);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let mut inner = manager.inner.lock().await;
                        manager.send_heartbeat_locked(&mut inner).await;
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("心跳定时器退出: {}", manager.server_uuid);
                        break;
                    }
                }
            }
        });
    }

    /// 安排一个窗口定时器：到点执行暂停/恢复，然后滚动到下一个有效时刻
    fn spawn_window_timer(
        &self,
        action: WindowAction,
        cron: CronScheduler,
        first_fire: DateTime<Utc>,
    ) {
        let Ok(manager) = self.strong_ref() else {
            return;
        };
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            let mut fire_at = first_fire;
            loop {
                let delay = (fire_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {
                        let result = match action {
                            WindowAction::Resume => manager.resume("到达运行窗口起点").await,
                            WindowAction::Pause => manager.pause("超出运行窗口终点").await,
                        };
                        if let Err(e) = result {
                            warn!("窗口切换失败: {} - {}", manager.server_uuid, e);
                        }
                        match cron.next_time_after(Utc::now()) {
                            Some(next) => {
                                manager.update_window_display(action, next).await;
                                fire_at = next;
                            }
                            None => break,
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });
    }

    async fn update_window_display(&self, action: WindowAction, next: DateTime<Utc>) {
        let mut inner = self.inner.lock().await;
        let text = Some(utils::format_timestamp(&next));
        match action {
            WindowAction::Resume => inner.server.next_run_start_time = text,
            WindowAction::Pause => inner.server.next_run_end_time = text,
        }
    }

    async fn global_time(&self) -> DateTime<Utc> {
        global_time_of(self.storage.as_ref()).await
    }

    fn strong_ref(&self) -> ScheduleResult<Arc<ScheduleManager>> {
        self.self_ref
            .get()
            .and_then(|weak| weak.upgrade())
            .ok_or_else(|| ScheduleError::Internal("调度管理器引用已失效".to_string()))
    }
}

/// 全局时钟，存储不可用时回退到本地时钟。
/// 心跳的过期判定本身容忍一定偏移，这里刻意从宽。
async fn global_time_of(storage: &dyn ScheduleStorage) -> DateTime<Utc> {
    match storage.get_global_time().await {
        Ok(ms) => DateTime::from_timestamp_millis(ms).unwrap_or_else(Utc::now),
        Err(_) => Utc::now(),
    }
}

/// 清理过期分组：没有任何存活服务器、且最近一次运行信息更新早于
/// 配置窗口的分组，从存储中删除其运行时簿记，防止无限堆积。
/// 只在构造时执行一次，不做周期性扫描。
async fn clear_expired_running_entries(
    storage: &dyn ScheduleStorage,
    task_name: &str,
    expire_days: f64,
) -> ScheduleResult<()> {
    let entries = storage.get_running_entry_list(task_name).await?;
    let window_ms = (expire_days * 24.0 * 3600.0 * 1000.0) as i64;
    let now = storage
        .get_global_time()
        .await
        .unwrap_or_else(|_| Utc::now().timestamp_millis());
    for entry in entries {
        let own_sign = utils::own_sign_from_running_entry(&entry);
        let uuid_list = storage.get_server_uuid_list(task_name, &own_sign).await?;
        if !uuid_list.is_empty() {
            continue;
        }
        if let Some(result) = storage
            .get_initial_running_info_result(task_name, &own_sign)
            .await?
        {
            if now - result.update_time_ms < window_ms {
                continue;
            }
        }
        info!("清理过期分组: {}({})", task_name, own_sign);
        storage.remove_running_entry(task_name, &own_sign).await?;
    }
    Ok(())
}
