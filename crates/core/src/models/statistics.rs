use std::sync::atomic::{AtomicU64, Ordering};

/// 处理统计信息
///
/// 由Processor的工作线程并发写入，Manager在心跳时只读取并渲染为
/// 状态描述文本。全部为原子计数器，无锁。
#[derive(Debug, Default)]
pub struct StatisticsInfo {
    /// 拉取数据的次数
    fetch_count: AtomicU64,
    /// 拉取到的数据条数
    fetch_item_num: AtomicU64,
    /// 处理成功条数
    deal_success_num: AtomicU64,
    /// 处理失败条数
    deal_failure_num: AtomicU64,
    /// 处理耗时累计（毫秒）
    deal_spend_ms: AtomicU64,
    /// 无数据休眠次数
    sleep_count: AtomicU64,
    /// 无数据休眠累计时间（毫秒）
    sleep_ms: AtomicU64,
}

impl StatisticsInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_fetch(&self, item_num: u64) {
        self.fetch_count.fetch_add(1, Ordering::Relaxed);
        self.fetch_item_num.fetch_add(item_num, Ordering::Relaxed);
    }

    pub fn add_deal_success(&self, num: u64, spend_ms: u64) {
        self.deal_success_num.fetch_add(num, Ordering::Relaxed);
        self.deal_spend_ms.fetch_add(spend_ms, Ordering::Relaxed);
    }

    pub fn add_deal_failure(&self, num: u64, spend_ms: u64) {
        self.deal_failure_num.fetch_add(num, Ordering::Relaxed);
        self.deal_spend_ms.fetch_add(spend_ms, Ordering::Relaxed);
    }

    pub fn add_sleep(&self, sleep_ms: u64) {
        self.sleep_count.fetch_add(1, Ordering::Relaxed);
        self.sleep_ms.fetch_add(sleep_ms, Ordering::Relaxed);
    }

    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::Relaxed)
    }

    pub fn deal_success_num(&self) -> u64 {
        self.deal_success_num.load(Ordering::Relaxed)
    }

    pub fn deal_failure_num(&self) -> u64 {
        self.deal_failure_num.load(Ordering::Relaxed)
    }

    /// 渲染为心跳状态描述
    pub fn deal_description(&self) -> String {
        format!(
            "FetchCount={},FetchItemNum={},DealSuccess={},DealFailure={},DealSpendMs={},SleepCount={},SleepMs={}",
            self.fetch_count.load(Ordering::Relaxed),
            self.fetch_item_num.load(Ordering::Relaxed),
            self.deal_success_num.load(Ordering::Relaxed),
            self.deal_failure_num.load(Ordering::Relaxed),
            self.deal_spend_ms.load(Ordering::Relaxed),
            self.sleep_count.load(Ordering::Relaxed),
            self.sleep_ms.load(Ordering::Relaxed),
        )
    }
}
