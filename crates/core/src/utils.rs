//! # 通用工具函数
//!
//! running entry 组合键、本机标识、领导者判定等辅助函数。

use std::net::UdpSocket;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};

use crate::models::Task;

/// 由任务名和分组标识组合 running entry。
/// 默认分组（BASE）直接使用任务名，其余为 `task$own_sign`。
pub fn running_entry(task_name: &str, own_sign: &str) -> String {
    if own_sign.is_empty() || own_sign == Task::DEFAULT_OWN_SIGN {
        task_name.to_string()
    } else {
        format!("{task_name}${own_sign}")
    }
}

/// 从 running entry 中拆出分组标识
pub fn own_sign_from_running_entry(running_entry: &str) -> String {
    match running_entry.split_once('$') {
        Some((_, own_sign)) => own_sign.to_string(),
        None => Task::DEFAULT_OWN_SIGN.to_string(),
    }
}

/// 从 running entry 中拆出任务名
pub fn task_name_from_running_entry(running_entry: &str) -> String {
    match running_entry.split_once('$') {
        Some((task_name, _)) => task_name.to_string(),
        None => running_entry.to_string(),
    }
}

/// 服务器UUID末段是注册时由存储签发的序列号，据此对存活服务器排序
fn uuid_sequence(uuid: &str) -> Option<u64> {
    uuid.rsplit('$').next()?.parse().ok()
}

/// 领导者判定：存活UUID列表中序列号最小者为领导者。
///
/// 纯读时计算，无副作用；列表为空（自身记录尚未可见）时判定为否。
pub fn is_leader(uuid: &str, server_uuid_list: &[String]) -> bool {
    let leader = server_uuid_list.iter().min_by(|a, b| {
        match (uuid_sequence(a), uuid_sequence(b)) {
            (Some(sa), Some(sb)) => sa.cmp(&sb),
            _ => a.as_str().cmp(b.as_str()),
        }
    });
    leader.map(|l| l == uuid).unwrap_or(false)
}

/// 本机IP，解析失败回退为回环地址
pub fn local_ip() -> String {
    let resolved = UdpSocket::bind("0.0.0.0:0").and_then(|socket| {
        socket.connect("8.8.8.8:80")?;
        socket.local_addr()
    });
    match resolved {
        Ok(addr) => addr.ip().to_string(),
        Err(_) => "127.0.0.1".to_string(),
    }
}

/// 本机主机名
pub fn local_host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_string())
}

/// 格式化展示时间
pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

static NEXT_SERIAL: AtomicU32 = AtomicU32::new(0);

/// 进程内递增的序号，仅用于日志里区分不同Manager实例，与正确性无关
pub fn next_serial_number() -> u32 {
    NEXT_SERIAL.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_entry_round_trip() {
        assert_eq!(running_entry("demo", "BASE"), "demo");
        assert_eq!(running_entry("demo", ""), "demo");
        assert_eq!(running_entry("demo", "shard1"), "demo$shard1");

        assert_eq!(own_sign_from_running_entry("demo"), "BASE");
        assert_eq!(own_sign_from_running_entry("demo$shard1"), "shard1");
        assert_eq!(task_name_from_running_entry("demo$shard1"), "demo");
        assert_eq!(task_name_from_running_entry("demo"), "demo");
    }

    #[test]
    fn test_is_leader_by_sequence() {
        let list = vec![
            "demo$10.0.0.2$AA$0000000007".to_string(),
            "demo$10.0.0.1$BB$0000000003".to_string(),
            "demo$10.0.0.3$CC$0000000009".to_string(),
        ];
        assert!(is_leader("demo$10.0.0.1$BB$0000000003", &list));
        assert!(!is_leader("demo$10.0.0.2$AA$0000000007", &list));
        assert!(!is_leader("demo$10.0.0.3$CC$0000000009", &list));
    }

    #[test]
    fn test_is_leader_unique_under_permutation() {
        let mut list = vec![
            "demo$a$X$0000000002".to_string(),
            "demo$b$Y$0000000001".to_string(),
            "demo$c$Z$0000000003".to_string(),
        ];
        for _ in 0..3 {
            list.rotate_left(1);
            let leaders = list.iter().filter(|u| is_leader(u, &list)).count();
            assert_eq!(leaders, 1);
        }
    }

    #[test]
    fn test_is_leader_empty_list() {
        assert!(!is_leader("demo$a$X$0000000001", &[]));
    }

    #[test]
    fn test_serial_number_increases() {
        let first = next_serial_number();
        let second = next_serial_number();
        assert!(second > first);
    }
}
