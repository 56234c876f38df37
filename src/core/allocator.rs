use crate::utils::error::{LaunchError, Result};
use std::collections::HashSet;
use std::net::TcpListener;

pub const MAX_PORT: u16 = 65535;

/// 用 bind 探測埠號是否可用。成功後立刻釋放，所以只是查詢；
/// 呼叫端必須在下一次分配前把埠號放進 claimed 集合。
pub fn port_is_free(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_ok()
}

/// 回傳 >= start 的最小可用埠，跳過 claimed 集合與 OS 已綁定的埠
pub fn find_free_port(start: u16, claimed: &HashSet<u16>) -> Result<u16> {
    find_free_port_in(start, MAX_PORT, claimed)
}

pub fn find_free_port_in(start: u16, end: u16, claimed: &HashSet<u16>) -> Result<u16> {
    for port in start..=end {
        if claimed.contains(&port) {
            continue;
        }
        if port_is_free(port) {
            return Ok(port);
        }
    }
    Err(LaunchError::NoPortAvailable { start, end })
}
