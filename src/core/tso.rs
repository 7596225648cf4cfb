//! 混合逻辑时钟时间戳
//!
//! 时间戳 = 物理毫秒 << 18 | 逻辑序号。请求的 deadline 也按同样方式
//! 折算成超时时间戳（逻辑序号为 0）转发给分片。

use chrono::{DateTime, Utc};

pub type Timestamp = u64;

/// 逻辑序号占用的位数
pub const LOGICAL_BITS: u32 = 18;
const LOGICAL_MASK: u64 = (1 << LOGICAL_BITS) - 1;
/// 物理部分可表示的最大毫秒数
pub const MAX_PHYSICAL_MS: u64 = u64::MAX >> LOGICAL_BITS;

/// 由物理毫秒和逻辑序号合成时间戳，物理部分截断到 `[0, MAX_PHYSICAL_MS]`
pub fn compose_ts(physical_ms: i64, logical: u64) -> Timestamp {
    let physical = (physical_ms.max(0) as u64).min(MAX_PHYSICAL_MS);
    (physical << LOGICAL_BITS) | (logical & LOGICAL_MASK)
}

/// 由墙上时间合成时间戳
pub fn compose_ts_by_time(time: DateTime<Utc>, logical: u64) -> Timestamp {
    compose_ts(time.timestamp_millis(), logical)
}

/// 拆分为 (物理毫秒, 逻辑序号)
pub fn parse_ts(ts: Timestamp) -> (i64, u64) {
    ((ts >> LOGICAL_BITS) as i64, ts & LOGICAL_MASK)
}

/// 在物理部分上加减毫秒，结果不小于 0
pub fn add_physical_duration(ts: Timestamp, delta_ms: i64) -> Timestamp {
    let (physical, logical) = parse_ts(ts);
    compose_ts(physical.saturating_add(delta_ms), logical)
}
