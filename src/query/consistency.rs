//! 一致性级别与保证时间戳
//!
//! 根据请求的一致性级别和开始时间戳推导查询需要满足的快照时间戳。
//! 纯函数，无 I/O。

use serde::{Deserialize, Serialize};

use crate::core::tso::{add_physical_duration, Timestamp};

/// 兼容路径中表示 Strong 的保证时间戳取值
const STRONG_TS: Timestamp = 0;
/// 兼容路径中表示 Bounded 的保证时间戳取值
const BOUNDED_TS: Timestamp = 2;
/// Eventually 一致性直接读取任意已就绪快照
const EVENTUALLY_TS: Timestamp = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConsistencyLevel {
    /// 零值，旧客户端未设置级别时也是它
    #[default]
    Strong = 0,
    Session = 1,
    Bounded = 2,
    Eventually = 3,
    Customized = 4,
}

impl ConsistencyLevel {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(ConsistencyLevel::Strong),
            1 => Some(ConsistencyLevel::Session),
            2 => Some(ConsistencyLevel::Bounded),
            3 => Some(ConsistencyLevel::Eventually),
            4 => Some(ConsistencyLevel::Customized),
            _ => None,
        }
    }
}

/// 推导保证时间戳所需的输入
#[derive(Debug, Clone, Copy)]
pub struct ConsistencyInput {
    /// 请求携带的原始保证时间戳，0 表示未设置
    pub guarantee_ts: Timestamp,
    /// 请求开始时间戳
    pub begin_ts: Timestamp,
    /// 请求显式指定的级别
    pub level: ConsistencyLevel,
    /// 集合的默认级别
    pub collection_level: ConsistencyLevel,
    /// 是否使用集合默认级别
    pub use_default_consistency: bool,
}

pub struct ConsistencyResolver {
    graceful_time_ms: i64,
}

impl ConsistencyResolver {
    pub fn new(graceful_time_ms: i64) -> Self {
        Self { graceful_time_ms }
    }

    /// 返回最终使用的一致性级别和保证时间戳
    pub fn resolve(&self, input: &ConsistencyInput) -> (ConsistencyLevel, Timestamp) {
        if input.use_default_consistency {
            let level = input.collection_level;
            return (
                level,
                self.from_consistency(input.guarantee_ts, input.begin_ts, level),
            );
        }

        let level = input.level;
        if level == ConsistencyLevel::Strong && input.guarantee_ts > 0 {
            // 旧客户端只传时间戳不传级别
            return (level, self.from_raw(input.guarantee_ts, input.begin_ts));
        }
        (
            level,
            self.from_consistency(input.guarantee_ts, input.begin_ts, level),
        )
    }

    fn bounded(&self, begin_ts: Timestamp) -> Timestamp {
        add_physical_duration(begin_ts, -self.graceful_time_ms)
    }

    fn from_consistency(
        &self,
        ts: Timestamp,
        begin_ts: Timestamp,
        level: ConsistencyLevel,
    ) -> Timestamp {
        match level {
            ConsistencyLevel::Strong => begin_ts,
            ConsistencyLevel::Bounded => self.bounded(begin_ts),
            ConsistencyLevel::Eventually => EVENTUALLY_TS,
            ConsistencyLevel::Session | ConsistencyLevel::Customized => ts,
        }
    }

    fn from_raw(&self, ts: Timestamp, begin_ts: Timestamp) -> Timestamp {
        match ts {
            STRONG_TS => begin_ts,
            BOUNDED_TS => self.bounded(begin_ts),
            _ => ts,
        }
    }
}
