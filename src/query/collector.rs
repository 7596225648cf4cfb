//! 分片结果收集
//!
//! 多个分片调用并发写入，合并阶段一次性取走全部结果。

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::query::shard::RetrieveResults;

#[derive(Debug, Default)]
pub struct ResultCollector {
    results: Mutex<Vec<RetrieveResults>>,
    drained: AtomicBool,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入一个分片结果，已被取走后返回 false 并丢弃结果
    pub fn insert(&self, result: RetrieveResults) -> bool {
        let mut results = self.results.lock();
        if self.drained.load(Ordering::Acquire) {
            log::warn!("结果已被合并，丢弃迟到的分片结果, source_id={}", result.source_id);
            return false;
        }
        results.push(result);
        true
    }

    pub fn len(&self) -> usize {
        self.results.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 取走全部结果，只有第一次调用能拿到数据
    pub fn drain(&self) -> Vec<RetrieveResults> {
        let mut results = self.results.lock();
        if self.drained.swap(true, Ordering::AcqRel) {
            return Vec::new();
        }
        std::mem::take(&mut *results)
    }

    pub fn is_drained(&self) -> bool {
        self.drained.load(Ordering::Acquire)
    }
}
