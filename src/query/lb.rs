//! 路由策略接口
//!
//! 路由策略负责为每个 DML channel 挑选 leader 节点、并发调用分片查询闭包，
//! 以及在 leader 失效时重试。查询任务只提供闭包，不关心具体策略。

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::core::error::ProxyResult;
use crate::query::context::RequestContext;
use crate::query::shard::{CostAggregation, QueryNodeClient};

/// 对单个节点、一组 channel 执行一次分片查询
pub type ShardQueryFn = Arc<
    dyn Fn(i64, Arc<dyn QueryNodeClient>, Vec<String>) -> BoxFuture<'static, ProxyResult<()>>
        + Send
        + Sync,
>;

/// 一次集合级别的查询负载
#[derive(Clone)]
pub struct CollectionWorkload {
    pub db: String,
    pub collection_id: i64,
    pub collection_name: String,
    pub nq: i64,
    pub exec: ShardQueryFn,
}

impl std::fmt::Debug for CollectionWorkload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionWorkload")
            .field("db", &self.db)
            .field("collection_id", &self.collection_id)
            .field("collection_name", &self.collection_name)
            .field("nq", &self.nq)
            .finish()
    }
}

#[async_trait]
pub trait LbPolicy: Send + Sync {
    /// 所有 channel 都成功返回 `Ok`；重试用尽后返回最后一次的错误
    async fn execute(&self, ctx: &RequestContext, workload: CollectionWorkload) -> ProxyResult<()>;

    fn update_cost_metrics(&self, node_id: i64, cost: &CostAggregation);
}
