//! 分片调用
//!
//! `ShardDispatcher::query_shard` 是交给路由策略的闭包主体：对一个节点发起
//! 检索，按状态码分类失败，成功时写入结果收集器并上报节点开销。

use std::sync::Arc;

use futures::FutureExt;

use crate::core::error::{ProxyError, ProxyResult};
use crate::query::collector::ResultCollector;
use crate::query::context::RequestContext;
use crate::query::lb::{LbPolicy, ShardQueryFn};
use crate::query::meta_cache::MetaCache;
use crate::query::shard::{
    DataScope, QueryNodeClient, RetrieveRequest, ShardErrorCode, ShardQueryRequest,
};

pub struct ShardDispatcher {
    ctx: RequestContext,
    db: String,
    collection_name: String,
    request: RetrieveRequest,
    collector: Arc<ResultCollector>,
    meta_cache: Arc<dyn MetaCache>,
    lb: Arc<dyn LbPolicy>,
}

impl ShardDispatcher {
    pub fn new(
        ctx: RequestContext,
        db: impl Into<String>,
        collection_name: impl Into<String>,
        request: RetrieveRequest,
        collector: Arc<ResultCollector>,
        meta_cache: Arc<dyn MetaCache>,
        lb: Arc<dyn LbPolicy>,
    ) -> Self {
        Self {
            ctx,
            db: db.into(),
            collection_name: collection_name.into(),
            request,
            collector,
            meta_cache,
            lb,
        }
    }

    /// 包装成路由策略使用的闭包
    pub fn into_exec(self: Arc<Self>) -> ShardQueryFn {
        Arc::new(move |node_id: i64, client: Arc<dyn QueryNodeClient>, channels: Vec<String>| {
            let dispatcher = self.clone();
            async move { dispatcher.query_shard(node_id, client, channels).await }.boxed()
        })
    }

    pub async fn query_shard(
        &self,
        node_id: i64,
        client: Arc<dyn QueryNodeClient>,
        channels: Vec<String>,
    ) -> ProxyResult<()> {
        // 每次调用各自拷贝请求，只改目标节点
        let mut req = self.request.clone();
        req.base.target_id = node_id;
        let request = ShardQueryRequest {
            req,
            dml_channels: channels.clone(),
            scope: DataScope::All,
        };

        let result = match self.ctx.run(client.query(request)).await {
            Ok(result) => result,
            Err(err) if err.is_canceled_or_timeout() => {
                log::debug!(
                    "分片查询被取消, node={}, channels={:?}, err={}",
                    node_id,
                    channels,
                    err
                );
                return Err(err);
            }
            Err(err) => {
                log::warn!(
                    "分片查询通信失败, collection={}, node={}, channels={:?}, err={}",
                    self.collection_name,
                    node_id,
                    channels,
                    err
                );
                metrics::counter!("proxy_shard_query_failures", "reason" => "transport")
                    .increment(1);
                self.meta_cache
                    .deprecate_shard_cache(&self.db, &self.collection_name);
                return Err(ProxyError::Transport {
                    node_id,
                    reason: err.to_string(),
                });
            }
        };

        match result.status.code {
            ShardErrorCode::Success => {}
            ShardErrorCode::NotShardLeader => {
                log::warn!(
                    "节点不是分片 leader, collection={}, node={}, channels={:?}",
                    self.collection_name,
                    node_id,
                    channels
                );
                metrics::counter!("proxy_shard_query_failures", "reason" => "not_leader")
                    .increment(1);
                self.meta_cache
                    .deprecate_shard_cache(&self.db, &self.collection_name);
                return Err(ProxyError::InvalidShardLeader { node_id });
            }
            ShardErrorCode::UnexpectedError => {
                log::warn!(
                    "分片查询失败, collection={}, node={}, reason={}",
                    self.collection_name,
                    node_id,
                    result.status.reason
                );
                metrics::counter!("proxy_shard_query_failures", "reason" => "shard").increment(1);
                return Err(ProxyError::ShardQuery {
                    node_id,
                    reason: result.status.reason,
                });
            }
        }

        log::debug!(
            "分片查询完成, collection={}, node={}, channels={:?}, rows={}",
            self.collection_name,
            node_id,
            channels,
            result.row_count()
        );

        let cost = result.cost_aggregation;
        if !self.collector.insert(result) {
            metrics::counter!("proxy_shard_query_failures", "reason" => "late").increment(1);
            return Err(ProxyError::Internal(format!(
                "分片结果在合并之后到达, collection={}, node={}",
                self.collection_name, node_id
            )));
        }
        if let Some(cost) = cost {
            self.lb.update_cost_metrics(node_id, &cost);
        }
        Ok(())
    }
}
