//! 集成测试共享工具模块
//!
//! 提供一个小型表达式编译器、可注入故障的查询节点和带重试的路由策略，
//! 用来驱动完整的查询任务生命周期。

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use vecdb_proxy::config::ProxyConfig;
use vecdb_proxy::core::error::{ProxyError, ProxyResult};
use vecdb_proxy::core::schema::{CollectionSchema, FieldSchema, TIMESTAMP_FIELD};
use vecdb_proxy::core::types::{ColumnValues, DataType, FieldData, Ids};
use vecdb_proxy::query::consistency::ConsistencyLevel;
use vecdb_proxy::query::context::RequestContext;
use vecdb_proxy::query::lb::{CollectionWorkload, LbPolicy};
use vecdb_proxy::query::meta_cache::{CollectionInfo, MemoryMetaCache, ShardLeader};
use vecdb_proxy::query::plan::{CompareOp, Expr, GenericValue, PlanCompiler, PlanNode};
use vecdb_proxy::query::request::QueryRequest;
use vecdb_proxy::query::shard::{
    CostAggregation, QueryNodeClient, RetrieveResults, ShardErrorCode, ShardQueryRequest,
    ShardStatus,
};
use vecdb_proxy::query::task::QueryTask;

pub const DB: &str = "default";
pub const COLLECTION: &str = "book";
pub const PK_FIELD_ID: i64 = 100;
pub const EMBEDDING_FIELD_ID: i64 = 101;
pub const SCORE_FIELD_ID: i64 = 102;
pub const AUTHOR_FIELD_ID: i64 = 103;

/// id(主键) / embedding(向量) / score(标量)
pub fn book_schema() -> CollectionSchema {
    CollectionSchema::new(
        COLLECTION,
        vec![
            FieldSchema::new(PK_FIELD_ID, "id", DataType::Int64).with_primary_key(),
            FieldSchema::new(EMBEDDING_FIELD_ID, "embedding", DataType::FloatVector).with_dim(2),
            FieldSchema::new(SCORE_FIELD_ID, "score", DataType::Double),
        ],
    )
}

/// 在 book_schema 基础上增加分区键字段 author
pub fn partitioned_book_schema() -> CollectionSchema {
    let mut schema = book_schema();
    schema.fields.push(
        FieldSchema::new(AUTHOR_FIELD_ID, "author", DataType::VarChar).with_partition_key(),
    );
    schema
}

/// 只认识 `field in [..]`、`field == v`，其余表达式原样保留
pub struct TestCompiler;

fn parse_value(raw: &str) -> ProxyResult<GenericValue> {
    let raw = raw.trim();
    if let Some(s) = raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        return Ok(GenericValue::String(s.to_string()));
    }
    raw.parse::<i64>()
        .map(GenericValue::Int64)
        .map_err(|_| ProxyError::PlanCompile(format!("无法解析常量 {}", raw)))
}

fn field_id(schema: &CollectionSchema, name: &str) -> ProxyResult<i64> {
    schema
        .field_by_name(name.trim())
        .map(|f| f.field_id)
        .ok_or_else(|| ProxyError::PlanCompile(format!("字段 {} 不存在", name.trim())))
}

impl PlanCompiler for TestCompiler {
    fn create_retrieve_plan(&self, schema: &CollectionSchema, expr: &str) -> ProxyResult<PlanNode> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Ok(PlanNode::retrieve(Some(Expr::AlwaysTrue)));
        }

        if let Some((field, list)) = expr.split_once(" in ") {
            let list = list
                .trim()
                .strip_prefix('[')
                .and_then(|s| s.strip_suffix(']'))
                .ok_or_else(|| ProxyError::PlanCompile(expr.to_string()))?;
            let values = list
                .split(',')
                .filter(|v| !v.trim().is_empty())
                .map(parse_value)
                .collect::<ProxyResult<Vec<_>>>()?;
            return Ok(PlanNode::retrieve(Some(Expr::Term {
                field_id: field_id(schema, field)?,
                values,
            })));
        }

        if let Some((field, value)) = expr.split_once("==") {
            return Ok(PlanNode::retrieve(Some(Expr::Compare {
                field_id: field_id(schema, field)?,
                op: CompareOp::Equal,
                value: parse_value(value)?,
            })));
        }

        Ok(PlanNode::retrieve(Some(Expr::Opaque(expr.to_string()))))
    }
}

/// 持有一个分片数据的查询节点
pub struct FakeQueryNode {
    pub node_id: i64,
    pks: Vec<i64>,
    not_leader_remaining: AtomicUsize,
    failure: Mutex<Option<String>>,
    pub requests: Mutex<Vec<ShardQueryRequest>>,
}

impl FakeQueryNode {
    pub fn new(node_id: i64, pks: &[i64]) -> Self {
        let mut pks = pks.to_vec();
        pks.sort_unstable();
        pks.dedup();
        Self {
            node_id,
            pks,
            not_leader_remaining: AtomicUsize::new(0),
            failure: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 前 `times` 次调用返回 NotShardLeader
    pub fn fail_not_leader(&self, times: usize) {
        self.not_leader_remaining.store(times, Ordering::SeqCst);
    }

    pub fn fail_with(&self, reason: &str) {
        *self.failure.lock() = Some(reason.to_string());
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn matching_pks(&self, plan: &PlanNode) -> Vec<i64> {
        let keep = |pk: &i64| match &plan.query.predicates {
            Some(Expr::Term { field_id, values }) if *field_id == PK_FIELD_ID => {
                values.contains(&GenericValue::Int64(*pk))
            }
            Some(Expr::Compare {
                field_id,
                op: CompareOp::Equal,
                value,
            }) if *field_id == PK_FIELD_ID => value == &GenericValue::Int64(*pk),
            _ => true,
        };
        self.pks.iter().copied().filter(keep).collect()
    }

    fn column(field_id: i64, pks: &[i64]) -> FieldData {
        match field_id {
            PK_FIELD_ID => FieldData::new(field_id, "id", DataType::Int64, ColumnValues::Long(pks.to_vec())),
            EMBEDDING_FIELD_ID => FieldData::new(
                field_id,
                "embedding",
                DataType::FloatVector,
                ColumnValues::FloatVector {
                    dim: 2,
                    data: pks.iter().flat_map(|pk| [*pk as f32, 0.0]).collect(),
                },
            ),
            SCORE_FIELD_ID => FieldData::new(
                field_id,
                "score",
                DataType::Double,
                ColumnValues::Double(pks.iter().map(|pk| *pk as f64 * 1.5).collect()),
            ),
            AUTHOR_FIELD_ID => FieldData::new(
                field_id,
                "author",
                DataType::VarChar,
                ColumnValues::String(pks.iter().map(|pk| format!("author_{}", pk)).collect()),
            ),
            TIMESTAMP_FIELD => FieldData::new(
                field_id,
                "Timestamp",
                DataType::Int64,
                ColumnValues::Long(vec![1; pks.len()]),
            ),
            _ => FieldData::new(field_id, "unknown", DataType::Int64, ColumnValues::Long(vec![0; pks.len()])),
        }
    }
}

#[async_trait]
impl QueryNodeClient for FakeQueryNode {
    async fn query(&self, request: ShardQueryRequest) -> ProxyResult<RetrieveResults> {
        self.requests.lock().push(request.clone());

        if self
            .not_leader_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Ok(RetrieveResults {
                status: ShardStatus::new(ShardErrorCode::NotShardLeader, "leader moved"),
                source_id: self.node_id,
                ..RetrieveResults::default()
            });
        }
        if let Some(reason) = self.failure.lock().clone() {
            return Ok(RetrieveResults {
                status: ShardStatus::new(ShardErrorCode::UnexpectedError, reason),
                source_id: self.node_id,
                ..RetrieveResults::default()
            });
        }

        let plan = PlanNode::deserialize(&request.req.serialized_expr_plan)?;
        let mut pks = self.matching_pks(&plan);
        let cost = Some(CostAggregation {
            response_time_ns: 1_000,
            service_time_ns: 500,
            total_nq: 1,
        });

        if request.req.is_count {
            return Ok(RetrieveResults {
                source_id: self.node_id,
                fields_data: vec![FieldData::new(
                    0,
                    "count(*)",
                    DataType::Int64,
                    ColumnValues::Long(vec![pks.len() as i64]),
                )],
                cost_aggregation: cost,
                ..RetrieveResults::default()
            });
        }

        if request.req.limit >= 0 {
            pks.truncate(request.req.limit as usize);
        }
        let fields_data = request
            .req
            .output_fields_id
            .iter()
            .map(|id| Self::column(*id, &pks))
            .collect();
        Ok(RetrieveResults {
            status: ShardStatus::success(),
            source_id: self.node_id,
            ids: Ids::Int(pks),
            fields_data,
            cost_aggregation: cost,
        })
    }
}

/// 每个 channel 依次尝试其 leader 列表，遇到可重试错误换下一个
pub struct FakeLbPolicy {
    meta: Arc<MemoryMetaCache>,
    clients: HashMap<i64, Arc<FakeQueryNode>>,
    leaders: Vec<ShardLeader>,
    max_attempts: usize,
    pub costs: Mutex<Vec<(i64, CostAggregation)>>,
}

impl FakeLbPolicy {
    fn current_leaders(&self, db: &str, collection: &str) -> Arc<Vec<ShardLeader>> {
        if let Some(leaders) = self.meta.get_shard_leaders(db, collection) {
            return leaders;
        }
        self.meta
            .update_shard_leaders(db, collection, self.leaders.clone());
        Arc::new(self.leaders.clone())
    }

    async fn execute_channel(
        &self,
        workload: &CollectionWorkload,
        channel: String,
    ) -> ProxyResult<()> {
        let mut last_err = ProxyError::Internal(format!("channel {} 没有可用 leader", channel));
        for attempt in 0..self.max_attempts {
            let leaders = self.current_leaders(&workload.db, &workload.collection_name);
            let Some(leader) = leaders.iter().find(|l| l.channel == channel) else {
                return Err(last_err);
            };
            if leader.node_ids.is_empty() {
                return Err(last_err);
            }
            let node_id = leader.node_ids[attempt % leader.node_ids.len()];
            let client: Arc<dyn QueryNodeClient> = match self.clients.get(&node_id) {
                Some(client) => client.clone(),
                None => return Err(last_err),
            };

            match (workload.exec)(node_id, client, vec![channel.clone()]).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_retriable() => last_err = err,
                Err(err) => return Err(err),
            }
        }
        Err(last_err)
    }
}

#[async_trait]
impl LbPolicy for FakeLbPolicy {
    async fn execute(&self, _ctx: &RequestContext, workload: CollectionWorkload) -> ProxyResult<()> {
        let channels: Vec<String> = self.leaders.iter().map(|l| l.channel.clone()).collect();
        let futures = channels
            .into_iter()
            .map(|channel| self.execute_channel(&workload, channel));
        futures::future::try_join_all(futures).await?;
        Ok(())
    }

    fn update_cost_metrics(&self, node_id: i64, cost: &CostAggregation) {
        self.costs.lock().push((node_id, *cost));
    }
}

/// 一个集合、每个分片一个查询节点
pub struct TestCluster {
    pub meta: Arc<MemoryMetaCache>,
    pub lb: Arc<FakeLbPolicy>,
    pub nodes: Vec<Arc<FakeQueryNode>>,
    pub config: Arc<ProxyConfig>,
}

impl TestCluster {
    pub fn new(shards: &[&[i64]]) -> Self {
        Self::with_schema(book_schema(), ConsistencyLevel::Strong, shards, ProxyConfig::default())
    }

    pub fn with_config(shards: &[&[i64]], config: ProxyConfig) -> Self {
        Self::with_schema(book_schema(), ConsistencyLevel::Strong, shards, config)
    }

    pub fn with_schema(
        schema: CollectionSchema,
        consistency_level: ConsistencyLevel,
        shards: &[&[i64]],
        config: ProxyConfig,
    ) -> Self {
        let meta = Arc::new(MemoryMetaCache::new());
        meta.add_collection(
            DB,
            CollectionInfo {
                collection_id: 1000,
                consistency_level,
            },
            schema,
            vec![
                ("_default_0".to_string(), 10),
                ("_default_1".to_string(), 11),
                ("_default_2".to_string(), 12),
                ("_default_3".to_string(), 13),
            ],
        );

        let nodes: Vec<Arc<FakeQueryNode>> = shards
            .iter()
            .enumerate()
            .map(|(i, pks)| Arc::new(FakeQueryNode::new(i as i64 + 1, pks)))
            .collect();
        let leaders = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| ShardLeader {
                channel: format!("dml_{}", i),
                node_ids: vec![node.node_id],
            })
            .collect();
        let clients = nodes.iter().map(|n| (n.node_id, n.clone())).collect();

        let lb = Arc::new(FakeLbPolicy {
            meta: meta.clone(),
            clients,
            leaders,
            max_attempts: 3,
            costs: Mutex::new(Vec::new()),
        });

        Self {
            meta,
            lb,
            nodes,
            config: Arc::new(config),
        }
    }

    pub fn task(&self, ctx: RequestContext, request: QueryRequest) -> QueryTask {
        QueryTask::new(
            ctx,
            request,
            self.config.clone(),
            self.meta.clone(),
            Arc::new(TestCompiler),
            self.lb.clone(),
        )
    }

    pub fn total_requests(&self) -> usize {
        self.nodes.iter().map(|n| n.request_count()).sum()
    }
}

pub fn request() -> QueryRequest {
    QueryRequest::new(DB, COLLECTION)
}

/// 取出 Int64 列
pub fn long_column(field: &FieldData) -> Vec<i64> {
    match &field.values {
        ColumnValues::Long(v) => v.clone(),
        other => panic!("expected int64 column, got {:?}", other),
    }
}
