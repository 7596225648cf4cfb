//! 查询任务
//!
//! 一次客户端查询对应一个 `QueryTask`，按 `on_enqueue → pre_execute →
//! execute → post_execute` 的顺序推进：
//!
//! - pre_execute 做全部校验、编译计划、解析分区和一致性，失败则不会下发任何请求
//! - execute 把分片查询闭包交给路由策略，由它选择 leader 并发调用和重试
//! - post_execute 取走所有分片结果并归并

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::config::ProxyConfig;
use crate::core::error::{ProxyError, ProxyResult};
use crate::core::schema::CollectionSchema;
use crate::core::tso::{compose_ts_by_time, Timestamp};
use crate::core::types::Ids;
use crate::query::collector::ResultCollector;
use crate::query::consistency::{ConsistencyInput, ConsistencyLevel, ConsistencyResolver};
use crate::query::context::RequestContext;
use crate::query::dispatch::ShardDispatcher;
use crate::query::lb::{CollectionWorkload, LbPolicy};
use crate::query::meta_cache::MetaCache;
use crate::query::params::{parse_query_params, take_ignore_growing, QueryParams};
use crate::query::partition::resolve_partition_ids;
use crate::query::plan::{ids_to_expr, PlanBuilder, PlanCompiler, PlanNode};
use crate::query::reduce::create_reducer;
use crate::query::request::{QueryRequest, QueryResults};
use crate::query::shard::{MsgType, RetrieveRequest};
use crate::query::validate::validate_collection_name;

pub const RETRIEVE_TASK_NAME: &str = "RetrieveTask";

/// 查询任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskState {
    #[default]
    Created,
    Enqueued,
    PreExecuting,
    Executing,
    PostExecuting,
    Done,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Done | TaskState::Failed)
    }

    /// 只允许按生命周期向前推进，任何非终态都可以转到失败
    pub fn can_transition_to(&self, target: TaskState) -> bool {
        match (self, target) {
            (TaskState::Done, _) | (TaskState::Failed, _) => false,
            (_, TaskState::Failed) => true,
            (TaskState::Created, TaskState::Enqueued) => true,
            (TaskState::Enqueued, TaskState::PreExecuting) => true,
            (TaskState::PreExecuting, TaskState::Executing) => true,
            (TaskState::Executing, TaskState::PostExecuting) => true,
            (TaskState::PostExecuting, TaskState::Done) => true,
            _ => false,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            TaskState::Created => "已创建",
            TaskState::Enqueued => "已入队",
            TaskState::PreExecuting => "预处理中",
            TaskState::Executing => "执行中",
            TaskState::PostExecuting => "归并中",
            TaskState::Done => "已完成",
            TaskState::Failed => "执行失败",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

pub struct QueryTask {
    ctx: RequestContext,
    request: QueryRequest,
    ids: Option<Ids>,
    config: Arc<ProxyConfig>,
    meta_cache: Arc<dyn MetaCache>,
    compiler: Arc<dyn PlanCompiler>,
    lb: Arc<dyn LbPolicy>,

    state: TaskState,
    retrieve: RetrieveRequest,
    schema: Option<Arc<CollectionSchema>>,
    plan: Option<PlanNode>,
    query_params: QueryParams,
    user_output_fields: Vec<String>,
    consistency_level: ConsistencyLevel,
    collector: Arc<ResultCollector>,
    result: Option<QueryResults>,
    cancelled: bool,
}

impl QueryTask {
    pub fn new(
        ctx: RequestContext,
        request: QueryRequest,
        config: Arc<ProxyConfig>,
        meta_cache: Arc<dyn MetaCache>,
        compiler: Arc<dyn PlanCompiler>,
        lb: Arc<dyn LbPolicy>,
    ) -> Self {
        let mut retrieve = RetrieveRequest::default();
        retrieve.base.timestamp = compose_ts_by_time(Utc::now(), 0);

        Self {
            ctx,
            request,
            ids: None,
            config,
            meta_cache,
            compiler,
            lb,
            state: TaskState::Created,
            retrieve,
            schema: None,
            plan: None,
            query_params: QueryParams::default(),
            user_output_fields: Vec::new(),
            consistency_level: ConsistencyLevel::default(),
            collector: Arc::new(ResultCollector::new()),
            result: None,
            cancelled: false,
        }
    }

    /// 按主键查询，覆盖请求中的过滤表达式
    pub fn with_ids(mut self, ids: Ids) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn id(&self) -> i64 {
        self.retrieve.base.msg_id
    }

    pub fn set_id(&mut self, id: i64) {
        self.retrieve.base.msg_id = id;
    }

    pub fn name(&self) -> &'static str {
        RETRIEVE_TASK_NAME
    }

    pub fn msg_type(&self) -> MsgType {
        self.retrieve.base.msg_type
    }

    pub fn begin_ts(&self) -> Timestamp {
        self.retrieve.base.timestamp
    }

    pub fn end_ts(&self) -> Timestamp {
        self.retrieve.base.timestamp
    }

    /// 调度器分配的开始时间戳
    pub fn set_ts(&mut self, ts: Timestamp) {
        self.retrieve.base.timestamp = ts;
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn context(&self) -> &RequestContext {
        &self.ctx
    }

    /// 下发给分片的请求模板，pre_execute 之后才完整
    pub fn retrieve_request(&self) -> &RetrieveRequest {
        &self.retrieve
    }

    pub fn plan(&self) -> Option<&PlanNode> {
        self.plan.as_ref()
    }

    pub fn consistency_level(&self) -> ConsistencyLevel {
        self.consistency_level
    }

    pub fn result(&self) -> Option<&QueryResults> {
        self.result.as_ref()
    }

    pub fn take_result(&mut self) -> Option<QueryResults> {
        self.result.take()
    }

    /// post_execute 时请求已被取消，因此没有结果
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    fn transition(&mut self, target: TaskState) -> ProxyResult<()> {
        if !self.state.can_transition_to(target) {
            return Err(ProxyError::Internal(format!(
                "任务 {} 状态不能从 {} 转换到 {}",
                self.id(),
                self.state,
                target
            )));
        }
        self.state = target;
        Ok(())
    }

    fn finish_phase<T>(&mut self, phase: &str, result: ProxyResult<T>) -> ProxyResult<T> {
        if let Err(err) = &result {
            log::warn!(
                "查询任务失败, task={}, phase={}, collection={}, err={}",
                self.id(),
                phase,
                self.request.collection_name,
                err
            );
            self.state = TaskState::Failed;
        }
        result
    }

    pub fn on_enqueue(&mut self) -> ProxyResult<()> {
        self.transition(TaskState::Enqueued)?;
        self.retrieve.base.msg_type = MsgType::Retrieve;
        self.retrieve.base.source_id = self.config.common.node_id;
        Ok(())
    }

    pub async fn pre_execute(&mut self) -> ProxyResult<()> {
        self.transition(TaskState::PreExecuting)?;
        let result = self.prepare().await;
        self.finish_phase("pre_execute", result)
    }

    async fn prepare(&mut self) -> ProxyResult<()> {
        let db = self.request.db_name.clone();
        let collection = self.request.collection_name.clone();

        validate_collection_name(&collection)?;
        let collection_id = self.meta_cache.get_collection_id(&db, &collection).await?;
        self.retrieve.collection_id = collection_id;

        let schema = self
            .meta_cache
            .get_collection_schema(&db, &collection)
            .await?;
        if schema.partition_key_field().is_some() && !self.request.partition_names.is_empty() {
            return Err(ProxyError::PartitionKeyConflict);
        }

        self.retrieve.ignore_growing = take_ignore_growing(&mut self.request.query_params)?;
        let params = parse_query_params(
            &self.request.query_params,
            self.config.quota.max_query_result_window,
        )?;
        self.retrieve.reduce_stop_for_best = params.reduce_stop_for_best;
        self.retrieve.limit = params.fetch_limit();

        if let Some(ids) = &self.ids {
            let pk = schema.primary_field().ok_or_else(|| {
                ProxyError::Internal(format!("集合 {} 没有主键字段", collection))
            })?;
            self.request.expr = ids_to_expr(&pk.name, ids);
        }

        let built = PlanBuilder::new(self.compiler.as_ref(), &schema)
            .build(&self.request.expr, &self.request.output_fields)?;
        let mut plan = built.plan;
        PlanBuilder::apply_params(&mut plan, &params)?;

        self.retrieve.partition_ids = resolve_partition_ids(
            self.meta_cache.as_ref(),
            &db,
            &schema,
            &self.request.partition_names,
            &plan,
        )
        .await?;
        self.retrieve.is_count = plan.is_count();
        self.retrieve.output_fields_id = built.output_field_ids;
        self.retrieve.serialized_expr_plan = plan.serialize()?;

        if let Some(username) = self.ctx.username() {
            self.retrieve.username = username.to_string();
        }

        self.retrieve.mvcc_timestamp = self.begin_ts();
        let info = self
            .meta_cache
            .get_collection_info(&db, &collection)
            .await?;
        let (level, guarantee_ts) = ConsistencyResolver::new(self.config.common.graceful_time_ms)
            .resolve(&ConsistencyInput {
                guarantee_ts: self.request.guarantee_timestamp,
                begin_ts: self.begin_ts(),
                level: self.request.consistency_level,
                collection_level: info.consistency_level,
                use_default_consistency: self.request.use_default_consistency,
            });
        self.retrieve.guarantee_timestamp = guarantee_ts;
        self.consistency_level = level;

        if let Some(timeout_ts) = self.ctx.timeout_timestamp() {
            self.retrieve.timeout_timestamp = timeout_ts;
        }

        log::debug!(
            "查询预处理完成, task={}, collection={}, partition_ids={:?}, limit={}, offset={}, \
             is_count={}, consistency={:?}, guarantee_ts={}",
            self.id(),
            collection,
            self.retrieve.partition_ids,
            self.retrieve.limit,
            params.offset,
            self.retrieve.is_count,
            level,
            guarantee_ts
        );

        self.query_params = params;
        self.user_output_fields = built.user_output_fields;
        self.schema = Some(schema);
        self.plan = Some(plan);
        Ok(())
    }

    pub async fn execute(&mut self) -> ProxyResult<()> {
        self.transition(TaskState::Executing)?;
        let result = self.dispatch().await;
        self.finish_phase("execute", result)
    }

    async fn dispatch(&mut self) -> ProxyResult<()> {
        let started = Instant::now();
        let dispatcher = Arc::new(ShardDispatcher::new(
            self.ctx.clone(),
            self.request.db_name.clone(),
            self.request.collection_name.clone(),
            self.retrieve.clone(),
            self.collector.clone(),
            self.meta_cache.clone(),
            self.lb.clone(),
        ));
        let workload = CollectionWorkload {
            db: self.request.db_name.clone(),
            collection_id: self.retrieve.collection_id,
            collection_name: self.request.collection_name.clone(),
            nq: 1,
            exec: dispatcher.into_exec(),
        };

        self.lb
            .execute(&self.ctx, workload)
            .await
            .map_err(|err| ProxyError::Routing(Box::new(err)))?;

        metrics::histogram!("proxy_query_dispatch_seconds").record(started.elapsed().as_secs_f64());
        log::debug!(
            "分片查询全部完成, task={}, collection={}, results={}",
            self.id(),
            self.request.collection_name,
            self.collector.len()
        );
        Ok(())
    }

    pub async fn post_execute(&mut self) -> ProxyResult<()> {
        self.transition(TaskState::PostExecuting)?;

        if let Some(err) = self.ctx.err() {
            log::warn!(
                "查询已结束，跳过结果归并, task={}, collection={}, reason={}",
                self.id(),
                self.request.collection_name,
                err
            );
            self.cancelled = true;
            return self.transition(TaskState::Done);
        }

        let result = self.reduce();
        self.finish_phase("post_execute", result)?;
        self.transition(TaskState::Done)
    }

    fn reduce(&mut self) -> ProxyResult<()> {
        let plan = self
            .plan
            .as_ref()
            .ok_or_else(|| ProxyError::Internal("归并前计划尚未构建".to_string()))?;
        let schema = self
            .schema
            .clone()
            .ok_or_else(|| ProxyError::Internal("归并前 schema 尚未加载".to_string()))?;

        let results = self.collector.drain();
        let shards = results.len();
        let started = Instant::now();

        let reducer = create_reducer(
            plan,
            self.query_params,
            schema,
            &self.retrieve.output_fields_id,
            self.config.quota.max_output_size,
        );
        let fields_data = reducer.reduce(results)?;

        metrics::histogram!("proxy_query_reduce_seconds").record(started.elapsed().as_secs_f64());

        let results = QueryResults {
            collection_name: self.request.collection_name.clone(),
            fields_data,
            output_fields: self.user_output_fields.clone(),
        };
        log::debug!(
            "查询结果归并完成, task={}, collection={}, shards={}, rows={}",
            self.id(),
            self.request.collection_name,
            shards,
            results.row_count()
        );
        self.result = Some(results);
        Ok(())
    }

    /// 依次执行所有阶段
    pub async fn run(&mut self) -> ProxyResult<()> {
        if self.state == TaskState::Created {
            self.on_enqueue()?;
        }
        self.pre_execute().await?;
        self.execute().await?;
        self.post_execute().await
    }
}
