//! 分片查询 RPC 契约
//!
//! 代理与查询节点之间交换的请求和结果结构，以及查询节点客户端接口。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::error::ProxyResult;
use crate::core::tso::Timestamp;
use crate::core::types::{FieldData, Ids};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MsgType {
    #[default]
    Undefined,
    Retrieve,
}

/// 消息公共头
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgBase {
    pub msg_type: MsgType,
    pub msg_id: i64,
    pub timestamp: Timestamp,
    /// 发送方节点 id
    pub source_id: i64,
    /// 接收方节点 id，每次分片调用前填写
    pub target_id: i64,
}

/// 下发给每个分片的检索请求
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrieveRequest {
    pub base: MsgBase,
    pub collection_id: i64,
    pub partition_ids: Vec<i64>,
    pub serialized_expr_plan: Vec<u8>,
    pub output_fields_id: Vec<i64>,
    pub mvcc_timestamp: Timestamp,
    pub guarantee_timestamp: Timestamp,
    pub timeout_timestamp: Timestamp,
    pub limit: i64,
    pub ignore_growing: bool,
    pub is_count: bool,
    pub reduce_stop_for_best: bool,
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DataScope {
    #[default]
    All,
    Streaming,
    Historical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardQueryRequest {
    pub req: RetrieveRequest,
    pub dml_channels: Vec<String>,
    pub scope: DataScope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShardErrorCode {
    #[default]
    Success,
    NotShardLeader,
    UnexpectedError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardStatus {
    pub code: ShardErrorCode,
    pub reason: String,
}

impl ShardStatus {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn new(code: ShardErrorCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == ShardErrorCode::Success
    }
}

/// 查询节点上报的开销，供路由策略做负载均衡
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostAggregation {
    pub response_time_ns: u64,
    pub service_time_ns: u64,
    pub total_nq: i64,
}

/// 单个分片的检索结果
///
/// `ids` 严格按主键升序；`fields_data` 每列行数与 `ids` 相同。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrieveResults {
    pub status: ShardStatus,
    pub source_id: i64,
    pub ids: Ids,
    pub fields_data: Vec<FieldData>,
    pub cost_aggregation: Option<CostAggregation>,
}

impl RetrieveResults {
    pub fn row_count(&self) -> usize {
        self.ids.len()
    }
}

/// 查询节点客户端
///
/// 返回 `Err` 表示传输层失败；节点侧的业务失败通过 `RetrieveResults::status` 表达。
#[async_trait]
pub trait QueryNodeClient: Send + Sync {
    async fn query(&self, request: ShardQueryRequest) -> ProxyResult<RetrieveResults>;
}
