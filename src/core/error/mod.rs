//! 统一错误处理
//!
//! 内部统一使用 `ProxyError`，对外通过 `Status` 暴露稳定的错误码。
//! 任何内部错误在离开查询引擎之前都必须经过 `Status::from_error`
//! 或 `Status::from_any` 转换。

use thiserror::Error;

pub mod codes;
pub mod status;

pub use codes::{ErrorCategory, ErrorCode};
pub use status::Status;

/// 查询引擎错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProxyError {
    #[error("参数无效: {0}")]
    ParameterInvalid(String),

    #[error("集合名称不合法: {0}")]
    InvalidCollectionName(String),

    #[error("分区名称不合法: {0}")]
    InvalidPartitionName(String),

    #[error("字段 {0} 不存在")]
    FieldNotFound(String),

    #[error("集合不存在: {0}")]
    CollectionNotFound(String),

    #[error("分区不存在: {0}")]
    PartitionNotFound(String),

    #[error("分区键模式下不支持手动指定分区名称")]
    PartitionKeyConflict,

    #[error("count(*) 查询不支持分页")]
    CountWithPagination,

    #[error("空表达式必须与 limit 一起使用")]
    UnboundedQuery,

    #[error("表达式编译失败: {0}")]
    PlanCompile(String),

    #[error("节点 {node_id} 不是分片 leader")]
    InvalidShardLeader { node_id: i64 },

    #[error("分片查询失败, node={node_id}, reason={reason}")]
    ShardQuery { node_id: i64, reason: String },

    #[error("节点 {node_id} 通信失败: {reason}")]
    Transport { node_id: i64, reason: String },

    #[error("查询结果超过输出上限 {limit} 字节")]
    OutputSizeExceeded { limit: i64 },

    #[error("查询失败: {0}")]
    Routing(Box<ProxyError>),

    #[error("请求已取消")]
    Cancelled,

    #[error("请求超时")]
    Timeout,

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 统一的结果类型
pub type ProxyResult<T> = Result<T, ProxyError>;

impl ProxyError {
    /// 包装层层剥开后的根错误
    pub fn root_cause(&self) -> &ProxyError {
        match self {
            ProxyError::Routing(inner) => inner.root_cause(),
            other => other,
        }
    }

    pub fn to_error_code(&self) -> ErrorCode {
        match self {
            ProxyError::ParameterInvalid(_)
            | ProxyError::PartitionKeyConflict
            | ProxyError::CountWithPagination
            | ProxyError::UnboundedQuery => ErrorCode::ParameterInvalid,
            ProxyError::InvalidCollectionName(_) | ProxyError::InvalidPartitionName(_) => {
                ErrorCode::NameInvalid
            }
            ProxyError::FieldNotFound(_) => ErrorCode::FieldNotFound,
            ProxyError::PlanCompile(_) => ErrorCode::ExprInvalid,
            ProxyError::CollectionNotFound(_) => ErrorCode::CollectionNotFound,
            ProxyError::PartitionNotFound(_) => ErrorCode::PartitionNotFound,
            ProxyError::OutputSizeExceeded { .. } => ErrorCode::ResourceExhausted,
            ProxyError::InvalidShardLeader { .. } => ErrorCode::InvalidShardLeader,
            ProxyError::ShardQuery { .. } => ErrorCode::ShardQueryFailed,
            ProxyError::Transport { .. } => ErrorCode::NodeUnavailable,
            ProxyError::Routing(inner) => inner.to_error_code(),
            ProxyError::Cancelled => ErrorCode::Canceled,
            ProxyError::Timeout => ErrorCode::Timeout,
            ProxyError::Serialization(_) | ProxyError::Internal(_) => ErrorCode::InternalError,
        }
    }

    pub fn is_retriable(&self) -> bool {
        self.to_error_code().is_retriable()
    }

    pub fn is_canceled_or_timeout(&self) -> bool {
        matches!(self.root_cause(), ProxyError::Cancelled | ProxyError::Timeout)
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(err: serde_json::Error) -> Self {
        ProxyError::Serialization(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for ProxyError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ProxyError::Timeout
    }
}
