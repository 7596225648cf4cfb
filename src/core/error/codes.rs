//! 对外错误码定义
//!
//! 错误码格式: XXYY
//! - XX: 错误类别 (00=成功, 01=参数, 02=资源, 03=路由, 04=取消, 09=系统)
//! - YY: 具体错误
//!
//! 错误码一旦定义不应随意修改，客户端依赖其数值。

use serde::{Deserialize, Serialize};

/// 对外错误码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    // ==================== 成功 (00xx) ====================
    Success = 0,

    // ==================== 参数错误 (01xx) ====================
    /// 通用参数错误
    ParameterInvalid = 100,
    /// 输出字段不存在
    FieldNotFound = 101,
    /// 集合或分区名称不合法
    NameInvalid = 102,
    /// 过滤表达式编译失败
    ExprInvalid = 103,

    // ==================== 资源错误 (02xx) ====================
    CollectionNotFound = 200,
    PartitionNotFound = 201,
    /// 结果大小超过配额
    ResourceExhausted = 202,

    // ==================== 路由错误 (03xx) ====================
    /// 目标节点已不是分片 leader
    InvalidShardLeader = 300,
    /// 分片返回非成功状态
    ShardQueryFailed = 301,
    /// 节点不可达
    NodeUnavailable = 302,

    // ==================== 取消 (04xx) ====================
    Canceled = 400,
    Timeout = 401,

    // ==================== 系统错误 (09xx) ====================
    InternalError = 900,
    Unexpected = 999,
}

impl ErrorCode {
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(ErrorCode::Success),
            100 => Some(ErrorCode::ParameterInvalid),
            101 => Some(ErrorCode::FieldNotFound),
            102 => Some(ErrorCode::NameInvalid),
            103 => Some(ErrorCode::ExprInvalid),
            200 => Some(ErrorCode::CollectionNotFound),
            201 => Some(ErrorCode::PartitionNotFound),
            202 => Some(ErrorCode::ResourceExhausted),
            300 => Some(ErrorCode::InvalidShardLeader),
            301 => Some(ErrorCode::ShardQueryFailed),
            302 => Some(ErrorCode::NodeUnavailable),
            400 => Some(ErrorCode::Canceled),
            401 => Some(ErrorCode::Timeout),
            900 => Some(ErrorCode::InternalError),
            999 => Some(ErrorCode::Unexpected),
            _ => None,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self.as_i32() {
            0 => ErrorCategory::Success,
            100..=199 => ErrorCategory::Parameter,
            200..=299 => ErrorCategory::Resource,
            300..=399 => ErrorCategory::Routing,
            400..=499 => ErrorCategory::Cancellation,
            _ => ErrorCategory::System,
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Success => "成功",
            ErrorCode::ParameterInvalid => "参数无效",
            ErrorCode::FieldNotFound => "字段不存在",
            ErrorCode::NameInvalid => "名称不合法",
            ErrorCode::ExprInvalid => "表达式无效",
            ErrorCode::CollectionNotFound => "集合不存在",
            ErrorCode::PartitionNotFound => "分区不存在",
            ErrorCode::ResourceExhausted => "资源不足",
            ErrorCode::InvalidShardLeader => "分片 leader 无效",
            ErrorCode::ShardQueryFailed => "分片查询失败",
            ErrorCode::NodeUnavailable => "节点不可用",
            ErrorCode::Canceled => "请求已取消",
            ErrorCode::Timeout => "请求超时",
            ErrorCode::InternalError => "内部服务器错误",
            ErrorCode::Unexpected => "未知错误",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// 判断错误是否可重试
    ///
    /// 只有拓扑变化类错误可以换一个 leader 重试
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ErrorCode::InvalidShardLeader | ErrorCode::NodeUnavailable
        )
    }
}

impl Default for ErrorCode {
    fn default() -> Self {
        ErrorCode::Success
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.as_i32(), self.default_message())
    }
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Success,
    Parameter,
    Resource,
    Routing,
    Cancellation,
    System,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_roundtrip() {
        for code in [
            ErrorCode::Success,
            ErrorCode::FieldNotFound,
            ErrorCode::InvalidShardLeader,
            ErrorCode::Timeout,
            ErrorCode::Unexpected,
        ] {
            assert_eq!(ErrorCode::from_i32(code.as_i32()), Some(code));
        }
        assert_eq!(ErrorCode::from_i32(12345), None);
    }

    #[test]
    fn test_error_code_category() {
        assert_eq!(ErrorCode::ParameterInvalid.category(), ErrorCategory::Parameter);
        assert_eq!(ErrorCode::ResourceExhausted.category(), ErrorCategory::Resource);
        assert_eq!(ErrorCode::InvalidShardLeader.category(), ErrorCategory::Routing);
        assert_eq!(ErrorCode::Canceled.category(), ErrorCategory::Cancellation);
        assert_eq!(ErrorCode::Unexpected.category(), ErrorCategory::System);
    }

    #[test]
    fn test_retriable_codes() {
        assert!(ErrorCode::InvalidShardLeader.is_retriable());
        assert!(ErrorCode::NodeUnavailable.is_retriable());
        assert!(!ErrorCode::ShardQueryFailed.is_retriable());
        assert!(!ErrorCode::ResourceExhausted.is_retriable());
    }
}
