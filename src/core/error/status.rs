//! 对外状态对象
//!
//! 调用方（RPC 处理器）直接把 `Status` 写入响应，内部错误类型不会越过接口边界。

use serde::{Deserialize, Serialize};

use super::codes::ErrorCode;
use super::{ProxyError, ProxyResult};

/// 对外状态
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// 稳定的数字错误码
    pub code: i32,
    /// 根因描述
    pub reason: String,
    /// 是否可以重试
    pub retriable: bool,
    /// 完整的错误链描述
    pub detail: String,
}

impl Status {
    pub fn success() -> Self {
        Self::default()
    }

    /// 分类函数：先识别类型化错误，再识别取消/超时，其余归为未知错误
    pub fn from_error(err: &ProxyError) -> Self {
        let code = err.to_error_code();
        Self {
            code: code.as_i32(),
            reason: err.root_cause().to_string(),
            retriable: code.is_retriable(),
            detail: err.to_string(),
        }
    }

    /// 处理来自外部协作者的非类型化错误
    pub fn from_any(err: &anyhow::Error) -> Self {
        if let Some(proxy_err) = err.downcast_ref::<ProxyError>() {
            return Self::from_error(proxy_err);
        }

        let code = if err.downcast_ref::<tokio::time::error::Elapsed>().is_some() {
            ErrorCode::Timeout
        } else if err
            .downcast_ref::<std::io::Error>()
            .is_some_and(|e| e.kind() == std::io::ErrorKind::TimedOut)
        {
            ErrorCode::Timeout
        } else {
            ErrorCode::Unexpected
        };

        Self {
            code: code.as_i32(),
            reason: err.root_cause().to_string(),
            retriable: false,
            detail: format!("{:#}", err),
        }
    }

    pub fn from_result<T>(result: &ProxyResult<T>) -> Self {
        match result {
            Ok(_) => Self::success(),
            Err(e) => Self::from_error(e),
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::from_i32(self.code).unwrap_or(ErrorCode::Unexpected)
    }

    pub fn is_ok(&self) -> bool {
        self.code == ErrorCode::Success.as_i32()
    }
}
