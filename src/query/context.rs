//! 请求上下文
//!
//! 携带取消令牌、截止时间和调用者身份，从入口一路传递到每一次分片调用。

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::core::error::{ProxyError, ProxyResult};
use crate::core::tso::{compose_ts_by_time, Timestamp};

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancel: CancellationToken,
    deadline: Option<DateTime<Utc>>,
    username: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        let timeout = chrono::Duration::from_std(timeout)
            .unwrap_or_else(|_| chrono::Duration::days(365 * 100));
        let deadline = Utc::now()
            .checked_add_signed(timeout)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.with_deadline(deadline)
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// 派生子上下文，父上下文取消时子上下文随之取消
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
            username: self.username.clone(),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// 截止时间折算成的超时时间戳，逻辑部分为 0
    pub fn timeout_timestamp(&self) -> Option<Timestamp> {
        self.deadline.map(|d| compose_ts_by_time(d, 0))
    }

    /// 已取消返回 `Cancelled`，已过截止时间返回 `Timeout`
    pub fn err(&self) -> Option<ProxyError> {
        if self.cancel.is_cancelled() {
            return Some(ProxyError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Utc::now() >= deadline => Some(ProxyError::Timeout),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// 等待取消或超时
    pub async fn done(&self) -> ProxyError {
        match self.remaining() {
            Some(remaining) => {
                tokio::select! {
                    _ = self.cancel.cancelled() => ProxyError::Cancelled,
                    _ = tokio::time::sleep(remaining) => ProxyError::Timeout,
                }
            }
            None => {
                self.cancel.cancelled().await;
                ProxyError::Cancelled
            }
        }
    }

    /// 运行 `fut`，取消或超时先发生时放弃它
    pub async fn run<T, F>(&self, fut: F) -> ProxyResult<T>
    where
        F: Future<Output = ProxyResult<T>>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            result = fut => result,
        }
    }

    fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|deadline| {
            (deadline - Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO)
        })
    }
}
