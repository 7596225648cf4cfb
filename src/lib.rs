//! vecdb-proxy - 向量数据库路由层的查询引擎
//!
//! 把一次客户端查询（过滤表达式 + 输出字段 + 分页参数）编译成检索计划，
//! 分发到集合的所有分片 leader，再把各分片按主键有序的部分结果归并成
//! 去重、分页后的最终结果。
//!
//! 元数据缓存、表达式编译器、路由策略和查询节点客户端都以 trait 注入，
//! 本 crate 只负责查询任务本身的生命周期。

pub mod config;
pub mod core;
pub mod query;
pub mod utils;

pub use crate::config::ProxyConfig;
pub use crate::core::{ErrorCode, ProxyError, ProxyResult, Status};
pub use crate::query::{QueryRequest, QueryResults, QueryTask, RequestContext};
