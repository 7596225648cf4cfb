// 查询模块
//
// 查询任务的完整流程：
// - 参数解析、输出字段解析、计划构建、分区解析（pre_execute）
// - 通过路由策略分发到各分片（execute）
// - 归并分片结果（post_execute）

pub mod collector;
pub mod consistency;
pub mod context;
pub mod dispatch;
pub mod lb;
pub mod meta_cache;
pub mod output_fields;
pub mod params;
pub mod partition;
pub mod plan;
pub mod reduce;
pub mod request;
pub mod shard;
pub mod task;
pub mod validate;

pub use consistency::{ConsistencyLevel, ConsistencyResolver};
pub use context::RequestContext;
pub use lb::{CollectionWorkload, LbPolicy, ShardQueryFn};
pub use meta_cache::{CollectionInfo, MemoryMetaCache, MetaCache};
pub use plan::{PlanCompiler, PlanNode};
pub use request::{QueryRequest, QueryResults};
pub use shard::{QueryNodeClient, RetrieveRequest, RetrieveResults};
pub use task::{QueryTask, TaskState};
