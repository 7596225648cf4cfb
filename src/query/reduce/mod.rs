//! 分片结果归并
//!
//! 普通检索与 count 查询使用不同的归并策略，任务创建时按计划的
//! `is_count` 选定一次，之后不再分支。

use std::sync::Arc;

use crate::core::error::ProxyResult;
use crate::core::schema::CollectionSchema;
use crate::core::types::FieldData;
use crate::query::params::QueryParams;
use crate::query::plan::PlanNode;
use crate::query::shard::RetrieveResults;

pub mod count;
pub mod retrieve;

pub use count::CountReducer;
pub use retrieve::{select_min_pk, RetrieveReducer};

pub trait Reducer: Send + Sync {
    /// 归并全部分片结果，得到按输出字段排列的列数据
    fn reduce(&self, results: Vec<RetrieveResults>) -> ProxyResult<Vec<FieldData>>;
}

/// 按计划选择归并策略
pub fn create_reducer(
    plan: &PlanNode,
    params: QueryParams,
    schema: Arc<CollectionSchema>,
    output_field_ids: &[i64],
    max_output_size: i64,
) -> Box<dyn Reducer> {
    if plan.is_count() {
        Box::new(CountReducer::new())
    } else {
        Box::new(RetrieveReducer::new(
            params,
            schema,
            output_field_ids,
            max_output_size,
        ))
    }
}
