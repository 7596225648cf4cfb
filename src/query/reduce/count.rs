//! count(*) 归并：把各分片返回的行数相加

use crate::core::error::{ProxyError, ProxyResult};
use crate::core::types::{ColumnValues, DataType, FieldData};
use crate::query::plan::COUNT_OUTPUT_FIELD;
use crate::query::shard::RetrieveResults;

use super::Reducer;

#[derive(Debug, Default)]
pub struct CountReducer;

impl CountReducer {
    pub fn new() -> Self {
        Self
    }
}

fn shard_count(result: &RetrieveResults) -> ProxyResult<i64> {
    match result.fields_data.as_slice() {
        [column] => match &column.values {
            ColumnValues::Long(values) if values.len() == 1 => Ok(values[0]),
            _ => Err(ProxyError::Internal(format!(
                "分片 {} 返回的 count 列格式不正确",
                result.source_id
            ))),
        },
        _ => Err(ProxyError::Internal(format!(
            "分片 {} 返回了 {} 列, count 查询应只有一列",
            result.source_id,
            result.fields_data.len()
        ))),
    }
}

impl Reducer for CountReducer {
    fn reduce(&self, results: Vec<RetrieveResults>) -> ProxyResult<Vec<FieldData>> {
        let mut total = 0i64;
        for result in &results {
            total += shard_count(result)?;
        }
        Ok(vec![FieldData::new(
            0,
            COUNT_OUTPUT_FIELD,
            DataType::Int64,
            ColumnValues::Long(vec![total]),
        )])
    }
}
