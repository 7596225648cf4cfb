//! 普通检索的多路归并
//!
//! 每个分片结果已按主键升序排列，这里按主键做 k 路归并：
//! 先跳过 offset 个不同主键，再逐行输出直到达到 limit 或全部耗尽，
//! 同一主键只输出一次。输出过程中累计字节数，超过上限立即失败。

use std::collections::HashSet;
use std::sync::Arc;

use crate::core::error::{ProxyError, ProxyResult};
use crate::core::schema::CollectionSchema;
use crate::core::types::{append_row, ColumnValues, FieldData, PkRef, PrimaryKey};
use crate::query::output_fields::filter_system_fields;
use crate::query::params::{QueryParams, UNLIMITED};
use crate::query::shard::RetrieveResults;

use super::Reducer;

/// 选出各游标当前位置中主键最小的结果下标
///
/// 主键相同时取下标较小的结果。某个结果恰好返回了 `real_limit` 行且已被
/// 读完时，它可能还有未返回的更小主键；`stop_for_best` 模式下此时返回 `None`。
pub fn select_min_pk(
    results: &[&RetrieveResults],
    cursors: &[usize],
    stop_for_best: bool,
    real_limit: i64,
) -> Option<usize> {
    let mut selected: Option<(usize, PkRef<'_>)> = None;
    let mut drained = false;

    for (i, (result, &cursor)) in results.iter().zip(cursors).enumerate() {
        let size = result.row_count();
        if cursor >= size {
            if real_limit != UNLIMITED && size as i64 == real_limit {
                drained = true;
            }
            continue;
        }
        let Some(pk) = result.ids.get(cursor) else {
            continue;
        };
        match selected {
            Some((_, min)) if min <= pk => {}
            _ => selected = Some((i, pk)),
        }
    }

    if stop_for_best && drained {
        return None;
    }
    selected.map(|(i, _)| i)
}

pub struct RetrieveReducer {
    params: QueryParams,
    schema: Arc<CollectionSchema>,
    /// 已去掉系统字段
    output_field_ids: Vec<i64>,
    max_output_size: i64,
}

impl RetrieveReducer {
    pub fn new(
        params: QueryParams,
        schema: Arc<CollectionSchema>,
        output_field_ids: &[i64],
        max_output_size: i64,
    ) -> Self {
        Self {
            params,
            schema,
            output_field_ids: filter_system_fields(output_field_ids),
            max_output_size,
        }
    }

    fn merge(&self, results: &[RetrieveResults]) -> ProxyResult<Vec<FieldData>> {
        let valid: Vec<&RetrieveResults> = results
            .iter()
            .filter(|r| r.row_count() > 0 && !r.fields_data.is_empty())
            .collect();
        let Some(first) = valid.first() else {
            return Ok(Vec::new());
        };

        let mut output: Vec<FieldData> = first.fields_data.iter().map(FieldData::empty_like).collect();
        let mut cursors = vec![0usize; valid.len()];
        let total: usize = valid.iter().map(|r| r.row_count()).sum();

        let stop_for_best = self.params.reduce_stop_for_best;
        // 分片收到的行数上限是 limit + offset，耗尽判断以它为准
        let real_limit = self.params.fetch_limit();
        let loop_end = if self.params.has_limit() && !stop_for_best {
            (self.params.limit as usize).min(total)
        } else {
            total
        };

        let mut seen: HashSet<PrimaryKey> = HashSet::with_capacity(loop_end);

        let mut skipped = 0i64;
        while skipped < self.params.offset {
            let Some(sel) = select_min_pk(&valid, &cursors, stop_for_best, real_limit) else {
                return Ok(output);
            };
            if let Some(pk) = valid[sel].ids.get(cursors[sel]) {
                if seen.insert(pk.to_owned_key()) {
                    skipped += 1;
                }
            }
            cursors[sel] += 1;
        }

        let mut emitted = 0usize;
        let mut duplicates = 0usize;
        let mut size = 0i64;
        while emitted < loop_end {
            let Some(sel) = select_min_pk(&valid, &cursors, stop_for_best, real_limit) else {
                break;
            };
            let cursor = cursors[sel];
            let pk = valid[sel]
                .ids
                .get(cursor)
                .ok_or_else(|| ProxyError::Internal(format!("游标 {} 越界", cursor)))?;

            if seen.insert(pk.to_owned_key()) {
                size += append_row(&mut output, &valid[sel].fields_data, cursor)?;
                emitted += 1;
                if size > self.max_output_size {
                    return Err(ProxyError::OutputSizeExceeded {
                        limit: self.max_output_size,
                    });
                }
            } else {
                duplicates += 1;
            }
            cursors[sel] += 1;
        }

        if duplicates > 0 {
            log::debug!(
                "归并时跳过重复主键, collection={}, duplicates={}",
                self.schema.name,
                duplicates
            );
        }
        log::debug!(
            "检索结果归并完成, collection={}, shards={}, rows={}, bytes={}",
            self.schema.name,
            valid.len(),
            emitted,
            size
        );
        Ok(output)
    }

    /// 按输出字段排列列数据，缺失的字段补默认值，系统字段列被丢弃
    fn align_output_fields(&self, mut merged: Vec<FieldData>) -> ProxyResult<Vec<FieldData>> {
        let rows = merged.iter().map(FieldData::len).max().unwrap_or(0);

        let mut columns = Vec::with_capacity(self.output_field_ids.len());
        for &field_id in &self.output_field_ids {
            if let Some(pos) = merged.iter().position(|f| f.field_id == field_id) {
                columns.push(merged.swap_remove(pos));
                continue;
            }

            let field = self.schema.field_by_id(field_id).ok_or_else(|| {
                ProxyError::Internal(format!(
                    "集合 {} 中不存在字段 id {}",
                    self.schema.name, field_id
                ))
            })?;
            let mut values = ColumnValues::empty_for(field.data_type, field.dim);
            for _ in 0..rows {
                values.push_default();
            }
            columns.push(FieldData::new(
                field_id,
                field.name.clone(),
                field.data_type,
                values,
            ));
        }
        Ok(columns)
    }
}

impl Reducer for RetrieveReducer {
    fn reduce(&self, results: Vec<RetrieveResults>) -> ProxyResult<Vec<FieldData>> {
        let merged = self.merge(&results)?;
        self.align_output_fields(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{FieldSchema, TIMESTAMP_FIELD};
    use crate::core::types::{DataType, Ids};

    fn schema() -> Arc<CollectionSchema> {
        Arc::new(CollectionSchema::new(
            "test",
            vec![
                FieldSchema::new(100, "pk", DataType::Int64).with_primary_key(),
                FieldSchema::new(101, "vector", DataType::FloatVector).with_dim(2),
                FieldSchema::new(102, "score", DataType::Double),
            ],
        ))
    }

    /// 主键列 + 时间戳列
    fn shard(pks: &[i64]) -> RetrieveResults {
        RetrieveResults {
            ids: Ids::Int(pks.to_vec()),
            fields_data: vec![
                FieldData::new(100, "pk", DataType::Int64, ColumnValues::Long(pks.to_vec())),
                FieldData::new(
                    TIMESTAMP_FIELD,
                    "Timestamp",
                    DataType::Int64,
                    ColumnValues::Long(vec![0; pks.len()]),
                ),
            ],
            ..RetrieveResults::default()
        }
    }

    fn reducer(limit: i64, offset: i64, stop_for_best: bool, max_output_size: i64) -> RetrieveReducer {
        RetrieveReducer::new(
            QueryParams {
                limit,
                offset,
                reduce_stop_for_best: stop_for_best,
            },
            schema(),
            &[100, TIMESTAMP_FIELD],
            max_output_size,
        )
    }

    fn pks(fields: &[FieldData]) -> Vec<i64> {
        match &fields[0].values {
            ColumnValues::Long(v) => v.clone(),
            other => panic!("unexpected column {:?}", other),
        }
    }

    #[test]
    fn test_offset_and_limit() {
        let results = vec![shard(&[1, 3, 5]), shard(&[2, 3, 6]), shard(&[4, 5, 7])];
        let fields = reducer(3, 1, false, i64::MAX).reduce(results).expect("reduce");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field_id, 100);
        assert_eq!(pks(&fields), vec![2, 3, 4]);
    }

    #[test]
    fn test_dedup_without_limit() {
        let results = vec![shard(&[1, 2, 4]), shard(&[2, 3, 4])];
        let fields = reducer(UNLIMITED, 0, false, i64::MAX).reduce(results).expect("reduce");
        assert_eq!(pks(&fields), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_offset_counts_distinct_keys() {
        let results = vec![shard(&[1, 2]), shard(&[1, 3])];
        let fields = reducer(10, 1, false, i64::MAX).reduce(results).expect("reduce");
        assert_eq!(pks(&fields), vec![2, 3]);
    }

    #[test]
    fn test_offset_past_end_is_empty() {
        let results = vec![shard(&[1, 2]), shard(&[3])];
        let fields = reducer(5, 10, false, i64::MAX).reduce(results).expect("reduce");
        assert_eq!(fields.len(), 1);
        assert!(fields[0].is_empty());
    }

    #[test]
    fn test_empty_results() {
        let results = vec![shard(&[]), RetrieveResults::default()];
        let fields = reducer(UNLIMITED, 0, false, i64::MAX).reduce(results).expect("reduce");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].data_type, DataType::Int64);
        assert!(fields[0].is_empty());
    }

    #[test]
    fn test_output_size_exceeded() {
        // 每行 16 字节，第二行超出
        let results = vec![shard(&[1, 2, 3])];
        let err = reducer(UNLIMITED, 0, false, 16)
            .reduce(results)
            .expect_err("quota exceeded");
        assert_eq!(err, ProxyError::OutputSizeExceeded { limit: 16 });
        assert_eq!(err.to_error_code(), crate::core::error::ErrorCode::ResourceExhausted);

        let results = vec![shard(&[1])];
        assert!(reducer(UNLIMITED, 0, false, 16).reduce(results).is_ok());
    }

    #[test]
    fn test_missing_field_filled_with_defaults() {
        let reducer = RetrieveReducer::new(
            QueryParams::default(),
            schema(),
            &[100, 102, 101, TIMESTAMP_FIELD],
            i64::MAX,
        );
        let fields = reducer.reduce(vec![shard(&[1, 2])]).expect("reduce");
        let ids: Vec<i64> = fields.iter().map(|f| f.field_id).collect();
        assert_eq!(ids, vec![100, 102, 101]);
        assert_eq!(fields[1].values, ColumnValues::Double(vec![0.0, 0.0]));
        assert_eq!(
            fields[2].values,
            ColumnValues::FloatVector {
                dim: 2,
                data: vec![0.0; 4]
            }
        );
    }

    #[test]
    fn test_select_min_pk_early_stop() {
        let a = shard(&[1, 2]);
        let b = shard(&[3]);
        let results = vec![&a, &b];

        assert_eq!(select_min_pk(&results, &[0, 0], true, 2), Some(0));
        // a 返回了 limit 行且已读完
        assert_eq!(select_min_pk(&results, &[2, 0], true, 2), None);
        assert_eq!(select_min_pk(&results, &[2, 0], false, 2), Some(1));
        assert_eq!(select_min_pk(&results, &[2, 1], false, 2), None);
    }

    #[test]
    fn test_select_min_pk_tie_break() {
        let a = shard(&[5]);
        let b = shard(&[5]);
        assert_eq!(select_min_pk(&[&a, &b], &[0, 0], false, UNLIMITED), Some(0));
    }

    #[test]
    fn test_stop_for_best_stops_at_drained_shard() {
        let results = vec![shard(&[1, 4]), shard(&[2, 3, 5])];
        let fields = reducer(2, 0, true, i64::MAX).reduce(results).expect("reduce");
        // 第一个结果读完后不能再确定 5 是否最小
        assert_eq!(pks(&fields), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_stop_for_best_with_offset() {
        // 每个分片收到 limit + offset = 2 行；第一个分片还有未返回的 3
        let results = vec![shard(&[1, 2]), shard(&[4, 5])];
        let fields = reducer(1, 1, true, i64::MAX).reduce(results).expect("reduce");
        assert_eq!(pks(&fields), vec![2]);
    }
}
