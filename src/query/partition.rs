//! 分区解析
//!
//! 普通集合按请求给出的分区名解析分区 id；分区键集合不允许手动指定分区，
//! 而是从过滤谓词中提取分区键取值，哈希后映射到具体分区。

use crate::core::error::{ProxyError, ProxyResult};
use crate::core::murmur::{hash32_int64, hash32_str};
use crate::core::schema::CollectionSchema;
use crate::query::meta_cache::MetaCache;
use crate::query::plan::{CompareOp, Expr, GenericValue, PlanNode};
use crate::query::validate::validate_partition_name;

/// 从谓词中提取分区键取值
///
/// 返回 `None` 表示谓词没有约束分区键，需要查询所有分区。
pub fn parse_partition_keys(expr: &Expr, partition_key_field_id: i64) -> Option<Vec<GenericValue>> {
    match expr {
        Expr::Term { field_id, values } if *field_id == partition_key_field_id => {
            Some(values.clone())
        }
        Expr::Compare {
            field_id,
            op: CompareOp::Equal,
            value,
        } if *field_id == partition_key_field_id => Some(vec![value.clone()]),
        Expr::And(left, right) => {
            match (
                parse_partition_keys(left, partition_key_field_id),
                parse_partition_keys(right, partition_key_field_id),
            ) {
                (Some(l), Some(r)) => Some(l.into_iter().filter(|v| r.contains(v)).collect()),
                (Some(keys), None) | (None, Some(keys)) => Some(keys),
                (None, None) => None,
            }
        }
        Expr::Or(left, right) => {
            let mut keys = parse_partition_keys(left, partition_key_field_id)?;
            keys.extend(parse_partition_keys(right, partition_key_field_id)?);
            Some(keys)
        }
        _ => None,
    }
}

fn hash_key(key: &GenericValue) -> ProxyResult<u32> {
    match key {
        GenericValue::Int64(v) => Ok(hash32_int64(*v)),
        GenericValue::String(v) => Ok(hash32_str(v)),
        other => Err(ProxyError::ParameterInvalid(format!(
            "分区键只支持 int64 或 varchar, 实际取值 {}",
            other
        ))),
    }
}

/// 分区键哈希到分区名，结果去重并保持首次出现顺序
pub fn assign_partition_keys(
    keys: &[GenericValue],
    partition_names: &[String],
) -> ProxyResult<Vec<String>> {
    if partition_names.is_empty() {
        return Err(ProxyError::Internal("分区键集合没有任何分区".to_string()));
    }

    let mut names: Vec<String> = Vec::new();
    for key in keys {
        let idx = hash_key(key)? as usize % partition_names.len();
        let name = &partition_names[idx];
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    Ok(names)
}

/// 解析本次查询要访问的分区 id
///
/// 返回空列表表示查询全部分区。
pub async fn resolve_partition_ids(
    meta_cache: &dyn MetaCache,
    db: &str,
    schema: &CollectionSchema,
    partition_names: &[String],
    plan: &PlanNode,
) -> ProxyResult<Vec<i64>> {
    let collection = schema.name.as_str();

    let Some(partition_key_field) = schema.partition_key_field() else {
        for name in partition_names {
            validate_partition_name(name)?;
        }
        return meta_cache
            .get_partition_ids(db, collection, partition_names)
            .await;
    };

    if !partition_names.is_empty() {
        return Err(ProxyError::PartitionKeyConflict);
    }

    let keys = plan
        .query
        .predicates
        .as_ref()
        .and_then(|expr| parse_partition_keys(expr, partition_key_field.field_id));
    let Some(keys) = keys else {
        return Ok(Vec::new());
    };

    let all_names = meta_cache.get_partition_names(db, collection).await?;
    let hashed = assign_partition_keys(&keys, &all_names)?;
    log::debug!(
        "分区键路由, collection={}, keys={}, partitions={:?}",
        collection,
        keys.len(),
        hashed
    );
    meta_cache.get_partition_ids(db, collection, &hashed).await
}
