//! 输出字段解析
//!
//! 把用户请求的字段名翻译成字段 id，保证主键字段总在其中且只出现一次。

use crate::core::error::{ProxyError, ProxyResult};
use crate::core::schema::{is_system_field, CollectionSchema};

/// 输出所有非向量用户字段的通配符
pub const WILDCARD_OUTPUT: &str = "*";

/// 展开通配符并去重
///
/// 返回 (下发用的字段名, 返回给用户的字段名)。前者总包含主键字段，
/// 后者只包含用户实际请求的字段。
pub fn translate_output_fields(
    output_fields: &[String],
    schema: &CollectionSchema,
) -> ProxyResult<(Vec<String>, Vec<String>)> {
    let mut user_output_fields: Vec<String> = Vec::with_capacity(output_fields.len());

    for name in output_fields {
        let name = name.trim();
        if name == WILDCARD_OUTPUT {
            for field in schema.scalar_user_fields() {
                if !user_output_fields.iter().any(|n| n == &field.name) {
                    user_output_fields.push(field.name.clone());
                }
            }
        } else if !user_output_fields.iter().any(|n| n == name) {
            user_output_fields.push(name.to_string());
        }
    }

    let mut result_fields = user_output_fields.clone();
    if let Some(pk) = schema.primary_field() {
        if !result_fields.iter().any(|n| n == &pk.name) {
            result_fields.push(pk.name.clone());
        }
    }

    Ok((result_fields, user_output_fields))
}

/// 字段名翻译为字段 id
///
/// 空请求返回所有非向量用户字段；否则逐个解析，任一字段不存在即失败。
pub fn translate_to_output_field_ids(
    output_fields: &[String],
    schema: &CollectionSchema,
) -> ProxyResult<Vec<i64>> {
    if output_fields.is_empty() {
        return Ok(schema.scalar_user_fields().map(|f| f.field_id).collect());
    }

    let mut field_ids = Vec::with_capacity(output_fields.len() + 1);
    for name in output_fields {
        let field = schema
            .field_by_name(name)
            .ok_or_else(|| ProxyError::FieldNotFound(name.clone()))?;
        if !field_ids.contains(&field.field_id) {
            field_ids.push(field.field_id);
        }
    }

    // 主键字段必须出现在输出中
    let pk_field_id = schema
        .primary_field()
        .map(|f| f.field_id)
        .ok_or_else(|| ProxyError::Internal(format!("集合 {} 没有主键字段", schema.name)))?;
    if !field_ids.contains(&pk_field_id) {
        field_ids.push(pk_field_id);
    }

    Ok(field_ids)
}

/// 去掉行 id、时间戳等系统字段
pub fn filter_system_fields(field_ids: &[i64]) -> Vec<i64> {
    field_ids
        .iter()
        .copied()
        .filter(|id| !is_system_field(*id))
        .collect()
}
