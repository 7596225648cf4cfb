//! 查询参数解析
//!
//! 请求以键值对列表携带分页和行为参数，不认识的键直接忽略。

use serde::{Deserialize, Serialize};

use crate::core::error::{ProxyError, ProxyResult};

pub const LIMIT_KEY: &str = "limit";
pub const OFFSET_KEY: &str = "offset";
pub const REDUCE_STOP_FOR_BEST_KEY: &str = "reduce_stop_for_best";
pub const IGNORE_GROWING_KEY: &str = "ignore_growing";

/// 不限制返回行数
pub const UNLIMITED: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub key: String,
    pub value: String,
}

impl KeyValuePair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// 解析后的分页参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryParams {
    pub limit: i64,
    pub offset: i64,
    pub reduce_stop_for_best: bool,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            limit: UNLIMITED,
            offset: 0,
            reduce_stop_for_best: false,
        }
    }
}

impl QueryParams {
    pub fn has_limit(&self) -> bool {
        self.limit != UNLIMITED
    }

    /// 下发给分片的行数：limit + offset，合并时再在本地跳过 offset
    pub fn fetch_limit(&self) -> i64 {
        if self.has_limit() {
            self.limit + self.offset
        } else {
            UNLIMITED
        }
    }

    /// 是否带有分页
    pub fn is_paginated(&self) -> bool {
        self.has_limit() || self.offset > 0
    }
}

fn get_attr<'a>(key: &str, params: &'a [KeyValuePair]) -> Option<&'a str> {
    params
        .iter()
        .find(|kv| kv.key == key)
        .map(|kv| kv.value.as_str())
}

/// 取出并移除 `ignore_growing`，缺省为 false
pub fn take_ignore_growing(params: &mut Vec<KeyValuePair>) -> ProxyResult<bool> {
    let Some(pos) = params.iter().position(|kv| kv.key == IGNORE_GROWING_KEY) else {
        return Ok(false);
    };
    let kv = params.remove(pos);
    parse_bool(&kv.value).ok_or_else(|| {
        ProxyError::ParameterInvalid(format!("{} [{}] is invalid", IGNORE_GROWING_KEY, kv.value))
    })
}

/// 解析 limit / offset / reduce_stop_for_best
pub fn parse_query_params(
    params: &[KeyValuePair],
    max_query_result_window: i64,
) -> ProxyResult<QueryParams> {
    let mut result = QueryParams::default();

    if let Some(value) = get_attr(REDUCE_STOP_FOR_BEST_KEY, params) {
        result.reduce_stop_for_best = parse_bool(value).ok_or_else(|| {
            ProxyError::ParameterInvalid(format!(
                "value for {} is invalid, expected true or false, actual {}",
                REDUCE_STOP_FOR_BEST_KEY, value
            ))
        })?;
    }

    if let Some(value) = get_attr(OFFSET_KEY, params) {
        result.offset = parse_int(value).ok_or_else(|| {
            ProxyError::ParameterInvalid(format!("{} [{}] is invalid", OFFSET_KEY, value))
        })?;
        if result.offset < 0 {
            return Err(ProxyError::ParameterInvalid(format!(
                "{} [{}] is invalid, should be gte than 0",
                OFFSET_KEY, result.offset
            )));
        }
    }

    if let Some(value) = get_attr(LIMIT_KEY, params) {
        result.limit = parse_int(value).ok_or_else(|| {
            ProxyError::ParameterInvalid(format!("{} [{}] is invalid", LIMIT_KEY, value))
        })?;
        validate_max_query_result_window(result.offset, result.limit, max_query_result_window)?;
    }

    Ok(result)
}

fn validate_max_query_result_window(offset: i64, limit: i64, max_window: i64) -> ProxyResult<()> {
    if limit <= 0 {
        return Err(ProxyError::ParameterInvalid(format!(
            "{} [{}] is invalid, should be greater than 0",
            LIMIT_KEY, limit
        )));
    }
    let depth = offset.saturating_add(limit);
    if depth > max_window {
        return Err(ProxyError::ParameterInvalid(format!(
            "invalid max query result window, (offset+limit) should be in range [1, {}], but got {}",
            max_window, depth
        )));
    }
    Ok(())
}

/// 整数解析，支持 0x / 0o / 0b 前缀和前导 0 八进制
fn parse_int(s: &str) -> Option<i64> {
    let (negative, body) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };

    let lower = body.to_ascii_lowercase();
    let (radix, digits) = if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest.to_string())
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (8, rest.to_string())
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest.to_string())
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, lower[1..].to_string())
    } else {
        (10, lower)
    };

    if digits.is_empty() || digits.starts_with(&['+', '-'][..]) {
        return None;
    }
    let magnitude = i128::from_str_radix(&digits, radix).ok()?;
    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value).ok()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kv(pairs: &[(&str, &str)]) -> Vec<KeyValuePair> {
        pairs.iter().map(|(k, v)| KeyValuePair::new(*k, *v)).collect()
    }

    #[test]
    fn test_parse_without_limit() {
        let params = parse_query_params(&kv(&[("unknown", "x")]), 16384).expect("should parse");
        assert_eq!(params, QueryParams::default());
        assert_eq!(params.fetch_limit(), UNLIMITED);
        assert!(!params.is_paginated());
    }

    #[test]
    fn test_parse_limit_offset() {
        let params = parse_query_params(
            &kv(&[("limit", "10"), ("offset", "0x5"), ("reduce_stop_for_best", "True")]),
            16384,
        )
        .expect("should parse");
        assert_eq!(params.limit, 10);
        assert_eq!(params.offset, 5);
        assert!(params.reduce_stop_for_best);
        assert_eq!(params.fetch_limit(), 15);
    }

    #[test]
    fn test_offset_without_limit() {
        let params = parse_query_params(&kv(&[("offset", "3")]), 16384).expect("should parse");
        assert!(!params.has_limit());
        assert_eq!(params.offset, 3);
        assert!(params.is_paginated());
        assert_eq!(params.fetch_limit(), UNLIMITED);
    }

    #[test]
    fn test_invalid_values() {
        assert!(parse_query_params(&kv(&[("limit", "abc")]), 16384).is_err());
        assert!(parse_query_params(&kv(&[("limit", "0")]), 16384).is_err());
        assert!(parse_query_params(&kv(&[("limit", "1"), ("offset", "-1")]), 16384).is_err());
        assert!(parse_query_params(&kv(&[("reduce_stop_for_best", "yes")]), 16384).is_err());
    }

    #[test]
    fn test_max_result_window() {
        assert!(parse_query_params(&kv(&[("limit", "100"), ("offset", "100")]), 200).is_ok());
        let err = parse_query_params(&kv(&[("limit", "100"), ("offset", "101")]), 200)
            .expect_err("window exceeded");
        assert!(matches!(err, ProxyError::ParameterInvalid(_)));
    }

    #[test]
    fn test_take_ignore_growing() {
        let mut params = kv(&[("limit", "1"), ("ignore_growing", "true")]);
        assert_eq!(take_ignore_growing(&mut params), Ok(true));
        assert_eq!(params, kv(&[("limit", "1")]));
        assert_eq!(take_ignore_growing(&mut params), Ok(false));

        let mut params = kv(&[("ignore_growing", "maybe")]);
        assert!(take_ignore_growing(&mut params).is_err());
    }

    #[test]
    fn test_parse_int_prefixes() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("-7"), Some(-7));
        assert_eq!(parse_int("010"), Some(8));
        assert_eq!(parse_int("0b11"), Some(3));
        assert_eq!(parse_int("0"), Some(0));
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_int("0x"), None);
        assert_eq!(parse_int("--1"), None);
    }
}
