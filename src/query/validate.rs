//! 集合名与分区名校验

use std::sync::OnceLock;

use regex::Regex;

use crate::core::error::{ProxyError, ProxyResult};

const MAX_NAME_LENGTH: usize = 255;

static COLLECTION_NAME_RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
static PARTITION_NAME_RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

fn compiled(
    cell: &'static OnceLock<Result<Regex, regex::Error>>,
    pattern: &str,
) -> ProxyResult<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern))
        .as_ref()
        .map_err(|e| ProxyError::Internal(format!("名称校验规则无效: {}", e)))
}

fn check_name(name: &str, re: &Regex, kind: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err(format!("{} 名称不能为空", kind));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(format!(
            "{} 名称长度不能超过 {} 个字符: {}",
            kind, MAX_NAME_LENGTH, name
        ));
    }
    if !re.is_match(name) {
        return Err(format!(
            "{} 名称只能以字母或下划线开头，且只能包含字母、数字和下划线: {}",
            kind, name
        ));
    }
    Ok(())
}

pub fn validate_collection_name(name: &str) -> ProxyResult<()> {
    let re = compiled(&COLLECTION_NAME_RE, r"^[A-Za-z_][A-Za-z0-9_$]*$")?;
    check_name(name.trim(), re, "collection").map_err(ProxyError::InvalidCollectionName)
}

pub fn validate_partition_name(name: &str) -> ProxyResult<()> {
    let re = compiled(&PARTITION_NAME_RE, r"^[A-Za-z_][A-Za-z0-9_\-]*$")?;
    check_name(name.trim(), re, "partition").map_err(ProxyError::InvalidPartitionName)
}
