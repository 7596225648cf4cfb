//! 客户端查询请求与返回结果

use serde::{Deserialize, Serialize};

use crate::core::tso::Timestamp;
use crate::core::types::FieldData;
use crate::query::consistency::ConsistencyLevel;
use crate::query::params::KeyValuePair;

/// 客户端发来的查询请求
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub db_name: String,
    pub collection_name: String,
    pub partition_names: Vec<String>,
    /// 过滤表达式，可以为空
    pub expr: String,
    /// 输出字段，`["count(*)"]` 表示计数查询
    pub output_fields: Vec<String>,
    pub query_params: Vec<KeyValuePair>,
    pub consistency_level: ConsistencyLevel,
    pub use_default_consistency: bool,
    /// 旧客户端直接给出的保证时间戳，0 表示未设置
    pub guarantee_timestamp: Timestamp,
}

impl QueryRequest {
    pub fn new(db_name: impl Into<String>, collection_name: impl Into<String>) -> Self {
        Self {
            db_name: db_name.into(),
            collection_name: collection_name.into(),
            ..Self::default()
        }
    }

    pub fn with_expr(mut self, expr: impl Into<String>) -> Self {
        self.expr = expr.into();
        self
    }

    pub fn with_output_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_partition_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.partition_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push(KeyValuePair::new(key, value));
        self
    }

    pub fn with_consistency_level(mut self, level: ConsistencyLevel) -> Self {
        self.consistency_level = level;
        self.use_default_consistency = false;
        self
    }

    pub fn with_default_consistency(mut self) -> Self {
        self.use_default_consistency = true;
        self
    }

    pub fn with_guarantee_timestamp(mut self, ts: Timestamp) -> Self {
        self.guarantee_timestamp = ts;
        self
    }
}

/// 返回给客户端的结果，列式存储
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResults {
    pub collection_name: String,
    pub fields_data: Vec<FieldData>,
    /// 用户请求的输出字段名
    pub output_fields: Vec<String>,
}

impl QueryResults {
    pub fn row_count(&self) -> usize {
        self.fields_data.first().map(FieldData::len).unwrap_or(0)
    }

    pub fn field(&self, name: &str) -> Option<&FieldData> {
        self.fields_data.iter().find(|f| f.field_name == name)
    }
}
