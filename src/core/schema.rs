use serde::{Deserialize, Serialize};

use crate::core::types::DataType;

/// 行 id 系统字段
pub const ROW_ID_FIELD: i64 = 0;
/// 时间戳系统字段
pub const TIMESTAMP_FIELD: i64 = 1;
/// 用户字段 id 的起始值，小于它的都是系统字段
pub const START_OF_USER_FIELD_ID: i64 = 100;

pub fn is_system_field(field_id: i64) -> bool {
    field_id < START_OF_USER_FIELD_ID
}

/// Field definition inside a collection schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub field_id: i64,
    pub name: String,
    pub data_type: DataType,
    pub is_primary_key: bool,
    pub is_partition_key: bool,
    /// 向量维度，标量字段为 0
    pub dim: usize,
}

impl FieldSchema {
    pub fn new(field_id: i64, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            field_id,
            name: name.into(),
            data_type,
            is_primary_key: false,
            is_partition_key: false,
            dim: 0,
        }
    }

    pub fn with_primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    pub fn with_partition_key(mut self) -> Self {
        self.is_partition_key = true;
        self
    }

    pub fn with_dim(mut self, dim: usize) -> Self {
        self.dim = dim;
        self
    }
}

/// Collection schema snapshot, shared read-only once loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    pub fields: Vec<FieldSchema>,
}

impl CollectionSchema {
    pub fn new(name: impl Into<String>, fields: Vec<FieldSchema>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn primary_field(&self) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.is_primary_key)
    }

    pub fn partition_key_field(&self) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.is_partition_key)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_by_id(&self, field_id: i64) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.field_id == field_id)
    }

    /// 非向量的用户字段，按 schema 顺序
    pub fn scalar_user_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields
            .iter()
            .filter(|f| f.field_id >= START_OF_USER_FIELD_ID && !f.data_type.is_vector())
    }
}
