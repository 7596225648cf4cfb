// 核心类型系统模块
//
// 包含集合字段的数据类型、主键以及列式字段数据

use serde::{Deserialize, Serialize};

pub mod field_data;
pub mod primary_key;

pub use field_data::{append_row, ColumnValues, FieldData};
pub use primary_key::{Ids, PkRef, PrimaryKey};

/// 字段数据类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    VarChar,
    Json,
    BinaryVector,
    FloatVector,
    Float16Vector,
}

impl DataType {
    /// 向量类型不参与默认输出
    pub fn is_vector(&self) -> bool {
        matches!(
            self,
            DataType::BinaryVector | DataType::FloatVector | DataType::Float16Vector
        )
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DataType::Bool => "Bool",
            DataType::Int8 => "Int8",
            DataType::Int16 => "Int16",
            DataType::Int32 => "Int32",
            DataType::Int64 => "Int64",
            DataType::Float => "Float",
            DataType::Double => "Double",
            DataType::VarChar => "VarChar",
            DataType::Json => "JSON",
            DataType::BinaryVector => "BinaryVector",
            DataType::FloatVector => "FloatVector",
            DataType::Float16Vector => "Float16Vector",
        };
        write!(f, "{}", name)
    }
}
