//! 列式字段数据
//!
//! 分片结果按列存储，每列与输出字段 id 一一对应。合并时逐行从源列拷贝
//! 到输出列，并返回拷贝的字节数用于输出配额检查。

use serde::{Deserialize, Serialize};

use super::DataType;
use crate::core::error::{ProxyError, ProxyResult};

/// 单列数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnValues {
    Bool(Vec<bool>),
    /// Int8/Int16/Int32 统一按 i32 存储
    Int(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    String(Vec<String>),
    Json(Vec<Vec<u8>>),
    FloatVector { dim: usize, data: Vec<f32> },
    BinaryVector { dim: usize, data: Vec<u8> },
    Float16Vector { dim: usize, data: Vec<u8> },
}

impl ColumnValues {
    /// 按数据类型创建空列
    pub fn empty_for(data_type: DataType, dim: usize) -> Self {
        match data_type {
            DataType::Bool => ColumnValues::Bool(Vec::new()),
            DataType::Int8 | DataType::Int16 | DataType::Int32 => ColumnValues::Int(Vec::new()),
            DataType::Int64 => ColumnValues::Long(Vec::new()),
            DataType::Float => ColumnValues::Float(Vec::new()),
            DataType::Double => ColumnValues::Double(Vec::new()),
            DataType::VarChar => ColumnValues::String(Vec::new()),
            DataType::Json => ColumnValues::Json(Vec::new()),
            DataType::FloatVector => ColumnValues::FloatVector { dim, data: Vec::new() },
            DataType::BinaryVector => ColumnValues::BinaryVector { dim, data: Vec::new() },
            DataType::Float16Vector => ColumnValues::Float16Vector { dim, data: Vec::new() },
        }
    }

    /// 相同类型的空列
    pub fn empty_like(&self) -> Self {
        match self {
            ColumnValues::Bool(_) => ColumnValues::Bool(Vec::new()),
            ColumnValues::Int(_) => ColumnValues::Int(Vec::new()),
            ColumnValues::Long(_) => ColumnValues::Long(Vec::new()),
            ColumnValues::Float(_) => ColumnValues::Float(Vec::new()),
            ColumnValues::Double(_) => ColumnValues::Double(Vec::new()),
            ColumnValues::String(_) => ColumnValues::String(Vec::new()),
            ColumnValues::Json(_) => ColumnValues::Json(Vec::new()),
            ColumnValues::FloatVector { dim, .. } => ColumnValues::FloatVector {
                dim: *dim,
                data: Vec::new(),
            },
            ColumnValues::BinaryVector { dim, .. } => ColumnValues::BinaryVector {
                dim: *dim,
                data: Vec::new(),
            },
            ColumnValues::Float16Vector { dim, .. } => ColumnValues::Float16Vector {
                dim: *dim,
                data: Vec::new(),
            },
        }
    }

    /// 每行向量占用的元素个数
    fn vector_stride(&self) -> usize {
        match self {
            ColumnValues::FloatVector { dim, .. } => *dim,
            ColumnValues::BinaryVector { dim, .. } => dim / 8,
            ColumnValues::Float16Vector { dim, .. } => dim * 2,
            _ => 1,
        }
    }

    /// 行数
    pub fn len(&self) -> usize {
        let stride = self.vector_stride();
        match self {
            ColumnValues::Bool(v) => v.len(),
            ColumnValues::Int(v) => v.len(),
            ColumnValues::Long(v) => v.len(),
            ColumnValues::Float(v) => v.len(),
            ColumnValues::Double(v) => v.len(),
            ColumnValues::String(v) => v.len(),
            ColumnValues::Json(v) => v.len(),
            ColumnValues::FloatVector { data, .. } => data.len().checked_div(stride).unwrap_or(0),
            ColumnValues::BinaryVector { data, .. } | ColumnValues::Float16Vector { data, .. } => {
                data.len().checked_div(stride).unwrap_or(0)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 从 `src` 的第 `idx` 行拷贝一行，返回拷贝的字节数
    pub fn push_from(&mut self, src: &ColumnValues, idx: usize) -> ProxyResult<i64> {
        let stride = src.vector_stride();
        let out_of_range = || ProxyError::Internal(format!("行号 {} 超出列长度", idx));

        let size = match (self, src) {
            (ColumnValues::Bool(dst), ColumnValues::Bool(s)) => {
                dst.push(*s.get(idx).ok_or_else(out_of_range)?);
                1
            }
            (ColumnValues::Int(dst), ColumnValues::Int(s)) => {
                dst.push(*s.get(idx).ok_or_else(out_of_range)?);
                4
            }
            (ColumnValues::Long(dst), ColumnValues::Long(s)) => {
                dst.push(*s.get(idx).ok_or_else(out_of_range)?);
                8
            }
            (ColumnValues::Float(dst), ColumnValues::Float(s)) => {
                dst.push(*s.get(idx).ok_or_else(out_of_range)?);
                4
            }
            (ColumnValues::Double(dst), ColumnValues::Double(s)) => {
                dst.push(*s.get(idx).ok_or_else(out_of_range)?);
                8
            }
            (ColumnValues::String(dst), ColumnValues::String(s)) => {
                let value = s.get(idx).ok_or_else(out_of_range)?;
                dst.push(value.clone());
                value.len() as i64
            }
            (ColumnValues::Json(dst), ColumnValues::Json(s)) => {
                let value = s.get(idx).ok_or_else(out_of_range)?;
                dst.push(value.clone());
                value.len() as i64
            }
            (ColumnValues::FloatVector { data: dst, .. }, ColumnValues::FloatVector { data, .. }) => {
                let row = data
                    .get(idx * stride..(idx + 1) * stride)
                    .ok_or_else(out_of_range)?;
                dst.extend_from_slice(row);
                (row.len() * 4) as i64
            }
            (ColumnValues::BinaryVector { data: dst, .. }, ColumnValues::BinaryVector { data, .. })
            | (
                ColumnValues::Float16Vector { data: dst, .. },
                ColumnValues::Float16Vector { data, .. },
            ) => {
                let row = data
                    .get(idx * stride..(idx + 1) * stride)
                    .ok_or_else(out_of_range)?;
                dst.extend_from_slice(row);
                row.len() as i64
            }
            _ => {
                return Err(ProxyError::Internal(
                    "合并结果时列类型不一致".to_string(),
                ))
            }
        };
        Ok(size)
    }

    /// 追加一行类型默认值
    pub fn push_default(&mut self) {
        let stride = self.vector_stride();
        match self {
            ColumnValues::Bool(v) => v.push(false),
            ColumnValues::Int(v) => v.push(0),
            ColumnValues::Long(v) => v.push(0),
            ColumnValues::Float(v) => v.push(0.0),
            ColumnValues::Double(v) => v.push(0.0),
            ColumnValues::String(v) => v.push(String::new()),
            ColumnValues::Json(v) => v.push(b"{}".to_vec()),
            ColumnValues::FloatVector { data, .. } => data.extend(std::iter::repeat(0.0).take(stride)),
            ColumnValues::BinaryVector { data, .. } | ColumnValues::Float16Vector { data, .. } => {
                data.extend(std::iter::repeat(0u8).take(stride))
            }
        }
    }
}

/// 一个字段的列数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldData {
    pub field_id: i64,
    pub field_name: String,
    pub data_type: DataType,
    pub values: ColumnValues,
}

impl FieldData {
    pub fn new(field_id: i64, field_name: impl Into<String>, data_type: DataType, values: ColumnValues) -> Self {
        Self {
            field_id,
            field_name: field_name.into(),
            data_type,
            values,
        }
    }

    /// 元信息相同的空列
    pub fn empty_like(&self) -> Self {
        Self {
            field_id: self.field_id,
            field_name: self.field_name.clone(),
            data_type: self.data_type,
            values: self.values.empty_like(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// 把 `src` 各列的第 `idx` 行追加到 `dst` 对应列，返回这一行的字节数
pub fn append_row(dst: &mut [FieldData], src: &[FieldData], idx: usize) -> ProxyResult<i64> {
    if dst.len() != src.len() {
        return Err(ProxyError::Internal(format!(
            "输出列数 {} 与分片结果列数 {} 不一致",
            dst.len(),
            src.len()
        )));
    }

    let mut size = 0;
    for (d, s) in dst.iter_mut().zip(src) {
        size += d.values.push_from(&s.values, idx)?;
    }
    Ok(size)
}
