//! 主键与主键列表
//!
//! 主键只能是 int64 或字符串，同一集合内全序且唯一。

use serde::{Deserialize, Serialize};

/// 拥有所有权的主键值，用于去重集合
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PrimaryKey {
    Int(i64),
    Str(String),
}

/// 主键的借用视图，合并时比较不需要克隆字符串
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PkRef<'a> {
    Int(i64),
    Str(&'a str),
}

impl PkRef<'_> {
    pub fn to_owned_key(&self) -> PrimaryKey {
        match self {
            PkRef::Int(v) => PrimaryKey::Int(*v),
            PkRef::Str(s) => PrimaryKey::Str((*s).to_string()),
        }
    }
}

impl PrimaryKey {
    pub fn as_ref(&self) -> PkRef<'_> {
        match self {
            PrimaryKey::Int(v) => PkRef::Int(*v),
            PrimaryKey::Str(s) => PkRef::Str(s.as_str()),
        }
    }
}

impl std::fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrimaryKey::Int(v) => write!(f, "{}", v),
            PrimaryKey::Str(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// 一个分片结果中按顺序排列的主键
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Ids {
    Int(Vec<i64>),
    Str(Vec<String>),
}

impl Default for Ids {
    fn default() -> Self {
        Ids::Int(Vec::new())
    }
}

impl Ids {
    pub fn len(&self) -> usize {
        match self {
            Ids::Int(v) => v.len(),
            Ids::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, idx: usize) -> Option<PkRef<'_>> {
        match self {
            Ids::Int(v) => v.get(idx).map(|pk| PkRef::Int(*pk)),
            Ids::Str(v) => v.get(idx).map(|pk| PkRef::Str(pk.as_str())),
        }
    }
}

impl From<Vec<i64>> for Ids {
    fn from(ids: Vec<i64>) -> Self {
        Ids::Int(ids)
    }
}

impl From<Vec<String>> for Ids {
    fn from(ids: Vec<String>) -> Self {
        Ids::Str(ids)
    }
}
