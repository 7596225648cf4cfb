pub mod error;
pub mod murmur;
pub mod schema;
pub mod tso;
pub mod types;

// 错误和结果类型
pub use error::{ErrorCode, ProxyError, ProxyResult, Status};

// 核心数据类型
pub use schema::{CollectionSchema, FieldSchema};
pub use tso::Timestamp;
pub use types::{ColumnValues, DataType, FieldData, Ids, PrimaryKey};
