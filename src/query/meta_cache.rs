//! 元数据缓存
//!
//! 查询任务只通过 `MetaCache` 读取集合 id、schema、分区等元数据，
//! 并在分片 leader 失效时让路由缓存作废。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use moka::sync::Cache;

use crate::core::error::{ProxyError, ProxyResult};
use crate::core::schema::CollectionSchema;
use crate::query::consistency::ConsistencyLevel;

/// 集合级别的元信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub collection_id: i64,
    pub consistency_level: ConsistencyLevel,
}

/// 一个 DML channel 的 leader 副本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardLeader {
    pub channel: String,
    pub node_ids: Vec<i64>,
}

#[async_trait]
pub trait MetaCache: Send + Sync {
    async fn get_collection_id(&self, db: &str, collection: &str) -> ProxyResult<i64>;

    async fn get_collection_schema(
        &self,
        db: &str,
        collection: &str,
    ) -> ProxyResult<Arc<CollectionSchema>>;

    async fn get_collection_info(&self, db: &str, collection: &str) -> ProxyResult<CollectionInfo>;

    /// 按名称解析分区 id，名称为空时返回空列表（查询全部分区）
    async fn get_partition_ids(
        &self,
        db: &str,
        collection: &str,
        partition_names: &[String],
    ) -> ProxyResult<Vec<i64>>;

    /// 集合所有分区名称，按名称排序
    async fn get_partition_names(&self, db: &str, collection: &str) -> ProxyResult<Vec<String>>;

    /// 作废集合的分片 leader 缓存，下一次路由时重新拉取
    fn deprecate_shard_cache(&self, db: &str, collection: &str);
}

#[derive(Debug, Clone)]
struct CollectionEntry {
    info: CollectionInfo,
    schema: Arc<CollectionSchema>,
    partitions: Vec<(String, i64)>,
}

type CollectionKey = (String, String);

fn key(db: &str, collection: &str) -> CollectionKey {
    (db.to_string(), collection.to_string())
}

/// 纯内存实现，供嵌入测试和单节点部署使用
pub struct MemoryMetaCache {
    collections: DashMap<CollectionKey, CollectionEntry>,
    shard_leaders: Cache<CollectionKey, Arc<Vec<ShardLeader>>>,
    deprecations: AtomicU64,
}

impl Default for MemoryMetaCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMetaCache {
    pub fn new() -> Self {
        Self {
            collections: DashMap::new(),
            shard_leaders: Cache::new(10_000),
            deprecations: AtomicU64::new(0),
        }
    }

    /// 注册集合；分区按名称排序保存
    pub fn add_collection(
        &self,
        db: &str,
        info: CollectionInfo,
        schema: CollectionSchema,
        partitions: Vec<(String, i64)>,
    ) {
        let mut partitions = partitions;
        partitions.sort_by(|a, b| a.0.cmp(&b.0));
        let collection = schema.name.clone();
        self.collections.insert(
            key(db, &collection),
            CollectionEntry {
                info,
                schema: Arc::new(schema),
                partitions,
            },
        );
    }

    pub fn drop_collection(&self, db: &str, collection: &str) -> bool {
        let k = key(db, collection);
        self.shard_leaders.invalidate(&k);
        self.collections.remove(&k).is_some()
    }

    pub fn update_shard_leaders(&self, db: &str, collection: &str, leaders: Vec<ShardLeader>) {
        self.shard_leaders
            .insert(key(db, collection), Arc::new(leaders));
    }

    pub fn get_shard_leaders(&self, db: &str, collection: &str) -> Option<Arc<Vec<ShardLeader>>> {
        self.shard_leaders.get(&key(db, collection))
    }

    /// `deprecate_shard_cache` 被调用的次数
    pub fn deprecation_count(&self) -> u64 {
        self.deprecations.load(Ordering::SeqCst)
    }

    fn entry(&self, db: &str, collection: &str) -> ProxyResult<CollectionEntry> {
        self.collections
            .get(&key(db, collection))
            .map(|e| e.value().clone())
            .ok_or_else(|| ProxyError::CollectionNotFound(collection.to_string()))
    }
}

#[async_trait]
impl MetaCache for MemoryMetaCache {
    async fn get_collection_id(&self, db: &str, collection: &str) -> ProxyResult<i64> {
        self.collections
            .get(&key(db, collection))
            .map(|e| e.info.collection_id)
            .ok_or_else(|| ProxyError::CollectionNotFound(collection.to_string()))
    }

    async fn get_collection_schema(
        &self,
        db: &str,
        collection: &str,
    ) -> ProxyResult<Arc<CollectionSchema>> {
        self.collections
            .get(&key(db, collection))
            .map(|e| e.schema.clone())
            .ok_or_else(|| ProxyError::CollectionNotFound(collection.to_string()))
    }

    async fn get_collection_info(&self, db: &str, collection: &str) -> ProxyResult<CollectionInfo> {
        self.collections
            .get(&key(db, collection))
            .map(|e| e.info.clone())
            .ok_or_else(|| ProxyError::CollectionNotFound(collection.to_string()))
    }

    async fn get_partition_ids(
        &self,
        db: &str,
        collection: &str,
        partition_names: &[String],
    ) -> ProxyResult<Vec<i64>> {
        let entry = self.entry(db, collection)?;
        let mut ids = Vec::with_capacity(partition_names.len());
        for name in partition_names {
            let id = entry
                .partitions
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, id)| *id)
                .ok_or_else(|| ProxyError::PartitionNotFound(name.clone()))?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    async fn get_partition_names(&self, db: &str, collection: &str) -> ProxyResult<Vec<String>> {
        let entry = self.entry(db, collection)?;
        Ok(entry.partitions.into_iter().map(|(name, _)| name).collect())
    }

    fn deprecate_shard_cache(&self, db: &str, collection: &str) {
        log::info!("作废分片 leader 缓存, db={}, collection={}", db, collection);
        self.shard_leaders.invalidate(&key(db, collection));
        self.deprecations.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::FieldSchema;
    use crate::core::types::DataType;

    fn cache() -> MemoryMetaCache {
        let cache = MemoryMetaCache::new();
        cache.add_collection(
            "default",
            CollectionInfo {
                collection_id: 42,
                consistency_level: ConsistencyLevel::Bounded,
            },
            CollectionSchema::new(
                "book",
                vec![FieldSchema::new(100, "id", DataType::Int64).with_primary_key()],
            ),
            vec![("p2".to_string(), 2), ("_default".to_string(), 1)],
        );
        cache
    }

    #[tokio::test]
    async fn test_collection_lookup() {
        let cache = cache();
        assert_eq!(cache.get_collection_id("default", "book").await, Ok(42));
        assert_eq!(
            cache.get_collection_id("default", "nope").await,
            Err(ProxyError::CollectionNotFound("nope".to_string()))
        );
        let schema = cache
            .get_collection_schema("default", "book")
            .await
            .expect("schema");
        assert_eq!(schema.name, "book");
    }

    #[tokio::test]
    async fn test_partitions() {
        let cache = cache();
        assert_eq!(
            cache.get_partition_names("default", "book").await,
            Ok(vec!["_default".to_string(), "p2".to_string()])
        );
        assert_eq!(
            cache
                .get_partition_ids("default", "book", &["p2".to_string(), "p2".to_string()])
                .await,
            Ok(vec![2])
        );
        assert_eq!(cache.get_partition_ids("default", "book", &[]).await, Ok(vec![]));
        assert_eq!(
            cache
                .get_partition_ids("default", "book", &["p9".to_string()])
                .await,
            Err(ProxyError::PartitionNotFound("p9".to_string()))
        );
    }

    #[test]
    fn test_deprecate_shard_cache() {
        let cache = cache();
        cache.update_shard_leaders(
            "default",
            "book",
            vec![ShardLeader {
                channel: "dml_0".to_string(),
                node_ids: vec![1, 2],
            }],
        );
        assert!(cache.get_shard_leaders("default", "book").is_some());

        cache.deprecate_shard_cache("default", "book");
        assert!(cache.get_shard_leaders("default", "book").is_none());
        assert_eq!(cache.deprecation_count(), 1);
    }
}
