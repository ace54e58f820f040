use std::sync::Arc;

use moka::future::Cache;

use crate::config::CacheConfig;
use crate::error::AppError;

use super::{CacheEntry, CacheNamespace, SqliteCacheStorage};

type MemoryKey = (CacheNamespace, String);

/// 进程级缓存句柄：启动时打开一次，经 `AppState` 注入各请求。
///
/// 查询先走内存层，未命中再查 SQLite，并把持久层命中提升到内存；写入同时落两层。
/// 存储层的任何错误都只记录日志并按未命中/空操作处理，不影响请求本身。
#[derive(Clone)]
pub struct CacheStore {
    memory: Cache<MemoryKey, CacheEntry>,
    persistent: Option<Arc<SqliteCacheStorage>>,
}

impl CacheStore {
    /// 按配置打开缓存（持久层失败时返回错误，由调用方决定是否降级）
    pub async fn open(cfg: &CacheConfig) -> Result<Self, AppError> {
        let persistent = if cfg.persistent {
            let storage = SqliteCacheStorage::connect_sqlite(&cfg.sqlite_path, cfg.sqlite_wal).await?;
            storage.init_schema().await?;
            tracing::info!("持久缓存已打开: {}", cfg.sqlite_path);
            Some(Arc::new(storage))
        } else {
            None
        };
        Ok(Self {
            memory: Self::build_memory(cfg.memory_max_bytes),
            persistent,
        })
    }

    /// 仅内存层
    pub fn in_memory(max_bytes: u64) -> Self {
        Self {
            memory: Self::build_memory(max_bytes),
            persistent: None,
        }
    }

    fn build_memory(max_bytes: u64) -> Cache<MemoryKey, CacheEntry> {
        Cache::builder()
            .weigher(|_k, v: &CacheEntry| v.weight())
            .max_capacity(max_bytes)
            .build()
    }

    /// 取得某个命名空间的视图
    pub fn namespace(&self, ns: CacheNamespace) -> CacheTier {
        CacheTier {
            store: self.clone(),
            ns,
        }
    }

    pub async fn lookup(&self, ns: CacheNamespace, key: &str) -> Option<CacheEntry> {
        let mem_key = (ns, key.to_string());
        if let Some(hit) = self.memory.get(&mem_key).await {
            tracing::debug!(namespace = ns.as_str(), key, "缓存命中（内存）");
            return Some(hit);
        }

        let storage = self.persistent.as_ref()?;
        match storage.get(ns, key).await {
            Ok(Some(hit)) => {
                tracing::debug!(namespace = ns.as_str(), key, "缓存命中（SQLite），提升到内存");
                self.memory.insert(mem_key, hit.clone()).await;
                Some(hit)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(namespace = ns.as_str(), key, "读取持久缓存失败: {}", e);
                None
            }
        }
    }

    pub async fn put(&self, ns: CacheNamespace, key: &str, entry: CacheEntry) {
        if let Some(storage) = self.persistent.as_ref() {
            if let Err(e) = storage.put(ns, key, &entry).await {
                tracing::warn!(namespace = ns.as_str(), key, "写入持久缓存失败: {}", e);
            }
        }
        self.memory.insert((ns, key.to_string()), entry).await;
        tracing::debug!(namespace = ns.as_str(), key, "缓存已写入");
    }

    /// 仅清空内存层（持久层保留），用于模拟进程重启后的冷启动
    pub async fn clear_memory(&self) {
        self.memory.invalidate_all();
        self.memory.run_pending_tasks().await;
    }
}

/// 单个命名空间的缓存视图
#[derive(Clone)]
pub struct CacheTier {
    store: CacheStore,
    ns: CacheNamespace,
}

impl CacheTier {
    pub async fn lookup(&self, key: &str) -> Option<CacheEntry> {
        self.store.lookup(self.ns, key).await
    }

    pub async fn put(&self, key: &str, entry: CacheEntry) {
        self.store.put(self.ns, key, entry).await
    }
}
