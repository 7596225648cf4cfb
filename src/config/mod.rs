use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 进程级运行时配置
///
/// 由调用方加载一次后以 `Arc<ProxyConfig>` 传入查询任务。
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    pub common: CommonConfig,
    pub quota: QuotaConfig,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct CommonConfig {
    /// 本节点 id，作为分片请求的 source id
    pub node_id: i64,
    /// Bounded 一致性允许的落后时间（毫秒）
    pub graceful_time_ms: i64,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            node_id: 1,
            graceful_time_ms: 5000,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct QuotaConfig {
    /// 合并结果的最大字节数
    pub max_output_size: i64,
    /// offset + limit 的上限
    pub max_query_result_window: i64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            max_output_size: 100 * 1024 * 1024, // 100MB
            max_query_result_window: 16384,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub dir: String,
    pub file: String,
    pub max_file_size: u64,
    pub max_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: "logs".to_string(),
            file: "vecdb-proxy".to_string(),
            max_file_size: 100 * 1024 * 1024, // 100MB
            max_files: 5,
        }
    }
}

impl ProxyConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let config: ProxyConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
