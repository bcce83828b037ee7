use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::core::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Dispatcher
    pub max_concurrent_queries: usize,      // Permits in the fair semaphore
    pub change_logger_type: String,         // Change log consulted by recency waits
    pub change_logger_id: u32,

    // Executor
    pub global_search_limit: usize,         // Ceiling on ranked hits computed per search
    pub warn_threshold_ms: u64,             // Slow-search warning, advisory only
    pub max_query_depth: usize,

    // Result cache
    pub result_cache_capacity: usize,       // Entries per generation, 0 disables the cache
    pub cache_authenticated_queries: bool,

    // Incremental updater
    pub updater_batch_size: usize,
    pub updater_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_concurrent_queries: 16,
            change_logger_type: "index".to_string(),
            change_logger_id: 1,

            global_search_limit: 60_000,
            warn_threshold_ms: 15_000,
            max_query_depth: 32,

            result_cache_capacity: 100,
            cache_authenticated_queries: false,

            updater_batch_size: 1000,
            updater_interval_ms: 500,
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn warn_threshold(&self) -> Duration {
        Duration::from_millis(self.warn_threshold_ms)
    }

    pub fn updater_interval(&self) -> Duration {
        Duration::from_millis(self.updater_interval_ms)
    }
}
