use crate::queue::RetryPolicy;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Samovar
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    pub queue: QueueConfig,
    pub output: OutputConfig,
}

/// The harvested site and how identifiers are recognized on it
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Site root, e.g. "https://1000.menu"
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Search listing path with its query string
    #[serde(rename = "search-path")]
    pub search_path: String,

    /// Only links under this path are admitted to the queue
    #[serde(rename = "path-prefix", default = "default_path_prefix")]
    pub path_prefix: String,

    /// User agent sent by both workers
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

/// Strategy used to walk the search listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectorMode {
    /// Try the AJAX endpoint first, fall back to paged requests
    #[default]
    Auto,
    /// Re-request the search path with an incrementing page parameter
    Paged,
    /// Follow the site's next-page AJAX template
    Endpoint,
}

/// Link collector (producer) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    #[serde(default)]
    pub mode: CollectorMode,

    /// Stop after this many pagination steps per run (unlimited if absent)
    #[serde(rename = "max-steps", default)]
    pub max_steps: Option<u32>,

    /// End discovery after this many consecutive steps with zero new links
    #[serde(rename = "stop-after-stale", default = "default_stop_after_stale")]
    pub stop_after_stale: u32,

    /// Log a milestone after this many newly discovered links
    #[serde(rename = "progress-interval", default = "default_progress_interval")]
    pub progress_interval: u64,

    #[serde(rename = "http-timeout-secs", default = "default_collector_timeout")]
    pub http_timeout_secs: u64,

    /// Where the discovery checkpoint is persisted
    #[serde(rename = "checkpoint-path", default = "default_checkpoint_path")]
    pub checkpoint_path: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            mode: CollectorMode::Auto,
            max_steps: None,
            stop_after_stale: default_stop_after_stale(),
            progress_interval: default_progress_interval(),
            http_timeout_secs: default_collector_timeout(),
            checkpoint_path: default_checkpoint_path(),
        }
    }
}

impl CollectorConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Recipe fetcher (consumer) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Items claimed per lease call
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: usize,

    /// Concurrent fetch/parse tasks
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(rename = "http-timeout-secs", default = "default_fetcher_timeout")]
    pub http_timeout_secs: u64,

    /// Failures before an item becomes terminally failed
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Leases older than this are treated as abandoned and swept back
    #[serde(rename = "lease-timeout-secs", default = "default_lease_timeout")]
    pub lease_timeout_secs: u64,

    /// Sleep between drain cycles when the queue is empty
    #[serde(rename = "idle-wait-secs", default = "default_idle_wait")]
    pub idle_wait_secs: u64,

    /// Base retry delay; doubles per attempt
    #[serde(rename = "retry-backoff-secs", default = "default_retry_backoff")]
    pub retry_backoff_secs: u64,

    #[serde(rename = "retry-backoff-cap-secs", default = "default_retry_backoff_cap")]
    pub retry_backoff_cap_secs: u64,

    /// Log a milestone after this many parsed recipes
    #[serde(rename = "progress-interval", default = "default_progress_interval")]
    pub progress_interval: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            http_timeout_secs: default_fetcher_timeout(),
            max_attempts: default_max_attempts(),
            lease_timeout_secs: default_lease_timeout(),
            idle_wait_secs: default_idle_wait(),
            retry_backoff_secs: default_retry_backoff(),
            retry_backoff_cap_secs: default_retry_backoff_cap(),
            progress_interval: default_progress_interval(),
        }
    }
}

impl FetcherConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn lease_timeout(&self) -> Duration {
        Duration::from_secs(self.lease_timeout_secs)
    }

    pub fn idle_wait(&self) -> Duration {
        Duration::from_secs(self.idle_wait_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_secs(self.retry_backoff_secs),
            Duration::from_secs(self.retry_backoff_cap_secs),
        )
    }
}

/// Queue storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Path to the SQLite work-queue database
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path of the TSV export file
    #[serde(rename = "tsv-path")]
    pub tsv_path: String,

    /// Optional line-delimited JSON mirror
    #[serde(rename = "jsonl-path", default)]
    pub jsonl_path: Option<String>,

    /// Buffered records before a flush to disk
    #[serde(rename = "flush-threshold", default = "default_flush_threshold")]
    pub flush_threshold: usize,
}

fn default_path_prefix() -> String {
    "/cooking/".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
        .to_string()
}

fn default_stop_after_stale() -> u32 {
    2
}

fn default_progress_interval() -> u64 {
    200
}

fn default_collector_timeout() -> u64 {
    30
}

fn default_checkpoint_path() -> String {
    "state/collector_checkpoint.json".to_string()
}

fn default_batch_size() -> usize {
    200
}

fn default_concurrency() -> usize {
    16
}

fn default_fetcher_timeout() -> u64 {
    25
}

fn default_max_attempts() -> u32 {
    5
}

fn default_lease_timeout() -> u64 {
    900
}

fn default_idle_wait() -> u64 {
    2
}

fn default_retry_backoff() -> u64 {
    2
}

fn default_retry_backoff_cap() -> u64 {
    60
}

fn default_flush_threshold() -> usize {
    500
}
