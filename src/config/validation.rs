use crate::config::types::{CollectorConfig, Config, FetcherConfig, SiteConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_collector_config(&config.collector)?;
    validate_fetcher_config(&config.fetcher)?;

    if config.queue.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "queue.database-path cannot be empty".to_string(),
        ));
    }

    if config.output.tsv_path.is_empty() {
        return Err(ConfigError::Validation(
            "output.tsv-path cannot be empty".to_string(),
        ));
    }

    if config.output.flush_threshold < 1 {
        return Err(ConfigError::Validation(
            "output.flush-threshold must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if base.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' has no host",
            config.base_url
        )));
    }

    if !config.search_path.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "search-path must start with '/', got '{}'",
            config.search_path
        )));
    }

    if !config.path_prefix.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "path-prefix must start with '/', got '{}'",
            config.path_prefix
        )));
    }

    Ok(())
}

fn validate_collector_config(config: &CollectorConfig) -> Result<(), ConfigError> {
    if config.stop_after_stale < 1 {
        return Err(ConfigError::Validation(
            "collector.stop-after-stale must be >= 1".to_string(),
        ));
    }

    if config.http_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "collector.http-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.checkpoint_path.is_empty() {
        return Err(ConfigError::Validation(
            "collector.checkpoint-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.batch_size < 1 {
        return Err(ConfigError::Validation(
            "fetcher.batch-size must be >= 1".to_string(),
        ));
    }

    if config.concurrency < 1 || config.concurrency > 256 {
        return Err(ConfigError::Validation(format!(
            "fetcher.concurrency must be between 1 and 256, got {}",
            config.concurrency
        )));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "fetcher.max-attempts must be >= 1".to_string(),
        ));
    }

    if config.lease_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "fetcher.lease-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.idle_wait_secs < 1 {
        return Err(ConfigError::Validation(
            "fetcher.idle-wait-secs must be >= 1".to_string(),
        ));
    }

    if config.retry_backoff_cap_secs < config.retry_backoff_secs {
        return Err(ConfigError::Validation(format!(
            "fetcher.retry-backoff-cap-secs ({}) must be >= retry-backoff-secs ({})",
            config.retry_backoff_cap_secs, config.retry_backoff_secs
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{OutputConfig, QueueConfig};

    fn valid_config() -> Config {
        Config {
            site: SiteConfig {
                base_url: "https://1000.menu".to_string(),
                search_path: "/cooking/search?ms=1".to_string(),
                path_prefix: "/cooking/".to_string(),
                user_agent: "TestAgent/1.0".to_string(),
            },
            collector: CollectorConfig::default(),
            fetcher: FetcherConfig::default(),
            queue: QueueConfig {
                database_path: "state/workqueue.db".to_string(),
            },
            output: OutputConfig {
                tsv_path: "data/recipes.tsv".to_string(),
                jsonl_path: None,
                flush_threshold: 500,
            },
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_invalid_base_url() {
        let mut config = valid_config();
        config.site.base_url = "not a url".to_string();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_search_path_must_be_absolute() {
        let mut config = valid_config();
        config.site.search_path = "cooking/search".to_string();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = valid_config();
        config.fetcher.concurrency = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = valid_config();
        config.fetcher.batch_size = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_max_attempts_rejected() {
        let mut config = valid_config();
        config.fetcher.max_attempts = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_idle_wait_rejected() {
        let mut config = valid_config();
        config.fetcher.idle_wait_secs = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_backoff_cap_below_base_rejected() {
        let mut config = valid_config();
        config.fetcher.retry_backoff_secs = 30;
        config.fetcher.retry_backoff_cap_secs = 5;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_database_path_rejected() {
        let mut config = valid_config();
        config.queue.database_path = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_tsv_path_rejected() {
        let mut config = valid_config();
        config.output.tsv_path = String::new();
        assert!(validate(&config).is_err());
    }
}
