//! Link collector: the discovery side of the pipeline
//!
//! Walks the site's search listing page by page, extracts recipe links, and
//! feeds them to the work queue. Discovery is resumable: a checkpoint records
//! how many listing steps are done, and the insert-if-new queue contract
//! makes replayed pages harmless.
//!
//! Two pagination strategies are available, selected by configuration:
//! - `endpoint`: follow the AJAX next-page template embedded in the first
//!   results page (how the site's own load-more button works)
//! - `paged`: re-request the search path with an incrementing `p` parameter
//! `auto` tries the endpoint strategy and falls back to paged requests.

mod checkpoint;
mod listing;

pub use checkpoint::CollectorCheckpoint;
pub use listing::{
    build_endpoint_url, build_paged_url, extract_listing_links, find_next_page_template,
};

use crate::config::{CollectorMode, Config};
use crate::fetcher::build_http_client;
use crate::normalize::allowed_hosts;
use crate::queue::{QueueStore, SqliteQueue};
use crate::{Result, SamovarError};
use reqwest::Client;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use url::Url;

enum Pagination {
    Endpoint(String),
    Paged,
}

/// Discovers recipe URLs and inserts them into the work queue
pub struct LinkCollector {
    config: Config,
    store: Arc<Mutex<SqliteQueue>>,
    client: Client,
    base: Url,
    hosts: HashSet<String>,
    checkpoint: CollectorCheckpoint,
    discovered: u64,
    last_bucket: u64,
}

impl LinkCollector {
    pub fn new(config: Config, store: Arc<Mutex<SqliteQueue>>) -> Result<Self> {
        let base = Url::parse(&config.site.base_url)?;
        let hosts = allowed_hosts(&base);
        let client = build_http_client(&config.site.user_agent, config.collector.http_timeout())?;
        let checkpoint = CollectorCheckpoint::load(Path::new(&config.collector.checkpoint_path));

        Ok(Self {
            config,
            store,
            client,
            base,
            hosts,
            checkpoint,
            discovered: 0,
            last_bucket: 0,
        })
    }

    /// Runs discovery until the listing is exhausted or the step limit hits
    pub async fn run(&mut self) -> Result<()> {
        if self.checkpoint.steps_completed() > 0 {
            tracing::info!(
                "Resuming discovery after {} completed steps",
                self.checkpoint.steps_completed()
            );
        }

        match self.config.collector.mode {
            CollectorMode::Endpoint => self.run_endpoint().await,
            CollectorMode::Paged => self.run_paged().await,
            CollectorMode::Auto => match self.run_endpoint().await {
                Ok(()) => Ok(()),
                Err(e) => {
                    tracing::warn!(
                        "Endpoint pagination failed ({}); falling back to paged requests",
                        e
                    );
                    self.run_paged().await
                }
            },
        }
    }

    async fn run_endpoint(&mut self) -> Result<()> {
        let first_url = self.base.join(&self.config.site.search_path)?.to_string();
        let html = self.fetch_listing(&first_url).await?;
        let template = find_next_page_template(&html).ok_or_else(|| {
            SamovarError::Discovery("no next-page template on the first results page".to_string())
        })?;
        self.harvest_page(&html)?;
        self.walk_listing(Pagination::Endpoint(template)).await
    }

    async fn run_paged(&mut self) -> Result<()> {
        let first_url = self.base.join(&self.config.site.search_path)?.to_string();
        let html = self.fetch_listing(&first_url).await?;
        self.harvest_page(&html)?;
        self.walk_listing(Pagination::Paged).await
    }

    /// Walks listing pages starting after the checkpointed step
    ///
    /// The first results page is always re-harvested by the caller; numbered
    /// pages resume at `steps_completed + 1`.
    async fn walk_listing(&mut self, strategy: Pagination) -> Result<()> {
        let mut page = self.checkpoint.steps_completed().max(1) + 1;
        let mut stale = 0u32;
        let mut performed = 0u32;

        loop {
            if let Some(limit) = self.config.collector.max_steps {
                if performed >= limit {
                    tracing::info!("Reached configured step limit ({})", limit);
                    break;
                }
            }

            let url = match &strategy {
                Pagination::Endpoint(template) => {
                    build_endpoint_url(template, &self.base, page)?
                }
                Pagination::Paged => {
                    build_paged_url(&self.base, &self.config.site.search_path, page)?
                }
            };

            tracing::debug!("Fetching listing page {}: {}", page, url);
            let html = match self.fetch_listing(&url).await {
                Ok(html) => html,
                Err(e) => {
                    tracing::warn!("Listing fetch failed on page {}: {}", page, e);
                    break;
                }
            };

            let added = self.harvest_page(&html)?;
            self.checkpoint.advance_to(page)?;
            performed += 1;

            if added == 0 {
                stale += 1;
                if stale >= self.config.collector.stop_after_stale {
                    tracing::info!(
                        "No new links for {} consecutive pages; discovery exhausted",
                        stale
                    );
                    break;
                }
            } else {
                stale = 0;
            }

            page += 1;
        }

        Ok(())
    }

    /// Extracts links from one listing page and admits them to the queue.
    /// Returns the number of genuinely new identifiers.
    fn harvest_page(&mut self, html: &str) -> Result<usize> {
        let links = extract_listing_links(
            html,
            &self.base,
            &self.hosts,
            &self.config.site.path_prefix,
        );
        if links.is_empty() {
            return Ok(0);
        }

        let added = {
            let mut store = self.store.lock().unwrap();
            store.insert_new(&links)?
        };
        if added > 0 {
            tracing::info!("Queued {} new recipe URLs", added);
            self.record_progress(added as u64);
        }
        Ok(added)
    }

    fn record_progress(&mut self, added: u64) {
        let interval = self.config.collector.progress_interval;
        if interval == 0 {
            return;
        }
        self.discovered += added;
        let bucket = self.discovered / interval;
        if bucket > self.last_bucket {
            self.last_bucket = bucket;
            tracing::info!("Discovered {} recipe links so far", bucket * interval);
        }
    }

    async fn fetch_listing(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SamovarError::Http {
                url: url.to_string(),
                source: e,
            })?;
        response.text().await.map_err(|e| SamovarError::Http {
            url: url.to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        CollectorConfig, FetcherConfig, OutputConfig, QueueConfig, SiteConfig,
    };

    fn test_config(checkpoint_path: &str) -> Config {
        Config {
            site: SiteConfig {
                base_url: "https://1000.menu".to_string(),
                search_path: "/cooking/search?ms=1".to_string(),
                path_prefix: "/cooking/".to_string(),
                user_agent: "TestAgent/1.0".to_string(),
            },
            collector: CollectorConfig {
                checkpoint_path: checkpoint_path.to_string(),
                progress_interval: 2,
                ..CollectorConfig::default()
            },
            fetcher: FetcherConfig::default(),
            queue: QueueConfig {
                database_path: String::new(),
            },
            output: OutputConfig {
                tsv_path: "out.tsv".to_string(),
                jsonl_path: None,
                flush_threshold: 500,
            },
        }
    }

    fn test_collector(dir: &tempfile::TempDir) -> LinkCollector {
        let checkpoint = dir.path().join("checkpoint.json");
        let store = Arc::new(Mutex::new(SqliteQueue::open_in_memory().unwrap()));
        LinkCollector::new(test_config(checkpoint.to_str().unwrap()), store).unwrap()
    }

    const LISTING: &str = r#"
        <div id="recipes">
            <a class="h5" href="/cooking/1-borscht">Borscht</a>
            <a class="h5" href="/cooking/2-olivie">Olivie</a>
        </div>
    "#;

    #[test]
    fn test_harvest_page_inserts_new_links() {
        let dir = tempfile::tempdir().unwrap();
        let mut collector = test_collector(&dir);

        assert_eq!(collector.harvest_page(LISTING).unwrap(), 2);
        // Replaying the same page discovers nothing new.
        assert_eq!(collector.harvest_page(LISTING).unwrap(), 0);

        let counts = collector.store.lock().unwrap().status_counts().unwrap();
        assert_eq!(counts.pending, 2);
    }

    #[test]
    fn test_harvest_page_without_cards() {
        let dir = tempfile::tempdir().unwrap();
        let mut collector = test_collector(&dir);
        assert_eq!(collector.harvest_page("<html></html>").unwrap(), 0);
    }

    #[test]
    fn test_progress_buckets_advance_once_per_interval() {
        let dir = tempfile::tempdir().unwrap();
        let mut collector = test_collector(&dir);

        collector.record_progress(1);
        assert_eq!(collector.last_bucket, 0);
        collector.record_progress(1);
        assert_eq!(collector.last_bucket, 1);
        collector.record_progress(5);
        assert_eq!(collector.last_bucket, 3);
    }
}
