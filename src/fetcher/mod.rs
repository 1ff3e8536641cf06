//! Recipe fetcher: the consumer side of the pipeline
//!
//! Drains the work queue in leased batches, fans each batch out across a
//! bounded pool of concurrent fetch/parse tasks, and acknowledges every
//! leased item exactly once. Per-item failures go back to the queue with
//! backoff; only store connectivity problems can pause the loop, and only a
//! store-layer bug can abort it.

mod client;
mod recipe;

pub use client::build_http_client;
pub use recipe::parse_recipe;

use crate::config::Config;
use crate::output::{RecipeRecord, ResultWriter};
use crate::queue::{AckOutcome, QueueItem, QueueStore, SqliteQueue, StoreError, StoreResult};
use crate::{Result, SamovarError};
use reqwest::Client;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Fetches one recipe page and parses it into a record
pub async fn fetch_recipe(client: &Client, url: &str) -> Result<RecipeRecord> {
    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| SamovarError::Http {
            url: url.to_string(),
            source: e,
        })?;
    let body = response.text().await.map_err(|e| SamovarError::Http {
        url: url.to_string(),
        source: e,
    })?;
    parse_recipe(&body, url).ok_or_else(|| SamovarError::Parse {
        url: url.to_string(),
        message: "recipe payload missing required fields".to_string(),
    })
}

/// Drains the work queue until cancelled
pub struct Fetcher {
    config: Config,
    store: Arc<Mutex<SqliteQueue>>,
    client: Client,
    writer: ResultWriter,
    semaphore: Arc<Semaphore>,
    processed: u64,
    failed: u64,
}

impl Fetcher {
    pub fn new(config: Config, store: Arc<Mutex<SqliteQueue>>) -> Result<Self> {
        let client = build_http_client(&config.site.user_agent, config.fetcher.http_timeout())?;
        let writer = ResultWriter::new(
            PathBuf::from(&config.output.tsv_path),
            config.output.jsonl_path.as_ref().map(PathBuf::from),
            config.output.flush_threshold,
        );
        let semaphore = Arc::new(Semaphore::new(config.fetcher.concurrency));

        Ok(Self {
            config,
            store,
            client,
            writer,
            semaphore,
            processed: 0,
            failed: 0,
        })
    }

    /// Runs the drain loop until the token is cancelled
    ///
    /// On cancellation the in-flight batch completes and is acknowledged,
    /// then buffered output is flushed.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        tracing::info!(
            "Draining queue: batch size {}, concurrency {}, max attempts {}",
            self.config.fetcher.batch_size,
            self.config.fetcher.concurrency,
            self.config.fetcher.max_attempts
        );

        let result = self.drain(&cancel).await;
        let flushed = self.writer.finalize();

        tracing::info!(
            "Drain stopped: {} processed, {} failed",
            self.processed,
            self.failed
        );

        result?;
        flushed?;
        Ok(())
    }

    async fn drain(&mut self, cancel: &CancellationToken) -> Result<()> {
        let lease_timeout = self.config.fetcher.lease_timeout();
        let batch_size = self.config.fetcher.batch_size;
        let idle_wait = self.config.fetcher.idle_wait();

        loop {
            if cancel.is_cancelled() {
                tracing::info!("Stop requested; ending drain loop");
                break;
            }

            // Items stranded by a crashed consumer come back first.
            let reclaimed = self
                .store_op(cancel, |store| store.reclaim_stale(lease_timeout))
                .await?;
            if reclaimed > 0 {
                tracing::warn!("Reclaimed {} stale leases", reclaimed);
            }

            let batch = self
                .store_op(cancel, |store| store.lease_batch(batch_size))
                .await?;

            if batch.is_empty() {
                self.writer.flush()?;
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(idle_wait) => {}
                }
                continue;
            }

            tracing::debug!("Leased {} items", batch.len());
            self.process_batch(batch, cancel).await?;
        }

        Ok(())
    }

    /// Fans one leased batch out over the bounded worker pool and
    /// acknowledges every completed task exactly once
    async fn process_batch(
        &mut self,
        batch: Vec<QueueItem>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut tasks: JoinSet<(String, Result<RecipeRecord>)> = JoinSet::new();

        for item in batch {
            let Ok(permit) = Arc::clone(&self.semaphore).acquire_owned().await else {
                tracing::error!(
                    "Fetch pool semaphore closed; leaving remaining items leased for the sweep"
                );
                break;
            };
            let client = self.client.clone();
            let url = item.identifier;
            tasks.spawn(async move {
                let _permit = permit;
                let outcome = fetch_recipe(&client, &url).await;
                (url, outcome)
            });
        }

        let max_attempts = self.config.fetcher.max_attempts;
        let backoff = self.config.fetcher.retry_policy();
        let progress_interval = self.config.fetcher.progress_interval;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((url, Ok(record))) => {
                    self.writer.append(record)?;
                    self.store_op(cancel, |store| store.ack_success(&url)).await?;
                    self.processed += 1;
                    if progress_interval > 0 && self.processed % progress_interval == 0 {
                        tracing::info!(
                            "Parsed {} recipes so far, {} failed (latest: {})",
                            self.processed,
                            self.failed,
                            url
                        );
                    }
                }
                Ok((url, Err(error))) => {
                    tracing::warn!("Failed to harvest {}: {}", url, error);
                    let message = error.to_string();
                    let outcome = self
                        .store_op(cancel, |store| {
                            store.ack_failure(&url, &message, max_attempts, &backoff)
                        })
                        .await?;
                    if outcome == AckOutcome::Exhausted {
                        self.failed += 1;
                        tracing::warn!("Giving up on {} after {} attempts", url, max_attempts);
                    }
                }
                Err(join_error) => {
                    // No identifier to acknowledge; the stale-lease sweep
                    // will return the item to the queue.
                    tracing::error!("Fetch task aborted: {}", join_error);
                }
            }
        }

        Ok(())
    }

    /// Runs a store operation, pausing and retrying while storage is
    /// unavailable. Every other store error is surfaced to the caller.
    async fn store_op<T, F>(&self, cancel: &CancellationToken, mut op: F) -> Result<T>
    where
        F: FnMut(&mut SqliteQueue) -> StoreResult<T>,
    {
        let mut pause = Duration::from_secs(1);
        loop {
            let outcome = {
                let mut store = self.store.lock().unwrap();
                op(&mut store)
            };
            match outcome {
                Ok(value) => return Ok(value),
                Err(StoreError::Unavailable(e)) => {
                    tracing::warn!("Queue store unavailable ({}); retrying in {:?}", e, pause);
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(StoreError::Unavailable(e).into()),
                        _ = tokio::time::sleep(pause) => {}
                    }
                    pause = (pause * 2).min(Duration::from_secs(60));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
