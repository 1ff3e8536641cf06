//! End-to-end tests for the harvest pipeline
//!
//! These tests run the collector and fetcher against wiremock servers and a
//! real on-disk queue database, covering the full discover → lease → fetch →
//! acknowledge cycle.

use samovar::collector::LinkCollector;
use samovar::config::{
    CollectorConfig, CollectorMode, Config, FetcherConfig, OutputConfig, QueueConfig, SiteConfig,
};
use samovar::fetcher::Fetcher;
use samovar::queue::{ItemStatus, QueueStore, SqliteQueue};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RECIPE_PAGE: &str = r#"
<section itemtype="http://schema.org/Recipe">
  <meta itemprop="name" content="Тестовый рецепт">
  <meta itemprop="recipeIngredient" content="Ингредиент - 1 шт.">
  <ol class="instructions"><li>ШАГ 1. Готовить.</li></ol>
</section>
"#;

fn listing_page(links: &[&str], with_template: bool) -> String {
    let mut body = String::from(r#"<div id="recipes">"#);
    for link in links {
        body.push_str(&format!(r#"<a class="h5" href="{}">recipe</a>"#, link));
    }
    body.push_str("</div>");
    if with_template {
        body.push_str(
            r#"<script>btn.onclick = () => cook_load_next_page_html('/cooking/search?ajax=1');</script>"#,
        );
    }
    body
}

fn test_config(base_url: &str, dir: &TempDir) -> Config {
    Config {
        site: SiteConfig {
            base_url: base_url.to_string(),
            search_path: "/cooking/search?start=1".to_string(),
            path_prefix: "/cooking/".to_string(),
            user_agent: "SamovarTest/1.0".to_string(),
        },
        collector: CollectorConfig {
            mode: CollectorMode::Endpoint,
            max_steps: None,
            stop_after_stale: 1,
            progress_interval: 200,
            http_timeout_secs: 5,
            checkpoint_path: dir
                .path()
                .join("checkpoint.json")
                .to_string_lossy()
                .into_owned(),
        },
        fetcher: FetcherConfig {
            batch_size: 10,
            concurrency: 4,
            http_timeout_secs: 5,
            max_attempts: 1,
            lease_timeout_secs: 900,
            idle_wait_secs: 1,
            retry_backoff_secs: 0,
            retry_backoff_cap_secs: 0,
            progress_interval: 200,
        },
        queue: QueueConfig {
            database_path: dir
                .path()
                .join("workqueue.db")
                .to_string_lossy()
                .into_owned(),
        },
        output: OutputConfig {
            tsv_path: dir.path().join("recipes.tsv").to_string_lossy().into_owned(),
            jsonl_path: Some(
                dir.path()
                    .join("recipes.jsonl")
                    .to_string_lossy()
                    .into_owned(),
            ),
            flush_threshold: 2,
        },
    }
}

fn open_store(config: &Config) -> Arc<Mutex<SqliteQueue>> {
    Arc::new(Mutex::new(
        SqliteQueue::open(Path::new(&config.queue.database_path)).expect("open queue"),
    ))
}

/// Polls the store until the predicate holds or the deadline passes
async fn wait_for<F>(store: &Arc<Mutex<SqliteQueue>>, mut predicate: F)
where
    F: FnMut(samovar::queue::QueueCounts) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
    loop {
        let counts = store.lock().unwrap().status_counts().expect("counts");
        if predicate(counts) {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for queue state, last counts: {:?}",
            counts
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn test_collector_discovers_through_endpoint_pagination() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), &dir);

    Mock::given(method("GET"))
        .and(path("/cooking/search"))
        .and(query_param("start", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(
            &["/cooking/r1", "/cooking/r2", "/news/ignored"],
            true,
        )))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cooking/search"))
        .and(query_param("ajax", "1"))
        .and(query_param("p", "2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(listing_page(&["/cooking/r3"], false)),
        )
        .mount(&server)
        .await;

    // Page 3 repeats known links only: a zero-new step ends discovery.
    Mock::given(method("GET"))
        .and(path("/cooking/search"))
        .and(query_param("ajax", "1"))
        .and(query_param("p", "3"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(listing_page(&["/cooking/r1"], false)),
        )
        .mount(&server)
        .await;

    let store = open_store(&config);
    let mut collector = LinkCollector::new(config.clone(), Arc::clone(&store)).unwrap();
    collector.run().await.unwrap();

    let counts = store.lock().unwrap().status_counts().unwrap();
    assert_eq!(counts.pending, 3);
    assert_eq!(counts.total(), 3);

    let base = server.uri();
    for recipe in ["r1", "r2", "r3"] {
        let item = store
            .lock()
            .unwrap()
            .item(&format!("{}/cooking/{}", base, recipe))
            .unwrap();
        assert_eq!(item.unwrap().status, ItemStatus::Pending);
    }
}

#[tokio::test]
async fn test_collector_resumes_from_checkpoint() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), &dir);

    Mock::given(method("GET"))
        .and(path("/cooking/search"))
        .and(query_param("start", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_page(&["/cooking/r1", "/cooking/r2"], true)),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cooking/search"))
        .and(query_param("ajax", "1"))
        .and(query_param("p", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[], false)))
        .mount(&server)
        .await;

    let store = open_store(&config);
    let mut collector = LinkCollector::new(config.clone(), Arc::clone(&store)).unwrap();
    collector.run().await.unwrap();
    assert_eq!(store.lock().unwrap().status_counts().unwrap().pending, 2);

    // A second run resumes past the checkpointed step: page 3 has no mock,
    // so the walk ends immediately, and replaying page 1 adds nothing new.
    let mut collector = LinkCollector::new(config, Arc::clone(&store)).unwrap();
    collector.run().await.unwrap();

    let counts = store.lock().unwrap().status_counts().unwrap();
    assert_eq!(counts.pending, 2);
    assert_eq!(counts.total(), 2);
}

#[tokio::test]
async fn test_fetcher_drains_queue_and_exports_records() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), &dir);

    Mock::given(method("GET"))
        .and(path("/cooking/r1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RECIPE_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cooking/r2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RECIPE_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cooking/bad"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = open_store(&config);
    let identifiers: Vec<String> = ["r1", "r2", "bad"]
        .iter()
        .map(|name| format!("{}/cooking/{}", server.uri(), name))
        .collect();
    assert_eq!(store.lock().unwrap().insert_new(&identifiers).unwrap(), 3);

    let mut fetcher = Fetcher::new(config.clone(), Arc::clone(&store)).unwrap();
    let cancel = CancellationToken::new();
    let run_cancel = cancel.clone();
    let handle = tokio::spawn(async move { fetcher.run(run_cancel).await });

    wait_for(&store, |counts| counts.processed == 2 && counts.failed == 1).await;
    cancel.cancel();
    handle.await.unwrap().unwrap();

    // The 404 item burned its single attempt and is terminally failed.
    let bad = store
        .lock()
        .unwrap()
        .item(&identifiers[2])
        .unwrap()
        .unwrap();
    assert_eq!(bad.status, ItemStatus::Failed);
    assert_eq!(bad.attempts, 1);
    assert!(bad.last_error.is_some());

    let tsv = std::fs::read_to_string(&config.output.tsv_path).unwrap();
    let lines: Vec<&str> = tsv.lines().collect();
    assert_eq!(lines.len(), 3, "header plus two records:\n{}", tsv);
    assert!(lines[0].starts_with("title\t"));
    assert!(lines[1].contains("Тестовый рецепт"));

    let jsonl =
        std::fs::read_to_string(config.output.jsonl_path.as_ref().unwrap()).unwrap();
    assert_eq!(jsonl.lines().count(), 2);
}

#[tokio::test]
async fn test_fetcher_recovers_abandoned_lease() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server.uri(), &dir);
    // Treat every lease as stale so the sweep fires on the first cycle.
    config.fetcher.lease_timeout_secs = 0;

    Mock::given(method("GET"))
        .and(path("/cooking/r1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RECIPE_PAGE))
        .mount(&server)
        .await;

    let identifier = format!("{}/cooking/r1", server.uri());
    let store = open_store(&config);
    {
        // Simulate a consumer that leased the item and crashed before acking.
        let mut queue = store.lock().unwrap();
        queue.insert_new(std::slice::from_ref(&identifier)).unwrap();
        let leased = queue.lease_batch(1).unwrap();
        assert_eq!(leased.len(), 1);
    }

    let mut fetcher = Fetcher::new(config, Arc::clone(&store)).unwrap();
    let cancel = CancellationToken::new();
    let run_cancel = cancel.clone();
    let handle = tokio::spawn(async move { fetcher.run(run_cancel).await });

    wait_for(&store, |counts| counts.processed == 1).await;
    cancel.cancel();
    handle.await.unwrap().unwrap();

    let item = store.lock().unwrap().item(&identifier).unwrap().unwrap();
    assert_eq!(item.status, ItemStatus::Processed);
}

#[tokio::test]
async fn test_fetcher_stops_promptly_when_cancelled() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), &dir);

    let store = open_store(&config);
    let mut fetcher = Fetcher::new(config, store).unwrap();

    let cancel = CancellationToken::new();
    let run_cancel = cancel.clone();
    let handle = tokio::spawn(async move { fetcher.run(run_cancel).await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("drain did not stop after cancellation");
    result.unwrap().unwrap();
}
