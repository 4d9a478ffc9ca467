// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{
    fast_retry_policy, pipeline, pipeline_with_policy, pool_config, task, wait_until,
    ScriptedFetcher, Step,
};
use async_trait::async_trait;
use harvestrs::domain::models::article::{ArticleStatus, ScrapeOutcome, ScrapeStatus};
use harvestrs::domain::models::cache_entry::CacheStatus;
use harvestrs::domain::models::task::Priority;
use harvestrs::domain::repositories::dedup_cache::DedupCache;
use harvestrs::domain::repositories::result_sink::{Ack, ResultSink};
use harvestrs::infrastructure::cache::memory_dedup_cache::MemoryDedupCache;
use harvestrs::queue::priority_broker::{InMemoryPriorityBroker, PriorityBroker};
use harvestrs::utils::errors::{FetchError, StoreError};
use harvestrs::utils::retry_policy::RetryPolicy;
use harvestrs::utils::url_normalizer::{NormalizerConfig, UrlNormalizer};
use harvestrs::workers::{PipelineComponents, WorkerPool};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// 写入永不返回的存储
struct StallingStore;

#[async_trait]
impl ResultSink for StallingStore {
    async fn upsert(&self, _outcome: &ScrapeOutcome) -> Result<Ack, StoreError> {
        std::future::pending().await
    }

    async fn find_by_article_id(&self, _article_id: &str) -> Result<Option<ScrapeOutcome>, StoreError> {
        Ok(None)
    }

    async fn find_by_url_hash(&self, _url_hash: &str) -> Result<Option<ScrapeOutcome>, StoreError> {
        Ok(None)
    }

    async fn count_by_status(&self, _status: ArticleStatus) -> Result<u64, StoreError> {
        Ok(0)
    }
}

async fn drain_ids(broker: &InMemoryPriorityBroker) -> Vec<String> {
    let mut ids = Vec::new();
    while let Some(task) = broker.try_dequeue().await.unwrap() {
        ids.push(task.article_id);
    }
    ids
}

#[tokio::test]
async fn test_transient_failures_then_success_yield_one_completed_record() {
    let url = "https://news.example.com/flaky";
    let fetcher = ScriptedFetcher::new(Step::Succeed).script(
        url,
        vec![
            Step::Fail(FetchError::network("connection reset")),
            Step::Fail(FetchError::network("connection reset")),
            Step::Succeed,
        ],
    );
    let mut p = pipeline(fetcher, pool_config(2));
    p.broker.enqueue(task("flaky-1", url, Priority::Medium)).await.unwrap();
    p.pool.start();

    let store = p.store.clone();
    wait_until("completed record", || {
        store.all().iter().any(|o| o.status == ArticleStatus::Completed)
    })
    .await;
    let stats = p.pool.shutdown().await;

    let records = p.store.all();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].attempts, 3);
    assert_eq!(records[0].scrape_status, ScrapeStatus::Success);
    assert_eq!(p.fetcher.call_count(), 3);
    assert_eq!(stats.retried, 2);
    assert_eq!(stats.successful, 1);

    let hash = p.normalizer.normalize(url).unwrap().hash;
    let entry = p.cache.status(&hash).await.unwrap().unwrap();
    assert_eq!(entry.status, CacheStatus::Completed);
}

#[tokio::test]
async fn test_high_priority_tasks_run_before_low() {
    let mut p = pipeline(ScriptedFetcher::new(Step::Succeed), pool_config(1));
    p.broker
        .enqueue(task("h1", "https://example.com/high-1", Priority::High))
        .await
        .unwrap();
    p.broker
        .enqueue(task("l1", "https://example.com/low-1", Priority::Low))
        .await
        .unwrap();
    p.broker
        .enqueue(task("h2", "https://example.com/high-2", Priority::High))
        .await
        .unwrap();
    p.pool.start();

    let fetcher = p.fetcher.clone();
    wait_until("three fetches", || fetcher.call_count() == 3).await;
    p.pool.shutdown().await;

    assert_eq!(
        p.fetcher.calls(),
        vec![
            "https://example.com/high-1",
            "https://example.com/high-2",
            "https://example.com/low-1",
        ]
    );
}

#[tokio::test]
async fn test_exhausted_timeouts_record_failure() {
    let url = "https://slow.example.com/story";
    let fetcher =
        ScriptedFetcher::new(Step::Fail(FetchError::timeout("no response within 10000ms")));
    let mut p = pipeline(fetcher, pool_config(2));
    p.broker.enqueue(task("slow-1", url, Priority::High)).await.unwrap();
    p.pool.start();

    let store = p.store.clone();
    wait_until("failed record", || !store.is_empty()).await;
    p.pool.shutdown().await;

    let outcome = p.store.find_by_article_id("slow-1").await.unwrap().unwrap();
    assert_eq!(outcome.status, ArticleStatus::Failed);
    assert_eq!(outcome.attempts, 3);
    assert!(outcome.scrape_error.unwrap().starts_with("Timeout"));
    assert_eq!(p.fetcher.call_count(), 3);

    let hash = p.normalizer.normalize(url).unwrap().hash;
    let entry = p.cache.status(&hash).await.unwrap().unwrap();
    assert_eq!(entry.status, CacheStatus::Failed);
}

#[tokio::test]
async fn test_http_status_is_not_retried() {
    let fetcher = ScriptedFetcher::new(Step::Fail(FetchError::http_status(503)));
    let mut p = pipeline(fetcher, pool_config(1));
    p.broker
        .enqueue(task("gone-1", "https://example.com/gone", Priority::Low))
        .await
        .unwrap();
    p.pool.start();

    let store = p.store.clone();
    wait_until("failed record", || !store.is_empty()).await;
    let stats = p.pool.shutdown().await;

    assert_eq!(p.fetcher.call_count(), 1);
    assert_eq!(stats.retried, 0);
    let outcome = p.store.find_by_article_id("gone-1").await.unwrap().unwrap();
    assert_eq!(outcome.scrape_error.as_deref(), Some("HttpStatus: HTTP 503"));
}

#[tokio::test]
async fn test_equivalent_urls_are_fetched_once() {
    let fetcher = ScriptedFetcher::new(Step::Succeed).with_latency(Duration::from_millis(200));
    let mut p = pipeline(fetcher, pool_config(2));
    p.broker
        .enqueue(task("dup-1", "https://example.com/same?utm_source=a", Priority::Medium))
        .await
        .unwrap();
    p.broker
        .enqueue(task("dup-2", "http://example.com/same/", Priority::Medium))
        .await
        .unwrap();
    p.pool.start();

    let pool_stats = || p.pool.stats();
    wait_until("both tasks processed", || pool_stats().processed == 2).await;
    let stats = p.pool.shutdown().await;

    assert_eq!(p.fetcher.call_count(), 1);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.successful, 1);
    assert_eq!(p.store.len(), 1);
}

#[tokio::test]
async fn test_malformed_url_is_recorded_without_fetch() {
    let mut p = pipeline(ScriptedFetcher::new(Step::Succeed), pool_config(1));
    p.broker
        .enqueue(task("bad-1", "htp//broken", Priority::High))
        .await
        .unwrap();
    p.pool.start();

    let store = p.store.clone();
    wait_until("failed record", || !store.is_empty()).await;
    p.pool.shutdown().await;

    assert_eq!(p.fetcher.call_count(), 0);
    let outcome = p.store.find_by_article_id("bad-1").await.unwrap().unwrap();
    assert_eq!(outcome.status, ArticleStatus::Failed);
    assert!(outcome.scrape_error.unwrap().starts_with("MalformedUrl"));
    assert!(p.cache.is_empty());
}

#[tokio::test]
async fn test_shutdown_cancels_in_flight_and_leaves_queue_untouched() {
    let mut config = pool_config(5);
    config.fetch_timeout = Duration::from_secs(60);
    config.drain_timeout = Duration::from_millis(100);
    let mut p = pipeline(ScriptedFetcher::new(Step::Hang), config);

    for i in 0..10 {
        p.broker
            .enqueue(task(
                &format!("hang-{}", i),
                &format!("https://example.com/hang/{}", i),
                Priority::Medium,
            ))
            .await
            .unwrap();
    }
    p.pool.start();

    let fetcher = p.fetcher.clone();
    wait_until("five fetches in flight", || fetcher.call_count() == 5).await;
    let stats = p.pool.shutdown().await;

    assert_eq!(stats.cancelled, 5);
    assert_eq!(p.fetcher.call_count(), 5);
    assert_eq!(p.broker.depths().await.unwrap().total(), 5);

    let records = p.store.all();
    assert_eq!(records.len(), 5);
    for outcome in &records {
        assert_eq!(outcome.status, ArticleStatus::Failed);
        assert!(outcome.scrape_error.as_deref().unwrap().starts_with("Cancelled"));
        let entry = p
            .cache
            .status(outcome.url_hash.as_deref().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.status, CacheStatus::Failed);
    }
}

#[tokio::test]
async fn test_shutdown_lets_in_flight_work_finish_within_drain_window() {
    let fetcher = ScriptedFetcher::new(Step::Succeed).with_latency(Duration::from_millis(300));
    let mut p = pipeline(fetcher, pool_config(5));

    for i in 0..10 {
        p.broker
            .enqueue(task(
                &format!("drain-{}", i),
                &format!("https://example.com/drain/{}", i),
                Priority::Low,
            ))
            .await
            .unwrap();
    }
    p.pool.start();

    let fetcher = p.fetcher.clone();
    wait_until("five fetches in flight", || fetcher.call_count() == 5).await;
    let stats = p.pool.shutdown().await;

    assert_eq!(stats.successful, 5);
    assert_eq!(stats.cancelled, 0);
    assert_eq!(p.broker.depths().await.unwrap().total(), 5);
    assert_eq!(p.store.len(), 5);
}

#[tokio::test]
async fn test_pending_retry_is_cancelled_on_shutdown() {
    let url = "https://example.com/retry-later";
    let policy = RetryPolicy {
        initial_backoff: Duration::from_secs(30),
        max_backoff: Duration::from_secs(30),
        ..fast_retry_policy()
    };
    let mut p = pipeline_with_policy(
        ScriptedFetcher::new(Step::Fail(FetchError::network("reset"))),
        pool_config(1),
        policy,
    );
    p.broker.enqueue(task("later-1", url, Priority::High)).await.unwrap();
    p.pool.start();

    let pool_stats = || p.pool.stats();
    wait_until("retry scheduled", || pool_stats().retried == 1).await;
    let stats = p.pool.shutdown().await;

    assert_eq!(stats.cancelled, 1);
    assert_eq!(p.fetcher.call_count(), 1);
    let outcome = p.store.find_by_article_id("later-1").await.unwrap().unwrap();
    assert_eq!(outcome.status, ArticleStatus::Failed);
    assert!(outcome.scrape_error.unwrap().starts_with("Cancelled"));
    let hash = p.normalizer.normalize(url).unwrap().hash;
    let entry = p.cache.status(&hash).await.unwrap().unwrap();
    assert_eq!(entry.status, CacheStatus::Failed);
}

#[tokio::test]
async fn test_task_taken_during_shutdown_returns_to_queue_head() {
    let mut config = pool_config(1);
    config.pop_timeout = Duration::from_secs(2);
    let mut p = pipeline(ScriptedFetcher::new(Step::Succeed), config);
    p.pool.start();
    // Let the worker block on the empty queue.
    sleep(Duration::from_millis(50)).await;

    let broker = p.broker.clone();
    let (stats, _) = tokio::join!(p.pool.shutdown(), async {
        sleep(Duration::from_millis(50)).await;
        broker
            .enqueue(task("first", "https://example.com/first", Priority::Medium))
            .await
            .unwrap();
        broker
            .enqueue(task("second", "https://example.com/second", Priority::Medium))
            .await
            .unwrap();
    });

    assert_eq!(stats.processed, 0);
    assert_eq!(p.fetcher.call_count(), 0);
    assert_eq!(drain_ids(&p.broker).await, vec!["first", "second"]);
}

#[tokio::test]
async fn test_aborted_worker_releases_its_claim() {
    let broker = Arc::new(InMemoryPriorityBroker::new());
    let cache = Arc::new(MemoryDedupCache::new());
    let fetcher = Arc::new(ScriptedFetcher::new(Step::Succeed));
    let normalizer = Arc::new(UrlNormalizer::new(NormalizerConfig::default()));
    let mut config = pool_config(1);
    config.drain_timeout = Duration::from_millis(100);
    config.cancel_grace = Duration::from_millis(100);

    let mut pool = WorkerPool::new(
        PipelineComponents {
            broker: broker.clone(),
            cache: cache.clone(),
            fetcher: fetcher.clone(),
            sink: Arc::new(StallingStore),
            normalizer: normalizer.clone(),
        },
        fast_retry_policy(),
        config,
    );
    let url = "https://example.com/stuck-write";
    broker.enqueue(task("stuck-1", url, Priority::High)).await.unwrap();
    pool.start();

    let calls = fetcher.clone();
    wait_until("fetch finished", || calls.call_count() == 1).await;
    let stats = pool.shutdown().await;

    assert_eq!(stats.cancelled, 1);
    let hash = normalizer.normalize(url).unwrap().hash;
    let entry = cache.status(&hash).await.unwrap().unwrap();
    assert_eq!(entry.status, CacheStatus::Failed);
}

#[tokio::test]
async fn test_batch_run_processes_queued_tasks_then_stops() {
    let url = "https://example.com/batch/flaky";
    let fetcher = ScriptedFetcher::new(Step::Succeed)
        .script(url, vec![Step::Fail(FetchError::timeout("slow")), Step::Succeed]);
    let p = pipeline(fetcher, pool_config(3));
    p.broker.enqueue(task("batch-flaky", url, Priority::High)).await.unwrap();
    for i in 0..5 {
        p.broker
            .enqueue(task(
                &format!("batch-{}", i),
                &format!("https://example.com/batch/{}", i),
                Priority::Low,
            ))
            .await
            .unwrap();
    }

    let stats = p.pool.run_batch(None).await;

    assert_eq!(stats.processed, 6);
    assert_eq!(stats.successful, 6);
    assert_eq!(stats.retried, 1);
    assert_eq!(p.fetcher.call_count(), 7);
    assert_eq!(p.store.len(), 6);
    assert_eq!(p.broker.depths().await.unwrap().total(), 0);
}

#[tokio::test]
async fn test_batch_count_limits_new_tasks_and_keeps_the_rest_in_order() {
    let p = pipeline(ScriptedFetcher::new(Step::Succeed), pool_config(2));
    for i in 0..5 {
        p.broker
            .enqueue(task(
                &format!("b-{}", i),
                &format!("https://example.com/limited/{}", i),
                Priority::Medium,
            ))
            .await
            .unwrap();
    }

    let stats = p.pool.run_batch(Some(2)).await;

    assert_eq!(stats.processed, 2);
    assert_eq!(p.fetcher.call_count(), 2);
    assert_eq!(drain_ids(&p.broker).await, vec!["b-2", "b-3", "b-4"]);
}

#[tokio::test]
async fn test_batch_run_on_empty_queues_returns_immediately() {
    let p = pipeline(ScriptedFetcher::new(Step::Succeed), pool_config(2));

    let stats = p.pool.run_batch(None).await;

    assert_eq!(stats.processed, 0);
    assert_eq!(p.fetcher.call_count(), 0);
}
