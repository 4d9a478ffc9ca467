// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{fast_retry_policy, pool_config, task, wait_until};
use harvestrs::config::settings::FetchSettings;
use harvestrs::domain::models::article::{ArticleStatus, NO_TITLE_NOTE};
use harvestrs::domain::models::task::Priority;
use harvestrs::engines::reqwest_engine::ReqwestFetcher;
use harvestrs::infrastructure::cache::memory_dedup_cache::MemoryDedupCache;
use harvestrs::infrastructure::repositories::memory_article_repo::InMemoryArticleStore;
use harvestrs::queue::priority_broker::{InMemoryPriorityBroker, PriorityBroker};
use harvestrs::utils::url_normalizer::{NormalizerConfig, UrlNormalizer};
use harvestrs::workers::{PipelineComponents, WorkerPool};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STORY: &str = r#"<html><head><title>Harbour reopens after storm | Coast Daily</title></head>
<body><header><h1>Harbour reopens after storm</h1></header>
<article><p>Ferries resumed their normal timetable on Monday morning after engineers cleared
debris from the harbour entrance and inspected every berth along the eastern quay.</p></article>
</body></html>"#;

const UNTITLED: &str = r#"<html><body><div class="post-body"><p>Only a body here, long enough to be
accepted as article content by the extractor even though the page has no headline at all.</p></div></body></html>"#;

#[tokio::test]
async fn test_pipeline_fetches_and_stores_real_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/story"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(STORY, "text/html; charset=utf-8"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/untitled"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(UNTITLED, "text/html"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let broker = Arc::new(InMemoryPriorityBroker::new());
    let store = Arc::new(InMemoryArticleStore::new());
    let components = PipelineComponents {
        broker: broker.clone(),
        cache: Arc::new(MemoryDedupCache::new()),
        fetcher: Arc::new(ReqwestFetcher::new(&FetchSettings::default()).unwrap()),
        sink: store.clone(),
        normalizer: Arc::new(UrlNormalizer::new(NormalizerConfig {
            collapse_scheme: false,
            ..NormalizerConfig::default()
        })),
    };
    let mut pool = WorkerPool::new(components, fast_retry_policy(), pool_config(3));

    let base = server.uri();
    for (id, route) in [("w-1", "story"), ("w-2", "untitled"), ("w-3", "missing")] {
        broker
            .enqueue(task(id, &format!("{}/{}", base, route), Priority::Medium))
            .await
            .unwrap();
    }
    broker
        .enqueue(task("w-4", &format!("{}/story?utm_source=x", base), Priority::Low))
        .await
        .unwrap();
    pool.start();

    let pool_stats = || pool.stats();
    wait_until("all tasks processed", || pool_stats().processed == 4).await;
    let stats = pool.shutdown().await;

    assert_eq!(stats.successful, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.duplicates, 1);

    let by_id = |id: &str| {
        store
            .all()
            .into_iter()
            .find(|o| o.article_id == id)
            .unwrap()
    };
    let story = by_id("w-1");
    assert_eq!(story.title.as_deref(), Some("Harbour reopens after storm"));
    assert!(story.scrape_error.is_none());

    let untitled = by_id("w-2");
    assert_eq!(untitled.status, ArticleStatus::Completed);
    assert_eq!(untitled.scrape_error.as_deref(), Some(NO_TITLE_NOTE));

    let missing = by_id("w-3");
    assert_eq!(missing.status, ArticleStatus::Failed);
    assert_eq!(missing.scrape_error.as_deref(), Some("HttpStatus: HTTP 404"));
}
