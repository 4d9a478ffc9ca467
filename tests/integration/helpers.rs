// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use harvestrs::domain::models::article::FetchedArticle;
use harvestrs::domain::models::task::{Priority, Task};
use harvestrs::engines::traits::FetchExecutor;
use harvestrs::infrastructure::cache::memory_dedup_cache::MemoryDedupCache;
use harvestrs::infrastructure::repositories::memory_article_repo::InMemoryArticleStore;
use harvestrs::queue::priority_broker::InMemoryPriorityBroker;
use harvestrs::utils::errors::FetchError;
use harvestrs::utils::retry_policy::RetryPolicy;
use harvestrs::utils::url_normalizer::{NormalizerConfig, UrlNormalizer};
use harvestrs::workers::{PipelineComponents, PoolConfig, WorkerPool};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// 脚本化抓取的单步行为
#[derive(Debug, Clone)]
pub enum Step {
    Succeed,
    Fail(FetchError),
    /// 一直等到抓取期限才返回超时
    Hang,
}

/// 按 URL 逐次返回预设结果的抓取执行器
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    fallback: Step,
    latency: Duration,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new(fallback: Step) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback,
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn script(self, url: &str, steps: Vec<Step>) -> Self {
        self.scripts.lock().insert(url.to_string(), steps.into());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl FetchExecutor for ScriptedFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedArticle, FetchError> {
        self.calls.lock().push(url.to_string());
        let step = self
            .scripts
            .lock()
            .get_mut(url)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.fallback.clone());

        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }

        match step {
            Step::Succeed => Ok(FetchedArticle {
                title: Some(format!("Story at {}", url)),
                content: Some("Body text ".repeat(20)),
                degraded: false,
            }),
            Step::Fail(err) => Err(err),
            Step::Hang => {
                sleep(timeout).await;
                Err(FetchError::timeout("scripted hang"))
            }
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

pub struct TestPipeline {
    pub broker: Arc<InMemoryPriorityBroker>,
    pub cache: Arc<MemoryDedupCache>,
    pub store: Arc<InMemoryArticleStore>,
    pub fetcher: Arc<ScriptedFetcher>,
    pub normalizer: Arc<UrlNormalizer>,
    pub pool: WorkerPool,
}

pub fn fast_retry_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(50),
        enable_jitter: false,
        ..RetryPolicy::default()
    }
}

pub fn pool_config(worker_count: usize) -> PoolConfig {
    PoolConfig {
        worker_count,
        fetch_timeout: Duration::from_secs(5),
        pop_timeout: Duration::from_millis(50),
        drain_timeout: Duration::from_secs(5),
        cancel_grace: Duration::from_secs(2),
        outage_backoff: Duration::from_millis(100),
        monitor_interval: Duration::from_secs(1),
    }
}

pub fn pipeline(fetcher: ScriptedFetcher, config: PoolConfig) -> TestPipeline {
    pipeline_with_policy(fetcher, config, fast_retry_policy())
}

pub fn pipeline_with_policy(
    fetcher: ScriptedFetcher,
    config: PoolConfig,
    policy: RetryPolicy,
) -> TestPipeline {
    let broker = Arc::new(InMemoryPriorityBroker::new());
    let cache = Arc::new(MemoryDedupCache::new());
    let store = Arc::new(InMemoryArticleStore::new());
    let fetcher = Arc::new(fetcher);
    let normalizer = Arc::new(UrlNormalizer::new(NormalizerConfig::default()));

    let components = PipelineComponents {
        broker: broker.clone(),
        cache: cache.clone(),
        fetcher: fetcher.clone(),
        sink: store.clone(),
        normalizer: normalizer.clone(),
    };

    TestPipeline {
        broker,
        cache,
        store,
        fetcher,
        normalizer,
        pool: WorkerPool::new(components, policy, config),
    }
}

pub fn task(article_id: &str, url: &str, priority: Priority) -> Task {
    Task {
        article_id: article_id.to_string(),
        url_original: url.to_string(),
        url_normalized: String::new(),
        url_hash: String::new(),
        source: "test-feed".to_string(),
        category: "news".to_string(),
        priority,
        attempt: 0,
        submitted_by: "tester".to_string(),
        force: false,
        claim_id: None,
    }
}

/// 轮询直到条件成立，超时则 panic
pub async fn wait_until<F: Fn() -> bool>(what: &str, condition: F) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        if Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        sleep(Duration::from_millis(10)).await;
    }
}
