// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use harvestrs::config::settings::{Backend, RunMode, Settings};
use harvestrs::domain::repositories::dedup_cache::DedupCache;
use harvestrs::engines::reqwest_engine::ReqwestFetcher;
use harvestrs::infrastructure::cache::memory_dedup_cache::MemoryDedupCache;
use harvestrs::infrastructure::cache::redis_client::RedisClient;
use harvestrs::infrastructure::cache::redis_dedup_cache::RedisDedupCache;
use harvestrs::infrastructure::database::connection;
use harvestrs::infrastructure::repositories::article_repo_impl::ArticleRepositoryImpl;
use harvestrs::queue::priority_broker::{InMemoryPriorityBroker, PriorityBroker};
use harvestrs::queue::redis_broker::RedisPriorityBroker;
use harvestrs::utils::telemetry;
use harvestrs::utils::url_normalizer::UrlNormalizer;
use harvestrs::workers::{PipelineComponents, WorkerPool};
use std::sync::Arc;
use tracing::info;

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并运行工作池。
/// 持续模式运行到收到 Ctrl-C，批处理模式处理完队列后退出。
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::new()?;

    // 1. Initialize logging
    telemetry::init_telemetry(&settings.logging.format);
    info!("Starting harvestrs...");

    if settings.metrics.enabled {
        harvestrs::infrastructure::metrics::init_metrics(&settings.metrics.listen_addr);
    }

    // 2. Result store
    let db = Arc::new(connection::connect_and_migrate(&settings.database).await?);
    info!("Database connected");

    // 3. Queue and dedup cache
    let redis = if settings.queue.backend == Backend::Redis || settings.cache.backend == Backend::Redis {
        let client = RedisClient::new(&settings.redis.url).await?;
        client.ping().await?;
        info!("Redis connected");
        Some(client)
    } else {
        None
    };

    let broker: Arc<dyn PriorityBroker> = match (&settings.queue.backend, &redis) {
        (Backend::Redis, Some(client)) => Arc::new(RedisPriorityBroker::new(
            client.clone(),
            settings.queue.keys(),
        )),
        _ => Arc::new(InMemoryPriorityBroker::new()),
    };

    let cache: Arc<dyn DedupCache> = match (&settings.cache.backend, &redis) {
        (Backend::Redis, Some(client)) => Arc::new(RedisDedupCache::new(
            client.clone(),
            settings.cache.key_prefix.clone(),
        )),
        _ => Arc::new(MemoryDedupCache::new()),
    };

    // 4. Worker pool
    let components = PipelineComponents {
        broker,
        cache,
        fetcher: Arc::new(ReqwestFetcher::new(&settings.fetch)?),
        sink: Arc::new(ArticleRepositoryImpl::new(db)),
        normalizer: Arc::new(UrlNormalizer::new(settings.normalizer.clone())),
    };

    let mut pool = WorkerPool::new(components, settings.retry.policy(), settings.pool_config());

    let stats = match settings.pipeline.mode {
        RunMode::Continuous => {
            pool.start();
            pool.run_until_ctrl_c().await
        }
        RunMode::Batch => pool.run_batch(settings.pipeline.batch_count).await,
    };
    info!(
        processed = stats.processed,
        successful = stats.successful,
        failed = stats.failed,
        duplicates = stats.duplicates,
        "harvestrs stopped"
    );

    Ok(())
}
