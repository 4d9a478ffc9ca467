// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 需要 Docker：`cargo test --test integration_tests -- --ignored`

use super::helpers::task;
use harvestrs::domain::models::article::ArticleStatus;
use harvestrs::domain::models::cache_entry::{CacheStatus, ClaimResult};
use harvestrs::domain::models::task::Priority;
use harvestrs::domain::repositories::dedup_cache::DedupCache;
use harvestrs::infrastructure::cache::redis_client::RedisClient;
use harvestrs::infrastructure::cache::redis_dedup_cache::RedisDedupCache;
use harvestrs::queue::priority_broker::PriorityBroker;
use harvestrs::queue::redis_broker::{QueueKeys, RedisPriorityBroker};
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage};
use uuid::Uuid;

async fn redis() -> (ContainerAsync<GenericImage>, RedisClient) {
    let node = GenericImage::new("redis", "7-alpine")
        .start()
        .await
        .expect("Failed to start Redis");
    let port = node
        .get_host_port_ipv4(6379)
        .await
        .expect("Failed to get Redis port");
    let client = RedisClient::new(&format!("redis://127.0.0.1:{}", port))
        .await
        .unwrap();

    // The container may accept connections before Redis is ready.
    for _ in 0..50 {
        if client.ping().await.is_ok() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    (node, client)
}

#[tokio::test]
#[ignore]
async fn test_redis_broker_orders_by_priority() {
    let (_node, client) = redis().await;
    let broker = RedisPriorityBroker::new(client.clone(), QueueKeys::default());

    broker
        .enqueue(task("l", "https://example.com/l", Priority::Low))
        .await
        .unwrap();
    broker
        .enqueue(task("h", "https://example.com/h", Priority::High))
        .await
        .unwrap();
    broker
        .enqueue(task("m", "https://example.com/m", Priority::Medium))
        .await
        .unwrap();
    client
        .rpush(&QueueKeys::default().high, "{not json")
        .await
        .unwrap();

    assert_eq!(broker.depths().await.unwrap().total(), 4);

    let mut order = Vec::new();
    while let Some(task) = broker.dequeue(Duration::from_millis(300)).await.unwrap() {
        order.push(task.article_id);
    }
    assert_eq!(order, vec!["h", "m", "l"]);
    assert_eq!(broker.try_dequeue().await.unwrap(), None);
}

#[tokio::test]
#[ignore]
async fn test_redis_dedup_cache_claim_lifecycle() {
    let (_node, client) = redis().await;
    let cache = RedisDedupCache::new(client, "test:url:");
    let owner = Uuid::new_v4();

    assert_eq!(cache.try_claim("h1", owner, false).await.unwrap(), ClaimResult::Claimed);
    assert_eq!(
        cache.try_claim("h1", Uuid::new_v4(), false).await.unwrap(),
        ClaimResult::AlreadyInFlight
    );
    assert_eq!(cache.try_claim("h1", owner, false).await.unwrap(), ClaimResult::Claimed);

    assert!(!cache
        .release("h1", Uuid::new_v4(), ArticleStatus::Completed)
        .await
        .unwrap());
    assert!(cache
        .release("h1", owner, ArticleStatus::Completed)
        .await
        .unwrap());

    assert_eq!(
        cache.status("h1").await.unwrap().unwrap().status,
        CacheStatus::Completed
    );
    assert_eq!(
        cache.try_claim("h1", Uuid::new_v4(), false).await.unwrap(),
        ClaimResult::AlreadyCompleted
    );
    assert_eq!(
        cache.try_claim("h1", Uuid::new_v4(), true).await.unwrap(),
        ClaimResult::Claimed
    );
}

#[tokio::test]
#[ignore]
async fn test_redis_broker_priority_follows_list_and_requeue_keeps_head() {
    let (_node, client) = redis().await;
    let keys = QueueKeys::default();
    let broker = RedisPriorityBroker::new(client.clone(), keys.clone());

    // Payload says low, but the producer pushed it onto the high list.
    let mislabelled = task("pushed-high", "https://example.com/a", Priority::Low);
    client
        .rpush(&keys.high, &serde_json::to_string(&mislabelled).unwrap())
        .await
        .unwrap();
    broker
        .enqueue(task("next-high", "https://example.com/b", Priority::High))
        .await
        .unwrap();

    let popped = broker.dequeue(Duration::from_millis(300)).await.unwrap().unwrap();
    assert_eq!(popped.article_id, "pushed-high");
    assert_eq!(popped.priority, Priority::High);

    broker.requeue_front(popped).await.unwrap();
    let depths = broker.depths().await.unwrap();
    assert_eq!((depths.high, depths.low), (2, 0));

    let order: Vec<String> = vec![
        broker.try_dequeue().await.unwrap().unwrap().article_id,
        broker.try_dequeue().await.unwrap().unwrap().article_id,
    ];
    assert_eq!(order, vec!["pushed-high", "next-high"]);
}
