// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::priority_broker::{PriorityBroker, QueueDepths};
use crate::domain::models::task::{Priority, Task};
use crate::infrastructure::cache::redis_client::RedisClient;
use crate::utils::errors::QueueError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, warn};

/// 单次 BLPOP 的最长阻塞时间
///
/// 较长的等待拆成多次短阻塞，避免超过客户端的响应超时。
const BLPOP_SLICE: Duration = Duration::from_millis(250);

/// 三个优先级对应的 Redis 列表键
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueKeys {
    pub high: String,
    pub medium: String,
    pub low: String,
}

impl Default for QueueKeys {
    fn default() -> Self {
        Self {
            high: "articles:high".to_string(),
            medium: "articles:medium".to_string(),
            low: "articles:low".to_string(),
        }
    }
}

impl QueueKeys {
    pub fn for_priority(&self, priority: Priority) -> &str {
        match priority {
            Priority::High => &self.high,
            Priority::Medium => &self.medium,
            Priority::Low => &self.low,
        }
    }

    /// 列表键对应的优先级
    pub fn priority_of(&self, key: &str) -> Option<Priority> {
        Priority::ALL
            .iter()
            .copied()
            .find(|p| self.for_priority(*p) == key)
    }

    /// 按出队顺序排列的键
    pub fn ordered(&self) -> Vec<String> {
        Priority::ALL
            .iter()
            .map(|p| self.for_priority(*p).to_string())
            .collect()
    }
}

/// Redis 优先级代理
///
/// 入队为 `RPUSH`（尾部），放回为 `LPUSH`（头部），出队为按优先级顺序的 `BLPOP`，
/// 多个进程可以同时消费同一组列表。无法解析的消息记录日志后丢弃。
#[derive(Clone)]
pub struct RedisPriorityBroker {
    client: RedisClient,
    keys: QueueKeys,
}

impl RedisPriorityBroker {
    pub fn new(client: RedisClient, keys: QueueKeys) -> Self {
        Self { client, keys }
    }

    pub fn keys(&self) -> &QueueKeys {
        &self.keys
    }

    /// 解析消息；优先级以所在列表为准，重试回到原队列
    fn decode(&self, key: &str, payload: &str) -> Option<Task> {
        match serde_json::from_str::<Task>(payload) {
            Ok(mut task) => {
                if let Some(priority) = self.keys.priority_of(key) {
                    task.priority = priority;
                }
                Some(task)
            }
            Err(e) => {
                error!(queue = key, error = %e, "Dropping undecodable task payload");
                None
            }
        }
    }
}

fn backend(e: anyhow::Error) -> QueueError {
    QueueError::Backend(e.to_string())
}

#[async_trait]
impl PriorityBroker for RedisPriorityBroker {
    async fn enqueue(&self, task: Task) -> Result<(), QueueError> {
        let payload =
            serde_json::to_string(&task).map_err(|e| QueueError::Serialization(e.to_string()))?;
        self.client
            .rpush(self.keys.for_priority(task.priority), &payload)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn requeue_front(&self, task: Task) -> Result<(), QueueError> {
        let payload =
            serde_json::to_string(&task).map_err(|e| QueueError::Serialization(e.to_string()))?;
        self.client
            .lpush(self.keys.for_priority(task.priority), &payload)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<Task>, QueueError> {
        let keys = self.keys.ordered();
        let deadline = Instant::now() + wait;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            // BLPOP 的 0 表示永久阻塞，这里至少等 10ms
            let slice = remaining.min(BLPOP_SLICE).max(Duration::from_millis(10));

            if let Some((key, payload)) = self
                .client
                .blpop(&keys, slice.as_secs_f64())
                .await
                .map_err(backend)?
            {
                match self.decode(&key, &payload) {
                    Some(task) => return Ok(Some(task)),
                    None => continue,
                }
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }

    async fn try_dequeue(&self) -> Result<Option<Task>, QueueError> {
        for key in self.keys.ordered() {
            while let Some(payload) = self.client.lpop(&key).await.map_err(backend)? {
                if let Some(task) = self.decode(&key, &payload) {
                    return Ok(Some(task));
                }
                warn!(queue = %key, "Skipped poison message");
            }
        }
        Ok(None)
    }

    async fn depths(&self) -> Result<QueueDepths, QueueError> {
        Ok(QueueDepths {
            high: self.client.llen(&self.keys.high).await.map_err(backend)?,
            medium: self.client.llen(&self.keys.medium).await.map_err(backend)?,
            low: self.client.llen(&self.keys.low).await.map_err(backend)?,
        })
    }
}
