// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::article::{ArticleStatus, ScrapeOutcome};
use crate::domain::repositories::result_sink::{Ack, ResultSink};
use crate::utils::errors::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
struct Records {
    by_article: HashMap<String, ScrapeOutcome>,
    /// url -> article_id
    by_url: HashMap<String, String>,
}

/// 进程内结果存储
///
/// 与数据库实现相同的两条唯一约束（`article_id`、`url`），用于测试和 memory 后端。
#[derive(Default)]
pub struct InMemoryArticleStore {
    records: Mutex<Records>,
}

impl InMemoryArticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().by_article.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 全部记录快照
    pub fn all(&self) -> Vec<ScrapeOutcome> {
        self.records.lock().by_article.values().cloned().collect()
    }
}

#[async_trait]
impl ResultSink for InMemoryArticleStore {
    async fn upsert(&self, outcome: &ScrapeOutcome) -> Result<Ack, StoreError> {
        let mut records = self.records.lock();

        if let Some(existing) = records.by_article.get_mut(&outcome.article_id) {
            if existing.url != outcome.url {
                return Err(StoreError::Conflict(format!(
                    "article_id {} already stored with url {}",
                    outcome.article_id, existing.url
                )));
            }
            let created_at = existing.created_at;
            *existing = ScrapeOutcome {
                created_at,
                updated_at: Utc::now(),
                ..outcome.clone()
            };
            return Ok(Ack::Updated);
        }

        if let Some(owner) = records.by_url.get(&outcome.url) {
            return Err(StoreError::Conflict(format!(
                "url {} already stored under article_id {}",
                outcome.url, owner
            )));
        }

        records
            .by_url
            .insert(outcome.url.clone(), outcome.article_id.clone());
        records
            .by_article
            .insert(outcome.article_id.clone(), outcome.clone());
        Ok(Ack::Inserted)
    }

    async fn find_by_article_id(&self, article_id: &str) -> Result<Option<ScrapeOutcome>, StoreError> {
        Ok(self.records.lock().by_article.get(article_id).cloned())
    }

    async fn find_by_url_hash(&self, url_hash: &str) -> Result<Option<ScrapeOutcome>, StoreError> {
        Ok(self
            .records
            .lock()
            .by_article
            .values()
            .filter(|o| o.url_hash.as_deref() == Some(url_hash))
            .max_by_key(|o| o.updated_at)
            .cloned())
    }

    async fn count_by_status(&self, status: ArticleStatus) -> Result<u64, StoreError> {
        Ok(self
            .records
            .lock()
            .by_article
            .values()
            .filter(|o| o.status == status)
            .count() as u64)
    }
}
