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

use crate::domain::models::article::{ArticleStatus, ScrapeOutcome};
use crate::domain::repositories::result_sink::{Ack, ResultSink};
use crate::infrastructure::database::entities::article as article_entity;
use crate::utils::errors::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::*;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// 文章结果仓库实现
pub struct ArticleRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl ArticleRepositoryImpl {
    /// 创建新的文章结果仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn find_model(&self, article_id: &str) -> Result<Option<article_entity::Model>, StoreError> {
        article_entity::Entity::find()
            .filter(article_entity::Column::ArticleId.eq(article_id))
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// 用新结果覆盖已有记录的可变字段
    async fn update_existing(
        &self,
        existing: article_entity::Model,
        outcome: &ScrapeOutcome,
    ) -> Result<Ack, StoreError> {
        if existing.url != outcome.url {
            return Err(StoreError::Conflict(format!(
                "article_id {} already stored with url {}",
                outcome.article_id, existing.url
            )));
        }

        let mut active: article_entity::ActiveModel = existing.into();
        active.url_original = Set(outcome.url_original.clone());
        active.url_hash = Set(outcome.url_hash.clone());
        active.domain = Set(outcome.domain.clone());
        active.source = Set(outcome.source.clone());
        active.category = Set(outcome.category.clone());
        active.priority = Set(outcome.priority.to_string());
        active.status = Set(outcome.status.to_string());
        active.title = Set(outcome.title.clone());
        active.content = Set(outcome.content.clone());
        active.scrape_status = Set(outcome.scrape_status.to_string());
        active.scrape_error = Set(outcome.scrape_error.clone());
        active.attempts = Set(outcome.attempts as i32);
        active.scraped_at = Set(outcome.scraped_at.into());
        active.enriched = Set(outcome.enriched);
        active.user_id = Set(outcome.user_id.clone());
        active.updated_at = Set(Utc::now().into());

        active.update(self.db.as_ref()).await.map_err(map_db_err)?;
        debug!(article_id = %outcome.article_id, "Article record updated");
        Ok(Ack::Updated)
    }
}

fn insert_model(outcome: &ScrapeOutcome) -> article_entity::ActiveModel {
    article_entity::ActiveModel {
        id: Set(Uuid::new_v4()),
        article_id: Set(outcome.article_id.clone()),
        url: Set(outcome.url.clone()),
        url_original: Set(outcome.url_original.clone()),
        url_hash: Set(outcome.url_hash.clone()),
        domain: Set(outcome.domain.clone()),
        source: Set(outcome.source.clone()),
        category: Set(outcome.category.clone()),
        priority: Set(outcome.priority.to_string()),
        status: Set(outcome.status.to_string()),
        title: Set(outcome.title.clone()),
        content: Set(outcome.content.clone()),
        scrape_status: Set(outcome.scrape_status.to_string()),
        scrape_error: Set(outcome.scrape_error.clone()),
        attempts: Set(outcome.attempts as i32),
        scraped_at: Set(outcome.scraped_at.into()),
        enriched: Set(outcome.enriched),
        user_id: Set(outcome.user_id.clone()),
        created_at: Set(outcome.created_at.into()),
        updated_at: Set(outcome.updated_at.into()),
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// 数据库错误映射：连接类错误视为存储不可用
fn map_db_err(err: DbErr) -> StoreError {
    if is_unique_violation(&err) {
        return StoreError::Conflict(err.to_string());
    }
    match err {
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => StoreError::Unavailable(err.to_string()),
        DbErr::Type(_) | DbErr::Json(_) | DbErr::TryIntoErr { .. } => {
            StoreError::Serialization(err.to_string())
        }
        other => StoreError::Database(other.to_string()),
    }
}

#[async_trait]
impl ResultSink for ArticleRepositoryImpl {
    async fn upsert(&self, outcome: &ScrapeOutcome) -> Result<Ack, StoreError> {
        if let Some(existing) = self.find_model(&outcome.article_id).await? {
            return self.update_existing(existing, outcome).await;
        }

        match article_entity::Entity::insert(insert_model(outcome))
            .exec_without_returning(self.db.as_ref())
            .await
        {
            Ok(_) => Ok(Ack::Inserted),
            Err(err) if is_unique_violation(&err) => {
                // 并发重复投递时另一写入者可能已插入同一 article_id
                match self.find_model(&outcome.article_id).await? {
                    Some(existing) => self.update_existing(existing, outcome).await,
                    None => Err(StoreError::Conflict(format!(
                        "url {} already stored under another article_id",
                        outcome.url
                    ))),
                }
            }
            Err(err) => Err(map_db_err(err)),
        }
    }

    async fn find_by_article_id(&self, article_id: &str) -> Result<Option<ScrapeOutcome>, StoreError> {
        self.find_model(article_id)
            .await?
            .map(ScrapeOutcome::try_from)
            .transpose()
    }

    async fn find_by_url_hash(&self, url_hash: &str) -> Result<Option<ScrapeOutcome>, StoreError> {
        article_entity::Entity::find()
            .filter(article_entity::Column::UrlHash.eq(url_hash))
            .order_by_desc(article_entity::Column::UpdatedAt)
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)?
            .map(ScrapeOutcome::try_from)
            .transpose()
    }

    async fn count_by_status(&self, status: ArticleStatus) -> Result<u64, StoreError> {
        article_entity::Entity::find()
            .filter(article_entity::Column::Status.eq(status.to_string()))
            .count(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }
}
