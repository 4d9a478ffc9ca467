// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::article::{ArticleStatus, ScrapeOutcome};
use crate::utils::errors::StoreError;
use async_trait::async_trait;

/// 写入确认
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// 新建记录
    Inserted,
    /// 同一 `article_id` 的已有记录被更新
    Updated,
}

/// 结果存储特质
///
/// 以 `article_id` 幂等写入终态记录，`url` 另有独立的唯一约束。
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// 插入或更新结果
    ///
    /// 同一 `article_id`、同一URL 的重复写入替换可变字段并刷新 `updated_at`；
    /// `article_id` 或 URL 与已有记录冲突时返回 `StoreError::Conflict`。
    async fn upsert(&self, outcome: &ScrapeOutcome) -> Result<Ack, StoreError>;

    /// 根据文章ID查找结果
    async fn find_by_article_id(&self, article_id: &str) -> Result<Option<ScrapeOutcome>, StoreError>;

    /// 根据URL摘要查找结果
    ///
    /// 去重缓存未命中时用于确认该URL是否已经完成
    async fn find_by_url_hash(&self, url_hash: &str) -> Result<Option<ScrapeOutcome>, StoreError>;

    /// 统计指定状态的记录数
    async fn count_by_status(&self, status: ArticleStatus) -> Result<u64, StoreError>;
}
