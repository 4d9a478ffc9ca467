// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::article::ArticleStatus;
use crate::domain::models::cache_entry::{CacheEntry, ClaimResult};
use crate::utils::errors::CacheError;
use async_trait::async_trait;
use uuid::Uuid;

/// 去重缓存特质
///
/// `try_claim` 是防止同一URL并发抓取的唯一同步点，
/// 每次成功占用都必须在所有退出路径上调用一次 `release`。
#[async_trait]
pub trait DedupCache: Send + Sync {
    /// 原子地尝试占用URL摘要
    async fn try_claim(&self, url_hash: &str, claim_id: Uuid, force: bool) -> Result<ClaimResult, CacheError>;

    /// 写入终态；`claim_id` 不是当前持有者时忽略，返回是否生效
    async fn release(&self, url_hash: &str, claim_id: Uuid, status: ArticleStatus) -> Result<bool, CacheError>;

    /// 读取缓存记录
    async fn status(&self, url_hash: &str) -> Result<Option<CacheEntry>, CacheError>;
}
