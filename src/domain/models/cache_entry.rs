// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::article::ArticleStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 去重缓存中的URL状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Pending,
    Completed,
    Failed,
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CacheStatus::Pending => write!(f, "pending"),
            CacheStatus::Completed => write!(f, "completed"),
            CacheStatus::Failed => write!(f, "failed"),
        }
    }
}

impl From<ArticleStatus> for CacheStatus {
    fn from(status: ArticleStatus) -> Self {
        match status {
            ArticleStatus::Completed => CacheStatus::Completed,
            ArticleStatus::Failed => CacheStatus::Failed,
        }
    }
}

/// 占用尝试的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimResult {
    /// 获得该URL的独占处理权
    Claimed,
    /// 已完成，跳过
    AlreadyCompleted,
    /// 其他工作器正在处理
    AlreadyInFlight,
}

/// 每个规范化URL一条缓存记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub url_hash: String,
    pub status: CacheStatus,
    /// 当前持有 `pending` 的占用标识
    #[serde(default)]
    pub claim_id: Option<Uuid>,
    pub last_updated: DateTime<Utc>,
}

impl CacheEntry {
    pub fn pending(url_hash: &str, claim_id: Uuid) -> Self {
        Self {
            url_hash: url_hash.to_string(),
            status: CacheStatus::Pending,
            claim_id: Some(claim_id),
            last_updated: Utc::now(),
        }
    }

    pub fn terminal(url_hash: &str, status: ArticleStatus) -> Self {
        Self {
            url_hash: url_hash.to_string(),
            status: status.into(),
            claim_id: None,
            last_updated: Utc::now(),
        }
    }

    /// 占用判定
    ///
    /// 不存在或已失败的记录可被占用；同一占用标识可重入自己的 `pending`；
    /// `force` 允许重新占用已完成的记录，但不会抢占他人的 `pending`。
    pub fn decide(existing: Option<&CacheEntry>, claim_id: Uuid, force: bool) -> ClaimResult {
        match existing {
            None => ClaimResult::Claimed,
            Some(entry) => match entry.status {
                CacheStatus::Failed => ClaimResult::Claimed,
                CacheStatus::Completed if force => ClaimResult::Claimed,
                CacheStatus::Completed => ClaimResult::AlreadyCompleted,
                CacheStatus::Pending if entry.claim_id == Some(claim_id) => ClaimResult::Claimed,
                CacheStatus::Pending => ClaimResult::AlreadyInFlight,
            },
        }
    }

    /// 释放是否应当生效（只有当前持有者可以写入终态）
    pub fn accepts_release(existing: Option<&CacheEntry>, claim_id: Uuid) -> bool {
        match existing {
            Some(entry) => entry.status == CacheStatus::Pending && entry.claim_id == Some(claim_id),
            None => false,
        }
    }
}
