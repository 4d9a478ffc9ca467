// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::article::ArticleStatus;
use crate::domain::models::cache_entry::{CacheEntry, ClaimResult};
use crate::domain::repositories::dedup_cache::DedupCache;
use crate::utils::errors::CacheError;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

/// 进程内去重缓存
///
/// 占用判定在 DashMap 分片锁内完成，读取与写入之间不会被其他调用插入。
#[derive(Default)]
pub struct MemoryDedupCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryDedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl DedupCache for MemoryDedupCache {
    async fn try_claim(&self, url_hash: &str, claim_id: Uuid, force: bool) -> Result<ClaimResult, CacheError> {
        let result = match self.entries.entry(url_hash.to_string()) {
            Entry::Occupied(mut occupied) => {
                let result = CacheEntry::decide(Some(occupied.get()), claim_id, force);
                if result == ClaimResult::Claimed {
                    occupied.insert(CacheEntry::pending(url_hash, claim_id));
                }
                result
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry::pending(url_hash, claim_id));
                ClaimResult::Claimed
            }
        };
        Ok(result)
    }

    async fn release(&self, url_hash: &str, claim_id: Uuid, status: ArticleStatus) -> Result<bool, CacheError> {
        match self.entries.get_mut(url_hash) {
            Some(mut entry) if CacheEntry::accepts_release(Some(&*entry), claim_id) => {
                *entry = CacheEntry::terminal(url_hash, status);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn status(&self, url_hash: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.entries.get(url_hash).map(|entry| entry.value().clone()))
    }
}
