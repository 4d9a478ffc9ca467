// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::redis_client::RedisClient;
use crate::domain::models::article::ArticleStatus;
use crate::domain::models::cache_entry::{CacheEntry, ClaimResult};
use crate::domain::repositories::dedup_cache::DedupCache;
use crate::utils::errors::CacheError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use redis::Script;
use uuid::Uuid;

/// 占用脚本，与 `CacheEntry::decide` 保持一致
///
/// KEYS[1] 缓存键；ARGV[1] 占用标识；ARGV[2] 是否强制；ARGV[3] 待写入的 pending 记录
static CLAIM_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
local raw = redis.call('GET', KEYS[1])
if raw then
  local entry = cjson.decode(raw)
  if entry.status == 'completed' and ARGV[2] ~= '1' then
    return 'already_completed'
  end
  if entry.status == 'pending' and entry.claim_id ~= ARGV[1] then
    return 'already_in_flight'
  end
end
redis.call('SET', KEYS[1], ARGV[3])
return 'claimed'
"#,
    )
});

/// 释放脚本：只有当前持有者可以写入终态
///
/// KEYS[1] 缓存键；ARGV[1] 占用标识；ARGV[2] 终态记录
static RELEASE_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
local raw = redis.call('GET', KEYS[1])
if not raw then
  return 'stale'
end
local entry = cjson.decode(raw)
if entry.status ~= 'pending' or entry.claim_id ~= ARGV[1] then
  return 'stale'
end
redis.call('SET', KEYS[1], ARGV[2])
return 'released'
"#,
    )
});

/// Redis 去重缓存
///
/// 每个URL摘要对应键 `{prefix}{url_hash}`，值为 JSON 格式的 [`CacheEntry`]。
/// 检查与写入在 Lua 脚本中原子完成，多个进程可以共享同一缓存。
#[derive(Clone)]
pub struct RedisDedupCache {
    client: RedisClient,
    key_prefix: String,
}

impl RedisDedupCache {
    pub fn new(client: RedisClient, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key(&self, url_hash: &str) -> String {
        format!("{}{}", self.key_prefix, url_hash)
    }
}

fn to_json(entry: &CacheEntry) -> Result<String, CacheError> {
    serde_json::to_string(entry).map_err(|e| CacheError::Serialization(e.to_string()))
}

#[async_trait]
impl DedupCache for RedisDedupCache {
    async fn try_claim(&self, url_hash: &str, claim_id: Uuid, force: bool) -> Result<ClaimResult, CacheError> {
        let pending = to_json(&CacheEntry::pending(url_hash, claim_id))?;
        let args = [
            claim_id.to_string(),
            if force { "1" } else { "0" }.to_string(),
            pending,
        ];
        let reply = self
            .client
            .eval_script(&CLAIM_SCRIPT, &self.key(url_hash), &args)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;

        match reply.as_deref() {
            Some("claimed") => Ok(ClaimResult::Claimed),
            Some("already_completed") => Ok(ClaimResult::AlreadyCompleted),
            Some("already_in_flight") => Ok(ClaimResult::AlreadyInFlight),
            other => Err(CacheError::Backend(format!(
                "unexpected claim reply: {:?}",
                other
            ))),
        }
    }

    async fn release(&self, url_hash: &str, claim_id: Uuid, status: ArticleStatus) -> Result<bool, CacheError> {
        let terminal = to_json(&CacheEntry::terminal(url_hash, status))?;
        let args = [claim_id.to_string(), terminal];
        let reply = self
            .client
            .eval_script(&RELEASE_SCRIPT, &self.key(url_hash), &args)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(reply.as_deref() == Some("released"))
    }

    async fn status(&self, url_hash: &str) -> Result<Option<CacheEntry>, CacheError> {
        let raw = self
            .client
            .get(&self.key(url_hash))
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        raw.map(|json| {
            serde_json::from_str(&json).map_err(|e| CacheError::Serialization(e.to_string()))
        })
        .transpose()
    }
}
