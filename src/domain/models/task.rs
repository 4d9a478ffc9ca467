// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::url_normalizer::UrlNormalizer;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

/// 文章抓取任务
///
/// 上游生产者（清单导入、控制台提交）推入队列的工作单元。
/// 任务创建后不可变，重试通过 [`Task::retry`] 生成新值，
/// 除 `attempt` 外身份保持不变。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// 来源提供的文章ID，入库前不保证全局唯一
    pub article_id: String,
    /// 原始URL
    pub url_original: String,
    /// 规范化URL，由生产者或工作器填充
    #[serde(default)]
    pub url_normalized: String,
    /// 规范化URL的摘要
    #[serde(default)]
    pub url_hash: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub category: String,
    /// 缺失或无法识别时按 low 处理
    #[serde(default, deserialize_with = "lenient_priority")]
    pub priority: Priority,
    /// 已执行的抓取次数（首次为 0）
    #[serde(default)]
    pub attempt: u32,
    /// 提交者（用户或会话标识）
    #[serde(default)]
    pub submitted_by: String,
    /// 强制重新抓取已完成的URL
    #[serde(default)]
    pub force: bool,
    /// 重试任务携带的去重占用标识
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_id: Option<Uuid>,
}

impl Task {
    /// 生成下一次尝试的任务
    pub fn retry(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }

    /// 绑定去重占用标识
    pub fn with_claim(mut self, claim_id: Uuid) -> Self {
        self.claim_id = Some(claim_id);
        self
    }

    /// 当前是第几次尝试（从 1 开始）
    pub fn attempt_number(&self) -> u32 {
        self.attempt + 1
    }

    /// 从外部提交构建任务
    ///
    /// 校验必填字段并尝试规范化URL。URL 无法解析时仍返回任务，
    /// 规范化字段留空，由工作器记录为 `MalformedUrl` 失败结果，
    /// 保证任务不会被静默丢弃。
    pub fn from_submission(
        submission: TaskSubmission,
        normalizer: &UrlNormalizer,
    ) -> Result<Self, TaskValidationError> {
        submission.validate()?;

        let (url_normalized, url_hash) = match normalizer.normalize(&submission.url) {
            Ok(normalized) => (normalized.normalized, normalized.hash),
            Err(_) => (String::new(), String::new()),
        };

        let priority = submission
            .priority
            .as_deref()
            .and_then(|p| p.parse().ok())
            .unwrap_or_default();

        Ok(Self {
            article_id: submission.article_id.trim().to_string(),
            url_original: submission.url,
            url_normalized,
            url_hash,
            source: submission.source,
            category: submission.category,
            priority,
            attempt: 0,
            submitted_by: submission.submitted_by,
            force: submission.force,
            claim_id: None,
        })
    }
}

/// 外部提交的任务请求
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct TaskSubmission {
    #[validate(length(min = 1, message = "article_id 不能为空"))]
    pub article_id: String,
    #[validate(length(min = 1, max = 4096, message = "url 不能为空"))]
    pub url: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub submitted_by: String,
    #[serde(default)]
    pub force: bool,
}

/// 任务提交校验错误
#[derive(Error, Debug)]
pub enum TaskValidationError {
    #[error("任务校验失败: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

/// 任务优先级
///
/// 出队顺序严格为 High > Medium > Low，不提供跨优先级的公平性保证。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    #[default]
    Low,
}

impl Priority {
    /// 按出队顺序排列
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => Err(()),
        }
    }
}

fn lenient_priority<'de, D>(deserializer: D) -> Result<Priority, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or_default())
}
