// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::task::{Priority, Task};
use crate::utils::errors::PipelineError;
use crate::utils::url_normalizer::NormalizedUrl;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 缺少标题但正文可用时写入 `scrape_error` 的说明
pub const NO_TITLE_NOTE: &str = "No title found";

/// 抓取执行器的成功结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedArticle {
    pub title: Option<String>,
    pub content: Option<String>,
    /// 仅做到了部分提取（缺标题或解析不完整）
    pub degraded: bool,
}

/// 文章终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    Completed,
    Failed,
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ArticleStatus::Completed => write!(f, "completed"),
            ArticleStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for ArticleStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(ArticleStatus::Completed),
            "failed" => Ok(ArticleStatus::Failed),
            _ => Err(()),
        }
    }
}

/// 抓取结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeStatus {
    Success,
    Failure,
}

impl fmt::Display for ScrapeStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScrapeStatus::Success => write!(f, "success"),
            ScrapeStatus::Failure => write!(f, "failure"),
        }
    }
}

impl FromStr for ScrapeStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(ScrapeStatus::Success),
            "failure" => Ok(ScrapeStatus::Failure),
            _ => Err(()),
        }
    }
}

/// 抓取终态记录
///
/// 每个 `article_id` 的终态尝试对应一条记录，失败同样落库以便查询。
/// `created_at` 与 `updated_at` 由存储层在插入与更新时维护。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeOutcome {
    pub article_id: String,
    /// 规范化URL；URL 无法解析时为原始输入
    pub url: String,
    pub url_original: String,
    /// URL 无法解析时为空
    pub url_hash: Option<String>,
    pub domain: Option<String>,
    pub source: String,
    pub category: String,
    pub priority: Priority,
    pub status: ArticleStatus,
    pub title: Option<String>,
    pub content: Option<String>,
    pub scrape_status: ScrapeStatus,
    pub scrape_error: Option<String>,
    pub scraped_at: DateTime<Utc>,
    /// 是否经过规范化与域名补全
    pub enriched: bool,
    pub user_id: String,
    /// 得到此终态共进行的抓取次数
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScrapeOutcome {
    fn base(task: &Task, normalized: Option<&NormalizedUrl>) -> Self {
        let now = Utc::now();
        Self {
            article_id: task.article_id.clone(),
            url: normalized
                .map(|n| n.normalized.clone())
                .unwrap_or_else(|| task.url_original.clone()),
            url_original: task.url_original.clone(),
            url_hash: normalized.map(|n| n.hash.clone()),
            domain: normalized.map(|n| n.domain.clone()),
            source: task.source.clone(),
            category: task.category.clone(),
            priority: task.priority,
            status: ArticleStatus::Failed,
            title: None,
            content: None,
            scrape_status: ScrapeStatus::Failure,
            scrape_error: None,
            scraped_at: now,
            enriched: normalized.is_some(),
            user_id: task.submitted_by.clone(),
            attempts: task.attempt_number(),
            created_at: now,
            updated_at: now,
        }
    }

    /// 构建成功结果；缺少标题时保持完成状态并记录说明
    pub fn completed(task: &Task, normalized: &NormalizedUrl, article: FetchedArticle) -> Self {
        let scrape_error = if article.title.is_none() {
            Some(NO_TITLE_NOTE.to_string())
        } else {
            None
        };
        Self {
            status: ArticleStatus::Completed,
            scrape_status: ScrapeStatus::Success,
            title: article.title,
            content: article.content,
            scrape_error,
            ..Self::base(task, Some(normalized))
        }
    }

    /// 构建失败结果
    pub fn failed(task: &Task, normalized: Option<&NormalizedUrl>, error: &PipelineError) -> Self {
        Self {
            scrape_error: Some(error.scrape_error()),
            ..Self::base(task, normalized)
        }
    }

    pub fn is_success(&self) -> bool {
        self.scrape_status == ScrapeStatus::Success
    }
}
