// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// URL 规范化错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("无效的URL: {0}")]
    MalformedUrl(String),
}

/// 抓取错误分类
///
/// 只有 `Network` 与 `Timeout` 属于瞬时故障，可以进入重试流程。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FetchErrorKind {
    Network,
    HttpStatus,
    ParseFailure,
    Timeout,
}

impl FetchErrorKind {
    /// 是否为可重试的瞬时错误
    pub fn is_retryable(self) -> bool {
        matches!(self, FetchErrorKind::Network | FetchErrorKind::Timeout)
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FetchErrorKind::Network => "Network",
            FetchErrorKind::HttpStatus => "HttpStatus",
            FetchErrorKind::ParseFailure => "ParseFailure",
            FetchErrorKind::Timeout => "Timeout",
        };
        f.write_str(name)
    }
}

/// 抓取执行器返回的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
    /// 仅 `HttpStatus` 时携带响应状态码
    pub status: Option<u16>,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Timeout, message)
    }

    pub fn parse_failure(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::ParseFailure, message)
    }

    pub fn http_status(status: u16) -> Self {
        Self {
            kind: FetchErrorKind::HttpStatus,
            message: format!("HTTP {}", status),
            status: Some(status),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// 结果存储错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// 唯一约束冲突（同一 article_id 对应不同 URL，或 URL 已归属其他 article_id）
    #[error("数据冲突: {0}")]
    Conflict(String),

    /// 存储不可用（连接丢失、连接池耗尽）
    #[error("存储不可用: {0}")]
    Unavailable(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    /// 其他数据库错误（非连接问题）
    #[error("数据库错误: {0}")]
    Database(String),
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// 去重缓存错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("缓存后端错误: {0}")]
    Backend(String),

    #[error("缓存数据损坏: {0}")]
    Serialization(String),
}

/// 队列错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("队列后端错误: {0}")]
    Backend(String),

    #[error("任务序列化错误: {0}")]
    Serialization(String),
}

/// 终态失败分类，写入 `scrape_error` 的前缀
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    MalformedUrl,
    Network,
    HttpStatus,
    ParseFailure,
    Timeout,
    Store,
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::MalformedUrl => "MalformedUrl",
            FailureKind::Network => "Network",
            FailureKind::HttpStatus => "HttpStatus",
            FailureKind::ParseFailure => "ParseFailure",
            FailureKind::Timeout => "Timeout",
            FailureKind::Store => "Store",
            FailureKind::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

impl From<FetchErrorKind> for FailureKind {
    fn from(kind: FetchErrorKind) -> Self {
        match kind {
            FetchErrorKind::Network => FailureKind::Network,
            FetchErrorKind::HttpStatus => FailureKind::HttpStatus,
            FetchErrorKind::ParseFailure => FailureKind::ParseFailure,
            FetchErrorKind::Timeout => FailureKind::Timeout,
        }
    }
}

/// 流水线错误
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("任务已取消: {0}")]
    Cancelled(String),
}

impl PipelineError {
    /// 失败分类
    ///
    /// 缓存与队列错误不会成为任务的终态（任务会被退回队列），
    /// 这里按存储故障归类，仅用于日志。
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            PipelineError::Normalize(_) => FailureKind::MalformedUrl,
            PipelineError::Fetch(e) => e.kind.into(),
            PipelineError::Store(_) | PipelineError::Cache(_) | PipelineError::Queue(_) => {
                FailureKind::Store
            }
            PipelineError::Cancelled(_) => FailureKind::Cancelled,
        }
    }

    /// 持久化到 `scrape_error` 的文本，形如 `Timeout: ...`
    pub fn scrape_error(&self) -> String {
        match self {
            // FetchError 的 Display 已带分类前缀
            PipelineError::Fetch(e) => e.to_string(),
            other => format!("{}: {}", other.failure_kind(), other),
        }
    }
}
