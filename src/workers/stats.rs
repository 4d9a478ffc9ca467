// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::article_worker::Disposition;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// 流水线运行统计
///
/// 所有工作器共享同一份计数，关闭时输出快照
#[derive(Debug, Default)]
pub struct PipelineStats {
    processed: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    duplicates: AtomicU64,
    retried: AtomicU64,
    cancelled: AtomicU64,
}

/// 统计快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// 已得到终态（含重复跳过与取消）的任务数
    pub processed: u64,
    pub successful: u64,
    pub failed: u64,
    pub duplicates: u64,
    /// 已安排的延迟重试次数
    pub retried: u64,
    pub cancelled: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, disposition: &Disposition) {
        let counter = match disposition {
            Disposition::Completed => &self.successful,
            Disposition::Failed(_) => &self.failed,
            Disposition::DuplicateSkipped => &self.duplicates,
            Disposition::Cancelled => &self.cancelled,
            Disposition::RetryScheduled => {
                self.retried.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Disposition::Deferred => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            successful: self.successful.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}
