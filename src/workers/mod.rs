// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 提供文章抓取工作器与工作池管理功能
/// 包括任务处理、延迟重试、统计和优雅关闭
pub mod article_worker;
pub mod manager;
pub mod stats;
pub mod worker;

pub use article_worker::{ArticleWorker, Disposition, PipelineComponents};
pub use manager::{PoolConfig, PoolState, WorkerPool};
pub use stats::{PipelineStats, StatsSnapshot};
pub use worker::Worker;
