// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::article_worker::{ArticleWorker, PipelineComponents, PipelineContext};
use super::stats::{PipelineStats, StatsSnapshot};
use super::worker::{stopped, Worker};
use crate::utils::retry_policy::RetryPolicy;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{error, info, warn};

/// 批处理模式检查完成条件的间隔
const BATCH_POLL: Duration = Duration::from_millis(100);

/// 工作池生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// 正常取任务
    Running,
    /// 停止取任务，等待在途任务完成
    Draining,
    /// 排空超时，在途抓取被取消
    Cancelling,
}

/// 工作池运行参数
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub worker_count: usize,
    /// 单次抓取期限
    pub fetch_timeout: Duration,
    /// 单次出队等待
    pub pop_timeout: Duration,
    /// 关闭时等待在途任务的时间
    pub drain_timeout: Duration,
    /// 取消后等待工作器记录结果的时间
    pub cancel_grace: Duration,
    /// 队列或存储故障后的暂停时间
    pub outage_backoff: Duration,
    /// 队列长度巡检间隔
    pub monitor_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 10,
            fetch_timeout: Duration::from_secs(10),
            pop_timeout: Duration::from_secs(1),
            drain_timeout: Duration::from_secs(30),
            cancel_grace: Duration::from_millis(500),
            outage_backoff: Duration::from_secs(5),
            monitor_interval: Duration::from_secs(30),
        }
    }
}

/// 工作池
///
/// 固定数量的 [`ArticleWorker`] 共享同一个队列代理和去重缓存，
/// 外加一个周期输出队列长度与统计的巡检循环
pub struct WorkerPool {
    ctx: Arc<PipelineContext>,
    state_tx: watch::Sender<PoolState>,
    workers: JoinSet<()>,
    monitor: Option<tokio::task::JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(components: PipelineComponents, policy: RetryPolicy, config: PoolConfig) -> Self {
        let (state_tx, _) = watch::channel(PoolState::Running);
        let stats = Arc::new(PipelineStats::new());
        Self {
            ctx: Arc::new(PipelineContext::new(components, policy, config, stats)),
            state_tx,
            workers: JoinSet::new(),
            monitor: None,
        }
    }

    /// 启动工作进程
    ///
    /// 按配置的数量创建工作器，重复调用只会追加工作器
    pub fn start(&mut self) {
        let count = self.ctx.config.worker_count;
        for _ in 0..count {
            let worker = ArticleWorker::new(self.ctx.clone(), self.state_tx.subscribe());
            let state = self.state_tx.subscribe();
            self.workers.spawn(async move {
                worker.run(state).await;
            });
        }

        if self.monitor.is_none() {
            let monitor = QueueMonitor {
                ctx: self.ctx.clone(),
            };
            let state = self.state_tx.subscribe();
            self.monitor = Some(tokio::spawn(async move {
                monitor.run(state).await;
            }));
        }

        info!(workers = count, "Worker pool started");
    }

    pub fn state(&self) -> PoolState {
        *self.state_tx.borrow()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.ctx.stats.snapshot()
    }

    /// 关闭工作池
    ///
    /// 停止取任务后在 `drain_timeout` 内等待在途任务；超时则发出取消信号，
    /// 在途抓取以 `Cancelled` 结束，`cancel_grace` 后仍未退出的工作器被中止。
    /// 未到期的延迟重试同样以 `Cancelled` 结束。
    pub async fn shutdown(mut self) -> StatsSnapshot {
        info!("Draining worker pool");
        self.state_tx.send_replace(PoolState::Draining);

        if timeout(self.ctx.config.drain_timeout, join_all(&mut self.workers))
            .await
            .is_err()
        {
            warn!(
                in_flight = self.workers.len(),
                "Drain timeout elapsed, cancelling in-flight fetches"
            );
            self.state_tx.send_replace(PoolState::Cancelling);

            if timeout(self.ctx.config.cancel_grace, join_all(&mut self.workers))
                .await
                .is_err()
            {
                error!(
                    remaining = self.workers.len(),
                    "Workers did not stop after cancellation, aborting"
                );
                self.workers.shutdown().await;
            }
        }

        {
            let mut retries = self.ctx.retries.lock().await;
            if timeout(self.ctx.config.cancel_grace, join_all(&mut retries))
                .await
                .is_err()
            {
                warn!(remaining = retries.len(), "Pending retries did not stop, aborting");
                retries.shutdown().await;
            }
        }

        // 被中止的工作器与重试不会走到释放逻辑，由这里补上
        self.ctx.release_abandoned().await;

        {
            let mut releases = self.ctx.releases.lock().await;
            if timeout(self.ctx.config.outage_backoff, join_all(&mut releases))
                .await
                .is_err()
            {
                error!(
                    alert = true,
                    remaining = releases.len(),
                    "Dedup cache still unavailable, claims left pending"
                );
                releases.shutdown().await;
            }
        }

        if let Some(monitor) = self.monitor.take() {
            let _ = monitor.await;
        }

        let snapshot = self.stats();
        info!(
            processed = snapshot.processed,
            successful = snapshot.successful,
            failed = snapshot.failed,
            duplicates = snapshot.duplicates,
            retried = snapshot.retried,
            cancelled = snapshot.cancelled,
            "Worker pool stopped"
        );
        snapshot
    }

    /// 批处理模式：处理完队列中已有的任务后关闭
    ///
    /// `limit` 为空时取当前三个队列的总长度。只有首次尝试计入配额，
    /// 配额用尽后工作器只接收重试。没有在途任务与待执行重试，并且
    /// 配额用尽或队列已空时，按 [`WorkerPool::shutdown`] 的流程关闭。
    /// 尚未启动时会先启动工作器。
    pub async fn run_batch(mut self, limit: Option<usize>) -> StatsSnapshot {
        let limit = match limit {
            Some(limit) => limit,
            None => match self.ctx.components.broker.depths().await {
                Ok(depths) => depths.total(),
                Err(e) => {
                    error!(error = %e, "Unable to read queue depths for batch run");
                    0
                }
            },
        };

        if limit == 0 {
            info!("No tasks available in queues");
            return self.shutdown().await;
        }

        info!(limit, "Processing tasks in batch mode");
        self.ctx.limit_intake(limit);
        if self.workers.is_empty() {
            self.start();
        }

        let mut ticker = interval(BATCH_POLL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut settled_ticks = 0;
        loop {
            ticker.tick().await;
            while self.workers.try_join_next().is_some() {}
            if self.workers.is_empty() {
                warn!("All workers exited during batch run");
                break;
            }

            let busy = self.ctx.in_flight() > 0 || self.ctx.pending_retries().await > 0;
            let exhausted = self.ctx.intake_exhausted();
            let queued = if busy || exhausted {
                0
            } else {
                match self.ctx.components.broker.depths().await {
                    Ok(depths) => depths.total(),
                    Err(e) => {
                        warn!(error = %e, "Failed to read queue depths");
                        usize::MAX
                    }
                }
            };

            // 连续两次满足才结束，避开重试入队到被取走之间的空档
            if !busy && (exhausted || queued == 0) {
                settled_ticks += 1;
            } else {
                settled_ticks = 0;
            }
            if settled_ticks >= 2 {
                info!(intake_exhausted = exhausted, "Batch complete");
                break;
            }
        }

        self.shutdown().await
    }

    /// 等待关闭信号并关闭工作池
    ///
    /// 监听 Ctrl-C 后执行 [`WorkerPool::shutdown`]
    pub async fn run_until(self, signal: impl Future<Output = ()>) -> StatsSnapshot {
        signal.await;
        info!("Shutdown signal received");
        self.shutdown().await
    }

    pub async fn run_until_ctrl_c(self) -> StatsSnapshot {
        self.run_until(async {
            if let Err(err) = signal::ctrl_c().await {
                error!("Unable to listen for shutdown signal: {}", err);
            }
        })
        .await
    }
}

async fn join_all(set: &mut JoinSet<()>) {
    while let Some(result) = set.join_next().await {
        if let Err(e) = result {
            if e.is_panic() {
                error!(error = %e, "Worker task panicked");
            }
        }
    }
}

/// 队列巡检循环
struct QueueMonitor {
    ctx: Arc<PipelineContext>,
}

#[async_trait::async_trait]
impl Worker for QueueMonitor {
    async fn run(&self, mut state: watch::Receiver<PoolState>) {
        let mut ticker = interval(self.ctx.config.monitor_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = stopped(&mut state) => break,
            }

            match self.ctx.components.broker.depths().await {
                Ok(depths) => {
                    crate::infrastructure::metrics::record_queue_depths(&depths);
                    let stats = self.ctx.stats.snapshot();
                    info!(
                        high = depths.high,
                        medium = depths.medium,
                        low = depths.low,
                        processed = stats.processed,
                        failed = stats.failed,
                        "Queue status"
                    );
                }
                Err(e) => warn!(error = %e, "Failed to read queue depths"),
            }
        }
    }

    fn name(&self) -> &str {
        "queue_monitor"
    }
}
