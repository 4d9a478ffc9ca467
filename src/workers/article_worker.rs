// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::manager::{PoolConfig, PoolState};
use super::stats::PipelineStats;
use super::worker::{cancelled, stopped, Worker};
use crate::domain::models::article::{ArticleStatus, ScrapeOutcome};
use crate::domain::models::cache_entry::ClaimResult;
use crate::domain::models::task::Task;
use crate::domain::repositories::dedup_cache::DedupCache;
use crate::domain::repositories::result_sink::{Ack, ResultSink};
use crate::engines::traits::FetchExecutor;
use crate::infrastructure::metrics;
use crate::queue::priority_broker::PriorityBroker;
use crate::utils::errors::{FailureKind, FetchError, PipelineError, StoreError};
use crate::utils::retry_policy::RetryPolicy;
use crate::utils::url_normalizer::{NormalizedUrl, UrlNormalizer};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// 释放失败后首次重试的等待时间
const RELEASE_RETRY_INITIAL: Duration = Duration::from_millis(100);

/// 不限制取任务数量
const UNLIMITED_INTAKE: usize = usize::MAX;

/// 单个任务的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// 抓取成功并已落库
    Completed,
    /// 终态失败，失败结果已尽量落库
    Failed(FailureKind),
    /// 已安排延迟重试，去重占用保持 pending
    RetryScheduled,
    /// URL 已完成或正被其他工作器处理
    DuplicateSkipped,
    /// 关闭过程中被取消
    Cancelled,
    /// 缓存不可用，任务已放回队列
    Deferred,
}

impl Disposition {
    pub fn label(&self) -> &'static str {
        match self {
            Disposition::Completed => "completed",
            Disposition::Failed(_) => "failed",
            Disposition::RetryScheduled => "retry_scheduled",
            Disposition::DuplicateSkipped => "duplicate",
            Disposition::Cancelled => "cancelled",
            Disposition::Deferred => "deferred",
        }
    }
}

/// 流水线协作组件
#[derive(Clone)]
pub struct PipelineComponents {
    pub broker: Arc<dyn PriorityBroker>,
    pub cache: Arc<dyn DedupCache>,
    pub fetcher: Arc<dyn FetchExecutor>,
    pub sink: Arc<dyn ResultSink>,
    pub normalizer: Arc<UrlNormalizer>,
}

/// 尚未释放的占用及其任务
#[derive(Debug, Clone)]
pub(crate) struct HeldClaim {
    task: Task,
    normalized: NormalizedUrl,
}

/// 所有工作器与重试定时器共享的上下文
pub(crate) struct PipelineContext {
    pub(crate) components: PipelineComponents,
    pub(crate) policy: RetryPolicy,
    pub(crate) config: PoolConfig,
    pub(crate) stats: Arc<PipelineStats>,
    /// 等待中的延迟重试
    pub(crate) retries: Mutex<JoinSet<()>>,
    /// 缓存出错后在后台重试的释放
    pub(crate) releases: Mutex<JoinSet<()>>,
    /// 本进程持有、尚未释放的占用
    claims: DashMap<Uuid, HeldClaim>,
    /// 已出队、尚未得出处理结果的任务数
    in_flight: AtomicUsize,
    /// 剩余可接收的首次尝试数
    intake_budget: AtomicUsize,
    /// 队列或存储故障后暂停取任务的截止时间
    paused_until: parking_lot::Mutex<Option<Instant>>,
}

impl PipelineContext {
    pub(crate) fn new(
        components: PipelineComponents,
        policy: RetryPolicy,
        config: PoolConfig,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            components,
            policy,
            config,
            stats,
            retries: Mutex::new(JoinSet::new()),
            releases: Mutex::new(JoinSet::new()),
            claims: DashMap::new(),
            in_flight: AtomicUsize::new(0),
            intake_budget: AtomicUsize::new(UNLIMITED_INTAKE),
            paused_until: parking_lot::Mutex::new(None),
        }
    }

    fn pause_intake(&self) {
        let until = Instant::now() + self.config.outage_backoff;
        let mut paused = self.paused_until.lock();
        if paused.map_or(true, |current| current < until) {
            *paused = Some(until);
        }
    }

    fn intake_pause_remaining(&self) -> Option<Duration> {
        let mut paused = self.paused_until.lock();
        match *paused {
            Some(until) if until > Instant::now() => Some(until - Instant::now()),
            Some(_) => {
                *paused = None;
                None
            }
            None => None,
        }
    }

    /// 限制之后接收的首次尝试数量
    pub(crate) fn limit_intake(&self, limit: usize) {
        self.intake_budget.store(limit, Ordering::Release);
    }

    pub(crate) fn intake_exhausted(&self) -> bool {
        self.intake_budget.load(Ordering::Acquire) == 0
    }

    fn take_intake_slot(&self) -> bool {
        self.intake_budget
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| match left {
                UNLIMITED_INTAKE => Some(UNLIMITED_INTAKE),
                0 => None,
                n => Some(n - 1),
            })
            .is_ok()
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// 等待中的延迟重试数量
    pub(crate) async fn pending_retries(&self) -> usize {
        let mut retries = self.retries.lock().await;
        while retries.try_join_next().is_some() {}
        retries.len()
    }

    fn record(&self, disposition: Disposition) {
        self.stats.record(&disposition);
        metrics::record_outcome(disposition.label());
    }

    /// 写入结果；存储故障记录告警，不可用时暂停取任务
    async fn persist(&self, outcome: &ScrapeOutcome) -> Result<Ack, StoreError> {
        match self.components.sink.upsert(outcome).await {
            Ok(ack) => Ok(ack),
            Err(e) => {
                metrics::record_store_error();
                error!(
                    alert = true,
                    article_id = %outcome.article_id,
                    url = %outcome.url,
                    error = %e,
                    "Failed to persist scrape outcome"
                );
                if e.is_unavailable() {
                    self.pause_intake();
                }
                Err(e)
            }
        }
    }

    /// 写入失败结果；写入本身失败时只记录日志
    async fn persist_failure(
        &self,
        task: &Task,
        normalized: Option<&NormalizedUrl>,
        error: &PipelineError,
    ) {
        let outcome = ScrapeOutcome::failed(task, normalized, error);
        if self.persist(&outcome).await.is_ok() {
            warn!(
                article_id = %task.article_id,
                kind = %error.failure_kind(),
                attempts = outcome.attempts,
                "Recorded failed outcome"
            );
        }
    }

    fn hold(&self, claim_id: Uuid, task: &Task, normalized: &NormalizedUrl) {
        self.claims.insert(
            claim_id,
            HeldClaim {
                task: task.clone(),
                normalized: normalized.clone(),
            },
        );
    }

    /// 写入占用终态
    ///
    /// 缓存出错时转入后台重试直到写入成功，占用不会停留在 pending
    async fn release(self: &Arc<Self>, url_hash: &str, claim_id: Uuid, status: ArticleStatus) {
        match self.components.cache.release(url_hash, claim_id, status).await {
            Ok(true) => {}
            Ok(false) => warn!(url_hash, %claim_id, "Release ignored, claim no longer held"),
            Err(e) => {
                error!(alert = true, url_hash, error = %e, "Failed to release dedup claim, retrying in background");
                self.retry_release(url_hash.to_string(), claim_id, status).await;
            }
        }
        self.claims.remove(&claim_id);
    }

    async fn retry_release(self: &Arc<Self>, url_hash: String, claim_id: Uuid, status: ArticleStatus) {
        let ctx = self.clone();
        let max_delay = self.config.outage_backoff.max(RELEASE_RETRY_INITIAL);
        let mut releases = self.releases.lock().await;
        while releases.try_join_next().is_some() {}
        releases.spawn(async move {
            let mut delay = RELEASE_RETRY_INITIAL;
            loop {
                sleep(delay).await;
                match ctx.components.cache.release(&url_hash, claim_id, status).await {
                    Ok(applied) => {
                        info!(url_hash = %url_hash, applied, "Dedup claim released after retry");
                        break;
                    }
                    Err(e) => {
                        delay = (delay * 2).min(max_delay);
                        warn!(
                            url_hash = %url_hash,
                            error = %e,
                            retry_in_ms = delay.as_millis() as u64,
                            "Dedup claim release still failing"
                        );
                    }
                }
            }
        });
    }

    /// 以取消结束任务：记录结果并释放占用为 failed
    async fn resolve_cancelled(
        self: &Arc<Self>,
        task: &Task,
        normalized: &NormalizedUrl,
        claim_id: Uuid,
        reason: &str,
    ) -> Disposition {
        let error = PipelineError::Cancelled(reason.to_string());
        self.persist_failure(task, Some(normalized), &error).await;
        self.release(&normalized.hash, claim_id, ArticleStatus::Failed).await;
        info!(article_id = %task.article_id, reason, "Task cancelled");
        Disposition::Cancelled
    }

    /// 释放被中止的工作器或重试遗留的占用
    ///
    /// 先释放再尝试写入取消结果，写入最多等待 `cancel_grace`
    pub(crate) async fn release_abandoned(self: &Arc<Self>) -> usize {
        let abandoned: Vec<(Uuid, HeldClaim)> = self
            .claims
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        for (claim_id, held) in &abandoned {
            self.release(&held.normalized.hash, *claim_id, ArticleStatus::Failed)
                .await;
            let error = PipelineError::Cancelled("aborted at shutdown".to_string());
            let outcome = ScrapeOutcome::failed(&held.task, Some(&held.normalized), &error);
            if timeout(self.config.cancel_grace, self.persist(&outcome)).await.is_err() {
                warn!(article_id = %held.task.article_id, "Gave up recording aborted task");
            }
            self.record(Disposition::Cancelled);
        }

        if !abandoned.is_empty() {
            warn!(count = abandoned.len(), "Released claims left by aborted tasks");
        }
        abandoned.len()
    }

    /// 缓存未命中时查询存储，已完成的URL不再抓取
    async fn completed_in_store(&self, normalized: &NormalizedUrl) -> Option<ScrapeOutcome> {
        match self.components.sink.find_by_url_hash(&normalized.hash).await {
            Ok(Some(existing)) if existing.status == ArticleStatus::Completed => Some(existing),
            Ok(_) => None,
            Err(e) => {
                warn!(url = %normalized.normalized, error = %e, "Store lookup failed, fetching anyway");
                None
            }
        }
    }
}

/// 文章抓取工作器
///
/// 单个任务的流程：规范化 → 去重占用 → 抓取 → 成功落库或按重试策略
/// 延迟重新入队 → 终态失败落库，每条退出路径都释放占用
#[derive(Clone)]
pub struct ArticleWorker {
    id: Uuid,
    ctx: Arc<PipelineContext>,
    state: watch::Receiver<PoolState>,
}

impl ArticleWorker {
    pub(crate) fn new(ctx: Arc<PipelineContext>, state: watch::Receiver<PoolState>) -> Self {
        Self {
            id: Uuid::new_v4(),
            ctx,
            state,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 处理单个任务并返回处理结果
    #[instrument(
        skip(self, task),
        fields(
            worker_id = %self.id,
            article_id = %task.article_id,
            priority = %task.priority,
            attempt = task.attempt_number()
        )
    )]
    pub async fn process(&self, task: Task) -> Disposition {
        let ctx = &self.ctx;

        let normalized = match ctx.components.normalizer.normalize(&task.url_original) {
            Ok(normalized) => normalized,
            Err(e) => {
                let error = PipelineError::from(e);
                ctx.persist_failure(&task, None, &error).await;
                return Disposition::Failed(FailureKind::MalformedUrl);
            }
        };

        let claim_id = task.claim_id.unwrap_or_else(Uuid::new_v4);
        match ctx
            .components
            .cache
            .try_claim(&normalized.hash, claim_id, task.force)
            .await
        {
            Ok(ClaimResult::Claimed) => ctx.hold(claim_id, &task, &normalized),
            Ok(result) => {
                info!(url = %normalized.normalized, ?result, "Skipping duplicate URL");
                return Disposition::DuplicateSkipped;
            }
            Err(e) => return self.defer(task, e.into()).await,
        }

        // 首次占用时以存储为准，缓存丢失不会导致重复抓取
        if !task.force && task.claim_id.is_none() {
            if let Some(existing) = ctx.completed_in_store(&normalized).await {
                ctx.release(&normalized.hash, claim_id, ArticleStatus::Completed)
                    .await;
                info!(
                    url = %normalized.normalized,
                    stored_article_id = %existing.article_id,
                    "URL already stored, skipping"
                );
                return Disposition::DuplicateSkipped;
            }
        }

        let mut state = self.state.clone();
        let started = Instant::now();
        let fetched = tokio::select! {
            result = ctx.components.fetcher.fetch(task.url_original.trim(), ctx.config.fetch_timeout) => Some(result),
            _ = cancelled(&mut state) => None,
        };
        metrics::record_fetch_duration(started.elapsed());

        match fetched {
            None => {
                ctx.resolve_cancelled(&task, &normalized, claim_id, "fetch interrupted by shutdown")
                    .await
            }
            Some(Ok(article)) => {
                let outcome = ScrapeOutcome::completed(&task, &normalized, article);
                match ctx.persist(&outcome).await {
                    Ok(ack) => {
                        ctx.release(&normalized.hash, claim_id, ArticleStatus::Completed)
                            .await;
                        info!(?ack, degraded = outcome.scrape_error.is_some(), "Article stored");
                        Disposition::Completed
                    }
                    Err(e) => {
                        ctx.release(&normalized.hash, claim_id, ArticleStatus::Failed).await;
                        ctx.persist_failure(&task, Some(&normalized), &PipelineError::Store(e))
                            .await;
                        Disposition::Failed(FailureKind::Store)
                    }
                }
            }
            Some(Err(e)) => self.handle_fetch_error(task, normalized, claim_id, e).await,
        }
    }

    async fn handle_fetch_error(
        &self,
        task: Task,
        normalized: NormalizedUrl,
        claim_id: Uuid,
        err: FetchError,
    ) -> Disposition {
        let ctx = &self.ctx;

        if ctx.policy.should_retry(task.attempt_number(), err.kind) {
            return self.schedule_retry(task, normalized, claim_id, err).await;
        }

        let kind = FailureKind::from(err.kind);
        ctx.persist_failure(&task, Some(&normalized), &PipelineError::Fetch(err))
            .await;
        ctx.release(&normalized.hash, claim_id, ArticleStatus::Failed).await;
        Disposition::Failed(kind)
    }

    /// 安排延迟重新入队
    ///
    /// 等待在独立任务中进行，不占用工作器；池停止时未到期的重试按取消处理
    async fn schedule_retry(
        &self,
        task: Task,
        normalized: NormalizedUrl,
        claim_id: Uuid,
        err: FetchError,
    ) -> Disposition {
        let ctx = &self.ctx;

        if *self.state.borrow() != PoolState::Running {
            return ctx
                .resolve_cancelled(&task, &normalized, claim_id, "retry abandoned during shutdown")
                .await;
        }

        let delay = ctx.policy.backoff_duration(task.attempt_number());
        let next = task.clone().with_claim(claim_id).retry();
        let retry_at = Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        warn!(
            error = %err,
            delay_ms = delay.as_millis() as u64,
            %retry_at,
            next_attempt = next.attempt_number(),
            "Fetch failed, retry scheduled"
        );
        metrics::record_retry_scheduled();

        let shared = self.ctx.clone();
        let mut state = self.state.clone();
        let mut retries = ctx.retries.lock().await;
        while retries.try_join_next().is_some() {}
        retries.spawn(async move {
            tokio::select! {
                _ = sleep(delay) => {
                    if let Err(e) = shared.components.broker.enqueue(next.clone()).await {
                        error!(alert = true, article_id = %next.article_id, error = %e, "Failed to re-enqueue retry");
                        let error = PipelineError::Queue(e);
                        shared.persist_failure(&task, Some(&normalized), &error).await;
                        shared.release(&normalized.hash, claim_id, ArticleStatus::Failed).await;
                        shared.record(Disposition::Failed(error.failure_kind()));
                    } else {
                        // 占用随任务回到队列，由下一次尝试重入
                        shared.claims.remove(&claim_id);
                        debug!(article_id = %next.article_id, "Retry re-enqueued");
                    }
                }
                _ = stopped(&mut state) => {
                    let disposition = shared
                        .resolve_cancelled(&task, &normalized, claim_id, "retry pending at shutdown")
                        .await;
                    shared.record(disposition);
                }
            }
        });

        Disposition::RetryScheduled
    }

    /// 缓存不可用：任务放回队首并暂停取任务
    async fn defer(&self, task: Task, error: PipelineError) -> Disposition {
        let ctx = &self.ctx;
        error!(alert = true, error = %error, "Dedup cache unavailable, deferring task");
        ctx.pause_intake();

        if let Err(e) = ctx.components.broker.requeue_front(task.clone()).await {
            error!(alert = true, error = %e, "Failed to return task to queue");
            ctx.persist_failure(&task, None, &error).await;
            return Disposition::Failed(error.failure_kind());
        }
        Disposition::Deferred
    }

    /// 把已出队但未开始的任务放回队首
    async fn hand_back(&self, task: Task, why: &str) {
        if let Err(e) = self.ctx.components.broker.requeue_front(task).await {
            error!(alert = true, error = %e, why, "Failed to return task to queue");
        }
    }

    async fn refresh_depth_gauge(&self) {
        match self.ctx.components.broker.depths().await {
            Ok(depths) => metrics::record_queue_depths(&depths),
            Err(e) => debug!(error = %e, "Queue depth unavailable"),
        }
    }
}

#[async_trait]
impl Worker for ArticleWorker {
    async fn run(&self, mut state: watch::Receiver<PoolState>) {
        info!(worker_id = %self.id, "Article worker started");

        loop {
            if *state.borrow() != PoolState::Running {
                break;
            }

            if let Some(wait) = self.ctx.intake_pause_remaining() {
                debug!(worker_id = %self.id, wait_ms = wait.as_millis() as u64, "Intake paused");
                tokio::select! {
                    _ = sleep(wait) => {}
                    _ = stopped(&mut state) => break,
                }
                continue;
            }

            let task = match self
                .ctx
                .components
                .broker
                .dequeue(self.ctx.config.pop_timeout)
                .await
            {
                Ok(Some(task)) => task,
                Ok(None) => continue,
                Err(e) => {
                    error!(alert = true, worker_id = %self.id, error = %e, "Queue unavailable, pausing intake");
                    self.ctx.pause_intake();
                    continue;
                }
            };

            if *state.borrow() != PoolState::Running {
                self.hand_back(task, "dequeued after shutdown began").await;
                break;
            }

            // 配额用尽后只接收重试，新任务原样放回
            if task.attempt == 0 && !self.ctx.take_intake_slot() {
                self.hand_back(task, "intake limit reached").await;
                tokio::select! {
                    _ = sleep(self.ctx.config.pop_timeout) => {}
                    _ = stopped(&mut state) => break,
                }
                continue;
            }

            self.ctx.in_flight.fetch_add(1, Ordering::AcqRel);
            self.refresh_depth_gauge().await;
            let disposition = self.process(task).await;
            self.ctx.record(disposition);
            self.ctx.in_flight.fetch_sub(1, Ordering::AcqRel);
        }

        info!(worker_id = %self.id, "Article worker stopped");
    }

    fn name(&self) -> &str {
        "article_worker"
    }
}
