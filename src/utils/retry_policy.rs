// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::errors::FetchErrorKind;
use std::time::Duration;

/// 重试策略配置
///
/// `max_attempts` 是抓取的总次数上限（含首次），耗尽后任务进入永久失败。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大尝试次数
    pub max_attempts: u32,
    /// 初始退避时间
    pub initial_backoff: Duration,
    /// 最大退避时间
    pub max_backoff: Duration,
    /// 退避乘数
    pub backoff_multiplier: f64,
    /// 抖动因子 (0.0-1.0)
    pub jitter_factor: f64,
    /// 是否启用抖动
    pub enable_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            enable_jitter: true,
        }
    }
}

impl RetryPolicy {
    /// 计算第 `attempt` 次尝试失败后的退避时间
    ///
    /// `attempt` 从 1 开始，结果为 `initial * multiplier^(attempt-1)`，
    /// 截断到 `max_backoff` 后叠加 ±`jitter_factor` 的抖动，
    /// 最终结果始终落在 `[0, max_backoff]` 内。
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let max_secs = self.max_backoff.as_secs_f64();
        let exponent = attempt.max(1) as i32 - 1;
        let backoff_secs = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);

        // 限制在 [0, max]；负乘数或溢出产生的 NaN 按上限处理
        let capped_backoff = if backoff_secs.is_nan() {
            max_secs
        } else {
            backoff_secs.clamp(0.0, max_secs)
        };

        // 添加抖动
        let final_backoff = if self.enable_jitter && self.jitter_factor > 0.0 && capped_backoff > 0.0 {
            let jitter_range = capped_backoff * self.jitter_factor;
            let jitter = rand::random_range(-jitter_range..jitter_range);
            (capped_backoff + jitter).clamp(0.0, max_secs)
        } else {
            capped_backoff
        };

        Duration::from_secs_f64(final_backoff)
    }

    /// 是否还有剩余尝试次数
    pub fn has_attempts_left(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }

    /// 根据已完成的尝试次数与错误类型判断是否重试
    pub fn should_retry(&self, attempts_made: u32, kind: FetchErrorKind) -> bool {
        self.has_attempts_left(attempts_made) && kind.is_retryable()
    }
}
