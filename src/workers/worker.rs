// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::manager::PoolState;
use async_trait::async_trait;
use tokio::sync::watch;

/// Worker trait定义
///
/// 工作池中所有后台循环都必须实现此trait，
/// 在池状态离开 `Running` 后自行退出
#[async_trait]
pub trait Worker: Send + Sync {
    /// 运行工作器直到收到停止信号
    async fn run(&self, state: watch::Receiver<PoolState>);

    /// 获取工作器名称
    fn name(&self) -> &str;
}

/// 等待池状态离开 `Running`；发送端已释放时立即返回
pub async fn stopped(state: &mut watch::Receiver<PoolState>) {
    let _ = state.wait_for(|s| *s != PoolState::Running).await;
}

/// 等待池进入 `Cancelling`；发送端已释放时立即返回
pub async fn cancelled(state: &mut watch::Receiver<PoolState>) {
    let _ = state.wait_for(|s| *s == PoolState::Cancelling).await;
}
