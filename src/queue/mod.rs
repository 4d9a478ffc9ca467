// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 提供内存与 Redis 两种优先级代理实现
pub mod priority_broker;
pub mod redis_broker;
