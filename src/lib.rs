// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含任务、文章结果与去重记录等核心实体，以及存储与缓存接口
pub mod domain;

/// 引擎模块
///
/// 实现网页抓取与正文提取
pub mod engines;

/// 基础设施模块
///
/// 提供外部服务集成，如数据库、Redis和指标导出
pub mod infrastructure;

/// 队列模块
///
/// 实现三级优先级任务队列
pub mod queue;

/// 工具模块
///
/// 提供URL规范化、重试策略、编码检测等通用功能
pub mod utils;

/// 工作器模块
///
/// 实现文章抓取工作器和工作池管理
pub mod workers;
