// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::article::FetchedArticle;
use crate::utils::errors::FetchError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// 抓取执行器特质
///
/// 获取并解析单个URL，返回标题与正文。实现需要区分瞬时错误
/// （`Network`、`Timeout`）与永久错误（`HttpStatus`、`ParseFailure`），
/// 只有前者会进入重试。
#[async_trait]
pub trait FetchExecutor: Send + Sync {
    /// 在 `timeout` 内完成抓取与解析
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedArticle, FetchError>;

    /// 获取执行器名称
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<T: FetchExecutor + ?Sized> FetchExecutor for Arc<T> {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedArticle, FetchError> {
        (**self).fetch(url, timeout).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
