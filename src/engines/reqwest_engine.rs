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

use crate::config::settings::FetchSettings;
use crate::domain::models::article::FetchedArticle;
use crate::engines::extractor::extract_article;
use crate::engines::traits::FetchExecutor;
use crate::utils::errors::FetchError;
use crate::utils::text_encoding::decode_html;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use std::time::{Duration, Instant};
use tracing::debug;

/// 抓取执行器
///
/// 基于reqwest实现的HTTP抓取，所有请求共享一个连接池
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// 根据配置创建抓取执行器
    ///
    /// # 参数
    ///
    /// * `settings` - 抓取配置
    ///
    /// # 返回值
    ///
    /// * `Ok(ReqwestFetcher)` - 抓取执行器
    /// * `Err(reqwest::Error)` - 客户端构建失败
    pub fn new(settings: &FetchSettings) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(settings.max_redirects))
            .cookie_store(true)
            .build()?;

        Ok(Self { client })
    }

    async fn fetch_inner(&self, url: &str) -> Result<FetchedArticle, FetchError> {
        let response = self.client.get(url).send().await.map_err(map_reqwest_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(map_reqwest_err)?;
        let (html, encoding) = decode_html(&body, content_type.as_deref());
        debug!(url, encoding = encoding.name(), bytes = body.len(), "Response decoded");

        extract_article(&html)
    }
}

/// reqwest 错误映射：超时归为 `Timeout`，其余传输错误归为 `Network`
fn map_reqwest_err(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::timeout(err.to_string())
    } else {
        FetchError::network(err.to_string())
    }
}

#[async_trait]
impl FetchExecutor for ReqwestFetcher {
    /// 执行HTTP抓取并提取文章
    ///
    /// 整体期限由 `tokio::time::timeout` 控制，超时后请求被丢弃
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedArticle, FetchError> {
        let start = Instant::now();
        let result = match tokio::time::timeout(timeout, self.fetch_inner(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::timeout(format!(
                "no complete response within {}ms",
                timeout.as_millis()
            ))),
        };
        debug!(
            url,
            elapsed_ms = start.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Fetch finished"
        );
        result
    }

    fn name(&self) -> &'static str {
        "reqwest"
    }
}

#[cfg(test)]
#[path = "reqwest_engine_test.rs"]
mod tests;
