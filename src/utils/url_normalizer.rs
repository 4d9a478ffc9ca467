// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::errors::NormalizeError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// 默认剔除的追踪参数
///
/// 以 `*` 结尾的条目按前缀匹配。
pub const DEFAULT_TRACKING_PARAMS: &[&str] = &[
    "utm_*",
    "gclid",
    "fbclid",
    "msclkid",
    "yclid",
    "mc_cid",
    "mc_eid",
    "_ga",
    "_hsenc",
    "_hsmi",
];

/// URL 规范化配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// 需要剔除的查询参数
    pub strip_params: Vec<String>,
    /// 是否将 http/https 视为同一资源
    pub collapse_scheme: bool,
    /// 合并后使用的协议
    pub canonical_scheme: String,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            strip_params: DEFAULT_TRACKING_PARAMS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            collapse_scheme: true,
            canonical_scheme: "https".to_string(),
        }
    }
}

/// 规范化结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedUrl {
    /// 规范化后的 URL
    pub normalized: String,
    /// 规范化 URL 的 SHA-256 十六进制摘要
    pub hash: String,
    /// 小写主机名（带非默认端口）
    pub domain: String,
}

/// URL 规范化器
///
/// 规则依次为：协议与主机小写、去除片段、去除路径末尾的 `/`
/// （根路径保留）、剔除追踪参数、查询参数按字典序排序、按配置合并协议。
#[derive(Debug, Clone, Default)]
pub struct UrlNormalizer {
    config: NormalizerConfig,
}

impl UrlNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// 规范化 URL 并计算摘要
    ///
    /// # 错误
    ///
    /// 无法解析、不是 http(s) 协议或缺少主机时返回 `MalformedUrl`
    pub fn normalize(&self, raw: &str) -> Result<NormalizedUrl, NormalizeError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(NormalizeError::MalformedUrl("empty url".to_string()));
        }

        // url crate 解析时已将协议和主机转为小写
        let mut url = Url::parse(trimmed)
            .map_err(|e| NormalizeError::MalformedUrl(format!("{}: {}", trimmed, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(NormalizeError::MalformedUrl(format!(
                "{}: unsupported scheme '{}'",
                trimmed,
                url.scheme()
            )));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(NormalizeError::MalformedUrl(format!(
                "{}: missing host",
                trimmed
            )));
        }

        url.set_fragment(None);

        let path = url.path().trim_end_matches('/').to_string();
        if path.is_empty() {
            url.set_path("/");
        } else {
            url.set_path(&path);
        }

        let mut params: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !self.is_tracking_param(key))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        params.sort();
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params.iter());
        }

        if self.config.collapse_scheme && url.scheme() != self.config.canonical_scheme {
            url.set_scheme(&self.config.canonical_scheme).map_err(|_| {
                NormalizeError::MalformedUrl(format!(
                    "{}: cannot switch scheme to '{}'",
                    trimmed, self.config.canonical_scheme
                ))
            })?;
        }

        let domain = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        };

        let normalized = url.to_string();
        let hash = url_hash(&normalized);

        Ok(NormalizedUrl {
            normalized,
            hash,
            domain,
        })
    }

    fn is_tracking_param(&self, key: &str) -> bool {
        let key = key.to_ascii_lowercase();
        self.config.strip_params.iter().any(|param| {
            let param = param.to_ascii_lowercase();
            match param.strip_suffix('*') {
                Some(prefix) => key.starts_with(prefix),
                None => key == param,
            }
        })
    }
}

/// 计算规范化 URL 的摘要（64 位十六进制）
pub fn url_hash(normalized: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}
