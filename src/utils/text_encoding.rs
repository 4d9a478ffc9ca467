// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use tracing::debug;

/// `<meta charset="...">` 或 `<meta http-equiv content="...; charset=...">`
static META_CHARSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?\s*([a-zA-Z0-9_\-:.]+)"#)
        .expect("valid meta charset regex")
});

/// 只扫描文档头部寻找 meta 声明
const META_SCAN_LIMIT: usize = 4096;

/// 从 `Content-Type` 头中提取 charset
pub fn charset_from_content_type(content_type: &str) -> Option<&'static Encoding> {
    content_type.split(';').skip(1).find_map(|part| {
        let (key, value) = part.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            Encoding::for_label(value.trim().trim_matches('"').as_bytes())
        } else {
            None
        }
    })
}

/// 从 HTML 头部的 meta 标签中提取 charset
pub fn charset_from_meta(body: &[u8]) -> Option<&'static Encoding> {
    let head = &body[..body.len().min(META_SCAN_LIMIT)];
    let caps = META_CHARSET.captures(head)?;
    Encoding::for_label(caps.get(1)?.as_bytes())
}

/// 解码 HTML 响应体为 UTF-8 文本
///
/// 编码来源依次为：响应头声明、meta 声明、chardetng 检测。
/// 无法映射的字节以替换字符输出，不会失败。
pub fn decode_html(body: &[u8], content_type: Option<&str>) -> (String, &'static Encoding) {
    let declared = content_type
        .and_then(charset_from_content_type)
        .or_else(|| charset_from_meta(body));

    let encoding = match declared {
        Some(encoding) => encoding,
        None => {
            if std::str::from_utf8(body).is_ok() {
                UTF_8
            } else {
                let mut detector = EncodingDetector::new();
                detector.feed(body, true);
                let guessed = detector.guess(None, true);
                debug!("检测到编码: {}", guessed.name());
                guessed
            }
        }
    };

    let (decoded, actual, had_errors) = encoding.decode(body);
    if had_errors {
        debug!("解码 {} 时存在无效字节，已替换", actual.name());
    }
    (decoded.into_owned(), actual)
}
