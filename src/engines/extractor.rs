// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::article::FetchedArticle;
use crate::utils::errors::FetchError;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// 正文候选块的最小字符数（不含）
const MIN_CONTENT_CHARS: usize = 100;
/// 正文截断长度
const MAX_CONTENT_CHARS: usize = 5000;
/// 标题的最小字符数（不含）
const MIN_TITLE_CHARS: usize = 5;
/// 参与标题判定的 h1 数量
const H1_SCAN_LIMIT: usize = 10;
/// 兜底时拼接的段落数量
const PARAGRAPH_LIMIT: usize = 15;

const TITLE_CLASSES: &[&str] = &[
    "entry-title",
    "article-title",
    "post-title",
    "title",
    "headline",
    "article-headline",
    "post-headline",
    "page-title",
    "single-title",
    "story-title",
    "td-post-title",
];

const NAV_KEYWORDS: &[&str] = &["menu", "navigation", "skip to", "search", "logo"];

const TITLE_SEPARATORS: &[&str] = &[" | ", " - ", " :: ", " — "];

const CONTENT_CLASSES: &[&str] = &[
    "entry-content",
    "article-content",
    "post-content",
    "content",
    "article-body",
    "post-body",
    "story-content",
    "story-body",
    "main-content",
    "page-content",
    "single-content",
];

const CONTENT_CLASS_KEYWORDS: &[&str] = &["content", "article", "post", "body", "story"];

const CONTENT_IDS: &[&str] = &["content", "article", "main", "post"];

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

struct Selectors {
    meta_titles: Vec<(Selector, &'static str)>,
    h1: Selector,
    header: Selector,
    article: Selector,
    header_divs: Vec<Selector>,
    title: Selector,
    content_divs: Vec<Selector>,
    div: Selector,
    content_ids: Vec<Selector>,
    main: Selector,
    paragraph: Selector,
}

static SELECTORS: Lazy<Selectors> = Lazy::new(|| Selectors {
    meta_titles: vec![
        (selector(r#"meta[property="og:title"]"#), "og:title"),
        (selector(r#"meta[name="twitter:title"]"#), "twitter:title"),
        (selector(r#"meta[name="title"]"#), "title"),
    ],
    h1: selector("h1"),
    header: selector("header"),
    article: selector("article"),
    header_divs: ["entry-header", "article-header", "post-header", "content-header"]
        .iter()
        .map(|class| selector(&format!("div.{}", class)))
        .collect(),
    title: selector("title"),
    content_divs: CONTENT_CLASSES
        .iter()
        .map(|class| selector(&format!("div.{}", class)))
        .collect(),
    div: selector("div[class]"),
    content_ids: CONTENT_IDS
        .iter()
        .map(|id| selector(&format!("#{}", id)))
        .collect(),
    main: selector("main"),
    paragraph: selector("p"),
});

/// 元素文本：各文本节点去除首尾空白后以空格连接
fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn class_string(element: ElementRef<'_>) -> String {
    element
        .value()
        .classes()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn usable_title(element: Option<ElementRef<'_>>) -> Option<String> {
    let title = text_of(element?);
    (char_len(&title) > MIN_TITLE_CHARS).then_some(title)
}

fn usable_content(element: Option<ElementRef<'_>>) -> Option<String> {
    let content = text_of(element?);
    (char_len(&content) > MIN_CONTENT_CHARS).then(|| truncate_chars(&content, MAX_CONTENT_CHARS))
}

/// 提取标题
///
/// 依次尝试 meta 标签、带标题类名的 h1、header/article 内的 h1、
/// 标题容器 div 内的 h1、首个非导航 h1，最后回退到 `<title>`。
pub fn extract_title(document: &Html) -> Option<String> {
    let s = &*SELECTORS;

    for (sel, name) in &s.meta_titles {
        if let Some(meta) = document.select(sel).next() {
            let content = meta.value().attr("content").unwrap_or("").trim();
            if !content.is_empty() {
                debug!(source = *name, "Title extracted from meta tag");
                return Some(content.to_string());
            }
        }
    }

    let h1s: Vec<ElementRef<'_>> = document.select(&s.h1).take(H1_SCAN_LIMIT).collect();

    for h1 in &h1s {
        let classes = class_string(*h1);
        if !classes.is_empty() && TITLE_CLASSES.iter().any(|c| classes.contains(c)) {
            if let Some(title) = usable_title(Some(*h1)) {
                return Some(title);
            }
        }
    }

    for header in document.select(&s.header).take(5) {
        if let Some(title) = usable_title(header.select(&s.h1).next()) {
            return Some(title);
        }
    }

    if let Some(article) = document.select(&s.article).next() {
        if let Some(title) = usable_title(article.select(&s.h1).next()) {
            return Some(title);
        }
    }

    for sel in &s.header_divs {
        if let Some(div) = document.select(sel).next() {
            if let Some(title) = usable_title(div.select(&s.h1).next()) {
                return Some(title);
            }
        }
    }

    for h1 in &h1s {
        if let Some(title) = usable_title(Some(*h1)) {
            let lower = title.to_lowercase();
            if !NAV_KEYWORDS.iter().any(|k| lower.contains(k)) {
                return Some(title);
            }
        }
    }

    let title = usable_title(document.select(&s.title).next())?;
    Some(strip_site_suffix(&title))
}

/// `文章标题 | 站点名` 形式只保留最长的一段
fn strip_site_suffix(title: &str) -> String {
    for sep in TITLE_SEPARATORS {
        if title.contains(sep) {
            return title
                .split(sep)
                .reduce(|best, part| if char_len(part) > char_len(best) { part } else { best })
                .unwrap_or(title)
                .trim()
                .to_string();
        }
    }
    title.to_string()
}

/// 提取正文
pub fn extract_content(document: &Html) -> Option<String> {
    let s = &*SELECTORS;

    if let Some(content) = usable_content(document.select(&s.article).next()) {
        return Some(content);
    }

    for sel in &s.content_divs {
        if let Some(content) = usable_content(document.select(sel).next()) {
            return Some(content);
        }
    }

    for div in document.select(&s.div) {
        let classes = class_string(div);
        if CONTENT_CLASS_KEYWORDS.iter().any(|k| classes.contains(k)) {
            if let Some(content) = usable_content(Some(div)) {
                return Some(content);
            }
        }
    }

    for sel in &s.content_ids {
        if let Some(content) = usable_content(document.select(sel).next()) {
            return Some(content);
        }
    }

    if let Some(content) = usable_content(document.select(&s.main).next()) {
        return Some(content);
    }

    let joined = document
        .select(&s.paragraph)
        .take(PARAGRAPH_LIMIT)
        .map(text_of)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (char_len(&joined) > MIN_CONTENT_CHARS).then(|| truncate_chars(&joined, MAX_CONTENT_CHARS))
}

/// 从 HTML 中提取文章
///
/// 解析器对残缺标记是宽容的，能取到标题或正文之一即视为（降级的）成功；
/// 两者都取不到时返回 `ParseFailure`。
pub fn extract_article(html: &str) -> Result<FetchedArticle, FetchError> {
    let document = Html::parse_document(html);
    if !document.errors.is_empty() {
        debug!(errors = document.errors.len(), "Markup errors tolerated during parse");
    }

    let title = extract_title(&document);
    let content = extract_content(&document);

    if title.is_none() && content.is_none() {
        return Err(FetchError::parse_failure("no title or content could be extracted"));
    }

    let degraded = title.is_none() || content.is_none();
    Ok(FetchedArticle {
        title,
        content,
        degraded,
    })
}
