// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use harvestrs::domain::models::task::{Priority, Task, TaskSubmission};
use harvestrs::utils::url_normalizer::{NormalizerConfig, UrlNormalizer};

fn submission(url: &str, priority: Option<&str>) -> TaskSubmission {
    TaskSubmission {
        article_id: "art-1".to_string(),
        url: url.to_string(),
        source: "rss".to_string(),
        category: "tech".to_string(),
        priority: priority.map(str::to_string),
        submitted_by: "user-9".to_string(),
        force: false,
    }
}

#[test]
fn test_submission_is_normalized_and_prioritized() {
    let normalizer = UrlNormalizer::new(NormalizerConfig::default());
    let task = Task::from_submission(
        submission("http://example.com/post/?utm_campaign=x", Some(" HIGH ")),
        &normalizer,
    )
    .unwrap();

    assert_eq!(task.priority, Priority::High);
    assert_eq!(task.url_normalized, "https://example.com/post");
    assert_eq!(task.url_hash.len(), 64);
    assert_eq!(task.attempt, 0);
}

#[test]
fn test_unknown_or_missing_priority_defaults_to_low() {
    let normalizer = UrlNormalizer::new(NormalizerConfig::default());
    for priority in [None, Some("urgent"), Some("")] {
        let task =
            Task::from_submission(submission("https://example.com/a", priority), &normalizer)
                .unwrap();
        assert_eq!(task.priority, Priority::Low);
    }
}

#[test]
fn test_empty_article_id_is_rejected() {
    let normalizer = UrlNormalizer::new(NormalizerConfig::default());
    let mut bad = submission("https://example.com/a", None);
    bad.article_id.clear();

    assert!(Task::from_submission(bad, &normalizer).is_err());
}

#[test]
fn test_malformed_url_is_kept_for_failure_reporting() {
    let normalizer = UrlNormalizer::new(NormalizerConfig::default());
    let task = Task::from_submission(submission("not a url", None), &normalizer).unwrap();

    assert!(task.url_normalized.is_empty());
    assert_eq!(task.url_original, "not a url");
}

#[test]
fn test_wire_payload_with_invalid_priority_decodes_as_low() {
    let task: Task = serde_json::from_str(
        r#"{"article_id":"a","url_original":"https://example.com","priority":"critical"}"#,
    )
    .unwrap();

    assert_eq!(task.priority, Priority::Low);
    assert!(task.claim_id.is_none());
}
