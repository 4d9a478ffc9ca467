// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use harvestrs::utils::errors::NormalizeError;
use harvestrs::utils::url_normalizer::{url_hash, NormalizerConfig, UrlNormalizer};

fn normalizer() -> UrlNormalizer {
    UrlNormalizer::new(NormalizerConfig::default())
}

#[test]
fn test_equivalent_urls_share_a_hash() {
    let n = normalizer();
    let variants = [
        "https://News.Example.com/world/story/?utm_source=feed&id=7#comments",
        "http://news.example.com/world/story?id=7",
        "  https://news.example.com/world/story?id=7&fbclid=abc  ",
    ];

    let hashes: Vec<String> = variants
        .iter()
        .map(|raw| n.normalize(raw).unwrap().hash)
        .collect();

    assert!(hashes.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(
        n.normalize(variants[0]).unwrap().normalized,
        "https://news.example.com/world/story?id=7"
    );
}

#[test]
fn test_normalization_is_idempotent() {
    let n = normalizer();
    let once = n
        .normalize("HTTP://Example.com:8080/a/b/?z=1&a=2&utm_medium=x")
        .unwrap();
    let twice = n.normalize(&once.normalized).unwrap();

    assert_eq!(once, twice);
    assert_eq!(once.domain, "example.com:8080");
    assert_eq!(once.hash, url_hash(&once.normalized));
}

#[test]
fn test_scheme_kept_when_collapse_disabled() {
    let n = UrlNormalizer::new(NormalizerConfig {
        collapse_scheme: false,
        ..NormalizerConfig::default()
    });
    let plain = n.normalize("http://example.com/page").unwrap();
    let secure = n.normalize("https://example.com/page").unwrap();

    assert_ne!(plain.hash, secure.hash);
}

#[test]
fn test_unparseable_input_is_malformed() {
    let n = normalizer();
    for raw in ["", "   ", "example.com/no-scheme", "ftp://files.example.com/a", "https://"] {
        assert!(
            matches!(n.normalize(raw), Err(NormalizeError::MalformedUrl(_))),
            "expected MalformedUrl for {raw:?}"
        );
    }
}
