// pages hide the playlist in a handful of ways (raw, json, inside a player call), none of the
// patterns below catches every provider on its own so all of them run and get merged
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use super::url_utils::{is_http, normalize_escapes};

pub const MANIFEST_EXTENSION: &str = ".m3u8";

static ABSOLUTE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(https?://[^\s"'<>]+\.m3u8[^\s"'<>]*)"#).expect("absolute regex should compile")
});

// the leading class keeps this from re-matching the tail of an absolute url
static PROTOCOL_RELATIVE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|[^:\w/])(//[^\s"'<>]+\.m3u8[^\s"'<>]*)"#)
        .expect("protocol relative regex should compile")
});

static JSON_KEY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""(?:file|source|src|url)"\s*:\s*"([^"]+\.m3u8[^"]*)""#)
        .expect("json key regex should compile")
});

static SINGLE_QUOTED_KEY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:file|source|src|url)\s*:\s*'([^']+\.m3u8[^']*)'"#)
        .expect("single quoted key regex should compile")
});

static PLAYER_CALL_REGEXES: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        // videojs style player.src({src:'...'}) / player.src('...')
        Regex::new(r#"player\.src\(\s*[{\[]?\s*(?:src\s*:\s*)?["']([^"']+\.m3u8[^"']*)["']"#)
            .expect("player src regex should compile"),
        // jwplayer style setup({sources:[{file:"..."}]})
        Regex::new(r#"sources\s*:\s*\[\s*\{\s*(?:file|src)\s*:\s*["']([^"']+\.m3u8[^"']*)["']"#)
            .expect("player setup regex should compile"),
    ]
});

/// every playlist url in `text`, in the order they were found with duplicates dropped
///
/// relative and protocol-relative hits are made absolute against `base_origin`, anything that
/// can't be resolved to http(s) is silently skipped
pub fn find_manifest_urls(text: &str, base_origin: &str) -> Vec<String> {
    let normalized = normalize_escapes(text);
    let base = Url::parse(base_origin).ok();

    let layers = [
        &*ABSOLUTE_REGEX,
        &*PROTOCOL_RELATIVE_REGEX,
        &*JSON_KEY_REGEX,
        &*SINGLE_QUOTED_KEY_REGEX,
        &PLAYER_CALL_REGEXES[0],
        &PLAYER_CALL_REGEXES[1],
    ];

    let mut found: Vec<String> = Vec::new();
    for regex in layers {
        for caps in regex.captures_iter(&normalized) {
            let Some(candidate) = caps.get(1) else {
                continue;
            };
            let Some(resolved) = resolve_candidate(candidate.as_str(), base.as_ref()) else {
                continue;
            };
            if !found.contains(&resolved) {
                found.push(resolved);
            }
        }
    }

    found
}

/// first candidate that actually points at a playlist, otherwise just the first one
pub fn pick_stream_url(candidates: &[String]) -> Option<&String> {
    candidates
        .iter()
        .find(|c| c.contains(MANIFEST_EXTENSION))
        .or_else(|| candidates.first())
}

fn resolve_candidate(candidate: &str, base: Option<&Url>) -> Option<String> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }

    let resolved = if let Some(rest) = candidate.strip_prefix("//") {
        Url::parse(&format!("https://{}", rest)).ok()?
    } else if candidate.starts_with("http://") || candidate.starts_with("https://") {
        Url::parse(candidate).ok()?
    } else {
        base?.join(candidate).ok()?
    };

    is_http(&resolved).then(|| resolved.to_string())
}
