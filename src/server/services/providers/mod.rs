pub mod filemoon;
pub mod rubystm;

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

// every embed family we've seen puts the file code right after one of these path segments
static MEDIA_ID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/(e|d|v|embed)/([0-9a-zA-Z]+)").expect("media id regex should compile")
});

/// file code after `/e/`, `/d/`, `/v/` or `/embed/`, restricted to the segments in `allowed`
pub fn media_id_from_path(url: &Url, allowed: &[&str]) -> Option<String> {
    MEDIA_ID_REGEX
        .captures_iter(url.path())
        .find(|caps| allowed.contains(&&caps[1]))
        .map(|caps| caps[2].to_string())
}

pub fn host_matches(url: &Url, hints: &[&str]) -> bool {
    url.host_str()
        .map(|host| hints.iter().any(|hint| host.contains(hint)))
        .unwrap_or(false)
}
