use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;
use url::Url;

use super::url_utils::is_http;

/// where the proxy route lives under the public base url
pub const PROXY_PATH: &str = "/api/proxy";

// quoted and unquoted in one pass so a rewritten value never gets picked up a second time
static URI_ATTRIBUTE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"URI=(?:"([^"]+)"|([^",\s]+))"#).expect("uri attribute regex should compile")
});

/// `<proxy_base>/api/proxy?url=<target>&referer=<referer>` with both values percent-encoded
pub fn build_proxy_url(proxy_base: &str, target: &str, referer: &str) -> String {
    format!(
        "{}{}?url={}&referer={}",
        proxy_base.trim_end_matches('/'),
        PROXY_PATH,
        urlencoding::encode(target),
        urlencoding::encode(referer)
    )
}

/// the fetched url cut right after its last `/`, relative segment lines hang off this
pub fn base_path(fetched_from: &Url) -> Url {
    let mut base = fetched_from.clone();
    base.set_query(None);
    base.set_fragment(None);

    let path = fetched_from.path();
    let cut = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    base.set_path(&path[..cut]);
    base
}

/// rewrites every reference in a playlist (segments, keys, maps, sub-playlists) so it goes back
/// through the proxy with `referer` attached
///
/// lines keep their order, blank lines stay blank, and a reference that can't be resolved to
/// http(s) is left alone instead of dropped
pub fn rewrite(manifest: &str, fetched_from: &Url, referer: &str, proxy_base: &str) -> String {
    let base = base_path(fetched_from);
    let to_proxy = |reference: &str| -> String {
        match base.join(reference) {
            Ok(resolved) if is_http(&resolved) => {
                build_proxy_url(proxy_base, resolved.as_str(), referer)
            }
            _ => {
                debug!("leaving unresolvable playlist reference as-is: {}", reference);
                reference.to_string()
            }
        }
    };

    let lines: Vec<String> = manifest
        .split('\n')
        .map(|line| {
            let trimmed = line.trim();

            if trimmed.is_empty() {
                return String::new();
            }

            if trimmed.starts_with('#') {
                return URI_ATTRIBUTE_REGEX
                    .replace_all(trimmed, |caps: &Captures| {
                        if let Some(quoted) = caps.get(1) {
                            format!("URI=\"{}\"", to_proxy(quoted.as_str()))
                        } else {
                            let bare = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
                            format!("URI={}", to_proxy(bare))
                        }
                    })
                    .into_owned();
            }

            to_proxy(trimmed)
        })
        .collect();

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_path_drops_file_and_query() {
        let url = Url::parse("https://h/a/b/master.m3u8?token=1").unwrap();
        assert_eq!(base_path(&url).as_str(), "https://h/a/b/");
    }

    #[test]
    fn directives_without_uri_are_untouched() {
        let url = Url::parse("https://h/a/master.m3u8").unwrap();
        let out = rewrite("#EXT-X-VERSION:3\n#EXTINF:4.0,", &url, "https://r/", "https://p");
        assert_eq!(out, "#EXT-X-VERSION:3\n#EXTINF:4.0,");
    }
}
