use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use url::Url;

static CODE_ESCAPE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\u([0-9a-fA-F]{4})|\\x([0-9a-fA-F]{2})")
        .expect("code escape regex should compile")
});

/// chained proxy calls end up double or triple encoding the target
const MAX_DECODE_PASSES: usize = 3;

/// percent-decodes until the value stops changing, a decode fails, or three passes are done
pub fn decode_repeatedly(value: &str) -> String {
    let mut current = value.to_string();
    for _ in 0..MAX_DECODE_PASSES {
        let decoded = match urlencoding::decode(&current) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => return current,
        };
        if decoded.is_empty() || decoded == current {
            return decoded;
        }
        current = decoded;
    }
    current
}

/// strips whitespace and any run of stray backticks or quotes players leave around the value
pub fn sanitize(value: &str) -> String {
    value
        .trim()
        .trim_matches('`')
        .trim_matches('"')
        .trim_matches('\'')
        .to_string()
}

/// `//host/path` -> `https://host/path`
pub fn promote_protocol_relative(value: &str) -> String {
    match value.strip_prefix("//") {
        Some(rest) => format!("https://{}", rest),
        None => value.to_string(),
    }
}

pub fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// `scheme://host[:port]` without a trailing slash, None for opaque origins
pub fn origin_of(url: &Url) -> Option<String> {
    let origin = url.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

pub fn parse_origin(value: &str) -> Option<String> {
    Url::parse(value).ok().as_ref().and_then(origin_of)
}

/// page text tends to carry urls json- or html-escaped, this rewrites the usual slash and
/// ampersand escapes back so the patterns can see the real thing
pub fn normalize_escapes(text: &str) -> String {
    const REPLACEMENTS: &[(&str, &str)] = &[
        ("\\u002F", "/"),
        ("\\u002f", "/"),
        ("\\x2F", "/"),
        ("\\x2f", "/"),
        ("\\/", "/"),
        ("\\u0026", "&"),
        ("\\x26", "&"),
        ("&amp;", "&"),
        ("&#38;", "&"),
        ("&#x26;", "&"),
    ];

    let replaced = REPLACEMENTS
        .iter()
        .fold(text.to_string(), |acc, (from, to)| acc.replace(from, to));

    // whatever `\uXXXX` / `\xXX` is left gets decoded as a code point
    CODE_ESCAPE_REGEX
        .replace_all(&replaced, |caps: &Captures| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .and_then(|hex| u32::from_str_radix(hex.as_str(), 16).ok())
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_stops_once_stable() {
        assert_eq!(decode_repeatedly("https://a.b/c"), "https://a.b/c");
        assert_eq!(
            decode_repeatedly("https%253A%252F%252Fa.b%252Fc"),
            "https://a.b/c"
        );
    }

    #[test]
    fn sanitize_strips_quote_runs() {
        assert_eq!(sanitize(" ``\"https://a.b\"`` "), "https://a.b");
        assert_eq!(sanitize("\"https://a.b\""), "https://a.b");
        assert_eq!(sanitize("'https://a.b'"), "https://a.b");
    }

    #[test]
    fn normalizes_json_and_html_escapes() {
        assert_eq!(
            normalize_escapes(r"https:\/\/a.b/c.m3u8?x=1&amp;y=2&z=3"),
            "https://a.b/c.m3u8?x=1&y=2&z=3"
        );
    }

    #[test]
    fn decodes_leftover_unicode_and_hex_escapes() {
        assert_eq!(
            normalize_escapes(r"https\u003a\/\/cdn/x.m3u8"),
            "https://cdn/x.m3u8"
        );
        assert_eq!(normalize_escapes(r"a\x3db\x26c"), "a=b&c");
        assert_eq!(normalize_escapes(r"\uD800 stays"), r"\uD800 stays");
    }
}
