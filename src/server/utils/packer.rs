// reverses the `eval(function(p,a,c,k,e,d){...}('payload',radix,count,'words'.split('|')))`
// packer that embed pages wrap their player setup in
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// anything above this is either not a real packer or something we don't want to expand
pub const MAX_WORD_COUNT: usize = 5000;

const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

static PACKED_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)eval\(function\(p,a,c,k,e,[dr]\)\{.*?\}\('(.*?)',\s*(\d+),\s*(\d+),\s*'(.*?)'\.split\('\|'\)",
    )
    .expect("packer regex should compile")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedScript {
    pub payload: String,
    pub base: u32,
    pub word_count: usize,
    pub dictionary: Vec<String>,
}

impl PackedScript {
    pub fn new(payload: impl Into<String>, base: u32, word_count: usize, dictionary: &str) -> Self {
        Self {
            payload: payload.into(),
            base,
            word_count,
            dictionary: dictionary.split('|').map(String::from).collect(),
        }
    }

    /// pulls the packer arguments out of a page or script, None if there is no packer in it
    pub fn parse(source: &str) -> Option<Self> {
        let caps = PACKED_REGEX.captures(source)?;

        let payload = unescape_js(&caps[1]);
        let base = caps[2].parse().ok()?;
        let word_count = caps[3].parse().ok()?;
        let dictionary = unescape_js(&caps[4]);

        Some(Self::new(payload, base, word_count, &dictionary))
    }

    /// the substitution runs from the highest index down so `1a` is gone before `1` and `a` get
    /// their turn
    pub fn unpack(&self) -> Option<String> {
        if self.base == 0 || self.word_count == 0 || self.dictionary.iter().all(|w| w.is_empty()) {
            debug!("packer is missing its radix, count or dictionary");
            return None;
        }
        if self.word_count > MAX_WORD_COUNT {
            debug!("packer word count {} over the ceiling", self.word_count);
            return None;
        }
        if !(2..=62).contains(&self.base) {
            debug!("unsupported packer radix {}", self.base);
            return None;
        }

        let mut result = self.payload.clone();
        for index in (0..self.word_count).rev() {
            let Some(word) = self.dictionary.get(index).filter(|w| !w.is_empty()) else {
                continue;
            };
            let token = encode_index(index, self.base);
            result = replace_whole_word(&result, &token, word);
        }

        Some(result)
    }
}

/// finds a packer in `source` and unpacks it in one go
pub fn unpack_script(source: &str) -> Option<String> {
    PackedScript::parse(source)?.unpack()
}

fn unescape_js(value: &str) -> String {
    value.replace("\\'", "'").replace("\\\\", "\\")
}

/// the packer's own `e(c)` encoder, plain `toString(radix)` up to 36 and `fromCharCode(c + 29)`
/// for the upper case digits after that
pub fn encode_index(index: usize, base: u32) -> String {
    let base = base as usize;
    let mut digits = Vec::new();
    let mut n = index;

    loop {
        let rem = n % base;
        let digit = if rem > 35 {
            char::from((rem + 29) as u8)
        } else {
            char::from(DIGITS[rem])
        };
        digits.push(digit);
        n /= base;
        if n == 0 {
            break;
        }
    }

    digits.iter().rev().collect()
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// `\btoken\b` replacement without building a regex per dictionary entry
fn replace_whole_word(haystack: &str, token: &str, replacement: &str) -> String {
    let bytes = haystack.as_bytes();
    let mut out = String::with_capacity(haystack.len());
    let mut last = 0;

    for (start, _) in haystack.match_indices(token) {
        if start < last {
            continue;
        }
        let end = start + token.len();
        let left_ok = start == 0 || !is_word_byte(bytes[start - 1]);
        let right_ok = end == bytes.len() || !is_word_byte(bytes[end]);

        if left_ok && right_ok {
            out.push_str(&haystack[last..start]);
            out.push_str(replacement);
            last = end;
        }
    }

    out.push_str(&haystack[last..]);
    out
}
