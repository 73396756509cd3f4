use url::Url;

use super::url_utils::{origin_of, parse_origin};

/// the proxy always shows up upstream as this browser
pub const PROXY_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// hosts that only serve when they see one exact referer
pub struct RefererOverride {
    pub host_suffix: &'static str,
    pub referer: &'static str,
    pub send_origin: bool,
}

pub const REFERER_OVERRIDES: &[RefererOverride] = &[RefererOverride {
    host_suffix: "play.zephyrflick.top",
    referer: "https://play.zephyrflick.top/",
    send_origin: false,
}];

pub fn override_for(target: &Url) -> Option<&'static RefererOverride> {
    let host = target.host_str()?;
    REFERER_OVERRIDES
        .iter()
        .find(|o| host.ends_with(o.host_suffix))
}

/// headers the upstream needs to see on a proxied fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamIdentity {
    pub user_agent: &'static str,
    pub referer: String,
    pub origin: Option<String>,
}

impl UpstreamIdentity {
    /// referer is the caller's or else the target's own origin, origin follows the referer,
    /// unless the host is in the override table
    pub fn for_target(target: &Url, referer: Option<&str>) -> Self {
        if let Some(rule) = override_for(target) {
            return Self {
                user_agent: PROXY_USER_AGENT,
                referer: rule.referer.to_string(),
                origin: rule.send_origin.then(|| parse_origin(rule.referer)).flatten(),
            };
        }

        let target_origin = origin_of(target).unwrap_or_default();
        let referer = referer
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}/", target_origin));
        let origin = parse_origin(&referer).unwrap_or(target_origin);

        Self {
            user_agent: PROXY_USER_AGENT,
            referer,
            origin: Some(origin),
        }
    }
}
