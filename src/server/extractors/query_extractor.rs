use std::collections::HashMap;
use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

/// query string as a map, when a key repeats the first value sticks
///
/// axum's `Query` rejects repeated keys for plain string fields, players sometimes send them
#[derive(Debug, Default, Clone)]
pub struct FirstQuery(pub HashMap<String, String>);

impl FirstQuery {
    pub fn parse(query: &str) -> Self {
        let mut params = HashMap::new();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            params
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }
        Self(params)
    }

    /// present and not blank
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}

impl<S> FromRequestParts<S> for FirstQuery
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.uri.query().map(Self::parse).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_value_wins() {
        let query = FirstQuery::parse("url=a&url=b&referer=");
        assert_eq!(query.get("url"), Some("a"));
        assert_eq!(query.get("referer"), None);
    }
}
