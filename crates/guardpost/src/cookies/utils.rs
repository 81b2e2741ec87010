// Cookie parsing and Set-Cookie serialization.

use std::collections::HashMap;
use std::fmt;

/// Attributes for a single Set-Cookie header.
#[derive(Debug, Clone)]
pub struct CookieAttributes {
    pub value: String,
    pub max_age: Option<i64>,
    pub path: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl CookieAttributes {
    /// HttpOnly, Path=/, SameSite=Lax. The shape every cookie here uses.
    pub fn http_only_lax(value: impl Into<String>, secure: bool) -> Self {
        Self {
            value: value.into(),
            max_age: None,
            path: Some("/".into()),
            secure,
            http_only: true,
            same_site: Some(SameSite::Lax),
        }
    }

    pub fn with_max_age(mut self, max_age: i64) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Max-Age=0 tells the browser to drop the cookie immediately.
    pub fn expired(secure: bool) -> Self {
        Self::http_only_lax("", secure).with_max_age(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SameSite::Strict => write!(f, "Strict"),
            SameSite::Lax => write!(f, "Lax"),
            SameSite::None => write!(f, "None"),
        }
    }
}

/// Parse a `Cookie` request header into name → value.
pub fn parse_cookies(cookie_header: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for cookie in cookie_header.split(';') {
        if let Some((name, value)) = cookie.trim().split_once('=') {
            map.insert(name.to_string(), value.to_string());
        }
    }
    map
}

/// Serialize into a `Set-Cookie` header value.
pub fn serialize_cookie(name: &str, attrs: &CookieAttributes) -> String {
    let mut parts = vec![format!("{}={}", name, attrs.value)];

    if let Some(max_age) = attrs.max_age {
        parts.push(format!("Max-Age={max_age}"));
    }
    if let Some(ref path) = attrs.path {
        parts.push(format!("Path={path}"));
    }
    if attrs.secure {
        parts.push("Secure".into());
    }
    if attrs.http_only {
        parts.push("HttpOnly".into());
    }
    if let Some(same_site) = attrs.same_site {
        parts.push(format!("SameSite={same_site}"));
    }

    parts.join("; ")
}
