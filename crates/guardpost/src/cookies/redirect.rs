// The redirect-to cookie carried across an external provider hand-off.
//
// Only in-app paths are ever stored or honored: a value that does not start
// with a single "/" could send the user to another origin after login, so it
// is dropped rather than sanitized.

use url::Url;

use super::utils::CookieAttributes;
use super::{AuthCookies, ResponseCookies};
use crate::cookies::utils::parse_cookies;

/// An in-app destination: absolute path, not protocol-relative.
pub fn safe_redirect(raw: &str) -> Option<String> {
    if raw.starts_with('/') && !raw.starts_with("//") && !raw.contains('\\') {
        Some(raw.to_string())
    } else {
        None
    }
}

/// The path-and-query portion of a Referer header, if it parses.
fn path_from_referrer(referrer: &str) -> Option<String> {
    let url = Url::parse(referrer).ok()?;
    let mut path = url.path().to_string();
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }
    safe_redirect(&path)
}

impl AuthCookies {
    /// Remember where to land after the provider round-trip. An explicit
    /// destination wins; otherwise fall back to the page the user came from.
    /// Nothing is set when neither yields a safe path.
    pub fn set_redirect(
        &self,
        response: &mut ResponseCookies,
        requested: Option<&str>,
        referrer: Option<&str>,
    ) {
        let destination = requested
            .and_then(safe_redirect)
            .or_else(|| referrer.and_then(path_from_referrer));
        if let Some(destination) = destination {
            let attrs = CookieAttributes::http_only_lax(
                urlencoding::encode(&destination).into_owned(),
                self.options().production,
            )
            .with_max_age(self.options().verification.redirect_cookie_max_age_seconds);
            response.set(&self.options().cookies.redirect_to, &attrs);
        }
    }

    /// Consume the stored destination: read it, clear the cookie, and return
    /// the path if it is still safe.
    pub fn take_redirect(
        &self,
        cookie_header: &str,
        response: &mut ResponseCookies,
    ) -> Option<String> {
        let cookies = parse_cookies(cookie_header);
        let raw = cookies.get(&self.options().cookies.redirect_to)?;
        response.set(
            &self.options().cookies.redirect_to,
            &CookieAttributes::expired(self.options().production),
        );
        let decoded = urlencoding::decode(raw).ok()?;
        safe_redirect(&decoded)
    }
}
