use axum::http::{
    HeaderMap, HeaderValue,
    header::{ACCEPT, AUTHORIZATION, COOKIE},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Duration;
use cookie::{Cookie, CookieJar, SameSite};

use super::{CSRF_COOKIE, ClientClass, Credentials, LOGIN_PATH, RequestProof};
use crate::error::{Error, Result};
use crate::types::SessionToken;

/// Collects every cookie from every `Cookie` header. Unparseable chunks are skipped.
pub fn parse_cookies(headers: &HeaderMap) -> CookieJar {
    let mut cookies = CookieJar::new();
    for header in headers.get_all(COOKIE) {
        let Ok(raw) = header.to_str() else {
            continue;
        };
        for chunk in raw.split(';').map(str::trim) {
            if let Ok(cookie) = Cookie::parse(chunk) {
                cookies.add_original(cookie.into_owned());
            }
        }
    }
    cookies
}

/// Decodes `Authorization: Basic base64(username:password)`.
/// Returns None for any other scheme or a malformed value.
pub fn extract_basic_credentials(headers: &HeaderMap) -> Option<Credentials> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let pair = String::from_utf8(decoded).ok()?;
    let (username, password) = pair.split_once(':')?;
    Some(Credentials::new(username, password))
}

/// Browsers announce `text/html` in Accept; anything else is treated as an API client.
pub fn classify_client(headers: &HeaderMap) -> ClientClass {
    let wants_html = headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.contains("text/html"));

    if wants_html {
        ClientClass::Interactive
    } else {
        ClientClass::Programmatic
    }
}

pub fn session_token_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<SessionToken> {
    let cookies = parse_cookies(headers);
    cookies
        .get(cookie_name)
        .map(|c| c.value())
        .filter(|v| !v.is_empty())
        .map(SessionToken::new)
}

pub fn proof_from_headers(headers: &HeaderMap, cookie_name: &str) -> RequestProof {
    RequestProof::new(
        session_token_from_headers(headers, cookie_name),
        extract_basic_credentials(headers),
    )
}

/// `Set-Cookie` value for a new session. Max-Age matches the session lifetime.
pub fn session_cookie_header_value(
    cookie_name: &str,
    token: &SessionToken,
    max_age: Duration,
    secure: bool,
) -> Result<HeaderValue> {
    let cookie = Cookie::build((cookie_name, token.as_str()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(cookie::time::Duration::seconds(max_age.num_seconds()))
        .build();
    to_header_value(&cookie)
}

/// `Set-Cookie` value that makes the browser drop the session cookie.
pub fn clear_session_cookie_header_value(cookie_name: &str, secure: bool) -> Result<HeaderValue> {
    let cookie = Cookie::build((cookie_name, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(cookie::time::Duration::ZERO)
        .build();
    to_header_value(&cookie)
}

pub fn csrf_cookie_from_headers(headers: &HeaderMap) -> Option<String> {
    parse_cookies(headers)
        .get(CSRF_COOKIE)
        .map(|c| c.value().to_string())
}

/// `Set-Cookie` value for the login form's CSRF cookie. Only sent back to
/// the login path.
pub fn csrf_cookie_header_value(value: &str, max_age: Duration, secure: bool) -> Result<HeaderValue> {
    let cookie = Cookie::build((CSRF_COOKIE, value))
        .path(LOGIN_PATH)
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .max_age(cookie::time::Duration::seconds(max_age.num_seconds()))
        .build();
    to_header_value(&cookie)
}

fn to_header_value(cookie: &Cookie<'_>) -> Result<HeaderValue> {
    HeaderValue::from_str(&cookie.to_string())
        .map_err(|e| Error::BadRequest(format!("invalid cookie value: {e}")))
}
