//! Login and logout. Both routes are public; everything else goes through
//! the guard.

use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{FromRequest, Query, Request, State},
    http::{
        HeaderMap, StatusCode,
        header::{CONTENT_TYPE, SET_COOKIE},
    },
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};

use super::AppState;
use super::dto::{LoginQuery, LoginRequest, LoginResponse};
use super::response::{ApiError, ApiResponse};
use crate::auth::{ClientClass, LOGIN_PATH, helpers};
use crate::error::Error;

const CSRF_COOKIE_LIFETIME: chrono::Duration = chrono::Duration::hours(1);

const LOGIN_PAGE: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Sign in</title></head>
<body>
<form method="post" action="{action}">
<input type="hidden" name="csrf_token" value="{csrf}">
<label>Username <input name="username" autocomplete="username" required></label>
<label>Password <input name="password" type="password" autocomplete="current-password" required></label>
<button type="submit">Sign in</button>
</form>
</body>
</html>
"#;

pub fn session_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(LOGIN_PATH, get(login_page).post(login))
        .route("/logout", get(logout).post(logout))
}

/// Only same-site relative paths are followed after login.
fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//") && !n.contains('\\'))
}

fn login_action(next: Option<&str>) -> String {
    match safe_next(next) {
        Some(next) => format!("{LOGIN_PATH}?next={}", urlencoding::encode(next)),
        None => LOGIN_PATH.to_string(),
    }
}

fn render_login_page(next: Option<&str>, csrf: &str) -> String {
    LOGIN_PAGE
        .replace("{action}", &login_action(next))
        .replace("{csrf}", csrf)
}

/// Each render issues a fresh CSRF token: the nonce goes in the form and
/// the signed copy in a cookie.
async fn login_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LoginQuery>,
) -> Result<Response, ApiError> {
    let token = state.csrf.issue();
    let cookie = helpers::csrf_cookie_header_value(
        &token.cookie_value,
        CSRF_COOKIE_LIFETIME,
        state.config.session.secure_cookie,
    )?;

    let mut response =
        Html(render_login_page(query.next.as_deref(), &token.form_value)).into_response();
    response.headers_mut().append(SET_COOKIE, cookie);
    Ok(response)
}

/// Login body, accepted as JSON from API clients or as a form post from
/// the login page.
pub struct LoginInput {
    pub request: LoginRequest,
    pub from_form: bool,
}

impl<S: Send + Sync> FromRequest<S> for LoginInput {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let from_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"));

        let request = if from_form {
            let Form(request) = Form::<LoginRequest>::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            request
        } else {
            let Json(request) = Json::<LoginRequest>::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            request
        };

        Ok(Self { request, from_form })
    }
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LoginQuery>,
    headers: HeaderMap,
    input: LoginInput,
) -> Result<Response, ApiError> {
    let LoginInput { request, from_form } = input;

    // JSON bodies cannot be sent cross-site without a preflight.
    if from_form {
        let cookie = helpers::csrf_cookie_from_headers(&headers);
        if !state
            .csrf
            .verify(cookie.as_deref(), request.csrf_token.as_deref())
        {
            tracing::warn!(user = %request.username, "Login form rejected: bad CSRF token");
            return Err(ApiError::forbidden("Invalid or missing CSRF token"));
        }
    }

    let user = match state.verifier.verify(&request.username, &request.password) {
        Ok(user) => user,
        Err(Error::InvalidCredentials) => {
            tracing::info!(user = %request.username, "Login failed");
            return Err(ApiError::unauthorized("Invalid username or password"));
        }
        Err(e) => return Err(e.into()),
    };

    let issued = state.sessions.create(&user)?;
    let session_config = &state.config.session;
    let cookie = helpers::session_cookie_header_value(
        &session_config.cookie_name,
        &issued.token,
        state.sessions.lifetime(),
        session_config.secure_cookie,
    )?;

    tracing::info!(user = %user.username, "Login succeeded");

    let mut response = match (safe_next(query.next.as_deref()), from_form) {
        (Some(next), _) => Redirect::to(next).into_response(),
        (None, true) => Redirect::to("/").into_response(),
        (None, false) => Json(ApiResponse::success(LoginResponse {
            username: user.username,
            expires_at: issued.session.expires_at,
        }))
        .into_response(),
    };
    response.headers_mut().append(SET_COOKIE, cookie);
    Ok(response)
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let session_config = &state.config.session;
    if let Some(token) = helpers::session_token_from_headers(&headers, &session_config.cookie_name) {
        state.sessions.destroy(&token)?;
    }

    let clear = helpers::clear_session_cookie_header_value(
        &session_config.cookie_name,
        session_config.secure_cookie,
    )?;

    let mut response = match helpers::classify_client(&headers) {
        ClientClass::Interactive => Redirect::to(LOGIN_PATH).into_response(),
        ClientClass::Programmatic => StatusCode::NO_CONTENT.into_response(),
    };
    response.headers_mut().append(SET_COOKIE, clear);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/api/v1/resources?x=1")), Some("/api/v1/resources?x=1"));
        assert_eq!(safe_next(Some("//evil.example")), None);
        assert_eq!(safe_next(Some("https://evil.example")), None);
        assert_eq!(safe_next(Some("/\\evil.example")), None);
        assert_eq!(safe_next(None), None);
    }

    #[test]
    fn test_login_page_embeds_token_and_action() {
        let html = render_login_page(Some("/api/v1/me"), "nonce123");
        assert!(html.contains(r#"action="/login?next=%2Fapi%2Fv1%2Fme""#));
        assert!(html.contains(r#"name="csrf_token" value="nonce123""#));
    }

    #[test]
    fn test_login_action_keeps_next() {
        assert_eq!(login_action(Some("/a b")), "/login?next=%2Fa%20b");
        assert_eq!(login_action(Some("//evil")), "/login");
    }
}
