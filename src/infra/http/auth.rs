//! Viewer resolution and login redirects at the HTTP boundary.
//!
//! The login page itself belongs to the external identity subsystem; this
//! module only reads the session cookie and issues redirects toward it.

use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::CookieJar;
use uuid::Uuid;

use crate::application::auth::AuthService;
use crate::application::error::{HttpError, repo_error_to_http};
use crate::domain::viewer::Viewer;

pub const SESSION_COOKIE: &str = "session";
pub const LOGIN_PATH: &str = "/auth/login";

/// Resolve the `session` cookie to the request viewer. A missing or
/// malformed token is an anonymous viewer; a storage failure surfaces.
pub async fn resolve_viewer(auth: &AuthService, jar: &CookieJar) -> Result<Viewer, HttpError> {
    let token = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok());

    auth.resolve(token)
        .await
        .map_err(|err| repo_error_to_http("infra::http::auth::resolve_viewer", err))
}

/// Redirect an unauthenticated viewer to the login interstitial,
/// preserving the original target in `next`.
pub fn login_redirect(next: &str) -> Response {
    let query: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("next", next)
        .finish();
    Redirect::to(&format!("{LOGIN_PATH}?{query}")).into_response()
}
