use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::app::auth::SessionService;
use crate::http::AppError;
use crate::AppState;

pub const SESSION_COOKIE: &str = "sid";

/// The user behind a valid, unexpired session cookie.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let sid = session_cookie(&parts.headers).ok_or_else(AppError::unauthorized)?;

        let service = SessionService::new(
            state.db.clone(),
            state.identity_key,
            state.session_ttl_hours,
        );
        let session = service.authenticate(&sid).await.map_err(|err| {
            tracing::error!(error = ?err, "failed to authenticate session");
            AppError::internal("failed to authenticate")
        })?;

        let session = session.ok_or_else(AppError::unauthorized)?;
        Ok(AuthUser {
            user_id: session.user_id,
        })
    }
}

/// Value of the session cookie, if the request carries one.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

pub fn session_set_cookie(sid: &str, max_age_seconds: u64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, sid, max_age_seconds
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn session_clear_cookie(secure: bool) -> String {
    session_set_cookie("", 0, secure)
}
